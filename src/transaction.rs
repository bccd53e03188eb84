use std::cell::RefCell;
use std::rc::Rc;

use crate::index::{DepIndex, DependencyLoop};
use crate::node::NodeBody;

thread_local! {
	static ACTIVE: RefCell<Vec<Rc<DepIndex>>> = RefCell::new(Vec::new());
}

/// Handle to the transaction currently walking the graph. Marking a node
/// flags it as changed and queues its direct dependents to settle.
#[derive(Clone)]
pub(crate) struct Transaction {
	index: Rc<DepIndex>,
}

impl Transaction {
	fn active() -> Option<Transaction> {
		ACTIVE
			.with(|stack| stack.borrow().last().cloned())
			.map(|index| Transaction { index })
	}

	/// Returns false when `node` is not part of this transaction's closure.
	pub(crate) fn mark(&self, node: &dyn NodeBody) -> bool {
		match self.index.position(node.node_id()) {
			Some(idx) => {
				self.index.mark(idx);
				true
			}
			None => false,
		}
	}
}

/// Pops the transaction frame even when a listener or recompute panics.
struct ActiveGuard;

impl ActiveGuard {
	fn push(index: Rc<DepIndex>) -> ActiveGuard {
		ACTIVE.with(|stack| stack.borrow_mut().push(index));
		ActiveGuard
	}
}

impl Drop for ActiveGuard {
	fn drop(&mut self) {
		ACTIVE.with(|stack| {
			stack.borrow_mut().pop();
		});
	}
}

/// Drive one mutation of `root` through the graph.
///
/// Inside an active transaction that knows `root`, the change is folded into
/// that transaction. A change to a node the active transaction cannot see is
/// reported as an untracked dependency and recovered with a fresh nested
/// transaction. The dependency closure is validated before `commit` runs, so
/// a dependency loop rejects the mutation without committing it.
pub(crate) fn propagate(
	root: &Rc<dyn NodeBody>,
	commit: impl FnOnce(),
	notify: impl FnOnce(),
) -> Result<(), DependencyLoop> {
	if let Some(tx) = Transaction::active() {
		if tx.mark(root.as_ref()) {
			commit();
			notify();
			return Ok(());
		}
		tracing::warn!(
			node = ?root.node_id(),
			kind = root.kind(),
			"untracked dependency: changed node is outside the active transaction"
		);
	}
	let index = refresh(root)?;
	commit();
	match index {
		None => notify(),
		Some(index) => run(root, index, notify),
	}
	Ok(())
}

fn refresh(root: &Rc<dyn NodeBody>) -> Result<Option<Rc<DepIndex>>, DependencyLoop> {
	if root.links().borrow().dependents.is_empty() {
		// Nothing downstream: listeners only, no walk.
		return Ok(None);
	}
	let cached = root.links().borrow().index.clone();
	if let Some(index) = cached {
		if index.is_fresh() {
			return Ok(Some(index));
		}
	}
	let index = Rc::new(DepIndex::build(root)?);
	root.links().borrow_mut().index = Some(index.clone());
	Ok(Some(index))
}

fn run(root: &Rc<dyn NodeBody>, index: Rc<DepIndex>, notify: impl FnOnce()) {
	index.reset();
	let tx = Transaction { index: index.clone() };
	let _guard = ActiveGuard::push(index.clone());
	tx.mark(root.as_ref());
	// Listeners run inside the transaction context, so a listener writing
	// to an unrelated node goes through the untracked-dependency path.
	notify();
	for idx in 1..index.len() {
		let due = index.should_run(idx);
		if due {
			if let Some(node) = index.node_at(idx) {
				node.settle(&tx);
			}
		}
	}
}
