use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fxhash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::node::{NodeBody, NodeId};

/// A mutation was rejected because the dependency graph reachable from the
/// mutated node contains a cycle. The datum is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dependency loop in the reactive graph")]
pub struct DependencyLoop;

/// Topologically sorted closure of one root's transitive dependents, plus
/// the per-transaction scratch flags. Cached on the root and rebuilt when
/// any member's dependent list has changed since the snapshot was taken.
pub(crate) struct DepIndex {
	sorted: Vec<Weak<dyn NodeBody>>,
	versions: Vec<u64>,
	dependent_idxes: Vec<Vec<usize>>,
	id_to_idx: FxHashMap<NodeId, usize>,
	changed: RefCell<Vec<bool>>,
	to_run: RefCell<Vec<bool>>,
}

impl DepIndex {
	pub(crate) fn build(root: &Rc<dyn NodeBody>) -> Result<DepIndex, DependencyLoop> {
		let mut order: Vec<Rc<dyn NodeBody>> = Vec::new();
		let mut done = FxHashSet::default();
		let mut open = FxHashSet::default();
		visit(root, &mut order, &mut done, &mut open)?;
		// Reversed post-order: the root first, every node after all of its
		// inputs that belong to the closure.
		order.reverse();
		debug_assert!(Rc::ptr_eq(&order[0], root));

		let id_to_idx: FxHashMap<NodeId, usize> = order
			.iter()
			.enumerate()
			.map(|(idx, node)| (node.node_id(), idx))
			.collect();
		let dependent_idxes: Vec<Vec<usize>> = order
			.iter()
			.map(|node| {
				node.links()
					.borrow_mut()
					.live_dependents()
					.iter()
					.map(|dependent| {
						id_to_idx
							.get(&dependent.node_id())
							.copied()
							.expect("inconsistent dependency references")
					})
					.collect()
			})
			.collect();
		let versions: Vec<u64> = order
			.iter()
			.map(|node| node.links().borrow().dependents_version)
			.collect();

		let len = order.len();
		Ok(DepIndex {
			sorted: order.iter().map(Rc::downgrade).collect(),
			versions,
			dependent_idxes,
			id_to_idx,
			changed: RefCell::new(vec![false; len]),
			to_run: RefCell::new(vec![false; len]),
		})
	}

	/// Whether every member's dependent list still matches the snapshot this
	/// index was built from. Pruning dead dependents counts as a change.
	pub(crate) fn is_fresh(&self) -> bool {
		self.sorted.iter().zip(&self.versions).all(|(node, version)| {
			match node.upgrade() {
				Some(node) => {
					node.links().borrow_mut().live_dependents();
					node.links().borrow().dependents_version == *version
				}
				None => false,
			}
		})
	}

	pub(crate) fn len(&self) -> usize {
		self.sorted.len()
	}

	pub(crate) fn position(&self, id: NodeId) -> Option<usize> {
		self.id_to_idx.get(&id).copied()
	}

	pub(crate) fn node_at(&self, idx: usize) -> Option<Rc<dyn NodeBody>> {
		self.sorted[idx].upgrade()
	}

	pub(crate) fn reset(&self) {
		for flag in self.changed.borrow_mut().iter_mut() {
			*flag = false;
		}
		for flag in self.to_run.borrow_mut().iter_mut() {
			*flag = false;
		}
	}

	/// Record that the node at `idx` changed and queue its direct dependents.
	pub(crate) fn mark(&self, idx: usize) {
		self.changed.borrow_mut()[idx] = true;
		let mut to_run = self.to_run.borrow_mut();
		for &dependent in &self.dependent_idxes[idx] {
			to_run[dependent] = true;
		}
	}

	pub(crate) fn should_run(&self, idx: usize) -> bool {
		self.to_run.borrow()[idx]
	}
}

fn visit(
	node: &Rc<dyn NodeBody>,
	order: &mut Vec<Rc<dyn NodeBody>>,
	done: &mut FxHashSet<NodeId>,
	open: &mut FxHashSet<NodeId>,
) -> Result<(), DependencyLoop> {
	let id = node.node_id();
	if done.contains(&id) {
		return Ok(());
	}
	if !open.insert(id) {
		return Err(DependencyLoop);
	}
	let dependents = node.links().borrow_mut().live_dependents();
	for dependent in &dependents {
		visit(dependent, order, done, open)?;
	}
	open.remove(&id);
	done.insert(id);
	order.push(node.clone());
	Ok(())
}
