use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::index::DepIndex;
use crate::transaction::Transaction;

pub(crate) type NodeId = snowflake::ProcessUniqueId;

/// A participant in the dependency graph. Implemented by the value and event
/// bodies; the engine only ever sees nodes through this trait.
pub(crate) trait NodeBody: 'static {
	fn node_id(&self) -> NodeId;
	fn links(&self) -> &RefCell<Links>;
	/// Run this node's settle step. Called at most once per transaction,
	/// after every upstream member of the closure has settled.
	fn settle(self: Rc<Self>, tx: &Transaction);
	fn kind(&self) -> &'static str;
}

/// Graph edges of one node. Inputs are owned, dependents are weak; the
/// version counter is bumped on every dependent add or prune so cached
/// dependency indexes can detect staleness.
pub(crate) struct Links {
	pub(crate) inputs: SmallVec<[Rc<dyn NodeBody>; 2]>,
	pub(crate) dependents: Vec<Weak<dyn NodeBody>>,
	pub(crate) dependents_version: u64,
	pub(crate) index: Option<Rc<DepIndex>>,
	#[allow(dead_code)]
	retained: Vec<Rc<dyn NodeBody>>,
}

impl Links {
	pub(crate) fn new() -> Links {
		Links {
			inputs: SmallVec::new(),
			dependents: Vec::new(),
			dependents_version: 0,
			index: None,
			retained: Vec::new(),
		}
	}

	/// Upgrade every dependent, pruning the ones that have been collected.
	pub(crate) fn live_dependents(&mut self) -> Vec<Rc<dyn NodeBody>> {
		let before = self.dependents.len();
		let mut live = Vec::with_capacity(before);
		self.dependents.retain(|dependent| match dependent.upgrade() {
			Some(dependent) => {
				live.push(dependent);
				true
			}
			None => false,
		});
		if self.dependents.len() != before {
			self.dependents_version += 1;
		}
		live
	}
}

/// Opaque handle to a node of either kind, used to declare graph edges.
#[derive(Clone)]
pub struct NodeHandle {
	pub(crate) body: Rc<dyn NodeBody>,
}

/// Anything that can appear in an input list.
pub trait Reactive {
	fn as_node(&self) -> NodeHandle;
}

/// Declare `input` as an upstream source of `dependent`: the dependent owns
/// the input, the input holds the dependent weakly.
pub(crate) fn declare_input(dependent: &Rc<dyn NodeBody>, input: &NodeHandle) {
	if Rc::ptr_eq(dependent, &input.body) {
		// Self edge: one borrow for both sides. The loop it forms is
		// reported when the next transaction starts.
		let mut links = dependent.links().borrow_mut();
		links.inputs.push(input.body.clone());
		links.dependents.push(Rc::downgrade(dependent));
		links.dependents_version += 1;
		return;
	}
	dependent.links().borrow_mut().inputs.push(input.body.clone());
	let mut links = input.body.links().borrow_mut();
	links.dependents.push(Rc::downgrade(dependent));
	links.dependents_version += 1;
}

/// Declare a tracking-only edge: `dependent` settles when `input` changes but
/// takes no ownership of it. Used where an owning edge would close an `Rc`
/// cycle, such as a state machine writing back to its own timeout.
pub(crate) fn declare_edge(dependent: &Rc<dyn NodeBody>, input: &NodeHandle) {
	let mut links = input.body.links().borrow_mut();
	links.dependents.push(Rc::downgrade(dependent));
	links.dependents_version += 1;
}

/// Keep `kept` alive for as long as `owner` lives, without a propagation
/// edge between them.
pub(crate) fn retain(owner: &Rc<dyn NodeBody>, kept: &NodeHandle) {
	owner.links().borrow_mut().retained.push(kept.body.clone());
}
