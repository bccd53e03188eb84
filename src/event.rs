use std::cell::RefCell;
use std::rc::{Rc, Weak};

use enclose::enclose;
use smallvec::SmallVec;

use crate::index::DependencyLoop;
use crate::node::{self, Links, NodeBody, NodeHandle, NodeId, Reactive};
use crate::transaction::{self, Transaction};

type Listener<T> = Rc<dyn Fn(&T)>;
type ReactionFn<T> = Box<dyn Fn(&Emitter<T>)>;

/// An instantaneous reactive node: no persisted datum, only notifications.
pub struct Event<T: 'static> {
	body: Rc<EventBody<T>>,
}

pub struct WeakEvent<T: 'static> {
	body: Weak<EventBody<T>>,
}

struct EventBody<T: 'static> {
	id: NodeId,
	listeners: RefCell<SmallVec<[Listener<T>; 2]>>,
	reaction: Option<ReactionFn<T>>,
	links: RefCell<Links>,
}

/// Capability handed to an event's reaction. Every `emit` notifies the
/// listeners immediately and marks the event changed in the transaction, so
/// downstream nodes settle once however many payloads were emitted.
pub struct Emitter<T: 'static> {
	body: Rc<EventBody<T>>,
	tx: Transaction,
}

impl<T: 'static> Emitter<T> {
	pub fn emit(&self, payload: T) {
		self.tx.mark(self.body.as_ref());
		self.body.notify(&payload);
	}
}

impl<T: 'static> Event<T> {
	pub fn new() -> Event<T> {
		Event::build(&[], None)
	}

	/// An event participating in ordering below `inputs` without reacting
	/// itself; emissions come from listeners on the inputs.
	pub fn with_inputs(inputs: &[&dyn Reactive]) -> Event<T> {
		Event::build(inputs, None)
	}

	/// An event whose reaction runs once per transaction in which an input
	/// changed, after every input has settled. The reaction may emit zero or
	/// more payloads.
	pub fn reactive(
		inputs: &[&dyn Reactive],
		reaction: impl Fn(&Emitter<T>) + 'static,
	) -> Event<T> {
		Event::build(inputs, Some(Box::new(reaction)))
	}

	fn build(inputs: &[&dyn Reactive], reaction: Option<ReactionFn<T>>) -> Event<T> {
		let body = Rc::new(EventBody {
			id: NodeId::new(),
			listeners: RefCell::new(SmallVec::new()),
			reaction,
			links: RefCell::new(Links::new()),
		});
		let node: Rc<dyn NodeBody> = body.clone();
		for input in inputs {
			node::declare_input(&node, &input.as_node());
		}
		Event { body }
	}

	pub fn emit(&self, payload: T) -> Result<(), DependencyLoop> {
		let node: Rc<dyn NodeBody> = self.body.clone();
		transaction::propagate(&node, || {}, || self.body.notify(&payload))
	}

	/// Register a listener for every emitted payload. Listeners cannot be
	/// removed; they live as long as the event does.
	pub fn on_event(&self, listener: impl Fn(&T) + 'static) {
		self.body.listeners.borrow_mut().push(Rc::new(listener));
	}

	/// Declare a late input edge from `input` to this event.
	pub fn add_input(&self, input: &dyn Reactive) {
		let node: Rc<dyn NodeBody> = self.body.clone();
		node::declare_input(&node, &input.as_node());
	}

	/// Keep `kept` alive for as long as this event lives, without an edge.
	pub(crate) fn retain(&self, kept: &dyn Reactive) {
		let node: Rc<dyn NodeBody> = self.body.clone();
		node::retain(&node, &kept.as_node());
	}

	pub fn downgrade(&self) -> WeakEvent<T> {
		WeakEvent {
			body: Rc::downgrade(&self.body),
		}
	}

	pub fn map<R: 'static>(&self, f: impl Fn(&T) -> R + 'static) -> Event<R>
	where
		T: Clone,
	{
		let pending: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));
		self.on_event(enclose!((pending) move |payload: &T| pending
			.borrow_mut()
			.push(payload.clone())));
		Event::reactive(&[self], move |emitter| {
			for payload in pending.take() {
				emitter.emit(f(&payload));
			}
		})
	}
}

impl<T: 'static> EventBody<T> {
	fn notify(&self, payload: &T) {
		let listeners = self.listeners.borrow().clone();
		for listener in &listeners {
			listener(payload);
		}
	}
}

impl<T: 'static> NodeBody for EventBody<T> {
	fn node_id(&self) -> NodeId {
		self.id
	}

	fn links(&self) -> &RefCell<Links> {
		&self.links
	}

	fn settle(self: Rc<Self>, tx: &Transaction) {
		let Some(reaction) = self.reaction.as_deref() else {
			return;
		};
		let emitter = Emitter {
			body: self.clone(),
			tx: tx.clone(),
		};
		reaction(&emitter);
	}

	fn kind(&self) -> &'static str {
		"event"
	}
}

impl<T: 'static> Reactive for Event<T> {
	fn as_node(&self) -> NodeHandle {
		NodeHandle {
			body: self.body.clone(),
		}
	}
}

impl<T> Clone for Event<T> {
	fn clone(&self) -> Event<T> {
		Event {
			body: self.body.clone(),
		}
	}
}

impl<T: 'static> Default for Event<T> {
	fn default() -> Event<T> {
		Event::new()
	}
}

impl<T: 'static> WeakEvent<T> {
	pub fn upgrade(&self) -> Option<Event<T>> {
		self.body.upgrade().map(|body| Event { body })
	}
}

impl<T> Clone for WeakEvent<T> {
	fn clone(&self) -> WeakEvent<T> {
		WeakEvent {
			body: self.body.clone(),
		}
	}
}
