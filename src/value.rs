use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::index::DependencyLoop;
use crate::node::{self, Links, NodeBody, NodeHandle, NodeId, Reactive};
use crate::transaction::{self, Transaction};

/// Outcome of a recompute step.
pub enum Recompute<T> {
	/// Store a new datum and propagate.
	Set(T),
	/// Clear the datum back to "no value" and propagate.
	Unset,
	/// Keep the current datum; listeners and dependents are not touched.
	NoChange,
}

type Listener<T> = Rc<dyn Fn(Option<&T>)>;
type RecomputeFn<T> = Box<dyn Fn() -> Recompute<T>>;

/// A continuous reactive value.
///
/// The datum domain is `Option<T>`: `None` is the "no value" marker, distinct
/// from every real datum. Writes always notify and always propagate, even
/// when the datum compares equal to the previous one; deduplication is a
/// combinator concern, not an engine concern.
pub struct Value<T: 'static> {
	body: Rc<ValueBody<T>>,
}

pub struct WeakValue<T: 'static> {
	body: Weak<ValueBody<T>>,
}

struct ValueBody<T: 'static> {
	id: NodeId,
	datum: RefCell<Option<T>>,
	listeners: RefCell<SmallVec<[Listener<T>; 2]>>,
	recompute: Option<RecomputeFn<T>>,
	links: RefCell<Links>,
}

impl<T: 'static> Value<T> {
	pub fn new(initial: T) -> Value<T> {
		Value::with_datum(Some(initial))
	}

	/// A value holding no datum yet.
	pub fn unset() -> Value<T> {
		Value::with_datum(None)
	}

	fn with_datum(datum: Option<T>) -> Value<T> {
		Value {
			body: Rc::new(ValueBody {
				id: NodeId::new(),
				datum: RefCell::new(datum),
				listeners: RefCell::new(SmallVec::new()),
				recompute: None,
				links: RefCell::new(Links::new()),
			}),
		}
	}

	/// A value derived from `inputs`. `recompute` runs once now to seed the
	/// datum and again in every transaction in which an input changed.
	pub fn computed(
		inputs: &[&dyn Reactive],
		recompute: impl Fn() -> Recompute<T> + 'static,
	) -> Value<T> {
		let body = Rc::new(ValueBody {
			id: NodeId::new(),
			datum: RefCell::new(None),
			listeners: RefCell::new(SmallVec::new()),
			recompute: Some(Box::new(recompute)),
			links: RefCell::new(Links::new()),
		});
		let node: Rc<dyn NodeBody> = body.clone();
		for input in inputs {
			node::declare_input(&node, &input.as_node());
		}
		// A fresh node has no dependents and no listeners yet, so the seed
		// datum is assigned directly instead of going through a transaction.
		if let Some(recompute) = body.recompute.as_deref() {
			if let Recompute::Set(datum) = recompute() {
				*body.datum.borrow_mut() = Some(datum);
			}
		}
		Value { body }
	}

	/// Borrow the current datum; `None` is the "no value" marker.
	pub fn value(&self) -> Ref<'_, Option<T>> {
		self.body.datum.borrow()
	}

	/// Clone of the current datum.
	pub fn get(&self) -> Option<T>
	where
		T: Clone,
	{
		self.body.datum.borrow().clone()
	}

	pub fn set(&self, datum: T) -> Result<(), DependencyLoop> {
		self.write(Some(datum))
	}

	/// Clear the datum back to "no value". Notifies and propagates like any
	/// other write.
	pub fn clear(&self) -> Result<(), DependencyLoop> {
		self.write(None)
	}

	pub(crate) fn write(&self, datum: Option<T>) -> Result<(), DependencyLoop> {
		let node: Rc<dyn NodeBody> = self.body.clone();
		let body = &self.body;
		transaction::propagate(
			&node,
			move || *body.datum.borrow_mut() = datum,
			|| body.notify(),
		)
	}

	/// Register a change listener, called with the new datum on every write.
	/// Listeners cannot be removed; they live as long as the value does.
	pub fn on_change(&self, listener: impl Fn(Option<&T>) + 'static) {
		self.body.listeners.borrow_mut().push(Rc::new(listener));
	}

	/// Declare a late input edge from `input` to this value.
	pub fn add_input(&self, input: &dyn Reactive) {
		let node: Rc<dyn NodeBody> = self.body.clone();
		node::declare_input(&node, &input.as_node());
	}

	/// Tracking-only edge: settle on `input` changes without owning it.
	pub(crate) fn add_edge(&self, input: &dyn Reactive) {
		let node: Rc<dyn NodeBody> = self.body.clone();
		node::declare_edge(&node, &input.as_node());
	}

	pub fn downgrade(&self) -> WeakValue<T> {
		WeakValue {
			body: Rc::downgrade(&self.body),
		}
	}

	pub fn map<R: 'static>(&self, f: impl Fn(&T) -> R + 'static) -> Value<R>
	where
		T: Clone,
	{
		let source = self.clone();
		Value::computed(&[self], move || match source.get() {
			Some(datum) => Recompute::Set(f(&datum)),
			None => Recompute::Unset,
		})
	}
}

impl<T: 'static> ValueBody<T> {
	fn notify(&self) {
		// Listeners may register further listeners; iterate over a snapshot.
		let listeners = self.listeners.borrow().clone();
		for listener in &listeners {
			listener(self.datum.borrow().as_ref());
		}
	}

	fn apply(&self, tx: &Transaction, datum: Option<T>) {
		tx.mark(self);
		*self.datum.borrow_mut() = datum;
		self.notify();
	}
}

impl<T: 'static> NodeBody for ValueBody<T> {
	fn node_id(&self) -> NodeId {
		self.id
	}

	fn links(&self) -> &RefCell<Links> {
		&self.links
	}

	fn settle(self: Rc<Self>, tx: &Transaction) {
		let Some(recompute) = self.recompute.as_deref() else {
			return;
		};
		match recompute() {
			Recompute::Set(datum) => self.apply(tx, Some(datum)),
			Recompute::Unset => self.apply(tx, None),
			Recompute::NoChange => {}
		}
	}

	fn kind(&self) -> &'static str {
		"value"
	}
}

impl<T: 'static> Reactive for Value<T> {
	fn as_node(&self) -> NodeHandle {
		NodeHandle {
			body: self.body.clone(),
		}
	}
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Value<T> {
		Value {
			body: self.body.clone(),
		}
	}
}

impl<T: Default + 'static> Default for Value<T> {
	fn default() -> Value<T> {
		Value::new(T::default())
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Value<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.body.datum.borrow().as_ref() {
			Some(datum) => write!(f, "Value({:?})", datum),
			None => write!(f, "Value(<unset>)"),
		}
	}
}

impl<T: 'static> WeakValue<T> {
	pub fn upgrade(&self) -> Option<Value<T>> {
		self.body.upgrade().map(|body| Value { body })
	}
}

impl<T> Clone for WeakValue<T> {
	fn clone(&self) -> WeakValue<T> {
		WeakValue {
			body: self.body.clone(),
		}
	}
}
