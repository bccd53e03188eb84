use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use enclose::enclose;

use crate::event::Event;
use crate::node::Reactive;
use crate::value::{Recompute, Value};

/// Aggregate the current data of several values, recomputed whenever any
/// member changes. Unset members appear as `None`.
pub fn value_vec<T: Clone + 'static>(values: &[Value<T>]) -> Value<Vec<Option<T>>> {
	let sources: Vec<Value<T>> = values.to_vec();
	let inputs: Vec<&dyn Reactive> = values.iter().map(|value| value as &dyn Reactive).collect();
	Value::computed(&inputs, move || {
		Recompute::Set(sources.iter().map(Value::get).collect())
	})
}

/// Keyed variant of [`value_vec`].
pub fn value_map<K, T>(entries: &[(K, Value<T>)]) -> Value<HashMap<K, Option<T>>>
where
	K: Clone + Eq + Hash + 'static,
	T: Clone + 'static,
{
	let sources: Vec<(K, Value<T>)> = entries.to_vec();
	let inputs: Vec<&dyn Reactive> = entries
		.iter()
		.map(|(_, value)| value as &dyn Reactive)
		.collect();
	Value::computed(&inputs, move || {
		Recompute::Set(
			sources
				.iter()
				.map(|(key, value)| (key.clone(), value.get()))
				.collect(),
		)
	})
}

/// An event emitting the new datum every time `source` changes to a real
/// value.
pub fn value_to_event<T: Clone + 'static>(source: &Value<T>) -> Event<T> {
	let event = Event::with_inputs(&[source]);
	let weak = event.downgrade();
	source.on_change(move |datum| {
		if let (Some(event), Some(datum)) = (weak.upgrade(), datum) {
			let _ = event.emit(datum.clone());
		}
	});
	event
}

/// A value latching the most recent payload of `source`.
pub fn event_to_value<T: Clone + 'static>(source: &Event<T>, initial: Option<T>) -> Value<T> {
	let value = match initial {
		Some(datum) => Value::new(datum),
		None => Value::unset(),
	};
	value.add_input(source);
	let weak = value.downgrade();
	source.on_event(move |payload| {
		if let Some(value) = weak.upgrade() {
			let _ = value.set(payload.clone());
		}
	});
	value
}

/// Lift a two-argument function over two values; unset until both are set.
pub fn lift2<A, B, R, F>(a: &Value<A>, b: &Value<B>, f: F) -> Value<R>
where
	A: Clone + 'static,
	B: Clone + 'static,
	R: 'static,
	F: Fn(&A, &B) -> R + 'static,
{
	let (sa, sb) = (a.clone(), b.clone());
	Value::computed(&[a, b], move || match (sa.get(), sb.get()) {
		(Some(a), Some(b)) => Recompute::Set(f(&a, &b)),
		_ => Recompute::NoChange,
	})
}

/// Emit `f(payload, latest_value)` once per emission of `source`, after both
/// inputs have settled. Changes to `value` alone do not emit.
pub fn snapshot<E, V, R, F>(source: &Event<E>, value: &Value<V>, f: F) -> Event<R>
where
	E: Clone + 'static,
	V: Clone + 'static,
	R: 'static,
	F: Fn(&E, Option<&V>) -> R + 'static,
{
	let pending: Rc<RefCell<Vec<E>>> = Rc::new(RefCell::new(Vec::new()));
	source.on_event(enclose!((pending) move |payload: &E| pending
		.borrow_mut()
		.push(payload.clone())));
	let latest = value.clone();
	Event::reactive(&[source, value], move |emitter| {
		let latest = latest.get();
		for payload in pending.take() {
			emitter.emit(f(&payload, latest.as_ref()));
		}
	})
}
