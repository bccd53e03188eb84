use std::cell::RefCell;
use std::rc::Rc;

use enclose::enclose;

use crate::event::Event;
use crate::source::Source;
use crate::value::{Recompute, Value};

/// The `count` most recent values or emissions of `source`. Shrinking
/// `count` crops the window immediately; growing it lengthens the window
/// gradually as new data arrives.
pub fn window<T: Clone + 'static>(source: &Source<T>, count: &Value<usize>) -> Value<Vec<T>> {
	let buffer: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));

	count.on_change(enclose!((buffer) move |count: Option<&usize>| {
		if let Some(&count) = count {
			trim(&mut buffer.borrow_mut(), count);
		}
	}));

	let limit = count.clone();
	let push = enclose!((buffer) move |datum: &T| {
		let mut buffer = buffer.borrow_mut();
		buffer.push(datum.clone());
		trim(&mut buffer, limit.get().unwrap_or(usize::MAX));
	});
	match source {
		Source::Continuous(value) => {
			if let Some(datum) = value.value().as_ref() {
				buffer.borrow_mut().push(datum.clone());
			}
			value.on_change(move |datum| {
				if let Some(datum) = datum {
					push(datum);
				}
			});
		}
		Source::Instantaneous(event) => event.on_event(push),
	}

	Value::computed(&[source, count], move || {
		Recompute::Set(buffer.borrow().clone())
	})
}

fn trim<T>(buffer: &mut Vec<T>, count: usize) {
	while buffer.len() > count {
		buffer.remove(0);
	}
}

/// Suppress consecutive duplicate values or emissions.
pub fn no_repeat<T: Clone + PartialEq + 'static>(source: &Source<T>) -> Source<T> {
	match source {
		Source::Continuous(value) => {
			// The outer Option distinguishes "never ran" from "saw unset".
			let seen: Rc<RefCell<Option<Option<T>>>> = Rc::new(RefCell::new(None));
			let source = value.clone();
			Source::Continuous(Value::computed(&[value], move || {
				let current = source.get();
				if seen.borrow().as_ref() == Some(&current) {
					return Recompute::NoChange;
				}
				*seen.borrow_mut() = Some(current.clone());
				match current {
					Some(datum) => Recompute::Set(datum),
					None => Recompute::Unset,
				}
			}))
		}
		Source::Instantaneous(event) => {
			let pending: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));
			event.on_event(enclose!((pending) move |payload: &T| pending
				.borrow_mut()
				.push(payload.clone())));
			let seen: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
			Source::Instantaneous(Event::reactive(&[event], move |emitter| {
				for payload in pending.take() {
					if seen.borrow().as_ref() != Some(&payload) {
						*seen.borrow_mut() = Some(payload.clone());
						emitter.emit(payload);
					}
				}
			}))
		}
	}
}

/// Pass through only the values or emissions accepted by `pred`. For a
/// continuous source a rejected change leaves the previous datum in place;
/// a rejected initial datum leaves the output unset.
pub fn filter<T, F>(source: &Source<T>, pred: F) -> Source<T>
where
	T: Clone + 'static,
	F: Fn(&T) -> bool + 'static,
{
	match source {
		Source::Continuous(value) => {
			let source = value.clone();
			Source::Continuous(Value::computed(&[value], move || match source.get() {
				Some(datum) if pred(&datum) => Recompute::Set(datum),
				_ => Recompute::NoChange,
			}))
		}
		Source::Instantaneous(event) => {
			let pending: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));
			event.on_event(enclose!((pending) move |payload: &T| pending
				.borrow_mut()
				.push(payload.clone())));
			Source::Instantaneous(Event::reactive(&[event], move |emitter| {
				for payload in pending.take() {
					if pred(&payload) {
						emitter.emit(payload);
					}
				}
			}))
		}
	}
}

/// A copy of `source` substituting `fallback` while the source is unset.
pub fn replace_unset<T: Clone + 'static>(source: &Value<T>, fallback: T) -> Value<T> {
	let inner = source.clone();
	Value::computed(&[source], move || {
		Recompute::Set(inner.get().unwrap_or_else(|| fallback.clone()))
	})
}
