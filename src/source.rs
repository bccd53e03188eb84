use crate::event::Event;
use crate::index::DependencyLoop;
use crate::node::{NodeHandle, Reactive};
use crate::value::Value;

/// The two node kinds as a closed variant: a continuous value or an
/// instantaneous event. Combinators that accept either kind take a `Source`.
pub enum Source<T: 'static> {
	Continuous(Value<T>),
	Instantaneous(Event<T>),
}

impl<T: 'static> Source<T> {
	/// Call `f` with the current datum (continuous sources only, when set)
	/// and then for every subsequent change or emission.
	pub fn on_each(&self, f: impl Fn(&T) + 'static) {
		match self {
			Source::Continuous(value) => {
				if let Some(datum) = value.value().as_ref() {
					f(datum);
				}
				value.on_change(move |datum| {
					if let Some(datum) = datum {
						f(datum);
					}
				});
			}
			Source::Instantaneous(event) => event.on_event(f),
		}
	}

	/// A function writing into this node: `set` for a value, `emit` for an
	/// event.
	pub fn sink(&self) -> Box<dyn Fn(T) -> Result<(), DependencyLoop>> {
		match self {
			Source::Continuous(value) => {
				let value = value.clone();
				Box::new(move |datum| value.set(datum))
			}
			Source::Instantaneous(event) => {
				let event = event.clone();
				Box::new(move |payload| event.emit(payload))
			}
		}
	}
}

impl<T: 'static> Reactive for Source<T> {
	fn as_node(&self) -> NodeHandle {
		match self {
			Source::Continuous(value) => value.as_node(),
			Source::Instantaneous(event) => event.as_node(),
		}
	}
}

impl<T> Clone for Source<T> {
	fn clone(&self) -> Source<T> {
		match self {
			Source::Continuous(value) => Source::Continuous(value.clone()),
			Source::Instantaneous(event) => Source::Instantaneous(event.clone()),
		}
	}
}

impl<T: 'static> From<Value<T>> for Source<T> {
	fn from(value: Value<T>) -> Source<T> {
		Source::Continuous(value)
	}
}

impl<T: 'static> From<Event<T>> for Source<T> {
	fn from(event: Event<T>) -> Source<T> {
		Source::Instantaneous(event)
	}
}
