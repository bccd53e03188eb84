use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::event::Event;
use crate::node::Reactive;
use crate::scheduler::Scheduler;
use crate::temporal::emit_at;
use crate::value::{Recompute, Value};

/// Timeout situation handed to a state machine's step function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsmTimeout {
	/// No timeout armed.
	None,
	/// The armed timeout expired; this step is the reaction to it.
	Expired,
	/// A timeout is armed and due in the given remaining time.
	Pending(Duration),
}

/// Next state and timeout returned by a step function. Echoing the incoming
/// timeout back (`Pending(remaining)` as `Some(remaining)`) leaves the armed
/// timer untouched; any other timeout re-arms or disarms it.
pub struct Transition<S> {
	pub state: S,
	pub timeout: Option<Duration>,
}

/// A finite-state machine over the reactive graph.
///
/// The step function runs once per transaction in which a declared input or
/// the timeout event changed; inputs are read by the closure itself, the
/// declared list only drives ordering. A transition to the current state
/// does not propagate.
pub struct Fsm<S: 'static> {
	pub state: Value<S>,
	pub timeout_length: Value<Option<Duration>>,
	pub timeout_time: Value<Option<Instant>>,
	pub timeout_event: Event<()>,
}

impl<S: Clone + PartialEq + 'static> Fsm<S> {
	pub fn new(
		scheduler: &Rc<dyn Scheduler>,
		initial: S,
		inputs: &[&dyn Reactive],
		step: impl Fn(&S, FsmTimeout) -> Transition<S> + 'static,
	) -> Fsm<S> {
		let timeout_length: Value<Option<Duration>> = Value::new(None);

		let timeout_time = {
			let scheduler = scheduler.clone();
			let length = timeout_length.clone();
			Value::computed(&[&timeout_length], move || {
				Recompute::Set(length.get().flatten().map(|length| scheduler.now() + length))
			})
		};

		let deadline = timeout_time.map(|time: &Option<Instant>| time.map(|at| (at, ())));
		let timeout_event = emit_at(scheduler, &deadline);

		let handling_timeout = Rc::new(Cell::new(false));
		{
			let handling_timeout = handling_timeout.clone();
			timeout_event.on_event(move |_| handling_timeout.set(true));
		}

		// None until the first step has run; the first step always settles.
		let current: Rc<RefCell<Option<S>>> = Rc::new(RefCell::new(None));

		let step_state = {
			let scheduler = scheduler.clone();
			let time = timeout_time.downgrade();
			let length = timeout_length.downgrade();
			let handling_timeout = handling_timeout.clone();
			let current = current.clone();
			move || {
				let timeout = if handling_timeout.get() {
					FsmTimeout::Expired
				} else {
					let due = time.upgrade().and_then(|time| time.get().flatten());
					match due {
						Some(at) => {
							FsmTimeout::Pending(at.saturating_duration_since(scheduler.now()))
						}
						None => FsmTimeout::None,
					}
				};
				let previous = current.borrow().clone();
				let transition = step(previous.as_ref().unwrap_or(&initial), timeout);
				handling_timeout.set(false);

				let timeout_now = match timeout {
					FsmTimeout::None => None,
					FsmTimeout::Expired => Some(Duration::ZERO),
					FsmTimeout::Pending(remaining) => Some(remaining),
				};
				if transition.timeout != timeout_now {
					if let Some(length) = length.upgrade() {
						if let Err(err) = length.set(transition.timeout) {
							tracing::error!(%err, "timeout update failed");
						}
					}
				}

				if previous.as_ref() != Some(&transition.state) {
					*current.borrow_mut() = Some(transition.state.clone());
					Recompute::Set(transition.state)
				} else {
					Recompute::NoChange
				}
			}
		};

		let mut state_inputs: Vec<&dyn Reactive> = inputs.to_vec();
		state_inputs.push(&timeout_event);
		let state = Value::computed(&state_inputs, step_state);
		// The step function writes the timeout, so the timeout value has to
		// settle after the state within the same transaction. Tracking-only:
		// an owning edge here would close an Rc cycle through the timeout
		// plumbing.
		timeout_length.add_edge(&state);

		Fsm {
			state,
			timeout_length,
			timeout_time,
			timeout_event,
		}
	}
}
