use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use ripple::{Event, Fsm, FsmTimeout, ManualScheduler, Scheduler, Transition, Value};

fn echo(timeout: FsmTimeout) -> Option<Duration> {
	match timeout {
		FsmTimeout::None => None,
		FsmTimeout::Expired => Some(Duration::ZERO),
		FsmTimeout::Pending(remaining) => Some(remaining),
	}
}

/// A light toggled by a button, switching itself off after `hold` or when
/// `force_off` is raised.
fn toggle_fsm(
	scheduler: &Rc<dyn Scheduler>,
	button: &Event<()>,
	force_off: &Value<bool>,
	hold: Duration,
) -> Fsm<bool> {
	let presses: Rc<RefCell<Vec<()>>> = Rc::new(RefCell::new(Vec::new()));
	{
		let presses = presses.clone();
		button.on_event(move |_| presses.borrow_mut().push(()));
	}
	let force = force_off.clone();
	Fsm::new(scheduler, false, &[button, force_off], move |state, timeout| {
		let pressed = !presses.take().is_empty();
		let forced = force.get().unwrap_or(false);
		match (*state, timeout, pressed, forced) {
			(_, _, _, true) => Transition {
				state: false,
				timeout: None,
			},
			(false, _, true, false) => Transition {
				state: true,
				timeout: Some(hold),
			},
			(true, _, true, false) => Transition {
				state: false,
				timeout: None,
			},
			(true, FsmTimeout::Expired, false, false) => Transition {
				state: false,
				timeout: None,
			},
			(state, timeout, false, false) => Transition {
				state,
				timeout: echo(timeout),
			},
		}
	})
}

#[test]
fn fsm_toggles_with_timeout() {
	let manual = ManualScheduler::new();
	let scheduler: Rc<dyn Scheduler> = manual.clone();

	let button: Event<()> = Event::new();
	let force_off = Value::new(false);
	let hold = Duration::from_secs(1);
	let fsm = toggle_fsm(&scheduler, &button, &force_off, hold);
	let state = fsm.state.clone();

	assert_eq!(state.get(), Some(false));

	// Press switches on; the hold timeout switches back off.
	button.emit(()).unwrap();
	assert_eq!(state.get(), Some(true));
	assert_eq!(fsm.timeout_length.get(), Some(Some(hold)));
	manual.advance(Duration::from_secs(2));
	assert_eq!(state.get(), Some(false));
	assert_eq!(fsm.timeout_length.get(), Some(None));

	// A second press before the timeout switches off and disarms it.
	button.emit(()).unwrap();
	assert_eq!(state.get(), Some(true));
	button.emit(()).unwrap();
	assert_eq!(state.get(), Some(false));
	manual.advance(Duration::from_secs(2));
	assert_eq!(state.get(), Some(false));

	// Force-off wins over everything and disarms the timeout.
	button.emit(()).unwrap();
	assert_eq!(state.get(), Some(true));
	force_off.set(true).unwrap();
	assert_eq!(state.get(), Some(false));
	manual.advance(Duration::from_secs(2));
	assert_eq!(state.get(), Some(false));

	force_off.set(false).unwrap();
	assert_eq!(state.get(), Some(false));
}

#[test]
fn fsm_state_changes_notify_once() {
	let manual = ManualScheduler::new();
	let scheduler: Rc<dyn Scheduler> = manual.clone();

	let button: Event<()> = Event::new();
	let force_off = Value::new(false);
	let fsm = toggle_fsm(&scheduler, &button, &force_off, Duration::from_secs(1));

	let transitions = Rc::new(RefCell::new(Vec::new()));
	{
		let transitions = transitions.clone();
		fsm.state
			.on_change(move |state| transitions.borrow_mut().push(state.copied()));
	}

	button.emit(()).unwrap();
	// A no-op input change settles the step without propagating a state.
	force_off.set(false).unwrap();
	manual.advance(Duration::from_secs(2));

	assert_eq!(*transitions.borrow(), vec![Some(true), Some(false)]);
}
