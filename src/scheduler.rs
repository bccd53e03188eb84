use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Timer capability used by the time-driven combinators.
///
/// `schedule_at` arranges for `callback` to run once, at or after `deadline`,
/// from the scheduler's loop. It never runs the callback synchronously inside
/// `schedule_at`, even when the deadline has already passed.
pub trait Scheduler {
	/// The loop's monotonic clock.
	fn now(&self) -> Instant;

	fn schedule_at(&self, deadline: Instant, callback: Box<dyn FnOnce()>) -> TimerHandle;
}

/// Cancellation handle for a scheduled timer. Cancelling is idempotent and
/// safe after the timer has fired.
#[derive(Clone, Default)]
pub struct TimerHandle {
	cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
	pub fn new() -> TimerHandle {
		TimerHandle::default()
	}

	pub fn cancel(&self) {
		self.cancelled.set(true);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.get()
	}
}

/// Deterministic single-threaded scheduler: time only moves when the embedder
/// advances it, and due timers fire from `advance`/`run_due`, in deadline
/// order with FIFO tie-breaking, each under its own deadline's clock value.
pub struct ManualScheduler {
	now: Cell<Instant>,
	queue: RefCell<Vec<ManualTimer>>,
	next_seq: Cell<u64>,
}

struct ManualTimer {
	deadline: Instant,
	seq: u64,
	handle: TimerHandle,
	callback: Box<dyn FnOnce()>,
}

impl ManualScheduler {
	pub fn new() -> Rc<ManualScheduler> {
		Rc::new(ManualScheduler {
			now: Cell::new(Instant::now()),
			queue: RefCell::new(Vec::new()),
			next_seq: Cell::new(0),
		})
	}

	pub fn advance(&self, by: Duration) {
		self.advance_to(self.now.get() + by);
	}

	/// Fire every timer due at or before `target`, then move the clock to
	/// `target`. Callbacks may schedule further timers; those fire too if
	/// they fall within the range.
	pub fn advance_to(&self, target: Instant) {
		loop {
			let due = {
				let mut queue = self.queue.borrow_mut();
				let next = queue
					.iter()
					.enumerate()
					.filter(|(_, timer)| timer.deadline <= target)
					.min_by_key(|(_, timer)| (timer.deadline, timer.seq))
					.map(|(idx, _)| idx);
				next.map(|idx| queue.swap_remove(idx))
			};
			let Some(timer) = due else {
				break;
			};
			if self.now.get() < timer.deadline {
				self.now.set(timer.deadline);
			}
			if !timer.handle.is_cancelled() {
				(timer.callback)();
			}
		}
		if self.now.get() < target {
			self.now.set(target);
		}
	}

	/// Fire the timers that are already due, including past deadlines,
	/// without moving the clock.
	pub fn run_due(&self) {
		self.advance_to(self.now.get());
	}

	/// Number of scheduled, uncancelled timers.
	pub fn pending(&self) -> usize {
		self.queue
			.borrow()
			.iter()
			.filter(|timer| !timer.handle.is_cancelled())
			.count()
	}
}

impl Scheduler for ManualScheduler {
	fn now(&self) -> Instant {
		self.now.get()
	}

	fn schedule_at(&self, deadline: Instant, callback: Box<dyn FnOnce()>) -> TimerHandle {
		let handle = TimerHandle::new();
		let seq = self.next_seq.get();
		self.next_seq.set(seq + 1);
		self.queue.borrow_mut().push(ManualTimer {
			deadline,
			seq,
			handle: handle.clone(),
			callback,
		});
		handle
	}
}
