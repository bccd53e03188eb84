use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use enclose::enclose;

use crate::event::Event;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::source::Source;
use crate::value::{Value, WeakValue};

struct PendingDatum<T> {
	inserted: Instant,
	datum: Option<T>,
	handle: TimerHandle,
}

/// A time-shifted copy of `source`: every change (including clears) appears
/// on the output `interval` later. Growing the interval delays the pending
/// deliveries further; shrinking it flushes overdue deliveries immediately,
/// in their original order.
pub fn delay<T: Clone + 'static>(
	scheduler: &Rc<dyn Scheduler>,
	source: &Value<T>,
	interval: &Value<Duration>,
) -> Value<T> {
	let output = match source.get() {
		Some(datum) => Value::new(datum),
		None => Value::unset(),
	};
	output.add_input(source);
	output.add_input(interval);

	let queue: Rc<RefCell<VecDeque<PendingDatum<T>>>> = Rc::new(RefCell::new(VecDeque::new()));

	let pop: Rc<dyn Fn()> = {
		let queue = queue.clone();
		let output = output.downgrade();
		Rc::new(move || {
			let next = queue.borrow_mut().pop_front();
			if let (Some(pending), Some(output)) = (next, output.upgrade()) {
				if let Err(err) = output.write(pending.datum) {
					tracing::error!(%err, "delayed write failed");
				}
			}
		})
	};

	{
		let scheduler = scheduler.clone();
		let interval = interval.clone();
		let queue = queue.clone();
		let pop = pop.clone();
		source.on_change(move |datum| {
			let inserted = scheduler.now();
			let wait = interval.get().unwrap_or(Duration::ZERO);
			let handle =
				scheduler.schedule_at(inserted + wait, Box::new(enclose!((pop) move || pop())));
			queue.borrow_mut().push_back(PendingDatum {
				inserted,
				datum: datum.cloned(),
				handle,
			});
		});
	}

	{
		let scheduler = scheduler.clone();
		interval.on_change(move |wait| {
			let Some(&wait) = wait else {
				return;
			};
			let now = scheduler.now();
			// Deliver everything that the new interval makes overdue.
			loop {
				let overdue = match queue.borrow().front() {
					Some(pending) => now.duration_since(pending.inserted) >= wait,
					None => false,
				};
				if !overdue {
					break;
				}
				if let Some(pending) = queue.borrow().front() {
					pending.handle.cancel();
				}
				pop();
			}
			// Re-aim the rest at the new interval.
			for pending in queue.borrow_mut().iter_mut() {
				pending.handle.cancel();
				pending.handle = scheduler.schedule_at(
					pending.inserted + wait,
					Box::new(enclose!((pop) move || pop())),
				);
			}
		});
	}

	output
}

/// Emit once at the deadline held in `deadline`: `None` disarms, a new
/// `(time, payload)` pair re-arms, cancelling an unfired timer. Each distinct
/// configuration fires at most once. A deadline already in the past still
/// fires, exactly once, from the scheduler's loop rather than synchronously.
pub fn emit_at<T>(scheduler: &Rc<dyn Scheduler>, deadline: &Value<Option<(Instant, T)>>) -> Event<T>
where
	T: Clone + PartialEq + 'static,
{
	let event: Event<T> = Event::new();
	// The event keeps its deadline value alive. A declared input edge would
	// make timeout-driven graphs (which write the deadline downstream of
	// this event) look like dependency loops, so ownership only.
	event.retain(deadline);

	let armed: Rc<RefCell<Option<(Instant, T, TimerHandle)>>> = Rc::new(RefCell::new(None));

	let setup = {
		let scheduler = scheduler.clone();
		let weak = event.downgrade();
		let armed = armed.clone();
		move |datum: Option<&Option<(Instant, T)>>| {
			let target: Option<(Instant, T)> = datum.and_then(|datum| datum.clone());
			{
				let armed = armed.borrow();
				let current = armed.as_ref().map(|(at, payload, _)| (at, payload));
				if current == target.as_ref().map(|(at, payload)| (at, payload)) {
					return;
				}
			}
			if let Some((_, _, handle)) = armed.borrow_mut().take() {
				handle.cancel();
			}
			if let Some((at, payload)) = target {
				let callback = {
					let armed = armed.clone();
					let weak = weak.clone();
					Box::new(move || {
						let fired = armed.borrow_mut().take();
						if let (Some(event), Some((_, payload, _))) = (weak.upgrade(), fired) {
							if let Err(err) = event.emit(payload) {
								tracing::error!(%err, "scheduled emission failed");
							}
						}
					})
				};
				let handle = scheduler.schedule_at(at, callback);
				*armed.borrow_mut() = Some((at, payload, handle));
			}
		}
	};

	{
		let current = deadline.value();
		setup(current.as_ref());
	}
	deadline.on_change(setup);

	event
}

struct TimeWindow<T: 'static> {
	scheduler: Rc<dyn Scheduler>,
	// Data paired with the instant they were superseded (values) or
	// occurred (events); `None` marks the still-current datum.
	seen: RefCell<Vec<(T, Option<Instant>)>>,
	timer: RefCell<Option<(Instant, Instant, TimerHandle)>>,
	duration: WeakValue<Duration>,
	output: WeakValue<Vec<T>>,
}

impl<T: Clone + 'static> TimeWindow<T> {
	fn snapshot(&self) -> Vec<T> {
		self.seen
			.borrow()
			.iter()
			.map(|(datum, _)| datum.clone())
			.collect()
	}

	fn publish(&self) {
		if let Some(output) = self.output.upgrade() {
			if let Err(err) = output.set(self.snapshot()) {
				tracing::error!(%err, "time window update failed");
			}
		}
	}

	/// Drop entries stamped at or before `cutoff`.
	fn expire(&self, cutoff: Instant) {
		let mut dropped = false;
		{
			let mut seen = self.seen.borrow_mut();
			while seen
				.first()
				.map_or(false, |(_, stamp)| stamp.map_or(false, |stamp| stamp <= cutoff))
			{
				seen.remove(0);
				dropped = true;
			}
		}
		if dropped {
			self.publish();
		}
	}

	/// Re-aim the single expiry timer at the oldest stamped entry.
	fn rearm(self: &Rc<Self>) {
		let oldest = self.seen.borrow().first().and_then(|(_, stamp)| *stamp);
		let wait = self
			.duration
			.upgrade()
			.and_then(|duration| duration.get())
			.unwrap_or(Duration::ZERO);
		let fire_at = oldest.map(|stamp| stamp + wait);
		{
			let timer = self.timer.borrow();
			if timer.as_ref().map(|(stamp, at, _)| (*stamp, *at)) == oldest.zip(fire_at) {
				return;
			}
		}
		if let Some((_, _, handle)) = self.timer.borrow_mut().take() {
			handle.cancel();
		}
		if let (Some(stamp), Some(at)) = (oldest, fire_at) {
			let this = self.clone();
			let handle = self.scheduler.schedule_at(
				at,
				Box::new(move || {
					this.timer.borrow_mut().take();
					this.expire(stamp);
					this.rearm();
				}),
			);
			*self.timer.borrow_mut() = Some((stamp, at, handle));
		}
	}
}

/// The values or emissions of `source` seen within the trailing `duration`.
/// For a continuous source an entry's clock starts when it is superseded;
/// the current datum never expires. Shrinking the duration may expire
/// entries immediately.
pub fn time_window<T: Clone + 'static>(
	scheduler: &Rc<dyn Scheduler>,
	source: &Source<T>,
	duration: &Value<Duration>,
) -> Value<Vec<T>> {
	let output: Value<Vec<T>> = Value::unset();
	output.add_input(source);
	output.add_input(duration);

	let state = Rc::new(TimeWindow {
		scheduler: scheduler.clone(),
		seen: RefCell::new(Vec::new()),
		timer: RefCell::new(None),
		duration: duration.downgrade(),
		output: output.downgrade(),
	});

	match source {
		Source::Continuous(value) => {
			if let Some(datum) = value.value().as_ref() {
				state.seen.borrow_mut().push((datum.clone(), None));
			}
			let state = state.clone();
			value.on_change(move |datum| {
				let Some(datum) = datum else {
					return;
				};
				let now = state.scheduler.now();
				{
					let mut seen = state.seen.borrow_mut();
					if let Some(last) = seen.last_mut() {
						if last.1.is_none() {
							last.1 = Some(now);
						}
					}
					seen.push((datum.clone(), None));
				}
				state.publish();
				state.rearm();
			});
		}
		Source::Instantaneous(event) => {
			let state = state.clone();
			event.on_event(move |payload| {
				let now = state.scheduler.now();
				state.seen.borrow_mut().push((payload.clone(), Some(now)));
				state.publish();
				state.rearm();
			});
		}
	}

	{
		let state = state.clone();
		duration.on_change(move |duration| {
			let Some(&duration) = duration else {
				return;
			};
			let now = state.scheduler.now();
			if let Some(cutoff) = now.checked_sub(duration) {
				state.expire(cutoff);
			}
			state.rearm();
		});
	}

	state.publish();
	output
}

struct RateLimit<T: 'static> {
	scheduler: Rc<dyn Scheduler>,
	output: WeakValue<T>,
	min_interval: WeakValue<Duration>,
	state: RefCell<RateState<T>>,
}

struct RateState<T> {
	blocked: bool,
	held: Option<Option<T>>,
	block_start: Option<Instant>,
	handle: Option<TimerHandle>,
}

impl<T: Clone + 'static> RateLimit<T> {
	fn interval(&self) -> Duration {
		self.min_interval
			.upgrade()
			.and_then(|interval| interval.get())
			.unwrap_or(Duration::ZERO)
	}

	fn write(&self, datum: Option<T>) {
		if let Some(output) = self.output.upgrade() {
			if let Err(err) = output.write(datum) {
				tracing::error!(%err, "rate limited write failed");
			}
		}
	}

	/// Start a blockage window from now.
	fn block(self: &Rc<Self>) {
		let start = self.scheduler.now();
		let this = self.clone();
		let handle = self
			.scheduler
			.schedule_at(start + self.interval(), Box::new(move || this.unblock()));
		let mut state = self.state.borrow_mut();
		state.blocked = true;
		state.block_start = Some(start);
		state.handle = Some(handle);
	}

	fn unblock(self: &Rc<Self>) {
		let held = {
			let mut state = self.state.borrow_mut();
			state.handle = None;
			state.held.take()
		};
		match held {
			Some(datum) => {
				// Deliver the datum held back by the blockage, then block
				// again for a full interval.
				self.write(datum);
				self.block();
			}
			None => {
				let mut state = self.state.borrow_mut();
				state.blocked = false;
				state.block_start = None;
			}
		}
	}
}

/// Limit `source` to at most one output change per `min_interval`, holding
/// back the most recent blocked datum and delivering it when the blockage
/// expires. Shrinking the interval may release a held datum immediately.
pub fn rate_limit<T: Clone + 'static>(
	scheduler: &Rc<dyn Scheduler>,
	source: &Value<T>,
	min_interval: &Value<Duration>,
) -> Value<T> {
	let initially_set = source.value().is_some();
	let output = match source.get() {
		Some(datum) => Value::new(datum),
		None => Value::unset(),
	};
	output.add_input(source);
	output.add_input(min_interval);

	let limiter = Rc::new(RateLimit {
		scheduler: scheduler.clone(),
		output: output.downgrade(),
		min_interval: min_interval.downgrade(),
		state: RefCell::new(RateState {
			blocked: initially_set,
			held: None,
			block_start: None,
			handle: None,
		}),
	});

	{
		let limiter = limiter.clone();
		source.on_change(move |datum| {
			let blocked = limiter.state.borrow().blocked;
			if blocked {
				limiter.state.borrow_mut().held = Some(datum.cloned());
			} else {
				limiter.write(datum.cloned());
				limiter.block();
			}
		});
	}

	{
		let limiter = limiter.clone();
		min_interval.on_change(move |_| {
			let (blocked, block_start) = {
				let state = limiter.state.borrow();
				(state.blocked, state.block_start)
			};
			if !blocked {
				return;
			}
			let Some(start) = block_start else {
				return;
			};
			let handle = limiter.state.borrow_mut().handle.take();
			if let Some(handle) = handle {
				handle.cancel();
			}
			let now = limiter.scheduler.now();
			let interval = limiter.interval();
			if now.duration_since(start) >= interval {
				limiter.unblock();
			} else {
				let this = limiter.clone();
				let handle = limiter
					.scheduler
					.schedule_at(start + interval, Box::new(move || this.unblock()));
				limiter.state.borrow_mut().handle = Some(handle);
			}
		});
	}

	// The initial datum counts as a delivery and starts the first blockage.
	if initially_set {
		limiter.block();
	}

	output
}
