pub mod macros;

mod combine;
mod event;
mod fsm;
mod index;
mod node;
mod ops;
mod persist;
mod scheduler;
mod source;
mod temporal;
mod transaction;
mod value;

pub use combine::{event_to_value, lift2, snapshot, value_map, value_to_event, value_vec};
pub use event::{Emitter, Event, WeakEvent};
pub use fsm::{Fsm, FsmTimeout, Transition};
pub use index::DependencyLoop;
pub use node::{NodeHandle, Reactive};
pub use ops::{filter, no_repeat, replace_unset, window};
pub use persist::file_backed_value;
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle};
pub use source::Source;
pub use temporal::{delay, emit_at, rate_limit, time_window};
pub use value::{Recompute, Value, WeakValue};
