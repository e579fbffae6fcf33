//! Model lifecycle: `Absent → Loading → Loaded → Absent`.
//!
//! [`LifecycleGate`] is the only way to reach the resource. It owns the
//! [`ResourceHandle`], guarantees at most one load in flight, and refuses to
//! evict while any extraction holds a [`ResourceLease`]. [`IdleReaper`] polls
//! the gate and asks it to evict once the idle threshold passes.

mod gate;
mod handle;
mod reaper;

pub use gate::{EvictOutcome, GateError, GateStats, LifecycleGate, ResourceLease};
pub use handle::{LifecyclePhase, ResourceHandle};
pub use reaper::IdleReaper;
