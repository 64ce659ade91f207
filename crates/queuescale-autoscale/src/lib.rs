//! queuescale-autoscale — right-size a worker fleet against queue backlog.
//!
//! One invocation runs one cycle and keeps no state between runs:
//!
//! ```text
//! find_inactive_instances(cooldown)
//!     queue depth > 0          -> nothing (work is waiting)
//!     running members          -> correlate with worker activity
//!     inactive && launched before now - cooldown -> candidate
//!
//! shutdown_instance(candidate) -> terminate + decrement desired
//!
//! auto_balance(factor)
//!     threshold = depth * factor
//!     threshold > fleet size   -> set desired = min(ceil(threshold), max)
//! ```
//!
//! Scale-down happens only through the inspector; the balancer never
//! lowers desired capacity. Overlapping invocations are not coordinated
//! here and must be serialized by whatever schedules them.

pub mod balancer;
pub mod controller;
pub mod cycle;
pub mod inspector;
pub mod shutdown;

pub use controller::Controller;
pub use cycle::{CycleError, CycleOptions, CycleReport, FailedShutdown};
pub use shutdown::ShutdownOutcome;
