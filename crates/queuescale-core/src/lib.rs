//! queuescale-core — shared building blocks for the queuescale control loop.
//!
//! Holds the per-invocation data model (fleet members, fleet descriptors,
//! worker activity), the error taxonomy, the TOML/env configuration layer,
//! and the two collaborator traits the control loop is written against:
//!
//! ```text
//! Broker        queue_depth(queue), active_workers()
//! FleetManager  list_running_members(fleet), describe_fleet(fleet),
//!               terminate_and_decrement(id), set_desired_size(fleet, n)
//! ```
//!
//! `memory` provides in-process implementations of both traits.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod types;

pub use client::{Broker, FleetManager};
pub use config::ScaleConfig;
pub use error::{ScaleError, ScaleResult};
pub use types::*;
