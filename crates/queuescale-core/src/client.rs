//! Collaborator traits the control loop is written against.
//!
//! Production adapters live in `queuescale-broker` and `queuescale-fleet`;
//! `crate::memory` implements both in-process for tests and dry runs.

use async_trait::async_trait;

use crate::error::ScaleResult;
use crate::types::{FleetDescriptor, FleetMember, WorkerActivity};

/// Read access to the task-queue broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Number of pending (not yet dequeued) messages on `queue`.
    async fn queue_depth(&self, queue: &str) -> ScaleResult<u64>;

    /// Tasks currently executing on each reporting worker.
    ///
    /// `None` means no worker replied; callers treat that as zero active
    /// workers rather than an error.
    async fn active_workers(&self) -> ScaleResult<Option<WorkerActivity>>;
}

/// Membership and sizing operations on a managed fleet.
#[async_trait]
pub trait FleetManager: Send + Sync {
    /// Members of `fleet` that are in the running state. An unknown fleet
    /// has no members; only `describe_fleet` reports it as missing.
    async fn list_running_members(&self, fleet: &str) -> ScaleResult<Vec<FleetMember>>;

    /// Current size bounds of `fleet`. Fails with `ScaleError::FleetNotFound`
    /// for an unknown name.
    async fn describe_fleet(&self, fleet: &str) -> ScaleResult<FleetDescriptor>;

    /// Terminate one instance and lower its fleet's desired size by one in
    /// the same operation.
    async fn terminate_and_decrement(&self, instance_id: &str) -> ScaleResult<()>;

    async fn set_desired_size(&self, fleet: &str, desired: u32) -> ScaleResult<()>;
}
