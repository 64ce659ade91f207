//! Instance shutdown — terminate one member and shrink desired capacity.

use tracing::info;

use queuescale_core::{FleetMember, InstanceId, ScaleError, ScaleResult};

use crate::controller::Controller;

/// What `shutdown_instance` did for a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Dry run: the member would have been terminated.
    WouldTerminate(InstanceId),
    Terminated(InstanceId),
}

impl ShutdownOutcome {
    pub fn instance_id(&self) -> &str {
        match self {
            ShutdownOutcome::WouldTerminate(id) | ShutdownOutcome::Terminated(id) => id,
        }
    }
}

impl Controller {
    /// Terminate `member`, decrementing the fleet's desired capacity in the
    /// same call so desired and actual size stay in step.
    pub async fn shutdown_instance(
        &self,
        member: &FleetMember,
        dry_run: bool,
    ) -> ScaleResult<ShutdownOutcome> {
        if member.instance_id.trim().is_empty() {
            return Err(ScaleError::InvalidMember(
                "member has no instance id".to_string(),
            ));
        }
        let id = member.instance_id.clone();

        if dry_run {
            info!(instance = %id, public_ip = ?member.public_ip, "dry run: would shut down");
            return Ok(ShutdownOutcome::WouldTerminate(id));
        }

        self.fleet.terminate_and_decrement(&id).await?;
        info!(instance = %id, fleet = %member.fleet_name, "instance terminated");
        Ok(ShutdownOutcome::Terminated(id))
    }
}
