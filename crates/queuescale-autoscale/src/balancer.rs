//! Capacity balancer — raises desired capacity in proportion to backlog.
//!
//! ```text
//! threshold = queue depth * factor
//! if threshold > fleet size:
//!     desired = min(ceil(threshold), fleet max)
//! ```
//!
//! This path only ever scales out. Scale-in is left to the inspector so
//! the two never fight over the same members.

use tracing::{debug, info};

use queuescale_core::config::validate_factor;
use queuescale_core::ScaleResult;

use crate::controller::Controller;

impl Controller {
    /// Recompute desired capacity from the current backlog.
    ///
    /// Returns the clamped desired size when the backlog warrants growth,
    /// `None` otherwise. With `dry_run` the value is computed and logged but
    /// never written.
    pub async fn auto_balance(&self, factor: f64, dry_run: bool) -> ScaleResult<Option<u32>> {
        validate_factor(factor)?;

        let fleet = self.fleet.describe_fleet(&self.fleet_name).await?;
        let messages = self.broker.queue_depth(&self.queue_name).await?;

        let Some(wanted) = scale_out_target(messages, fleet.size, factor) else {
            debug!(
                fleet = %self.fleet_name,
                messages,
                instances = fleet.size,
                factor,
                "backlog within capacity"
            );
            return Ok(None);
        };

        if dry_run {
            let desired = fleet.clamp(wanted);
            info!(
                fleet = %self.fleet_name,
                from = fleet.desired_size,
                to = desired,
                messages,
                "dry run: would set desired capacity"
            );
            return Ok(Some(desired));
        }

        self.set_desired_capacity(wanted).await.map(Some)
    }

    /// Clamp `desired` to the fleet maximum and apply it.
    ///
    /// Reads the fleet descriptor once, writes once, and returns the value
    /// actually applied. An unknown fleet fails before any write.
    pub async fn set_desired_capacity(&self, desired: u32) -> ScaleResult<u32> {
        let fleet = self.fleet.describe_fleet(&self.fleet_name).await?;
        let applied = fleet.clamp(desired);

        self.fleet.set_desired_size(&self.fleet_name, applied).await?;
        info!(
            fleet = %self.fleet_name,
            from = fleet.desired_size,
            to = applied,
            requested = desired,
            max = fleet.max_size,
            "desired capacity set"
        );
        Ok(applied)
    }
}

/// `ceil(messages * factor)` when that projected demand strictly exceeds
/// the current number of instances.
fn scale_out_target(messages: u64, instances: u32, factor: f64) -> Option<u32> {
    let threshold = messages as f64 * factor;
    if threshold > f64::from(instances) {
        // Float-to-int `as` saturates, so huge backlogs land on u32::MAX
        // and are clamped to the fleet max afterwards.
        Some(threshold.ceil() as u32)
    } else {
        None
    }
}
