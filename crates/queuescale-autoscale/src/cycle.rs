//! One full evaluation: reclaim idle members, then rebalance.

use std::time::Duration;

use tracing::{error, info, warn};

use queuescale_core::config::{DEFAULT_COOLDOWN, DEFAULT_FACTOR, ScaleConfig};
use queuescale_core::{InstanceId, ScaleError, ScaleResult};

use crate::controller::Controller;
use crate::shutdown::ShutdownOutcome;

/// Knobs for a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOptions {
    /// `None` reclaims idle members regardless of age.
    pub cooldown: Option<Duration>,
    pub factor: f64,
    pub dry_run: bool,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            cooldown: Some(DEFAULT_COOLDOWN),
            factor: DEFAULT_FACTOR,
            dry_run: false,
        }
    }
}

impl CycleOptions {
    pub fn from_config(config: &ScaleConfig) -> ScaleResult<Self> {
        Ok(Self {
            cooldown: config.cooldown()?,
            factor: config.factor(),
            dry_run: config.dry_run(),
        })
    }
}

/// A member whose termination failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedShutdown {
    pub instance_id: InstanceId,
    pub error: String,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub shut_down: Vec<ShutdownOutcome>,
    pub failed: Vec<FailedShutdown>,
    /// New desired capacity, when the balancer computed one.
    pub desired: Option<u32>,
}

impl CycleReport {
    /// False when any termination in the batch failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A cycle aborted by an inspection or balancing error.
///
/// `report` holds the shutdowns already carried out before the abort.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct CycleError {
    pub report: CycleReport,
    #[source]
    pub source: ScaleError,
}

impl CycleError {
    pub fn is_config(&self) -> bool {
        self.source.is_config()
    }
}

impl Controller {
    /// Reclaim inactive members, then recompute desired capacity.
    ///
    /// Inspection and balancing errors abort the cycle; the error carries
    /// the partial report. Termination errors do not: the remaining members
    /// are still processed and each failure is recorded in the report.
    pub async fn run_cycle(&self, options: &CycleOptions) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        let inactive = match self.find_inactive_instances(options.cooldown).await {
            Ok(inactive) => inactive,
            Err(source) => return Err(CycleError { report, source }),
        };
        for member in &inactive {
            match self.shutdown_instance(member, options.dry_run).await {
                Ok(outcome) => report.shut_down.push(outcome),
                Err(e) => {
                    error!(instance = %member.instance_id, error = %e, "shutdown failed");
                    report.failed.push(FailedShutdown {
                        instance_id: member.instance_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        match self.auto_balance(options.factor, options.dry_run).await {
            Ok(desired) => report.desired = desired,
            Err(source) => {
                warn!(
                    fleet = %self.fleet_name,
                    shut_down = report.shut_down.len(),
                    error = %source,
                    "balancing failed after shutdowns"
                );
                return Err(CycleError { report, source });
            }
        }

        if report.is_success() {
            info!(
                fleet = %self.fleet_name,
                shut_down = report.shut_down.len(),
                desired = ?report.desired,
                "cycle complete"
            );
        } else {
            warn!(
                fleet = %self.fleet_name,
                shut_down = report.shut_down.len(),
                failed = report.failed.len(),
                desired = ?report.desired,
                "cycle complete with failed shutdowns"
            );
        }
        Ok(report)
    }
}
