//! The control object tying one fleet to one broker queue.

use std::sync::Arc;

use queuescale_core::{Broker, FleetManager};

/// Evaluates and resizes a single fleet against a single queue.
///
/// Both collaborators are injected, so tests substitute the in-memory
/// implementations from `queuescale_core::memory`.
#[derive(Clone)]
pub struct Controller {
    pub(crate) fleet_name: String,
    pub(crate) queue_name: String,
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) fleet: Arc<dyn FleetManager>,
}

impl Controller {
    pub fn new(
        fleet_name: impl Into<String>,
        queue_name: impl Into<String>,
        broker: Arc<dyn Broker>,
        fleet: Arc<dyn FleetManager>,
    ) -> Self {
        Self {
            fleet_name: fleet_name.into(),
            queue_name: queue_name.into(),
            broker,
            fleet,
        }
    }

    pub fn fleet_name(&self) -> &str {
        &self.fleet_name
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("fleet_name", &self.fleet_name)
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, Utc};
    use queuescale_core::{FleetMember, MemberState};

    pub const FLEET: &str = "workers";
    pub const QUEUE: &str = "celery";

    pub fn member(id: &str, ip: &str, launched: DateTime<Utc>) -> FleetMember {
        FleetMember {
            instance_id: id.to_string(),
            public_ip: Some(ip.to_string()),
            public_dns: Some(format!("ec2-{}.compute.amazonaws.com", ip.replace('.', "-"))),
            launch_time: launched,
            fleet_name: FLEET.to_string(),
            state: MemberState::Running,
        }
    }

    pub fn hours_ago(hours: i64) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::hours(hours)
    }
}
