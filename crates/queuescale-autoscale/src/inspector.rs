//! Fleet inspector — finds members that are running but doing no work.
//!
//! Fleet membership is correlated with the broker's worker-activity
//! snapshot by public address: a worker `name@address` belongs to the
//! member whose public IP equals `address` exactly. A member with no
//! matching worker, or whose matching workers all report no tasks, is
//! inactive. Members without a public address never match, so they are
//! always inactive.
//!
//! Workers that report by private address or hostname will not correlate
//! and every member will look inactive. The exact-match join is kept
//! as-is; the queue-depth gate is what protects busy fleets.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use queuescale_core::{FleetMember, ScaleError, ScaleResult, WorkerActivity};

use crate::controller::Controller;

impl Controller {
    /// Members that are idle and were launched more than `cooldown` ago.
    ///
    /// Returns nothing while the queue has a backlog. `None` disables the
    /// cooldown filter. Result order is not significant.
    pub async fn find_inactive_instances(
        &self,
        cooldown: Option<Duration>,
    ) -> ScaleResult<Vec<FleetMember>> {
        self.find_inactive_instances_at(cooldown, Utc::now()).await
    }

    /// [`Controller::find_inactive_instances`] evaluated at a fixed `now`.
    pub async fn find_inactive_instances_at(
        &self,
        cooldown: Option<Duration>,
        now: DateTime<Utc>,
    ) -> ScaleResult<Vec<FleetMember>> {
        let depth = self.broker.queue_depth(&self.queue_name).await?;
        if depth > 0 {
            debug!(queue = %self.queue_name, depth, "backlog pending, skipping scale-in");
            return Ok(Vec::new());
        }

        let members: Vec<FleetMember> = self
            .fleet
            .list_running_members(&self.fleet_name)
            .await?
            .into_iter()
            .filter(FleetMember::is_running)
            .collect();
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let activity = self.broker.active_workers().await?.unwrap_or_default();
        debug!(
            fleet = %self.fleet_name,
            members = members.len(),
            workers = activity.len(),
            "correlating fleet with worker activity"
        );

        let inactive = members
            .into_iter()
            .filter(|m| !is_active(m, &activity));

        let candidates: Vec<FleetMember> = match cooldown {
            Some(cooldown) => {
                let cutoff = cooldown_cutoff(now, cooldown)?;
                inactive.filter(|m| m.launch_time < cutoff).collect()
            }
            None => inactive.collect(),
        };

        info!(
            fleet = %self.fleet_name,
            candidates = candidates.len(),
            "inactive members found"
        );
        Ok(candidates)
    }
}

/// A member is active iff some worker at its public address runs a task.
fn is_active(member: &FleetMember, activity: &WorkerActivity) -> bool {
    let Some(address) = member.public_ip.as_deref() else {
        debug!(instance = %member.instance_id, "member has no public address");
        return false;
    };
    let tasks = activity.tasks_at(address).len();
    debug!(instance = %member.instance_id, %address, tasks, "member activity");
    tasks > 0
}

fn cooldown_cutoff(now: DateTime<Utc>, cooldown: Duration) -> ScaleResult<DateTime<Utc>> {
    TimeDelta::from_std(cooldown)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| ScaleError::Config(format!("cooldown {cooldown:?} out of range")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use queuescale_core::memory::{InMemoryBroker, InMemoryFleet};
    use queuescale_core::{MemberState, TaskDescriptor};

    use super::*;
    use crate::controller::testing::*;

    const COOLDOWN: Duration = Duration::from_secs(300);

    fn busy(worker: &str) -> (String, Vec<TaskDescriptor>) {
        (worker.to_string(), vec![TaskDescriptor::new("task-1")])
    }

    fn idle(worker: &str) -> (String, Vec<TaskDescriptor>) {
        (worker.to_string(), Vec::new())
    }

    fn controller(broker: InMemoryBroker, fleet: InMemoryFleet) -> Controller {
        Controller::new(FLEET, QUEUE, Arc::new(broker), Arc::new(fleet))
    }

    fn ids(members: &[FleetMember]) -> Vec<&str> {
        let mut ids: Vec<_> = members.iter().map(|m| m.instance_id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn backlog_blocks_scale_in() {
        let broker = InMemoryBroker::new().with_queue(QUEUE, 1);
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(member("i-1", "10.0.0.1", hours_ago(2)));

        let found = controller(broker, fleet)
            .find_inactive_instances(None)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn empty_fleet_returns_nothing() {
        let broker = InMemoryBroker::new().with_queue(QUEUE, 0);
        let fleet = InMemoryFleet::new().with_fleet(FLEET, 0, 10);

        let found = controller(broker, fleet)
            .find_inactive_instances(Some(COOLDOWN))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn missing_snapshot_means_every_member_is_idle() {
        let broker = InMemoryBroker::new().with_queue(QUEUE, 0);
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(member("i-1", "10.0.0.1", hours_ago(2)))
            .with_member(member("i-2", "10.0.0.2", hours_ago(2)));

        let found = controller(broker, fleet)
            .find_inactive_instances(Some(COOLDOWN))
            .await
            .unwrap();
        assert_eq!(ids(&found), ["i-1", "i-2"]);
    }

    #[tokio::test]
    async fn classifies_members_by_worker_address() {
        let activity = [
            busy("celery@10.0.0.1"),
            idle("celery@10.0.0.2"),
            busy("celery@10.9.9.9"),
        ]
        .into_iter()
        .collect();
        let broker = InMemoryBroker::new()
            .with_queue(QUEUE, 0)
            .with_activity(activity);
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(member("busy", "10.0.0.1", hours_ago(2)))
            .with_member(member("idle", "10.0.0.2", hours_ago(2)))
            .with_member(member("unknown", "10.0.0.3", hours_ago(2)));

        let found = controller(broker, fleet)
            .find_inactive_instances(None)
            .await
            .unwrap();
        assert_eq!(ids(&found), ["idle", "unknown"]);
    }

    #[tokio::test]
    async fn any_busy_worker_on_an_address_keeps_member_active() {
        let activity = [idle("w1@10.0.0.1"), busy("w2@10.0.0.1")]
            .into_iter()
            .collect();
        let broker = InMemoryBroker::new()
            .with_queue(QUEUE, 0)
            .with_activity(activity);
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(member("i-1", "10.0.0.1", hours_ago(2)));

        let found = controller(broker, fleet)
            .find_inactive_instances(None)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn member_without_public_address_is_inactive() {
        let activity = [busy("celery@10.0.0.1")].into_iter().collect();
        let broker = InMemoryBroker::new()
            .with_queue(QUEUE, 0)
            .with_activity(activity);
        let mut unreachable = member("i-1", "10.0.0.1", hours_ago(2));
        unreachable.public_ip = None;
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(unreachable);

        let found = controller(broker, fleet)
            .find_inactive_instances(None)
            .await
            .unwrap();
        assert_eq!(ids(&found), ["i-1"]);
    }

    #[tokio::test]
    async fn worker_without_address_never_matches() {
        let activity = [busy("10.0.0.1")].into_iter().collect();
        let broker = InMemoryBroker::new()
            .with_queue(QUEUE, 0)
            .with_activity(activity);
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(member("i-1", "10.0.0.1", hours_ago(2)));

        let found = controller(broker, fleet)
            .find_inactive_instances(None)
            .await
            .unwrap();
        assert_eq!(ids(&found), ["i-1"]);
    }

    #[tokio::test]
    async fn non_running_members_are_excluded() {
        let broker = InMemoryBroker::new().with_queue(QUEUE, 0);
        let mut stopping = member("i-2", "10.0.0.2", hours_ago(2));
        stopping.state = MemberState::Stopping;
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(member("i-1", "10.0.0.1", hours_ago(2)))
            .with_member(stopping);

        let found = controller(broker, fleet)
            .find_inactive_instances(None)
            .await
            .unwrap();
        assert_eq!(ids(&found), ["i-1"]);
    }

    #[tokio::test]
    async fn cooldown_boundary_is_strict() {
        let now = Utc::now();
        let c = TimeDelta::seconds(300);
        let one = TimeDelta::seconds(1);
        let broker = InMemoryBroker::new().with_queue(QUEUE, 0);
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(member("young", "10.0.0.1", now - c + one))
            .with_member(member("exact", "10.0.0.2", now - c))
            .with_member(member("old", "10.0.0.3", now - c - one));
        let controller = controller(broker, fleet);

        let found = controller
            .find_inactive_instances_at(Some(COOLDOWN), now)
            .await
            .unwrap();
        assert_eq!(ids(&found), ["old"]);

        let found = controller
            .find_inactive_instances_at(None, now)
            .await
            .unwrap();
        assert_eq!(ids(&found), ["exact", "old", "young"]);
    }

    #[tokio::test]
    async fn repeated_runs_agree() {
        let activity = [busy("celery@10.0.0.1")].into_iter().collect();
        let broker = InMemoryBroker::new()
            .with_queue(QUEUE, 0)
            .with_activity(activity);
        let fleet = InMemoryFleet::new()
            .with_fleet(FLEET, 0, 10)
            .with_member(member("i-1", "10.0.0.1", hours_ago(2)))
            .with_member(member("i-2", "10.0.0.2", hours_ago(2)));
        let controller = controller(broker, fleet);
        let now = Utc::now();

        let first = controller
            .find_inactive_instances_at(Some(COOLDOWN), now)
            .await
            .unwrap();
        let second = controller
            .find_inactive_instances_at(Some(COOLDOWN), now)
            .await
            .unwrap();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(ids(&first), ["i-2"]);
    }

    #[tokio::test]
    async fn unknown_fleet_has_no_candidates() {
        let broker = InMemoryBroker::new().with_queue(QUEUE, 0);
        let found = controller(broker, InMemoryFleet::new())
            .find_inactive_instances(None)
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
