//! In-process `Broker` and `FleetManager` implementations.
//!
//! Used by tests across the workspace. `InMemoryFleet` keeps a log of every
//! mutating call so callers can assert exactly which writes happened.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::{Broker, FleetManager};
use crate::error::{ScaleError, ScaleResult};
use crate::types::*;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Broker ────────────────────────────────────────────────────────

/// Broker backed by a queue-depth table and an optional activity snapshot.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, u64>>,
    activity: Mutex<Option<WorkerActivity>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue(self, queue: &str, depth: u64) -> Self {
        self.set_depth(queue, depth);
        self
    }

    pub fn with_activity(self, activity: WorkerActivity) -> Self {
        self.set_activity(Some(activity));
        self
    }

    pub fn set_depth(&self, queue: &str, depth: u64) {
        lock(&self.queues).insert(queue.to_string(), depth);
    }

    /// Replace the activity snapshot; `None` simulates no worker replying.
    pub fn set_activity(&self, activity: Option<WorkerActivity>) {
        *lock(&self.activity) = activity;
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn queue_depth(&self, queue: &str) -> ScaleResult<u64> {
        lock(&self.queues)
            .get(queue)
            .copied()
            .ok_or_else(|| ScaleError::Broker(format!("queue \"{queue}\" not found")))
    }

    async fn active_workers(&self) -> ScaleResult<Option<WorkerActivity>> {
        Ok(lock(&self.activity).clone())
    }
}

// ── Fleet ─────────────────────────────────────────────────────────

/// A mutating call observed by `InMemoryFleet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetWrite {
    Terminate(InstanceId),
    SetDesired { fleet: String, desired: u32 },
}

#[derive(Debug)]
struct FleetEntry {
    min_size: u32,
    max_size: u32,
    desired_size: u32,
    members: Vec<FleetMember>,
}

#[derive(Debug, Default)]
struct FleetTables {
    fleets: HashMap<String, FleetEntry>,
    writes: Vec<FleetWrite>,
    failing: HashSet<InstanceId>,
}

/// Fleet manager holding any number of named fleets in memory.
#[derive(Debug, Default)]
pub struct InMemoryFleet {
    tables: Mutex<FleetTables>,
}

impl InMemoryFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty fleet.
    pub fn with_fleet(self, name: &str, min_size: u32, max_size: u32) -> Self {
        lock(&self.tables).fleets.insert(
            name.to_string(),
            FleetEntry {
                min_size,
                max_size,
                desired_size: 0,
                members: Vec::new(),
            },
        );
        self
    }

    /// Add a member to an already registered fleet (`member.fleet_name`).
    pub fn with_member(self, member: FleetMember) -> Self {
        self.add_member(member);
        self
    }

    /// Simulate a machine joining the fleet. Desired size only rises when
    /// membership outgrows it.
    pub fn add_member(&self, member: FleetMember) {
        let mut tables = lock(&self.tables);
        if let Some(entry) = tables.fleets.get_mut(&member.fleet_name) {
            entry.members.push(member);
            let size = u32::try_from(entry.members.len()).unwrap_or(u32::MAX);
            entry.desired_size = entry.desired_size.max(size);
        }
    }

    /// Make termination of `instance_id` fail with a fleet-manager error.
    pub fn fail_termination_of(&self, instance_id: &str) {
        lock(&self.tables).failing.insert(instance_id.to_string());
    }

    /// Every mutating call made so far, in order.
    pub fn writes(&self) -> Vec<FleetWrite> {
        lock(&self.tables).writes.clone()
    }

    pub fn desired_size(&self, fleet: &str) -> Option<u32> {
        lock(&self.tables).fleets.get(fleet).map(|f| f.desired_size)
    }

    pub fn member_ids(&self, fleet: &str) -> Vec<InstanceId> {
        lock(&self.tables)
            .fleets
            .get(fleet)
            .map(|f| f.members.iter().map(|m| m.instance_id.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FleetManager for InMemoryFleet {
    async fn list_running_members(&self, fleet: &str) -> ScaleResult<Vec<FleetMember>> {
        Ok(lock(&self.tables)
            .fleets
            .get(fleet)
            .map(|entry| {
                entry
                    .members
                    .iter()
                    .filter(|m| m.is_running())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn describe_fleet(&self, fleet: &str) -> ScaleResult<FleetDescriptor> {
        let tables = lock(&self.tables);
        let entry = tables
            .fleets
            .get(fleet)
            .ok_or_else(|| ScaleError::FleetNotFound(fleet.to_string()))?;
        Ok(FleetDescriptor {
            name: fleet.to_string(),
            size: u32::try_from(entry.members.len()).unwrap_or(u32::MAX),
            min_size: entry.min_size,
            max_size: entry.max_size,
            desired_size: entry.desired_size,
        })
    }

    async fn terminate_and_decrement(&self, instance_id: &str) -> ScaleResult<()> {
        let mut tables = lock(&self.tables);
        if tables.failing.contains(instance_id) {
            return Err(ScaleError::Fleet(format!(
                "termination of {instance_id} rejected"
            )));
        }

        let entry = tables
            .fleets
            .values_mut()
            .find(|f| f.members.iter().any(|m| m.instance_id == instance_id))
            .ok_or_else(|| ScaleError::Fleet(format!("instance {instance_id} not found")))?;
        entry.members.retain(|m| m.instance_id != instance_id);
        entry.desired_size = entry.desired_size.saturating_sub(1);

        tables
            .writes
            .push(FleetWrite::Terminate(instance_id.to_string()));
        Ok(())
    }

    async fn set_desired_size(&self, fleet: &str, desired: u32) -> ScaleResult<()> {
        let mut tables = lock(&self.tables);
        let entry = tables
            .fleets
            .get_mut(fleet)
            .ok_or_else(|| ScaleError::FleetNotFound(fleet.to_string()))?;
        if desired < entry.min_size || desired > entry.max_size {
            return Err(ScaleError::Fleet(format!(
                "desired size {desired} outside [{}, {}]",
                entry.min_size, entry.max_size
            )));
        }
        entry.desired_size = desired;

        tables.writes.push(FleetWrite::SetDesired {
            fleet: fleet.to_string(),
            desired,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn member(id: &str, state: MemberState) -> FleetMember {
        FleetMember {
            instance_id: id.to_string(),
            public_ip: Some("10.0.0.1".to_string()),
            public_dns: None,
            launch_time: Utc::now(),
            fleet_name: "workers".to_string(),
            state,
        }
    }

    #[tokio::test]
    async fn unknown_queue_is_a_broker_error() {
        let broker = InMemoryBroker::new().with_queue("celery", 3);
        assert_eq!(broker.queue_depth("celery").await.unwrap(), 3);
        assert!(matches!(
            broker.queue_depth("other").await,
            Err(ScaleError::Broker(_))
        ));
        assert!(broker.active_workers().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_only_running_members() {
        let fleet = InMemoryFleet::new()
            .with_fleet("workers", 0, 10)
            .with_member(member("i-1", MemberState::Running))
            .with_member(member("i-2", MemberState::Pending));

        let running = fleet.list_running_members("workers").await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].instance_id, "i-1");

        let described = fleet.describe_fleet("workers").await.unwrap();
        assert_eq!(described.size, 2);
        assert_eq!(described.desired_size, 2);
    }

    #[tokio::test]
    async fn unknown_fleet_lists_empty_but_cannot_be_described() {
        let fleet = InMemoryFleet::new();
        assert!(fleet.list_running_members("ghost").await.unwrap().is_empty());
        assert!(matches!(
            fleet.describe_fleet("ghost").await,
            Err(ScaleError::FleetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn terminate_decrements_desired() {
        let fleet = InMemoryFleet::new()
            .with_fleet("workers", 0, 10)
            .with_member(member("i-1", MemberState::Running))
            .with_member(member("i-2", MemberState::Running));

        fleet.terminate_and_decrement("i-1").await.unwrap();

        assert_eq!(fleet.desired_size("workers"), Some(1));
        assert_eq!(fleet.member_ids("workers"), ["i-2"]);
        assert_eq!(fleet.writes(), [FleetWrite::Terminate("i-1".into())]);
    }

    #[tokio::test]
    async fn injected_termination_failure() {
        let fleet = InMemoryFleet::new()
            .with_fleet("workers", 0, 10)
            .with_member(member("i-1", MemberState::Running));
        fleet.fail_termination_of("i-1");

        assert!(matches!(
            fleet.terminate_and_decrement("i-1").await,
            Err(ScaleError::Fleet(_))
        ));
        assert!(fleet.writes().is_empty());
    }

    #[tokio::test]
    async fn set_desired_on_unknown_fleet_fails() {
        let fleet = InMemoryFleet::new();
        let err = fleet.set_desired_size("ghost", 2).await.unwrap_err();
        assert!(matches!(err, ScaleError::FleetNotFound(_)));
        assert!(fleet.writes().is_empty());
    }

    #[tokio::test]
    async fn set_desired_outside_bounds_fails() {
        let fleet = InMemoryFleet::new().with_fleet("workers", 1, 4);
        assert!(fleet.set_desired_size("workers", 5).await.is_err());
        fleet.set_desired_size("workers", 4).await.unwrap();
        assert_eq!(fleet.desired_size("workers"), Some(4));
    }
}
