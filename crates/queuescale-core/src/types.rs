//! Domain types for a single control-loop evaluation.
//!
//! Everything here is rebuilt from the broker and the fleet manager at
//! the start of each invocation and dropped at the end of it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a machine in the fleet (e.g. `i-0abc...`).
pub type InstanceId = String;

// ── Fleet ─────────────────────────────────────────────────────────

/// One machine currently provisioned in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetMember {
    pub instance_id: InstanceId,
    /// Public network address; the join key against worker identities.
    pub public_ip: Option<String>,
    pub public_dns: Option<String>,
    pub launch_time: DateTime<Utc>,
    /// Name of the fleet that owns this machine.
    pub fleet_name: String,
    pub state: MemberState,
}

impl FleetMember {
    pub fn is_running(&self) -> bool {
        self.state == MemberState::Running
    }
}

/// Lifecycle state of a fleet member as reported by the compute provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

/// Size bounds and targets of a fleet, read fresh per balancing decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FleetDescriptor {
    pub name: String,
    /// Current membership count.
    pub size: u32,
    pub min_size: u32,
    /// Upper clamp for every computed desired size.
    pub max_size: u32,
    pub desired_size: u32,
}

impl FleetDescriptor {
    /// Clamp a requested desired size to the fleet maximum.
    pub fn clamp(&self, desired: u32) -> u32 {
        desired.min(self.max_size)
    }
}

// ── Broker ────────────────────────────────────────────────────────

/// A task currently executing on a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Unix timestamp (fractional seconds) when the task started.
    #[serde(default)]
    pub time_start: Option<f64>,
    #[serde(default)]
    pub worker_pid: Option<u32>,
}

impl TaskDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            hostname: None,
            time_start: None,
            worker_pid: None,
        }
    }
}

/// Snapshot of the tasks each reporting worker is running.
///
/// Keys are worker identities of the form `name@address`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct WorkerActivity {
    workers: HashMap<String, Vec<TaskDescriptor>>,
}

impl WorkerActivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tasks a worker reported. Reporting the same worker twice
    /// replaces its task list.
    pub fn insert(&mut self, worker: impl Into<String>, tasks: Vec<TaskDescriptor>) {
        self.workers.insert(worker.into(), tasks);
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn workers(&self) -> impl Iterator<Item = (&str, &[TaskDescriptor])> {
        self.workers
            .iter()
            .map(|(name, tasks)| (name.as_str(), tasks.as_slice()))
    }

    /// All tasks running on workers whose address component equals `address`.
    ///
    /// Several worker processes may share one address; their tasks are
    /// concatenated.
    pub fn tasks_at(&self, address: &str) -> Vec<&TaskDescriptor> {
        self.workers()
            .filter(|(name, _)| worker_address(name) == Some(address))
            .flat_map(|(_, tasks)| tasks.iter())
            .collect()
    }
}

impl FromIterator<(String, Vec<TaskDescriptor>)> for WorkerActivity {
    fn from_iter<I: IntoIterator<Item = (String, Vec<TaskDescriptor>)>>(iter: I) -> Self {
        Self {
            workers: iter.into_iter().collect(),
        }
    }
}

/// Address component of a `name@address` worker identity.
///
/// Splits on the first `@`. Identities without one have no address.
pub fn worker_address(worker: &str) -> Option<&str> {
    worker.split_once('@').map(|(_, address)| address)
}
