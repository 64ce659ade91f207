//! `Broker` implementation over the Flower HTTP API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use queuescale_core::{Broker, ScaleError, ScaleResult, TaskDescriptor, WorkerActivity};

use crate::transport::Endpoint;

const QUEUES_PATH: &str = "/api/queues/length";
const WORKERS_PATH: &str = "/api/workers?refresh=1";

/// Response of `GET /api/queues/length`.
#[derive(Debug, Deserialize)]
struct QueueLengths {
    #[serde(default)]
    active_queues: Vec<QueueLength>,
}

#[derive(Debug, Deserialize)]
struct QueueLength {
    name: String,
    messages: Option<u64>,
}

/// One worker entry of `GET /api/workers`. Workers that did not answer
/// the `active` inspection have no such key.
#[derive(Debug, Deserialize)]
struct WorkerInfo {
    #[serde(default)]
    active: Option<Vec<TaskDescriptor>>,
}

/// Broker reached through a Flower-compatible monitoring endpoint.
#[derive(Debug, Clone)]
pub struct FlowerBroker {
    endpoint: Endpoint,
    timeout: Duration,
}

impl FlowerBroker {
    /// `url` is the monitoring base URL, e.g. `http://flower:5555`.
    pub fn new(url: &str, timeout: Duration) -> ScaleResult<Self> {
        Ok(Self {
            endpoint: Endpoint::parse(url)?,
            timeout,
        })
    }
}

#[async_trait]
impl Broker for FlowerBroker {
    async fn queue_depth(&self, queue: &str) -> ScaleResult<u64> {
        let lengths: QueueLengths = self.endpoint.get_json(QUEUES_PATH, self.timeout).await?;
        let depth = depth_of(&lengths, queue)?;
        debug!(queue, depth, "queue depth");
        Ok(depth)
    }

    async fn active_workers(&self) -> ScaleResult<Option<WorkerActivity>> {
        let workers: Option<HashMap<String, Option<WorkerInfo>>> =
            self.endpoint.get_json(WORKERS_PATH, self.timeout).await?;
        Ok(workers.and_then(activity_of))
    }
}

fn depth_of(lengths: &QueueLengths, queue: &str) -> ScaleResult<u64> {
    let entry = lengths
        .active_queues
        .iter()
        .find(|q| q.name == queue)
        .ok_or_else(|| ScaleError::Broker(format!("queue \"{queue}\" not found")))?;
    entry
        .messages
        .ok_or_else(|| ScaleError::Broker(format!("queue \"{queue}\" reported no message count")))
}

/// An empty worker map means nobody replied.
fn activity_of(workers: HashMap<String, Option<WorkerInfo>>) -> Option<WorkerActivity> {
    if workers.is_empty() {
        return None;
    }
    Some(
        workers
            .into_iter()
            .map(|(name, info)| {
                let tasks = info.and_then(|i| i.active).unwrap_or_default();
                (name, tasks)
            })
            .collect(),
    )
}
