//! queuescale.toml configuration parser.
//!
//! Every field is optional; unset fields fall back to the documented
//! defaults. The queue name can also come from `CELERY_DEFAULT_QUEUE`,
//! which an explicit `queue` in the file overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ScaleError, ScaleResult};

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "QUEUESCALE_CONFIG";
/// Environment variable supplying the queue name when the file does not.
pub const QUEUE_ENV: &str = "CELERY_DEFAULT_QUEUE";

pub const DEFAULT_QUEUE: &str = "celery";
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);
pub const DEFAULT_FACTOR: f64 = 0.5;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaleConfig {
    /// Queue whose backlog drives scaling.
    pub queue: Option<String>,
    /// Minimum age before an idle member may be reclaimed ("300s", "5m",
    /// "off").
    pub cooldown: Option<String>,
    /// Desired members per pending message.
    pub factor: Option<f64>,
    pub dry_run: Option<bool>,
    /// Cloud region; the provider's default chain applies when unset.
    pub region: Option<String>,
    /// Per-request timeout for broker calls.
    pub request_timeout: Option<String>,
}

impl ScaleConfig {
    pub fn from_file(path: &Path) -> ScaleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScaleError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ScaleResult<Self> {
        toml::from_str(content).map_err(|e| ScaleError::Config(e.to_string()))
    }

    /// Load from the process environment: the file named by
    /// `QUEUESCALE_CONFIG` (if any), then `CELERY_DEFAULT_QUEUE`.
    pub fn load() -> ScaleResult<Self> {
        let path = std::env::var_os(CONFIG_ENV);
        let env_queue = std::env::var(QUEUE_ENV).ok();
        Self::load_from(path.as_deref().map(Path::new), env_queue)
    }

    /// Same as [`ScaleConfig::load`] with the environment passed in.
    pub fn load_from(path: Option<&Path>, env_queue: Option<String>) -> ScaleResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if config.queue.is_none() {
            config.queue = env_queue.filter(|q| !q.is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject values no evaluation could run with.
    pub fn validate(&self) -> ScaleResult<()> {
        if self.queue.as_deref().is_some_and(|q| q.trim().is_empty()) {
            return Err(ScaleError::Config("queue name is empty".into()));
        }
        validate_factor(self.factor())?;
        self.cooldown()?;
        self.request_timeout()?;
        Ok(())
    }

    pub fn queue_name(&self) -> &str {
        self.queue.as_deref().unwrap_or(DEFAULT_QUEUE)
    }

    /// Cooldown window, or `None` when disabled with "off".
    pub fn cooldown(&self) -> ScaleResult<Option<Duration>> {
        match self.cooldown.as_deref().map(str::trim) {
            None => Ok(Some(DEFAULT_COOLDOWN)),
            Some("off" | "none") => Ok(None),
            Some(s) => parse_duration(s)
                .map(Some)
                .ok_or_else(|| ScaleError::Config(format!("invalid cooldown \"{s}\""))),
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor.unwrap_or(DEFAULT_FACTOR)
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }

    pub fn request_timeout(&self) -> ScaleResult<Duration> {
        match self.request_timeout.as_deref() {
            None => Ok(DEFAULT_REQUEST_TIMEOUT),
            Some(s) => parse_duration(s)
                .filter(|d| !d.is_zero())
                .ok_or_else(|| ScaleError::Config(format!("invalid request_timeout \"{s}\""))),
        }
    }
}

/// A scaling factor must be a finite, strictly positive number.
pub fn validate_factor(factor: f64) -> ScaleResult<()> {
    if factor.is_finite() && factor > 0.0 {
        Ok(())
    } else {
        Err(ScaleError::Config(format!(
            "factor must be a positive number, got {factor}"
        )))
    }
}

/// Parse a duration string like "5s", "500ms", "5m", or plain seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
