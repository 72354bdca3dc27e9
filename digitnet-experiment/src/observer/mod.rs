//! Sinks that persist the lifecycle and metrics of a run.

use crate::error::Result;
use crate::run::{RunId, ScalarEntry};
use mongodb::bson::DateTime;
use serde::Serialize;
use serde_json::Value;

mod file_storage;
mod mongo;

pub use file_storage::FileStorageObserver;
pub use mongo::{MongoObserver, MongoUrl};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub cpu_count: usize,
}

impl HostInfo {
    pub fn collect() -> Self {
        let hostname = std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        HostInfo {
            hostname,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunMeta {
    pub command: String,
    pub config_updates: Value,
}

#[derive(Clone, Debug)]
pub struct StartedEvent {
    pub experiment_name: String,
    pub command: String,
    pub host: HostInfo,
    pub start_time: DateTime,
    pub config: Value,
    pub meta: RunMeta,
}

#[derive(Clone, Debug)]
pub struct HeartbeatEvent {
    pub captured_out: String,
    pub beat_time: DateTime,
    pub result: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct CompletedEvent {
    pub stop_time: DateTime,
    pub result: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct FailedEvent {
    pub fail_time: DateTime,
    pub fail_trace: Vec<String>,
}

/// Receives run events in order: `started`, then any number of `log_metrics` and `heartbeat`
/// calls, then exactly one of `completed` or `failed`.
pub trait RunObserver {
    /// Registers the run. `id` is set when an earlier observer already assigned one, which
    /// should then be reused.
    fn started(&mut self, event: &StartedEvent, id: Option<RunId>) -> Result<RunId>;

    fn heartbeat(&mut self, event: &HeartbeatEvent) -> Result<()>;

    fn log_metrics(&mut self, entries: &[ScalarEntry]) -> Result<()>;

    fn completed(&mut self, event: &CompletedEvent) -> Result<()>;

    fn failed(&mut self, event: &FailedEvent) -> Result<()>;
}

/// Groups entries by metric name, keeping the order in which names first appear.
pub(crate) fn group_by_name(entries: &[ScalarEntry]) -> Vec<(&str, Vec<&ScalarEntry>)> {
    let mut groups: Vec<(&str, Vec<&ScalarEntry>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(name, _)| *name == entry.name) {
            Some((_, group)) => group.push(entry),
            None => groups.push((&entry.name, vec![entry])),
        }
    }
    groups
}

#[cfg(test)]
mod test {
    use super::{group_by_name, HostInfo};
    use crate::run::ScalarEntry;
    use mongodb::bson::DateTime;

    fn entry(name: &str, step: u64) -> ScalarEntry {
        ScalarEntry {
            name: name.to_string(),
            step,
            value: step as f64,
            timestamp: DateTime::from_millis(0),
        }
    }

    #[test]
    fn test_group_by_name() {
        let entries = vec![entry("loss", 0), entry("acc", 0), entry("loss", 1)];
        let groups = group_by_name(&entries);
        assert_eq!(2, groups.len());
        assert_eq!("loss", groups[0].0);
        assert_eq!(vec![0, 1], groups[0].1.iter().map(|e| e.step).collect::<Vec<_>>());
        assert_eq!("acc", groups[1].0);
    }

    #[test]
    fn test_host_info() {
        let host = HostInfo::collect();
        assert!(!host.hostname.is_empty());
        assert_eq!(std::env::consts::OS, host.os);
        assert!(host.cpu_count >= 1);
    }
}
