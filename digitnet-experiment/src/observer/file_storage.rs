use crate::error::{Error, Result};
use crate::observer::{group_by_name, CompletedEvent, FailedEvent, HeartbeatEvent, RunObserver, StartedEvent};
use crate::run::{RunId, ScalarEntry};
use mongodb::bson::DateTime;
use serde_json::{json, Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const CREATE_ATTEMPTS: usize = 5;

/// Writes every run into its own numbered directory below `base_dir`.
pub struct FileStorageObserver {
    base_dir: PathBuf,
    run_dir: Option<PathBuf>,
    run: Value,
    metrics: Map<String, Value>,
}

impl FileStorageObserver {
    pub fn create(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(FileStorageObserver {
            base_dir,
            run_dir: None,
            run: Value::Null,
            metrics: Map::new(),
        })
    }

    /// Directory of the current run, once started.
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    fn next_run_id(&self) -> Result<RunId> {
        let mut max_id = 0;
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|name| name.parse::<RunId>().ok()) {
                max_id = max_id.max(id);
            }
        }
        Ok(max_id + 1)
    }

    fn claim_dir(&self, id: Option<RunId>) -> Result<(RunId, PathBuf)> {
        if let Some(id) = id {
            let dir = self.base_dir.join(id.to_string());
            fs::create_dir_all(&dir)?;
            return Ok((id, dir));
        }
        let mut attempts = 0;
        loop {
            let id = self.next_run_id()?;
            let dir = self.base_dir.join(id.to_string());
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((id, dir)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists && attempts + 1 < CREATE_ATTEMPTS => attempts += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn run_dir_or_err(&self) -> Result<&Path> {
        self.run_dir()
            .ok_or_else(|| Error::Config("observer used before the run started".into()))
    }

    fn write_json(&self, file: &str, value: &Value) -> Result<()> {
        let path = self.run_dir_or_err()?.join(file);
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    fn update_run(&mut self, fields: Value) -> Result<()> {
        if let (Value::Object(run), Value::Object(fields)) = (&mut self.run, fields) {
            run.extend(fields);
        }
        self.write_json("run.json", &self.run)
    }
}

impl RunObserver for FileStorageObserver {
    fn started(&mut self, event: &StartedEvent, id: Option<RunId>) -> Result<RunId> {
        let (id, dir) = self.claim_dir(id)?;
        self.run_dir = Some(dir);
        self.run = json!({
            "experiment": { "name": event.experiment_name },
            "command": event.command,
            "host": event.host,
            "start_time": timestamp(&event.start_time)?,
            "meta": event.meta,
            "status": "RUNNING",
            "heartbeat": null,
            "result": null,
            "artifacts": [],
            "resources": [],
        });
        self.write_json("config.json", &event.config)?;
        self.write_json("run.json", &self.run)?;
        let cout = self.run_dir_or_err()?.join("cout.txt");
        fs::write(cout, "")?;
        log::debug!("storing run {id} in {}", self.base_dir.display());
        Ok(id)
    }

    fn heartbeat(&mut self, event: &HeartbeatEvent) -> Result<()> {
        let cout = self.run_dir_or_err()?.join("cout.txt");
        fs::write(cout, &event.captured_out)?;
        self.update_run(json!({
            "heartbeat": timestamp(&event.beat_time)?,
            "result": event.result,
        }))
    }

    fn log_metrics(&mut self, entries: &[ScalarEntry]) -> Result<()> {
        for (name, group) in group_by_name(entries) {
            let series = self
                .metrics
                .entry(name.to_string())
                .or_insert_with(|| json!({ "steps": [], "values": [], "timestamps": [] }));
            for entry in group {
                push(series, "steps", json!(entry.step));
                push(series, "values", json!(entry.value));
                push(series, "timestamps", json!(timestamp(&entry.timestamp)?));
            }
        }
        self.write_json("metrics.json", &Value::Object(self.metrics.clone()))
    }

    fn completed(&mut self, event: &CompletedEvent) -> Result<()> {
        self.update_run(json!({
            "stop_time": timestamp(&event.stop_time)?,
            "result": event.result,
            "status": "COMPLETED",
        }))
    }

    fn failed(&mut self, event: &FailedEvent) -> Result<()> {
        self.update_run(json!({
            "stop_time": timestamp(&event.fail_time)?,
            "fail_trace": event.fail_trace,
            "status": "FAILED",
        }))
    }
}

fn push(series: &mut Value, key: &str, value: Value) {
    if let Some(Value::Array(values)) = series.get_mut(key) {
        values.push(value);
    }
}

fn timestamp(time: &DateTime) -> Result<String> {
    time.try_to_rfc3339_string()
        .map_err(|err| Error::Timestamp(err.to_string()))
}

#[cfg(test)]
mod test {
    use super::FileStorageObserver;
    use crate::observer::RunObserver;

    #[test]
    fn test_next_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let observer = FileStorageObserver::create(dir.path()).unwrap();
        assert_eq!(1, observer.next_run_id().unwrap());
        std::fs::create_dir(dir.path().join("3")).unwrap();
        std::fs::create_dir(dir.path().join("_sources")).unwrap();
        std::fs::write(dir.path().join("9"), "not a run").unwrap();
        assert_eq!(4, observer.next_run_id().unwrap());
    }

    #[test]
    fn test_reuses_given_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut observer = FileStorageObserver::create(dir.path().join("runs")).unwrap();
        let (id, path) = observer.claim_dir(Some(12)).unwrap();
        assert_eq!(12, id);
        assert!(path.ends_with("runs/12") && path.is_dir());
        assert!(observer.log_metrics(&[]).is_err());
    }
}
