use crate::config::RunConfig;
use crate::observer::{HeartbeatEvent, RunObserver};
use mongodb::bson::DateTime;
use std::collections::HashMap;
use std::fmt::Display;

pub type RunId = i64;

/// One value of a named metric. Steps count from zero per name.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarEntry {
    pub name: String,
    pub step: u64,
    pub value: f64,
    pub timestamp: DateTime,
}

pub type CapturedOutFilter = fn(&str) -> String;

/// The state of a single experiment run as seen by its main function.
pub struct Run {
    id: Option<RunId>,
    config: RunConfig,
    observers: Vec<Box<dyn RunObserver>>,
    captured_out: String,
    captured_out_filter: Option<CapturedOutFilter>,
    pending: Vec<ScalarEntry>,
    next_steps: HashMap<String, u64>,
    result: Option<f64>,
}

impl Run {
    pub(crate) fn new(
        id: Option<RunId>,
        config: RunConfig,
        observers: Vec<Box<dyn RunObserver>>,
        captured_out_filter: Option<CapturedOutFilter>,
    ) -> Self {
        Run {
            id,
            config,
            observers,
            captured_out: String::new(),
            captured_out_filter,
            pending: Vec::new(),
            next_steps: HashMap::new(),
            result: None,
        }
    }

    #[inline]
    pub fn id(&self) -> Option<RunId> {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Prints a line to stdout and records it in the captured output.
    pub fn println(&mut self, line: impl Display) {
        let line = line.to_string();
        println!("{line}");
        self.captured_out.push_str(&line);
        self.captured_out.push('\n');
    }

    /// Captured output after the filter, if any, has been applied.
    pub fn captured_out(&self) -> String {
        match self.captured_out_filter {
            Some(filter) => filter(&self.captured_out),
            None => self.captured_out.clone(),
        }
    }

    /// Buffers a metric value until the next heartbeat.
    pub fn log_scalar(&mut self, name: &str, value: f64) {
        let step = self.next_steps.entry(name.to_string()).or_insert(0);
        self.pending.push(ScalarEntry {
            name: name.to_string(),
            step: *step,
            value,
            timestamp: DateTime::now(),
        });
        *step += 1;
    }

    #[inline]
    pub fn set_result(&mut self, value: f64) {
        self.result = Some(value);
    }

    #[inline]
    pub fn result(&self) -> Option<f64> {
        self.result
    }

    /// Flushes buffered metrics and reports captured output and the current result. Observer
    /// failures are logged and do not interrupt the run.
    pub fn heartbeat(&mut self) {
        let entries = std::mem::take(&mut self.pending);
        let event = HeartbeatEvent {
            captured_out: self.captured_out(),
            beat_time: DateTime::now(),
            result: self.result,
        };
        for observer in self.observers.iter_mut() {
            if !entries.is_empty() {
                if let Err(err) = observer.log_metrics(&entries) {
                    log::warn!("failed to log metrics: {err}");
                }
            }
            if let Err(err) = observer.heartbeat(&event) {
                log::warn!("failed to send heartbeat: {err}");
            }
        }
    }

    pub(crate) fn observers_mut(&mut self) -> &mut [Box<dyn RunObserver>] {
        &mut self.observers
    }
}

#[cfg(test)]
mod test {
    use super::Run;
    use crate::capture::apply_backspaces_and_linefeeds;
    use crate::config::RunConfig;

    #[test]
    fn test_steps_per_name() {
        let mut run = Run::new(Some(1), RunConfig::with_seed(0), Vec::new(), None);
        run.log_scalar("loss", 0.5);
        run.log_scalar("acc", 0.7);
        run.log_scalar("loss", 0.4);
        let steps: Vec<(&str, u64)> = run.pending.iter().map(|e| (e.name.as_str(), e.step)).collect();
        assert_eq!(vec![("loss", 0), ("acc", 0), ("loss", 1)], steps);
        run.heartbeat();
        assert!(run.pending.is_empty());
        run.log_scalar("loss", 0.3);
        assert_eq!(2, run.pending[0].step);
    }

    #[test]
    fn test_captured_out_filter() {
        let mut run = Run::new(None, RunConfig::with_seed(0), Vec::new(), Some(apply_backspaces_and_linefeeds));
        run.println("10%\r100%");
        run.println(format!("{} train samples", 60000));
        assert_eq!("100%\n60000 train samples\n", run.captured_out());
    }

    #[test]
    fn test_result() {
        let mut run = Run::new(None, RunConfig::with_seed(0), Vec::new(), None);
        assert_eq!(None, run.result());
        run.set_result(0.98);
        assert_eq!(Some(0.98), run.result());
    }
}
