use crate::config::RunConfig;
use crate::error::Result;
use crate::observer::{CompletedEvent, FailedEvent, HostInfo, RunMeta, RunObserver, StartedEvent};
use crate::run::{CapturedOutFilter, Run, RunId};
use mongodb::bson::DateTime;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub id: Option<RunId>,
    pub result: Option<f64>,
    pub captured_out: String,
}

/// A named experiment whose runs are reported to a set of observers.
pub struct Experiment {
    name: String,
    observers: Vec<Box<dyn RunObserver>>,
    captured_out_filter: Option<CapturedOutFilter>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Experiment {
            name: name.into(),
            observers: Vec::new(),
            captured_out_filter: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_captured_out_filter(mut self, filter: CapturedOutFilter) -> Self {
        self.captured_out_filter = Some(filter);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `main` as command `command`. Observers are told the run completed or failed before
    /// this returns; a failure of `main` is returned after the observers have recorded it.
    pub fn run<F>(self, command: &str, config: RunConfig, config_updates: Value, main: F) -> Result<RunOutcome>
    where
        F: FnOnce(&mut Run) -> Result<()>,
    {
        let Experiment {
            name,
            mut observers,
            captured_out_filter,
        } = self;
        let started = StartedEvent {
            experiment_name: name.clone(),
            command: command.to_string(),
            host: HostInfo::collect(),
            start_time: DateTime::now(),
            config: serde_json::to_value(&config)?,
            meta: RunMeta {
                command: command.to_string(),
                config_updates,
            },
        };
        let mut id = None;
        for observer in observers.iter_mut() {
            let assigned = observer.started(&started, id)?;
            id = id.or(Some(assigned));
        }
        match id {
            Some(id) => log::info!("running command '{command}' of {name} with id {id}"),
            None => log::info!("running command '{command}' of {name} without observers"),
        }

        let mut run = Run::new(id, config, observers, captured_out_filter);
        let status = main(&mut run);
        run.heartbeat();
        match status {
            Ok(()) => {
                let event = CompletedEvent {
                    stop_time: DateTime::now(),
                    result: run.result(),
                };
                for observer in run.observers_mut() {
                    if let Err(err) = observer.completed(&event) {
                        log::warn!("observer failed to record completion: {err}");
                    }
                }
                log::info!("completed after {} with result {:?}", elapsed(&started.start_time), run.result());
                let outcome = RunOutcome {
                    id,
                    result: run.result(),
                    captured_out: run.captured_out(),
                };
                Ok(outcome)
            }
            Err(err) => {
                let event = FailedEvent {
                    fail_time: DateTime::now(),
                    fail_trace: fail_trace(&err),
                };
                for observer in run.observers_mut() {
                    if let Err(observer_err) = observer.failed(&event) {
                        log::warn!("observer failed to record failure: {observer_err}");
                    }
                }
                log::error!("failed after {}: {err}", elapsed(&started.start_time));
                Err(err)
            }
        }
    }
}

fn elapsed(start: &DateTime) -> String {
    let millis = (DateTime::now().timestamp_millis() - start.timestamp_millis()).max(0);
    format!("{:.1}s", millis as f64 / 1000.0)
}

/// The error followed by each of its sources, one per line.
fn fail_trace(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut trace = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    trace
}

#[cfg(test)]
mod test {
    use super::fail_trace;
    use crate::error::Error;

    #[test]
    fn test_fail_trace() {
        let err = Error::Net(digitnet::Error::Callback("disk full".into()));
        let trace = fail_trace(&err);
        assert_eq!(vec!["training callback failed".to_string(), "caused by: disk full".to_string()], trace);
    }
}
