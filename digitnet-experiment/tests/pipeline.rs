use digitnet_experiment::capture::apply_backspaces_and_linefeeds;
use digitnet_experiment::config::{ConfigBuilder, RunConfig};
use digitnet_experiment::data::{MnistData, RawSplit};
use digitnet_experiment::observer::{CompletedEvent, FailedEvent, HeartbeatEvent, RunObserver, StartedEvent};
use digitnet_experiment::pipeline::{run_main, train_and_evaluate, PipelineOptions};
use digitnet_experiment::run::{RunId, ScalarEntry};
use digitnet_experiment::{Error, Experiment};
use serde_json::json;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Started { id: Option<RunId>, command: String, config: serde_json::Value },
    Metrics(Vec<(String, u64, f64)>),
    Heartbeat { captured_out: String, result: Option<f64> },
    Completed { result: Option<f64> },
    Failed { trace: Vec<String> },
}

struct RecordingObserver {
    assign_id: RunId,
    events: Rc<RefCell<Vec<Event>>>,
}

impl RecordingObserver {
    fn new(assign_id: RunId) -> (Self, Rc<RefCell<Vec<Event>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        (
            RecordingObserver {
                assign_id,
                events: events.clone(),
            },
            events,
        )
    }
}

impl RunObserver for RecordingObserver {
    fn started(&mut self, event: &StartedEvent, id: Option<RunId>) -> digitnet_experiment::Result<RunId> {
        self.events.borrow_mut().push(Event::Started {
            id,
            command: event.command.clone(),
            config: event.config.clone(),
        });
        Ok(id.unwrap_or(self.assign_id))
    }

    fn heartbeat(&mut self, event: &HeartbeatEvent) -> digitnet_experiment::Result<()> {
        self.events.borrow_mut().push(Event::Heartbeat {
            captured_out: event.captured_out.clone(),
            result: event.result,
        });
        Ok(())
    }

    fn log_metrics(&mut self, entries: &[ScalarEntry]) -> digitnet_experiment::Result<()> {
        let entries = entries.iter().map(|e| (e.name.clone(), e.step, e.value)).collect();
        self.events.borrow_mut().push(Event::Metrics(entries));
        Ok(())
    }

    fn completed(&mut self, event: &CompletedEvent) -> digitnet_experiment::Result<()> {
        self.events.borrow_mut().push(Event::Completed { result: event.result });
        Ok(())
    }

    fn failed(&mut self, event: &FailedEvent) -> digitnet_experiment::Result<()> {
        self.events.borrow_mut().push(Event::Failed {
            trace: event.fail_trace.clone(),
        });
        Ok(())
    }
}

/// Digits drawn as a bright upper half (class 0) or a bright lower half (class 1).
fn synthetic_split(count: usize) -> RawSplit {
    let mut images = Vec::with_capacity(count * 28 * 28);
    let mut labels = Vec::with_capacity(count);
    for i in 0..count {
        let label = (i % 2) as u8;
        labels.push(label);
        for row in 0..28 {
            let lit = (row < 14) == (label == 0);
            images.extend((0..28).map(|col| if lit && (col + i) % 3 != 0 { 255 } else { 0 }));
        }
    }
    RawSplit::new(images, labels, 28, 28).unwrap()
}

fn synthetic_data() -> MnistData {
    MnistData {
        train: synthetic_split(16),
        test: synthetic_split(8),
        rows: 28,
        cols: 28,
    }
}

fn small_config() -> (RunConfig, serde_json::Value) {
    let mut builder = ConfigBuilder::new(3).unwrap();
    for update in ["epochs=2", "batch_size=8", "num_classes=2"] {
        builder.update(update).unwrap();
    }
    builder.build().unwrap()
}

fn options() -> PipelineOptions {
    PipelineOptions {
        data_dir: PathBuf::from("does/not/exist"),
        show_progress: false,
        dashboard: None,
    }
}

#[test]
fn test_tracked_training_run() {
    let (observer, events) = RecordingObserver::new(5);
    let (config, updates) = small_config();
    let data = synthetic_data();
    let outcome = Experiment::new("mnist_cnn")
        .with_observer(Box::new(observer))
        .with_captured_out_filter(apply_backspaces_and_linefeeds)
        .run("main", config, updates.clone(), |run| {
            train_and_evaluate(run, &data, &options())?;
            Ok(())
        })
        .unwrap();
    assert_eq!(Some(5), outcome.id);

    let events = events.borrow();
    match &events[0] {
        Event::Started { id, command, config } => {
            assert_eq!(None, *id);
            assert_eq!("main", command);
            assert_eq!(json!(2), config["epochs"]);
            assert_eq!(json!(3), config["seed"]);
        }
        other => panic!("expected started event, got {other:?}"),
    }
    assert_eq!(json!({"epochs": 2, "batch_size": 8, "num_classes": 2}), updates);

    let metrics: Vec<&Vec<(String, u64, f64)>> = events
        .iter()
        .filter_map(|e| match e {
            Event::Metrics(m) => Some(m),
            _ => None,
        })
        .collect();
    assert_eq!(2, metrics.len());
    for (epoch, entries) in metrics.iter().enumerate() {
        let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(vec!["loss", "acc", "val_loss", "val_acc"], names);
        assert!(entries.iter().all(|(_, step, _)| *step == epoch as u64));
        assert!(entries.iter().all(|(_, _, value)| value.is_finite()));
    }
    let last_val_acc = metrics[1][3].2;
    assert_eq!(Some(last_val_acc), outcome.result);
    assert!((0.0..=1.0).contains(&last_val_acc));

    // one heartbeat per epoch and a final one
    let heartbeats = events.iter().filter(|e| matches!(e, Event::Heartbeat { .. })).count();
    assert_eq!(3, heartbeats);
    assert_eq!(Some(&Event::Completed { result: outcome.result }), events.last());
    assert!(!events.iter().any(|e| matches!(e, Event::Failed { .. })));

    let lines: Vec<&str> = outcome.captured_out.lines().collect();
    assert_eq!("x_train shape: (16, 28, 28, 1)", lines[0]);
    assert_eq!("16 train samples", lines[1]);
    assert_eq!("8 test samples", lines[2]);
    assert!(lines[3].starts_with("Test loss: "));
    assert!(lines[4].starts_with("Test accuracy: "));
    assert_eq!(5, lines.len());
}

#[test]
fn test_dashboard_hint() {
    let (config, updates) = small_config();
    let data = synthetic_data();
    let options = PipelineOptions {
        dashboard: Some(Default::default()),
        ..options()
    };
    let outcome = Experiment::new("mnist_cnn")
        .run("main", config, updates, |run| {
            train_and_evaluate(run, &data, &options)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(None, outcome.id);
    assert!(outcome.captured_out.ends_with(
        "open omniboard by the following command...\nomniboard -m 127.0.0.1:27017:sacred_db_1\n"
    ));
}

#[cfg(not(feature = "download"))]
#[test]
fn test_missing_dataset_fails_run() {
    let (observer, events) = RecordingObserver::new(1);
    let (config, updates) = small_config();
    let result = Experiment::new("mnist_cnn")
        .with_observer(Box::new(observer))
        .run("main", config, updates, |run| run_main(run, &options()));
    assert!(matches!(result, Err(Error::DatasetMissing(_))));

    let events = events.borrow();
    assert!(matches!(events.first(), Some(Event::Started { .. })));
    match events.last() {
        Some(Event::Failed { trace }) => assert!(trace[0].contains("does/not/exist"), "{trace:?}"),
        other => panic!("expected failed event, got {other:?}"),
    }
    assert!(!events.iter().any(|e| matches!(e, Event::Completed { .. })));
}

#[test]
fn test_first_observer_assigns_id() {
    let (first, first_events) = RecordingObserver::new(11);
    let (second, second_events) = RecordingObserver::new(99);
    let outcome = Experiment::new("ids")
        .with_observer(Box::new(first))
        .with_observer(Box::new(second))
        .run("main", RunConfig::with_seed(0), json!({}), |run| {
            run.log_scalar("loss", 1.0);
            run.set_result(0.5);
            Ok(())
        })
        .unwrap();
    assert_eq!(Some(11), outcome.id);
    assert!(matches!(first_events.borrow()[0], Event::Started { id: None, .. }));
    assert!(matches!(second_events.borrow()[0], Event::Started { id: Some(11), .. }));
    // buffered scalars still reach observers through the final flush
    assert_eq!(
        Event::Metrics(vec![("loss".to_string(), 0, 1.0)]),
        second_events.borrow()[1]
    );
    assert_eq!(Some(&Event::Completed { result: Some(0.5) }), second_events.borrow().last());
}
