use digitnet_experiment::config::RunConfig;
use digitnet_experiment::observer::FileStorageObserver;
use digitnet_experiment::{Error, Experiment};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_completed_run_files() {
    let dir = tempfile::tempdir().unwrap();
    let observer = FileStorageObserver::create(dir.path()).unwrap();
    let outcome = Experiment::new("mnist_cnn")
        .with_observer(Box::new(observer))
        .run("main", RunConfig::with_seed(17), json!({"epochs": 3}), |run| {
            run.println("10 train samples");
            for epoch in 0..2 {
                run.log_scalar("loss", 1.0 / (epoch + 1) as f64);
                run.log_scalar("val_acc", 0.5 + epoch as f64 / 10.0);
                run.set_result(0.5 + epoch as f64 / 10.0);
                run.heartbeat();
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(Some(1), outcome.id);

    let run_dir = dir.path().join("1");
    let config = read_json(&run_dir.join("config.json"));
    assert_eq!(json!(17), config["seed"]);
    assert_eq!(json!(128), config["batch_size"]);

    let run = read_json(&run_dir.join("run.json"));
    assert_eq!(json!("COMPLETED"), run["status"]);
    assert_eq!(json!("mnist_cnn"), run["experiment"]["name"]);
    assert_eq!(json!({"epochs": 3}), run["meta"]["config_updates"]);
    assert_eq!(json!(0.6), run["result"]);
    assert!(run["stop_time"].is_string());
    assert!(run["heartbeat"].is_string());

    let metrics = read_json(&run_dir.join("metrics.json"));
    assert_eq!(json!([0, 1]), metrics["loss"]["steps"]);
    assert_eq!(json!([1.0, 0.5]), metrics["loss"]["values"]);
    assert_eq!(2, metrics["val_acc"]["timestamps"].as_array().unwrap().len());

    assert_eq!("10 train samples\n", fs::read_to_string(run_dir.join("cout.txt")).unwrap());
}

#[test]
fn test_failed_run_and_next_id() {
    let dir = tempfile::tempdir().unwrap();
    let first = Experiment::new("mnist_cnn")
        .with_observer(Box::new(FileStorageObserver::create(dir.path()).unwrap()))
        .run("main", RunConfig::with_seed(0), json!({}), |_| Ok(()))
        .unwrap();
    assert_eq!(Some(1), first.id);

    let result = Experiment::new("mnist_cnn")
        .with_observer(Box::new(FileStorageObserver::create(dir.path()).unwrap()))
        .run("main", RunConfig::with_seed(0), json!({}), |_| {
            Err(Error::Config("epochs must be at least 1".into()))
        });
    assert!(matches!(result, Err(Error::Config(_))));

    let run = read_json(&dir.path().join("2").join("run.json"));
    assert_eq!(json!("FAILED"), run["status"]);
    assert_eq!(
        json!(["invalid configuration: epochs must be at least 1"]),
        run["fail_trace"]
    );
}
