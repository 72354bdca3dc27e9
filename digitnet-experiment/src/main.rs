use anyhow::Context;
use clap::Parser;
use digitnet_experiment::capture::apply_backspaces_and_linefeeds;
use digitnet_experiment::cli::{parse_invocation, Cli, Command};
use digitnet_experiment::config::{random_seed, ConfigBuilder};
use digitnet_experiment::observer::{FileStorageObserver, MongoObserver};
use digitnet_experiment::pipeline::{run_main, PipelineOptions};
use digitnet_experiment::Experiment;

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let invocation = parse_invocation(&cli.args)?;

    let mut builder = ConfigBuilder::new(random_seed())?;
    if let Some(path) = &cli.config {
        builder = builder
            .with_file(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
    }
    for update in &invocation.updates {
        builder.update(update)?;
    }
    let (config, config_updates) = builder.build()?;

    if invocation.command == Command::PrintConfig {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let plan = cli.observer_plan()?;
    let mut experiment = Experiment::new(&cli.name).with_captured_out_filter(apply_backspaces_and_linefeeds);
    if let Some(url) = &plan.mongo {
        let observer = MongoObserver::from_url(url).with_context(|| format!("connecting to MongoDB at {url}"))?;
        experiment = experiment.with_observer(Box::new(observer));
    }
    if let Some(dir) = &plan.file_storage {
        experiment = experiment.with_observer(Box::new(FileStorageObserver::create(dir)?));
    }

    let options = PipelineOptions {
        data_dir: cli.data_dir.clone(),
        show_progress: !cli.no_progress,
        dashboard: Some(plan.dashboard()),
    };
    let outcome = experiment.run("main", config, config_updates, |run| run_main(run, &options))?;
    log::info!("run {:?} finished with result {:?}", outcome.id, outcome.result);
    Ok(())
}
