use crate::callbacks::{ProgressCallback, TrackingCallback};
use crate::data::{load_mnist, MnistData, Preprocessed};
use crate::error::Result;
use crate::model::build_classifier;
use crate::observer::MongoUrl;
use crate::report::{report_dashboard_hint, report_dataset, report_evaluation};
use crate::run::Run;
use digitnet::backend::CpuBackend;
use digitnet::loss::LossFn;
use digitnet::net::train::{Evaluation, FitParams, TrainCallback};
use digitnet::scoring::NoOpScorer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub data_dir: PathBuf,
    pub show_progress: bool,
    /// Database to point the dashboard hint at, if runs are tracked in MongoDB.
    pub dashboard: Option<MongoUrl>,
}

/// The `run` command: load MNIST from the data directory, then train and evaluate.
pub fn run_main(run: &mut Run, options: &PipelineOptions) -> Result<()> {
    let data = load_mnist(&options.data_dir)?;
    train_and_evaluate(run, &data, options)?;
    Ok(())
}

pub fn train_and_evaluate(run: &mut Run, data: &MnistData, options: &PipelineOptions) -> Result<Evaluation> {
    let config = run.config().clone();
    let prepared = Preprocessed::from_raw(data, config.num_classes)?;
    report_dataset(run, &prepared.train, &prepared.test);

    let mut net = build_classifier(CpuBackend::<f32>::new(), config.num_classes, config.seed)?;
    log::debug!("model summary:\n{}", net.summary());

    let loss = LossFn::CategoricalCrossEntropy;
    let optimizer = config.optimizer.to_optimizer();
    let params = FitParams {
        batch_size: config.batch_size,
        epochs: config.epochs,
        shuffle: true,
    };
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut progress = if options.show_progress {
        ProgressCallback::new(config.epochs)
    } else {
        ProgressCallback::hidden(config.epochs)
    };
    {
        let mut tracking = TrackingCallback::new(run);
        let mut callbacks: [&mut dyn TrainCallback; 2] = [&mut tracking, &mut progress];
        net.fit(
            &mut rng,
            &prepared.train,
            Some(&prepared.test),
            &loss,
            &optimizer,
            &params,
            &mut callbacks,
        )?;
    }

    let evaluation = net.evaluate(&prepared.test, config.batch_size, &loss, &mut NoOpScorer)?;
    report_evaluation(run, &evaluation);
    if let Some(url) = &options.dashboard {
        report_dashboard_hint(run, url);
    }
    Ok(evaluation)
}
