use crate::run::Run;
use digitnet::net::train::{BatchMetrics, EpochMetrics, TrainCallback};
use digitnet::CallbackError;
use indicatif::{ProgressBar, ProgressStyle};

/// Records each epoch's metrics on the run and uses validation accuracy as the run result.
pub struct TrackingCallback<'a> {
    run: &'a mut Run,
}

impl<'a> TrackingCallback<'a> {
    pub fn new(run: &'a mut Run) -> Self {
        TrackingCallback { run }
    }
}

impl TrainCallback for TrackingCallback<'_> {
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<(), CallbackError> {
        self.run.log_scalar("loss", metrics.loss);
        self.run.log_scalar("acc", metrics.accuracy);
        if let Some(val_loss) = metrics.val_loss {
            self.run.log_scalar("val_loss", val_loss);
        }
        if let Some(val_accuracy) = metrics.val_accuracy {
            self.run.log_scalar("val_acc", val_accuracy);
            self.run.set_result(val_accuracy);
        }
        self.run.heartbeat();
        Ok(())
    }
}

const PROGRESS_TEMPLATE: &str = "{prefix} [{bar:30}] {pos}/{len} {elapsed_precise} {msg}";

/// A per-epoch progress bar on stderr with the running loss and accuracy.
pub struct ProgressCallback {
    epochs: usize,
    hidden: bool,
    bar: Option<ProgressBar>,
}

impl ProgressCallback {
    pub fn new(epochs: usize) -> Self {
        ProgressCallback {
            epochs,
            hidden: false,
            bar: None,
        }
    }

    pub fn hidden(epochs: usize) -> Self {
        ProgressCallback {
            epochs,
            hidden: true,
            bar: None,
        }
    }
}

impl TrainCallback for ProgressCallback {
    fn on_epoch_begin(&mut self, epoch: usize, num_batches: usize) {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(num_batches as u64)
        };
        bar.set_length(num_batches as u64);
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_prefix(format!("Epoch {epoch}/{}", self.epochs));
        self.bar = Some(bar);
    }

    fn on_batch_end(&mut self, metrics: &BatchMetrics) {
        if let Some(bar) = &self.bar {
            bar.set_position(metrics.batch as u64);
            bar.set_message(format!("loss: {:.4} - acc: {:.4}", metrics.loss, metrics.accuracy));
        }
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<(), CallbackError> {
        if let Some(bar) = self.bar.take() {
            let mut message = format!("loss: {:.4} - acc: {:.4}", metrics.loss, metrics.accuracy);
            if let (Some(val_loss), Some(val_accuracy)) = (metrics.val_loss, metrics.val_accuracy) {
                message.push_str(&format!(" - val_loss: {val_loss:.4} - val_acc: {val_accuracy:.4}"));
            }
            bar.finish_with_message(message);
        }
        Ok(())
    }
}
