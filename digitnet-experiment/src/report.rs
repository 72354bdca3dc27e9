use crate::observer::MongoUrl;
use crate::run::Run;
use digitnet::net::train::{Evaluation, LabeledData};
use digitnet::tensor::ITensor;

pub fn report_dataset(run: &mut Run, train: &LabeledData<f32>, test: &LabeledData<f32>) {
    run.println(format!("x_train shape: {}", train.images().dims()));
    run.println(format!("{} train samples", train.len()));
    run.println(format!("{} test samples", test.len()));
}

pub fn report_evaluation(run: &mut Run, evaluation: &Evaluation) {
    run.println(format!("Test loss: {}", evaluation.loss));
    run.println(format!("Test accuracy: {}", evaluation.accuracy));
}

/// How to browse the tracked runs of `url` in Omniboard.
pub fn report_dashboard_hint(run: &mut Run, url: &MongoUrl) {
    run.println("open omniboard by the following command...");
    run.println(format!("omniboard -m {}:{}", url.address(), url.db_name));
}

#[cfg(test)]
mod test {
    use super::{report_dashboard_hint, report_dataset, report_evaluation};
    use crate::config::RunConfig;
    use crate::observer::MongoUrl;
    use crate::run::Run;
    use digitnet::net::train::{Evaluation, LabeledData};
    use digitnet::tensor::{Dim2, Dim4, Tensor2, Tensor4};

    #[test]
    fn test_report_lines() {
        let mut run = Run::new(None, RunConfig::with_seed(0), Vec::new(), None);
        let train = LabeledData::new(Tensor4::zeroed(Dim4(6, 28, 28, 1)), Tensor2::zeroed(Dim2(6, 10))).unwrap();
        let test = LabeledData::new(Tensor4::zeroed(Dim4(2, 28, 28, 1)), Tensor2::zeroed(Dim2(2, 10))).unwrap();
        report_dataset(&mut run, &train, &test);
        report_evaluation(&mut run, &Evaluation { loss: 0.25, accuracy: 0.5 });
        report_dashboard_hint(&mut run, &MongoUrl::default());
        assert_eq!(
            "x_train shape: (6, 28, 28, 1)\n\
             6 train samples\n\
             2 test samples\n\
             Test loss: 0.25\n\
             Test accuracy: 0.5\n\
             open omniboard by the following command...\n\
             omniboard -m 127.0.0.1:27017:sacred_db_1\n",
            run.captured_out()
        );
    }
}
