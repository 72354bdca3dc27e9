use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::{CallbackError, Error};
use crate::loss::LossFn;
use crate::net::Net;
use crate::optimizer::Optimizer;
use crate::scoring::{MulticlassScorer, NoOpScorer, Scorer};
use crate::tensor::{Dim2, Dim3, Dims, ITensor, Tensor2, Tensor4};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FitParams {
    pub batch_size: usize,
    pub epochs: usize,
    /// Reorder the training samples at the start of every epoch.
    pub shuffle: bool,
}

impl Default for FitParams {
    fn default() -> Self {
        FitParams {
            batch_size: 32,
            epochs: 1,
            shuffle: true,
        }
    }
}

/// Images in NHWC layout with one-hot labels, one row per sample.
#[derive(Clone, Debug)]
pub struct LabeledData<T: DType> {
    images: Tensor4<T>,
    labels: Tensor2<T>,
}

impl<T: DType> LabeledData<T> {
    pub fn new(images: Tensor4<T>, labels: Tensor2<T>) -> Result<Self, Error> {
        let (num_images, num_labels) = (images.dims().first(), labels.dims().rows());
        if num_images != num_labels {
            return Err(Error::MismatchedSampleCount {
                images: num_images,
                labels: num_labels,
            });
        }
        Ok(LabeledData { images, labels })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.dims().rows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn images(&self) -> &Tensor4<T> {
        &self.images
    }

    #[inline]
    pub fn labels(&self) -> &Tensor2<T> {
        &self.labels
    }

    #[inline]
    pub fn sample_shape(&self) -> Dim3 {
        self.images.dims().without_first_axis()
    }

    #[inline]
    pub fn classes(&self) -> usize {
        self.labels.dims().cols()
    }

    /// Copies the samples at `indices` into flat `(indices.len(), features)` batch rows.
    pub fn gather(&self, indices: &[usize], images_out: &mut Tensor2<T>, labels_out: &mut Tensor2<T>) {
        let image_len = self.sample_shape().tensor_len();
        let classes = self.classes();
        images_out.resize(T::ZERO, Dim2(indices.len(), image_len));
        labels_out.resize(T::ZERO, Dim2(indices.len(), classes));
        let (images, labels) = (self.images.as_ref(), self.labels.as_ref());
        for (row, &idx) in indices.iter().enumerate() {
            images_out.as_mut()[row * image_len..(row + 1) * image_len]
                .copy_from_slice(&images[idx * image_len..(idx + 1) * image_len]);
            labels_out.as_mut()[row * classes..(row + 1) * classes]
                .copy_from_slice(&labels[idx * classes..(idx + 1) * classes]);
        }
    }
}

/// Running means over the batches seen so far in the current epoch.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatchMetrics {
    /// 1-based
    pub batch: usize,
    pub size: usize,
    pub loss: f64,
    pub accuracy: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpochMetrics {
    /// 1-based
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct History {
    pub epochs: Vec<EpochMetrics>,
}

impl History {
    #[inline]
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

/// Hooks invoked by [`Net::fit`]. An error from `on_epoch_end` stops training.
pub trait TrainCallback {
    fn on_epoch_begin(&mut self, _epoch: usize, _num_batches: usize) {}

    fn on_batch_end(&mut self, _metrics: &BatchMetrics) {}

    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<(), CallbackError>;
}

struct ScorerPair<'a, B: Backend> {
    first: &'a mut MulticlassScorer<B>,
    second: &'a mut dyn Scorer<B>,
}

impl<B: Backend> Scorer<B> for ScorerPair<'_, B> {
    fn process_batch(&mut self, backend: &B, output: &B::Tensor<Dim2>, expected: &B::Tensor<Dim2>) {
        self.first.process_batch(backend, output, expected);
        self.second.process_batch(backend, output, expected);
    }
}

impl<B: Backend> Net<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn fit<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        train: &LabeledData<B::Float>,
        validation: Option<&LabeledData<B::Float>>,
        loss: &LossFn,
        optimizer: &Optimizer,
        params: &FitParams,
        callbacks: &mut [&mut dyn TrainCallback],
    ) -> Result<History, Error> {
        if params.batch_size == 0 {
            return Err(Error::ZeroBatchSize);
        }
        self.check_data(train)?;
        if let Some(validation) = validation {
            self.check_data(validation)?;
        }

        let mut order: Vec<usize> = (0..train.len()).collect();
        let num_batches = train.len().div_ceil(params.batch_size);
        let mut input_batch = Tensor2::empty();
        let mut label_batch = Tensor2::empty();
        let mut history = History::default();

        for epoch in 1..=params.epochs {
            if params.shuffle {
                order.shuffle(rng);
            }
            for callback in callbacks.iter_mut() {
                callback.on_epoch_begin(epoch, num_batches);
            }

            let mut scorer = MulticlassScorer::new(&self.backend, self.output_size());
            let mut loss_sum = 0.0;
            let mut seen = 0;
            for (batch, indices) in order.chunks(params.batch_size).enumerate() {
                train.gather(indices, &mut input_batch, &mut label_batch);
                loss_sum += self.train_batch(&input_batch, &label_batch, loss, optimizer, &mut scorer);
                seen += indices.len();
                let metrics = BatchMetrics {
                    batch: batch + 1,
                    size: indices.len(),
                    loss: loss_sum / seen as f64,
                    accuracy: scorer.accuracy(&self.backend),
                };
                for callback in callbacks.iter_mut() {
                    callback.on_batch_end(&metrics);
                }
            }

            let (val_loss, val_accuracy) = match validation {
                Some(validation) => {
                    let eval = self.evaluate(validation, params.batch_size, loss, &mut NoOpScorer)?;
                    (Some(eval.loss), Some(eval.accuracy))
                }
                None => (None, None),
            };
            let metrics = EpochMetrics {
                epoch,
                loss: if seen > 0 { loss_sum / seen as f64 } else { 0.0 },
                accuracy: scorer.accuracy(&self.backend),
                val_loss,
                val_accuracy,
            };
            log::info!(
                "epoch {epoch}/{}: loss={:.4} accuracy={:.4} val_loss={:?} val_accuracy={:?}",
                params.epochs,
                metrics.loss,
                metrics.accuracy,
                metrics.val_loss,
                metrics.val_accuracy
            );
            for callback in callbacks.iter_mut() {
                callback.on_epoch_end(&metrics).map_err(Error::Callback)?;
            }
            history.epochs.push(metrics);
        }
        Ok(history)
    }

    /// Mean loss and accuracy over `data` in inference mode. `scorer` sees every batch too.
    pub fn evaluate(
        &mut self,
        data: &LabeledData<B::Float>,
        batch_size: usize,
        loss: &LossFn,
        scorer: &mut dyn Scorer<B>,
    ) -> Result<Evaluation, Error> {
        if batch_size == 0 {
            return Err(Error::ZeroBatchSize);
        }
        self.check_data(data)?;
        let mut accuracy = MulticlassScorer::new(&self.backend, self.output_size());
        let mut input_batch = Tensor2::empty();
        let mut label_batch = Tensor2::empty();
        let mut loss_sum = 0.0;
        let indices: Vec<usize> = (0..data.len()).collect();
        for chunk in indices.chunks(batch_size) {
            data.gather(chunk, &mut input_batch, &mut label_batch);
            let mut pair = ScorerPair {
                first: &mut accuracy,
                second: &mut *scorer,
            };
            loss_sum += self.evaluate_batch(&input_batch, &label_batch, loss, &mut pair);
        }
        Ok(Evaluation {
            loss: if data.is_empty() { 0.0 } else { loss_sum / data.len() as f64 },
            accuracy: accuracy.accuracy(&self.backend),
        })
    }

    fn check_data(&self, data: &LabeledData<B::Float>) -> Result<(), Error> {
        if data.sample_shape() != self.input_shape() {
            return Err(Error::ShapeMismatch {
                expected: self.input_shape().as_vec(),
                actual: data.sample_shape().as_vec(),
            });
        }
        if data.classes() != self.output_size() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.output_size()],
                actual: vec![data.classes()],
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{EpochMetrics, FitParams, LabeledData, TrainCallback};
    use crate::activation::ActivationFn;
    use crate::backend::CpuBackend;
    use crate::error::{CallbackError, Error};
    use crate::loss::LossFn;
    use crate::net::initializer::RandomNetInitializer;
    use crate::net::layer::{DenseLayerParams, DropoutLayerParams, FlattenLayerParams};
    use crate::net::{Net, NetBuilder};
    use crate::optimizer::Optimizer;
    use crate::scoring::NoOpScorer;
    use crate::tensor::{Dim2, Dim3, Dim4, Tensor};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Two classes separated by which half of a 2×2 image is bright.
    fn synthetic(samples: usize, seed: u64) -> LabeledData<f32> {
        use rand::Rng;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut images = Vec::with_capacity(samples * 4);
        let mut labels = Vec::with_capacity(samples * 2);
        for i in 0..samples {
            let class = i % 2;
            for px in 0..4 {
                let bright = (px < 2) == (class == 0);
                let base = if bright { 0.8 } else { 0.1 };
                images.push(base + rng.gen_range(0.0..0.1f32));
            }
            labels.extend(if class == 0 { [1.0, 0.0] } else { [0.0, 1.0] });
        }
        LabeledData::new(
            Tensor::from_vec(images, Dim4(samples, 2, 2, 1)),
            Tensor::from_vec(labels, Dim2(samples, 2)),
        )
        .unwrap()
    }

    fn small_net() -> Net<CpuBackend<f32>> {
        NetBuilder::new(CpuBackend::<f32>::new(), Dim3(2, 2, 1))
            .with_initializer(RandomNetInitializer::seed_from_u64(11))
            .with_layer(FlattenLayerParams)
            .with_layer(DenseLayerParams {
                size: 8,
                activation_fn: ActivationFn::RELU,
            })
            .with_layer(DropoutLayerParams { rate: 0.1 })
            .with_layer(DenseLayerParams {
                size: 2,
                activation_fn: ActivationFn::Softmax,
            })
            .build()
            .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        begun: Vec<(usize, usize)>,
        batches: usize,
        epochs: Vec<EpochMetrics>,
        fail_at: Option<usize>,
    }

    impl TrainCallback for Recorder {
        fn on_epoch_begin(&mut self, epoch: usize, num_batches: usize) {
            self.begun.push((epoch, num_batches));
        }
        fn on_batch_end(&mut self, _metrics: &super::BatchMetrics) {
            self.batches += 1;
        }
        fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<(), CallbackError> {
            self.epochs.push(*metrics);
            if self.fail_at == Some(metrics.epoch) {
                return Err("sink unavailable".into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_fit_reports_every_epoch() {
        let train = synthetic(50, 1);
        let test = synthetic(20, 2);
        let mut net = small_net();
        let mut recorder = Recorder::default();
        let params = FitParams {
            batch_size: 16,
            epochs: 4,
            shuffle: true,
        };
        let history = net
            .fit(
                &mut StdRng::seed_from_u64(3),
                &train,
                Some(&test),
                &LossFn::CategoricalCrossEntropy,
                &Optimizer::default(),
                &params,
                &mut [&mut recorder],
            )
            .unwrap();

        assert_eq!(4, history.epochs.len());
        assert_eq!(history.epochs, recorder.epochs);
        assert_eq!(vec![(1, 4), (2, 4), (3, 4), (4, 4)], recorder.begun);
        assert_eq!(16, recorder.batches);
        for (i, m) in history.epochs.iter().enumerate() {
            assert_eq!(i + 1, m.epoch);
            assert!(m.loss.is_finite() && m.loss >= 0.0);
            assert!((0.0..=1.0).contains(&m.accuracy));
            let val_loss = m.val_loss.unwrap();
            let val_accuracy = m.val_accuracy.unwrap();
            assert!(val_loss.is_finite() && val_loss >= 0.0);
            assert!((0.0..=1.0).contains(&val_accuracy));
        }
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let train = synthetic(200, 4);
        let test = synthetic(40, 5);
        let mut net = small_net();
        let params = FitParams {
            batch_size: 10,
            epochs: 5,
            shuffle: true,
        };
        let optimizer = Optimizer::Sgd {
            learning_rate: 0.1,
            momentum: 0.9,
        };
        let history = net
            .fit(
                &mut StdRng::seed_from_u64(6),
                &train,
                Some(&test),
                &LossFn::CategoricalCrossEntropy,
                &optimizer,
                &params,
                &mut [],
            )
            .unwrap();
        let last = history.last().unwrap();
        assert!(last.val_accuracy.unwrap() > 0.9, "{history:?}");
        let eval = net.evaluate(&test, 7, &LossFn::CategoricalCrossEntropy, &mut NoOpScorer).unwrap();
        assert_eq!(last.val_accuracy, Some(eval.accuracy));
    }

    #[test]
    fn test_callback_error_stops_fit() {
        let train = synthetic(8, 1);
        let mut net = small_net();
        let mut recorder = Recorder {
            fail_at: Some(2),
            ..Recorder::default()
        };
        let params = FitParams {
            batch_size: 4,
            epochs: 5,
            shuffle: false,
        };
        let result = net.fit(
            &mut StdRng::seed_from_u64(0),
            &train,
            None,
            &LossFn::CategoricalCrossEntropy,
            &Optimizer::default(),
            &params,
            &mut [&mut recorder],
        );
        assert!(matches!(result, Err(Error::Callback(_))));
        assert_eq!(2, recorder.epochs.len());
        assert_eq!(None, recorder.epochs[0].val_loss);
    }

    #[test]
    fn test_invalid_inputs() {
        let mut net = small_net();
        let train = synthetic(8, 1);
        let zero = FitParams {
            batch_size: 0,
            ..FitParams::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let loss = LossFn::CategoricalCrossEntropy;
        let optimizer = Optimizer::default();
        assert!(matches!(
            net.fit(&mut rng, &train, None, &loss, &optimizer, &zero, &mut []),
            Err(Error::ZeroBatchSize)
        ));

        let wrong_shape = LabeledData::new(
            Tensor::from_vec(vec![0.0f32; 18], Dim4(2, 3, 3, 1)),
            Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], Dim2(2, 2)),
        )
        .unwrap();
        assert!(matches!(
            net.fit(&mut rng, &wrong_shape, None, &loss, &optimizer, &FitParams::default(), &mut []),
            Err(Error::ShapeMismatch { .. })
        ));

        let mismatched = LabeledData::new(
            Tensor::from_vec(vec![0.0f32; 12], Dim4(3, 2, 2, 1)),
            Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], Dim2(2, 2)),
        );
        assert!(matches!(
            mismatched,
            Err(Error::MismatchedSampleCount { images: 3, labels: 2 })
        ));
    }

    #[test]
    fn test_gather() {
        let data = synthetic(4, 0);
        let mut images = Tensor::empty();
        let mut labels = Tensor::empty();
        data.gather(&[3, 0], &mut images, &mut labels);
        assert_eq!(&data.images().as_ref()[12..16], &images.as_ref()[0..4]);
        assert_eq!(&data.images().as_ref()[0..4], &images.as_ref()[4..8]);
        assert_eq!(&[0.0, 1.0, 1.0, 0.0], labels.as_ref());
    }
}
