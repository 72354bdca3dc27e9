use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::Error;
use crate::loss::LossFn;
use crate::net::initializer::{NetInitializer, RandomNetInitializer};
use crate::net::layer::{ConcreteLayer, ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::optimizer::Optimizer;
use crate::scoring::Scorer;
use crate::tensor::{Dim1, Dim2, Dim3, Dims, ITensor, Tensor2};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Write};

pub mod initializer;
pub mod layer;
pub mod param;
pub mod train;

/// Selects training-only behavior such as dropout.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    Train,
    Infer,
}

pub struct Net<B: Backend> {
    backend: B,
    input_shape: Dim3,
    layers: Box<[ConcreteLayer<B>]>,
    outputs: Box<[B::Tensor<Dim2>]>,
    input_buff: B::Tensor<Dim2>,
    expected_buff: B::Tensor<Dim2>,

    // error with respect to the input of each layer; the first is never written
    input_errors: Box<[B::Tensor<Dim2>]>,
    loss_buff: B::Tensor<Dim1>,
    loss_deriv_buff: B::Tensor<Dim2>,
}

impl<B: Backend> Net<B> {
    fn new(backend: B, input_shape: Dim3, layers: Box<[ConcreteLayer<B>]>) -> Self {
        let input_size = input_shape.tensor_len();
        let output_size = layers.last().map_or(input_size, |l| l.output_size());
        let outputs = layers
            .iter()
            .map(|l| backend.new_tensor_exact(Dim2(0, l.output_size())))
            .collect();
        let input_errors = layers
            .iter()
            .map(|l| backend.new_tensor_exact(Dim2(0, l.input_size())))
            .collect();
        Net {
            input_buff: backend.new_tensor_exact(Dim2(0, input_size)),
            expected_buff: backend.new_tensor_exact(Dim2(0, output_size)),
            loss_buff: backend.new_tensor_exact(Dim1(0)),
            loss_deriv_buff: backend.new_tensor_exact(Dim2(0, output_size)),
            backend,
            input_shape,
            layers,
            outputs,
            input_errors,
        }
    }

    /// Runs inference on `(samples, input_size)` rows.
    pub fn predict(&mut self, input: &Tensor2<B::Float>) -> &B::Tensor<Dim2> {
        let num_rows = input.dims().rows();
        assert_eq!(
            input.dims(),
            &Dim2(num_rows, self.input_size()),
            "Invalid dimensions for input tensor"
        );
        let Net {
            backend,
            layers,
            outputs,
            input_buff,
            ..
        } = self;
        let input = backend.adapt_input(input_buff, input);
        forward_layers(backend, Mode::Infer, layers, outputs, input);
        self.output()
    }

    /// Runs one gradient step on a batch and returns the summed per-sample loss.
    pub fn train_batch(
        &mut self,
        input: &Tensor2<B::Float>,
        expected: &Tensor2<B::Float>,
        loss: &LossFn,
        optimizer: &Optimizer,
        scorer: &mut dyn Scorer<B>,
    ) -> f64 {
        self.check_batch(input, expected);
        let Net {
            backend,
            layers,
            outputs,
            input_buff,
            expected_buff,
            input_errors,
            loss_buff,
            loss_deriv_buff,
            ..
        } = self;
        let num_rows = input.dims().rows();
        let input = backend.adapt_input(input_buff, input);
        let expected = backend.adapt_input(expected_buff, expected);

        forward_layers(backend, Mode::Train, layers, outputs, input);
        let output = &outputs[outputs.len() - 1];
        backend.resize_tensor(loss_buff, Dim1(num_rows));
        backend.resize_tensor_major(loss_deriv_buff, num_rows);
        loss.compute(backend, output, expected, loss_buff, loss_deriv_buff);
        scorer.process_batch(backend, output, expected);

        backprop_layers(backend, layers, outputs, input_errors, input, loss_deriv_buff);
        for layer in layers.iter_mut() {
            layer.update(backend, optimizer);
        }
        self.loss_sum()
    }

    /// Scores a batch in inference mode and returns the summed per-sample loss.
    pub fn evaluate_batch(
        &mut self,
        input: &Tensor2<B::Float>,
        expected: &Tensor2<B::Float>,
        loss: &LossFn,
        scorer: &mut dyn Scorer<B>,
    ) -> f64 {
        self.check_batch(input, expected);
        let Net {
            backend,
            layers,
            outputs,
            input_buff,
            expected_buff,
            loss_buff,
            loss_deriv_buff,
            ..
        } = self;
        let num_rows = input.dims().rows();
        let input = backend.adapt_input(input_buff, input);
        let expected = backend.adapt_input(expected_buff, expected);

        forward_layers(backend, Mode::Infer, layers, outputs, input);
        let output = &outputs[outputs.len() - 1];
        backend.resize_tensor(loss_buff, Dim1(num_rows));
        backend.resize_tensor_major(loss_deriv_buff, num_rows);
        loss.compute(backend, output, expected, loss_buff, loss_deriv_buff);
        scorer.process_batch(backend, output, expected);
        self.loss_sum()
    }

    fn check_batch(&self, input: &Tensor2<B::Float>, expected: &Tensor2<B::Float>) {
        let num_rows = input.dims().rows();
        assert_eq!(
            input.dims(),
            &Dim2(num_rows, self.input_size()),
            "Invalid dimensions for input tensor"
        );
        assert_eq!(
            expected.dims(),
            &Dim2(num_rows, self.output_size()),
            "Invalid dimensions for expected tensor"
        );
    }

    fn loss_sum(&self) -> f64 {
        let losses = self.backend.tensor_as_native(&self.loss_buff);
        losses.as_ref().iter().map(|l| l.as_f64()).sum()
    }

    #[inline]
    fn output(&self) -> &B::Tensor<Dim2> {
        // the builder rejects empty networks
        &self.outputs[self.outputs.len() - 1]
    }

    #[inline]
    pub fn layers(&self) -> &[ConcreteLayer<B>] {
        &self.layers
    }

    #[inline]
    pub fn input_shape(&self) -> Dim3 {
        self.input_shape
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_shape.tensor_len()
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.output().dims().cols()
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(|l| l.param_count()).sum()
    }

    /// A layer table with output shapes and parameter counts.
    pub fn summary(&self) -> String {
        const RULE_WIDTH: usize = 65;
        let mut out = String::new();
        let mut counters: HashMap<LayerType, usize> = HashMap::new();
        let _ = writeln!(out, "{:<29}{:<26}{}", "Layer (type)", "Output Shape", "Param #");
        let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
        for layer in self.layers.iter() {
            let layer_type = layer.layer_type();
            let n = counters.entry(layer_type).or_insert(0);
            *n += 1;
            let name = format!("{}_{} ({})", layer_type.snake_name(), n, layer_type.name());
            let shape = layer.output_shape();
            let shape = if shape.height() == 1 && shape.width() == 1 {
                format!("(None, {})", shape.channels())
            } else {
                format!("(None, {}, {}, {})", shape.height(), shape.width(), shape.channels())
            };
            let _ = writeln!(out, "{name:<29}{shape:<26}{}", group_thousands(layer.param_count()));
        }
        let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
        let _ = write!(out, "Total params: {}", group_thousands(self.param_count()));
        out
    }
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn forward_layers<B: Backend>(
    backend: &B,
    mode: Mode,
    layers: &mut [ConcreteLayer<B>],
    outputs: &mut [B::Tensor<Dim2>],
    input: &B::Tensor<Dim2>,
) {
    let num_rows = input.dims().rows();
    for (i, layer) in layers.iter_mut().enumerate() {
        let (done, rest) = outputs.split_at_mut(i);
        let layer_input = done.last().unwrap_or(input);
        let output = &mut rest[0];
        backend.resize_tensor_major(output, num_rows);
        layer.forward(backend, mode, layer_input, output);
    }
}

fn backprop_layers<B: Backend>(
    backend: &B,
    layers: &mut [ConcreteLayer<B>],
    outputs: &[B::Tensor<Dim2>],
    input_errors: &mut [B::Tensor<Dim2>],
    input: &B::Tensor<Dim2>,
    output_error: &B::Tensor<Dim2>,
) {
    let num_rows = input.dims().rows();
    for (i, layer) in layers.iter_mut().enumerate().rev() {
        let (below, above) = input_errors.split_at_mut(i + 1);
        let out_error = above.first().unwrap_or(output_error);
        let layer_input = if i == 0 { input } else { &outputs[i - 1] };
        let input_error = if i == 0 {
            None
        } else {
            let input_error = &mut below[i];
            backend.resize_tensor_major(input_error, num_rows);
            Some(input_error)
        };
        layer.backprop(backend, layer_input, &outputs[i], input_error, out_error);
    }
}

pub struct NetBuilder<B: Backend> {
    backend: B,
    input_shape: Dim3,
    initializer: Box<dyn NetInitializer<B::Float>>,
    layers: Vec<ConcreteLayerParams>,
}

impl<B: Backend> NetBuilder<B> {
    pub fn new(backend: B, input_shape: Dim3) -> Self {
        NetBuilder {
            backend,
            input_shape,
            initializer: Box::new(RandomNetInitializer::default()),
            layers: Vec::new(),
        }
    }

    pub fn with_initializer<I>(mut self, initializer: I) -> Self
    where
        I: 'static + NetInitializer<B::Float>,
    {
        self.initializer = Box::new(initializer);
        self
    }

    pub fn with_layer<T>(mut self, layer: T) -> Self
    where
        T: Into<ConcreteLayerParams>,
    {
        self.layers.push(layer.into());
        self
    }

    pub fn build(mut self) -> Result<Net<B>, Error> {
        if self.layers.is_empty() {
            return Err(Error::EmptyNet);
        }
        let mut shape = self.input_shape;
        let mut layers = Vec::with_capacity(self.layers.len());
        for (layer_idx, params) in self.layers.iter().enumerate() {
            let layer = params.create_layer(&self.backend, layer_idx, shape, self.initializer.as_mut())?;
            log::debug!(
                "layer {layer_idx}: {} {shape} -> {} ({} params)",
                layer.layer_type().name(),
                layer.output_shape(),
                layer.param_count()
            );
            shape = layer.output_shape();
            layers.push(layer);
        }
        Ok(Net::new(self.backend, self.input_shape, layers.into_boxed_slice()))
    }
}

impl<B: Backend> Debug for Net<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Net")
            .field("backend", &self.backend)
            .field("input_shape", &self.input_shape)
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::{group_thousands, NetBuilder};
    use crate::activation::ActivationFn;
    use crate::backend::{CpuBackend, TensorOps};
    use crate::error::Error;
    use crate::loss::LossFn;
    use crate::net::initializer::RandomNetInitializer;
    use crate::net::layer::{
        Conv2dLayerParams, DenseLayerParams, DropoutLayerParams, FlattenLayerParams, MaxPool2dLayerParams,
    };
    use crate::optimizer::Optimizer;
    use crate::scoring::NoOpScorer;
    use crate::tensor::{Dim2, Dim3, ITensor, Tensor2};

    #[test]
    fn test_empty_net() {
        let result = NetBuilder::new(CpuBackend::<f32>::new(), Dim3(28, 28, 1)).build();
        assert!(matches!(result, Err(Error::EmptyNet)));
    }

    #[test]
    fn test_geometry_error_names_layer() {
        let result = NetBuilder::new(CpuBackend::<f32>::new(), Dim3(4, 4, 1))
            .with_initializer(RandomNetInitializer::seed_from_u64(0))
            .with_layer(Conv2dLayerParams::square(2, 3, ActivationFn::RELU))
            .with_layer(Conv2dLayerParams::square(2, 3, ActivationFn::RELU))
            .build();
        match result {
            Err(Error::InvalidLayerGeometry { layer_idx, input, .. }) => {
                assert_eq!(1, layer_idx);
                assert_eq!(Dim3(2, 2, 2), input);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_summary() {
        let net = NetBuilder::new(CpuBackend::<f32>::new(), Dim3(28, 28, 1))
            .with_initializer(RandomNetInitializer::seed_from_u64(0))
            .with_layer(Conv2dLayerParams::square(32, 3, ActivationFn::RELU))
            .with_layer(Conv2dLayerParams::square(64, 3, ActivationFn::RELU))
            .with_layer(MaxPool2dLayerParams {
                pool: (2, 2),
                stride: None,
            })
            .with_layer(DropoutLayerParams { rate: 0.25 })
            .with_layer(FlattenLayerParams)
            .with_layer(DenseLayerParams {
                size: 128,
                activation_fn: ActivationFn::RELU,
            })
            .with_layer(DropoutLayerParams { rate: 0.5 })
            .with_layer(DenseLayerParams {
                size: 10,
                activation_fn: ActivationFn::Softmax,
            })
            .build()
            .unwrap();
        assert_eq!(1_199_882, net.param_count());
        assert_eq!(10, net.output_size());
        let summary = net.summary();
        assert!(summary.contains("conv2d_2 (Conv2D)"), "{summary}");
        assert!(summary.contains("(None, 12, 12, 64)"), "{summary}");
        assert!(summary.contains("flatten_1 (Flatten)"), "{summary}");
        assert!(summary.contains("(None, 9216)"), "{summary}");
        assert!(summary.ends_with("Total params: 1,199,882"), "{summary}");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!("0", group_thousands(0));
        assert_eq!("999", group_thousands(999));
        assert_eq!("1,000", group_thousands(1000));
        assert_eq!("18,496", group_thousands(18496));
    }

    #[test]
    fn test_train_batch_reduces_loss() {
        let mut net = NetBuilder::new(CpuBackend::<f64>::new(), Dim3::flat(2))
            .with_initializer(RandomNetInitializer::seed_from_u64(3))
            .with_layer(DenseLayerParams {
                size: 16,
                activation_fn: ActivationFn::RELU,
            })
            .with_layer(DenseLayerParams {
                size: 2,
                activation_fn: ActivationFn::Softmax,
            })
            .build()
            .unwrap();
        let input = Tensor2::from_vec(vec![0., 0., 0., 1., 1., 0., 1., 1.], Dim2(4, 2));
        let expected = Tensor2::from_vec(vec![1., 0., 0., 1., 0., 1., 1., 0.], Dim2(4, 2));
        let optimizer = Optimizer::Sgd {
            learning_rate: 0.1,
            momentum: 0.9,
        };
        let first = net.train_batch(&input, &expected, &LossFn::CategoricalCrossEntropy, &optimizer, &mut NoOpScorer);
        let mut last = first;
        for _ in 0..1000 {
            last = net.train_batch(&input, &expected, &LossFn::CategoricalCrossEntropy, &optimizer, &mut NoOpScorer);
        }
        assert!(last < first / 2.0, "first={first}, last={last}");

        let backend = CpuBackend::<f64>::new();
        let output = backend.tensor_as_native(net.predict(&input));
        assert_eq!(&Dim2(4, 2), output.dims());
        for row in output.as_ref().chunks(2) {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-9);
        }
    }
}
