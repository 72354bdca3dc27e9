use crate::activation::ActivationFn;
use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::net::layer::{geometry_error, ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::net::param::Param;
use crate::net::Mode;
use crate::optimizer::Optimizer;
use crate::tensor::{Dim1, Dim2, Dim3, Dims, ITensor};
use std::fmt::{Debug, Formatter};

/// Fully connected layer over the whole input row.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseLayerParams {
    pub size: usize,
    pub activation_fn: ActivationFn,
}

impl<B: Backend> LayerParams<B> for DenseLayerParams {
    type Layer = DenseLayer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        let input_size = input_shape.tensor_len();
        let output_size = self.size;
        if input_size == 0 || output_size == 0 {
            return Err(geometry_error(layer_idx, LayerType::Dense, input_shape, "empty input or output"));
        }
        let weights = initializer.get_weights(
            LayerType::Dense,
            Dim2(output_size, input_size),
            layer_idx,
            input_size,
            output_size,
        );
        let biases = initializer.get_biases(LayerType::Dense, Dim1(output_size), layer_idx);
        Ok(DenseLayer {
            input_shape,
            output_size,
            weights: Param::new(backend, weights),
            biases: Param::new(backend, biases),
            activation: backend.new_tensor_exact(Dim2(0, output_size)),
            activation_error: backend.new_tensor_exact(Dim2(0, output_size)),
            activation_fn: self.activation_fn,
        })
    }
}

impl From<DenseLayerParams> for ConcreteLayerParams {
    fn from(params: DenseLayerParams) -> Self {
        ConcreteLayerParams::Dense(params)
    }
}

pub struct DenseLayer<B: Backend> {
    input_shape: Dim3,
    output_size: usize,
    weights: Param<B, Dim2>,
    biases: Param<B, Dim1>,
    activation: B::Tensor<Dim2>,
    activation_error: B::Tensor<Dim2>,
    activation_fn: ActivationFn,
}

impl<B: Backend> DenseLayer<B> {
    #[inline]
    pub fn weights(&self) -> &Param<B, Dim2> {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &Param<B, Dim1> {
        &self.biases
    }
}

impl<B: Backend> Layer<B> for DenseLayer<B> {
    fn forward(&mut self, backend: &B, _mode: Mode, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        let num_rows = input.dims().rows();
        assert_eq!(input.dims(), &Dim2(num_rows, self.input_size()), "Invalid dimensions for input tensor");
        assert_eq!(output.dims(), &Dim2(num_rows, self.output_size), "Invalid dimensions for output tensor");

        backend.resize_tensor_major(&mut self.activation, num_rows);
        backend.matmul(
            B::Float::ONE,
            input,
            false,
            self.weights.value(),
            true,
            B::Float::ZERO,
            &mut self.activation,
        );
        backend.add_row(self.biases.value(), &mut self.activation);
        self.activation_fn.compute(backend, &self.activation, output);
    }

    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        out_error: &B::Tensor<Dim2>,
    ) {
        let num_rows = input.dims().rows();
        assert_eq!(output.dims(), &Dim2(num_rows, self.output_size), "Invalid dimensions for output tensor");
        assert_eq!(out_error.dims(), output.dims(), "Invalid dimensions for out_error tensor");

        backend.resize_tensor_major(&mut self.activation_error, num_rows);
        self.activation_fn
            .compute_error(backend, &self.activation, output, out_error, &mut self.activation_error);

        if let Some(input_error) = input_error {
            assert_eq!(input_error.dims(), input.dims());
            backend.matmul(
                B::Float::ONE,
                &self.activation_error,
                false,
                self.weights.value(),
                false,
                B::Float::ZERO,
                input_error,
            );
        }

        backend.matmul(
            B::Float::ONE,
            &self.activation_error,
            true,
            input,
            false,
            B::Float::ZERO,
            self.weights.grad_mut(),
        );
        backend.column_sum(B::Float::ONE, &self.activation_error, B::Float::ZERO, self.biases.grad_mut());
    }

    fn update(&mut self, backend: &B, optimizer: &Optimizer) {
        optimizer.apply(backend, &mut self.weights);
        optimizer.apply(backend, &mut self.biases);
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::Dense
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.input_shape
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        Dim3::flat(self.output_size)
    }

    fn param_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

impl<B: Backend> Debug for DenseLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseLayer")
            .field("size", &self.output_size)
            .field("activation_fn", &self.activation_fn)
            .field("weights", &self.weights)
            .field("biases", &self.biases)
            .finish_non_exhaustive()
    }
}
