mod concrete;
mod conv2d;
mod dense;
mod dropout;
mod flatten;
mod max_pool;

use crate::backend::Backend;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::net::Mode;
use crate::optimizer::Optimizer;
use crate::tensor::{Dim2, Dim3, Dims};
use std::fmt::Debug;

pub use concrete::{ConcreteLayer, ConcreteLayerParams};
pub use conv2d::{Conv2dLayer, Conv2dLayerParams};
pub use dense::{DenseLayer, DenseLayerParams};
pub use dropout::{DropoutLayer, DropoutLayerParams};
pub use flatten::{FlattenLayer, FlattenLayerParams};
pub use max_pool::{MaxPool2dLayer, MaxPool2dLayerParams};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LayerType {
    Conv2d,
    MaxPool2d,
    Dropout,
    Flatten,
    Dense,
}

impl LayerType {
    pub fn name(&self) -> &'static str {
        match self {
            LayerType::Conv2d => "Conv2D",
            LayerType::MaxPool2d => "MaxPooling2D",
            LayerType::Dropout => "Dropout",
            LayerType::Flatten => "Flatten",
            LayerType::Dense => "Dense",
        }
    }

    /// Prefix for generated layer names such as `conv2d_1`.
    pub fn snake_name(&self) -> &'static str {
        match self {
            LayerType::Conv2d => "conv2d",
            LayerType::MaxPool2d => "max_pooling2d",
            LayerType::Dropout => "dropout",
            LayerType::Flatten => "flatten",
            LayerType::Dense => "dense",
        }
    }
}

pub trait LayerParams<B: Backend>: Clone + Debug {
    type Layer: Layer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error>;
}

/// A network stage working on `(batch, features)` tensors. Spatial layers read each row as an
/// NHWC sample of [`Layer::input_shape`].
pub trait Layer<B: Backend>: Debug {
    fn forward(&mut self, backend: &B, mode: Mode, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>);

    /// Computes parameter gradients for the last batch and, when `input_error` is given, the
    /// error with respect to the layer input.
    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        output_error: &B::Tensor<Dim2>,
    );

    fn update(&mut self, _backend: &B, _optimizer: &Optimizer) {}

    fn layer_type(&self) -> LayerType;
    fn input_shape(&self) -> Dim3;
    fn output_shape(&self) -> Dim3;

    fn param_count(&self) -> usize {
        0
    }

    #[inline]
    fn input_size(&self) -> usize {
        self.input_shape().tensor_len()
    }

    #[inline]
    fn output_size(&self) -> usize {
        self.output_shape().tensor_len()
    }
}

pub(crate) fn geometry_error(layer_idx: usize, layer: LayerType, input: Dim3, reason: impl Into<String>) -> Error {
    Error::InvalidLayerGeometry {
        layer_idx,
        layer: layer.name(),
        input,
        reason: reason.into(),
    }
}
