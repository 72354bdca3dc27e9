use super::{
    Conv2dLayer, Conv2dLayerParams, DenseLayer, DenseLayerParams, DropoutLayer, DropoutLayerParams, FlattenLayer,
    FlattenLayerParams, Layer, LayerParams, LayerType, MaxPool2dLayer, MaxPool2dLayerParams,
};
use crate::backend::Backend;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::net::Mode;
use crate::optimizer::Optimizer;
use crate::tensor::{Dim2, Dim3};
use std::fmt::{Debug, Formatter};

// LayerParams has an associated type, so the builder keeps an enum instead of boxed trait objects.

#[derive(Clone, Debug, PartialEq)]
pub enum ConcreteLayerParams {
    Conv2d(Conv2dLayerParams),
    MaxPool2d(MaxPool2dLayerParams),
    Dropout(DropoutLayerParams),
    Flatten(FlattenLayerParams),
    Dense(DenseLayerParams),
}

impl<B: Backend> LayerParams<B> for ConcreteLayerParams {
    type Layer = ConcreteLayer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        Ok(match self {
            ConcreteLayerParams::Conv2d(params) => {
                ConcreteLayer::Conv2d(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::MaxPool2d(params) => {
                ConcreteLayer::MaxPool2d(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::Dropout(params) => {
                ConcreteLayer::Dropout(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::Flatten(params) => {
                ConcreteLayer::Flatten(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::Dense(params) => {
                ConcreteLayer::Dense(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
        })
    }
}

pub enum ConcreteLayer<B: Backend> {
    Conv2d(Conv2dLayer<B>),
    MaxPool2d(MaxPool2dLayer),
    Dropout(DropoutLayer<B>),
    Flatten(FlattenLayer),
    Dense(DenseLayer<B>),
}

impl<B: Backend> ConcreteLayer<B> {
    pub fn inner(&self) -> &dyn Layer<B> {
        match self {
            ConcreteLayer::Conv2d(inner) => inner,
            ConcreteLayer::MaxPool2d(inner) => inner,
            ConcreteLayer::Dropout(inner) => inner,
            ConcreteLayer::Flatten(inner) => inner,
            ConcreteLayer::Dense(inner) => inner,
        }
    }
    pub fn inner_mut(&mut self) -> &mut dyn Layer<B> {
        match self {
            ConcreteLayer::Conv2d(inner) => inner,
            ConcreteLayer::MaxPool2d(inner) => inner,
            ConcreteLayer::Dropout(inner) => inner,
            ConcreteLayer::Flatten(inner) => inner,
            ConcreteLayer::Dense(inner) => inner,
        }
    }
}

impl<B: Backend> Layer<B> for ConcreteLayer<B> {
    #[inline]
    fn forward(&mut self, backend: &B, mode: Mode, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        self.inner_mut().forward(backend, mode, input, output)
    }

    #[inline]
    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        output_error: &B::Tensor<Dim2>,
    ) {
        self.inner_mut()
            .backprop(backend, input, output, input_error, output_error)
    }

    #[inline]
    fn update(&mut self, backend: &B, optimizer: &Optimizer) {
        self.inner_mut().update(backend, optimizer)
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        self.inner().layer_type()
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.inner().input_shape()
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        self.inner().output_shape()
    }

    #[inline]
    fn param_count(&self) -> usize {
        self.inner().param_count()
    }
}

impl<B: Backend> Debug for ConcreteLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self.inner(), f)
    }
}
