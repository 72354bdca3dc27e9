use crate::backend::Backend;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::net::layer::{ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::net::Mode;
use crate::tensor::{Dim2, Dim3, Dims};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlattenLayerParams;

impl<B: Backend> LayerParams<B> for FlattenLayerParams {
    type Layer = FlattenLayer;

    fn create_layer(
        &self,
        _backend: &B,
        _layer_idx: usize,
        input_shape: Dim3,
        _initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        Ok(FlattenLayer { input_shape })
    }
}

impl From<FlattenLayerParams> for ConcreteLayerParams {
    fn from(params: FlattenLayerParams) -> Self {
        ConcreteLayerParams::Flatten(params)
    }
}

/// Rows are already stored flat, so only the reported shape changes.
#[derive(Debug)]
pub struct FlattenLayer {
    input_shape: Dim3,
}

impl<B: Backend> Layer<B> for FlattenLayer {
    fn forward(&mut self, backend: &B, _mode: Mode, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        backend.copy_reshaped(input, output);
    }

    fn backprop(
        &mut self,
        backend: &B,
        _input: &B::Tensor<Dim2>,
        _output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        out_error: &B::Tensor<Dim2>,
    ) {
        if let Some(input_error) = input_error {
            backend.copy_reshaped(out_error, input_error);
        }
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::Flatten
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.input_shape
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        Dim3::flat(self.input_shape.tensor_len())
    }
}
