use crate::backend::{Backend, Window2d};
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::net::layer::{geometry_error, ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::net::Mode;
use crate::tensor::{Dim2, Dim3, ITensor};

#[derive(Clone, Debug, PartialEq)]
pub struct MaxPool2dLayerParams {
    pub pool: (usize, usize),
    /// Defaults to `pool`.
    pub stride: Option<(usize, usize)>,
}

impl<B: Backend> LayerParams<B> for MaxPool2dLayerParams {
    type Layer = MaxPool2dLayer;

    fn create_layer(
        &self,
        _backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        _initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        let window = Window2d {
            input: input_shape,
            kernel: self.pool,
            stride: self.stride.unwrap_or(self.pool),
        };
        match window.output_size() {
            Some((out_h, out_w)) if input_shape.channels() > 0 => Ok(MaxPool2dLayer {
                window,
                output_shape: Dim3(out_h, out_w, input_shape.channels()),
            }),
            _ => Err(geometry_error(
                layer_idx,
                LayerType::MaxPool2d,
                input_shape,
                format!("pool {:?} does not fit", self.pool),
            )),
        }
    }
}

impl From<MaxPool2dLayerParams> for ConcreteLayerParams {
    fn from(params: MaxPool2dLayerParams) -> Self {
        ConcreteLayerParams::MaxPool2d(params)
    }
}

#[derive(Debug)]
pub struct MaxPool2dLayer {
    window: Window2d,
    output_shape: Dim3,
}

impl<B: Backend> Layer<B> for MaxPool2dLayer {
    fn forward(&mut self, backend: &B, _mode: Mode, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        let samples = input.dims().rows();
        assert_eq!(
            output.dims(),
            &Dim2(samples, <Self as Layer<B>>::output_size(self)),
            "Invalid dimensions for output tensor"
        );
        backend.max_pool(input, &self.window, output);
    }

    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        out_error: &B::Tensor<Dim2>,
    ) {
        if let Some(input_error) = input_error {
            backend.max_pool_error(input, output, out_error, &self.window, input_error);
        }
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::MaxPool2d
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.window.input
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        self.output_shape
    }
}

#[cfg(test)]
mod test {
    use super::MaxPool2dLayerParams;
    use crate::backend::CpuBackend;
    use crate::net::initializer::RandomNetInitializer;
    use crate::net::layer::test_util::check_input_gradient;
    use crate::net::layer::{Layer, LayerParams};
    use crate::tensor::{Dim2, Dim3, Tensor2};

    #[test]
    fn test_geometry() {
        let backend = CpuBackend::<f32>::new();
        let mut init = RandomNetInitializer::seed_from_u64(0);
        let params = MaxPool2dLayerParams {
            pool: (2, 2),
            stride: None,
        };
        let layer = params.create_layer(&backend, 2, Dim3(24, 24, 64), &mut init).unwrap();
        assert_eq!(Dim3(12, 12, 64), Layer::<CpuBackend<f32>>::output_shape(&layer));
        assert!(params.create_layer(&backend, 2, Dim3(1, 1, 4), &mut init).is_err());
    }

    #[test]
    fn test_input_gradient() {
        let backend = CpuBackend::<f64>::new();
        let mut init = RandomNetInitializer::seed_from_u64(0);
        let mut layer = MaxPool2dLayerParams {
            pool: (2, 2),
            stride: Some((1, 1)),
        }
        .create_layer(&backend, 0, Dim3(3, 3, 2), &mut init)
        .unwrap();
        // distinct values keep every window maximum unique
        let input = Tensor2::from_vec((0..36).map(|i| ((i * 7 % 36) as f64) / 10.0).collect(), Dim2(2, 18));
        check_input_gradient(&mut layer, &input, 1e-6);
    }
}
