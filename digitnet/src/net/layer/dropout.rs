use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::net::layer::{geometry_error, ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::net::Mode;
use crate::tensor::{Dim2, Dim3, ITensor, Tensor2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::{Debug, Formatter};

#[derive(Clone, Debug, PartialEq)]
pub struct DropoutLayerParams {
    /// Fraction of inputs zeroed while training, in `[0, 1)`.
    pub rate: f64,
}

impl<B: Backend> LayerParams<B> for DropoutLayerParams {
    type Layer = DropoutLayer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        if !(0.0..1.0).contains(&self.rate) {
            return Err(geometry_error(
                layer_idx,
                LayerType::Dropout,
                input_shape,
                format!("rate {} is outside [0, 1)", self.rate),
            ));
        }
        let seed = initializer.layer_seed(LayerType::Dropout, layer_idx);
        Ok(DropoutLayer {
            shape: input_shape,
            rate: self.rate,
            rng: StdRng::seed_from_u64(seed),
            mask: backend.new_tensor_exact(Dim2(0, 0)),
            native_mask: Tensor2::empty(),
            masked: false,
        })
    }
}

impl From<DropoutLayerParams> for ConcreteLayerParams {
    fn from(params: DropoutLayerParams) -> Self {
        ConcreteLayerParams::Dropout(params)
    }
}

/// Inverted dropout: kept inputs are scaled by `1 / (1 - rate)` so inference is a plain copy.
pub struct DropoutLayer<B: Backend> {
    shape: Dim3,
    rate: f64,
    rng: StdRng,
    mask: B::Tensor<Dim2>,
    native_mask: Tensor2<B::Float>,
    masked: bool,
}

impl<B: Backend> DropoutLayer<B> {
    fn draw_mask(&mut self, backend: &B, dims: Dim2) {
        let keep = 1.0 - self.rate;
        let scale = B::Float::from_f64(1.0 / keep);
        self.native_mask.resize(B::Float::ZERO, dims);
        for m in self.native_mask.as_mut() {
            *m = if self.rng.gen_bool(keep) { scale } else { B::Float::ZERO };
        }
        backend.resize_tensor(&mut self.mask, dims);
        backend.write_tensor(&mut self.mask, &self.native_mask);
    }
}

impl<B: Backend> Layer<B> for DropoutLayer<B> {
    fn forward(&mut self, backend: &B, mode: Mode, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        backend.copy_reshaped(input, output);
        self.masked = mode == Mode::Train && self.rate > 0.0;
        if self.masked {
            self.draw_mask(backend, *input.dims());
            backend.mul_assign(&self.mask, output);
        }
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
            if self.masked {
                backend.mul_assign(&self.mask, input_error);
            }
        }
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::Dropout
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.shape
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        self.shape
    }
}

impl<B: Backend> Debug for DropoutLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropoutLayer")
            .field("rate", &self.rate)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::DropoutLayerParams;
    use crate::backend::{CpuBackend, TensorOps};
    use crate::net::initializer::RandomNetInitializer;
    use crate::net::layer::{Layer, LayerParams};
    use crate::net::Mode;
    use crate::tensor::{Dim2, Dim3, Tensor2};

    #[test]
    fn test_inference_is_identity() {
        let backend = CpuBackend::<f32>::new();
        let mut init = RandomNetInitializer::seed_from_u64(0);
        let mut layer = DropoutLayerParams { rate: 0.5 }
            .create_layer(&backend, 0, Dim3::flat(6), &mut init)
            .unwrap();
        let input = Tensor2::from_vec(vec![1., 2., 3., 4., 5., 6.], Dim2(1, 6));
        let mut output = backend.new_tensor_exact(Dim2(1, 6));
        layer.forward(&backend, Mode::Infer, &input, &mut output);
        assert_eq!(input.as_ref(), output.as_ref());
    }

    #[test]
    fn test_training_mask_is_inverted() {
        let backend = CpuBackend::<f64>::new();
        let mut init = RandomNetInitializer::seed_from_u64(1);
        let mut layer = DropoutLayerParams { rate: 0.25 }
            .create_layer(&backend, 0, Dim3::flat(1000), &mut init)
            .unwrap();
        let input = Tensor2::filled(1.0, Dim2(4, 1000));
        let mut output = backend.new_tensor_exact(Dim2(4, 1000));
        layer.forward(&backend, Mode::Train, &input, &mut output);
        let scale = 1.0 / 0.75;
        assert!(output.as_ref().iter().all(|&x| x == 0.0 || (x - scale).abs() < 1e-12));
        let kept = output.as_ref().iter().filter(|&&x| x != 0.0).count() as f64 / 4000.0;
        assert!((kept - 0.75).abs() < 0.05, "kept fraction {kept}");

        // the same mask gates the error
        let out_error = Tensor2::filled(1.0, Dim2(4, 1000));
        let mut input_error = backend.new_tensor_exact(Dim2(4, 1000));
        layer.backprop(&backend, &input, &output, Some(&mut input_error), &out_error);
        assert_eq!(output.as_ref(), input_error.as_ref());
    }

    #[test]
    fn test_invalid_rate() {
        let backend = CpuBackend::<f32>::new();
        let mut init = RandomNetInitializer::seed_from_u64(0);
        assert!(DropoutLayerParams { rate: 1.0 }
            .create_layer(&backend, 0, Dim3::flat(3), &mut init)
            .is_err());
    }
}
