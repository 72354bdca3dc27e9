use crate::dtype::DType;
use crate::net::layer::LayerType;
use crate::tensor::{Dim1, Dim2, Tensor1, Tensor2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

pub trait NetInitializer<T: DType> {
    fn get_weights(
        &mut self,
        layer_type: LayerType,
        dims: Dim2,
        layer_idx: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Tensor2<T>;

    fn get_biases(&mut self, layer_type: LayerType, dims: Dim1, layer_idx: usize) -> Tensor1<T>;

    /// Seed for layers that draw their own random numbers while running, such as dropout masks.
    fn layer_seed(&mut self, layer_type: LayerType, layer_idx: usize) -> u64;
}

/// Glorot uniform weights and zero biases.
pub struct RandomNetInitializer {
    rng: StdRng,
}

impl RandomNetInitializer {
    pub fn seed_from_u64(seed: u64) -> Self {
        RandomNetInitializer {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomNetInitializer {
    fn default() -> Self {
        RandomNetInitializer {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<T: DType> NetInitializer<T> for RandomNetInitializer {
    fn get_weights(
        &mut self,
        _layer_type: LayerType,
        dims: Dim2,
        _layer_idx: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Tensor2<T> {
        let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        let data: Vec<T> = dist
            .sample_iter(&mut self.rng)
            .take(dims.rows() * dims.cols())
            .map(T::from_f64)
            .collect();
        Tensor2::from_vec(data, dims)
    }

    fn get_biases(&mut self, _layer_type: LayerType, dims: Dim1, _layer_idx: usize) -> Tensor1<T> {
        Tensor1::filled(T::ZERO, dims)
    }

    fn layer_seed(&mut self, _layer_type: LayerType, _layer_idx: usize) -> u64 {
        self.rng.sample(rand::distributions::Standard)
    }
}
