use crate::backend::Backend;
use crate::dtype::DType;
use crate::net::param::Param;
use crate::tensor::Dims;

/// Update rule applied to every trainable [`Param`] after each batch.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Optimizer {
    Adadelta { learning_rate: f64, rho: f64, epsilon: f64 },
    Sgd { learning_rate: f64, momentum: f64 },
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::Adadelta {
            learning_rate: 0.001,
            rho: 0.95,
            epsilon: 1e-7,
        }
    }
}

impl Optimizer {
    pub fn apply<B: Backend, D: Dims>(&self, backend: &B, param: &mut Param<B, D>) {
        let (value, grad, [slot_a, slot_b]) = param.parts_mut();
        match *self {
            Optimizer::Adadelta {
                learning_rate,
                rho,
                epsilon,
            } => backend.adadelta_step(
                B::Float::from_f64(learning_rate),
                B::Float::from_f64(rho),
                B::Float::from_f64(epsilon),
                grad,
                slot_a,
                slot_b,
                value,
            ),
            Optimizer::Sgd {
                learning_rate,
                momentum,
            } => backend.sgd_step(
                B::Float::from_f64(learning_rate),
                B::Float::from_f64(momentum),
                grad,
                slot_a,
                value,
            ),
        }
    }
}
