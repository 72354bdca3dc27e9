use crate::backend::Backend;
use crate::dtype::DType;
use crate::tensor::Dim2;
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivationFn {
    #[default]
    Linear,
    ReLU {
        leak: f64,
    },
    Softmax,
}

impl ActivationFn {
    pub const RELU: ActivationFn = ActivationFn::ReLU { leak: 0.0 };

    pub fn compute<B: Backend>(&self, backend: &B, activation: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        match self {
            ActivationFn::Linear => backend.copy_reshaped(activation, output),
            &ActivationFn::ReLU { leak } => backend.relu(B::Float::from_f64(leak), activation, output),
            ActivationFn::Softmax => backend.softmax(activation, output),
        }
    }

    pub fn compute_error<B: Backend>(
        &self,
        backend: &B,
        activation: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        out_error: &B::Tensor<Dim2>,
        result: &mut B::Tensor<Dim2>,
    ) {
        match self {
            ActivationFn::Linear => backend.copy_reshaped(out_error, result),
            &ActivationFn::ReLU { leak } => {
                backend.relu_error(B::Float::from_f64(leak), activation, out_error, result)
            }
            ActivationFn::Softmax => backend.softmax_error(output, out_error, result),
        }
    }
}

impl Display for ActivationFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationFn::Linear => f.write_str("linear"),
            ActivationFn::ReLU { leak } if *leak == 0.0 => f.write_str("relu"),
            ActivationFn::ReLU { leak } => write!(f, "leaky_relu({leak})"),
            ActivationFn::Softmax => f.write_str("softmax"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::ActivationFn;
    use crate::backend::CpuBackend;
    use crate::tensor::{Dim2, Tensor, Tensor2};

    #[test]
    fn test_relu() {
        let backend = CpuBackend::<f32>::new();
        let act = Tensor::from_vec(vec![-2.0f32, -0.5, 0.0, 3.0], Dim2(2, 2));
        let mut out = Tensor2::zeroed(Dim2(2, 2));
        ActivationFn::RELU.compute(&backend, &act, &mut out);
        assert_eq!(&[0.0, 0.0, 0.0, 3.0], out.as_ref());
        ActivationFn::ReLU { leak: 0.5 }.compute(&backend, &act, &mut out);
        assert_eq!(&[-1.0, -0.25, 0.0, 3.0], out.as_ref());
    }

    #[test]
    fn test_relu_error_blocks_negative_inputs() {
        let backend = CpuBackend::<f32>::new();
        let act = Tensor::from_vec(vec![-2.0f32, 1.0], Dim2(1, 2));
        let err = Tensor::from_vec(vec![5.0f32, 7.0], Dim2(1, 2));
        let mut result = Tensor2::zeroed(Dim2(1, 2));
        ActivationFn::RELU.compute_error(&backend, &act, &act, &err, &mut result);
        assert_eq!(&[0.0, 7.0], result.as_ref());
    }

    #[test]
    fn test_display() {
        assert_eq!("relu", ActivationFn::RELU.to_string());
        assert_eq!("softmax", ActivationFn::Softmax.to_string());
        assert_eq!("linear", ActivationFn::default().to_string());
    }
}
