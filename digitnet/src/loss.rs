use crate::backend::Backend;
use crate::tensor::{Dim1, Dim2};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LossFn {
    #[default]
    CategoricalCrossEntropy,
}

impl LossFn {
    /// Writes the per-sample loss into `result` and the derivative of the batch-mean loss
    /// with respect to `output` into `result_deriv`.
    pub fn compute<B: Backend>(
        &self,
        backend: &B,
        output: &B::Tensor<Dim2>,
        expected: &B::Tensor<Dim2>,
        result: &mut B::Tensor<Dim1>,
        result_deriv: &mut B::Tensor<Dim2>,
    ) {
        match self {
            LossFn::CategoricalCrossEntropy => {
                backend.categorical_cross_entropy(output, expected, result, result_deriv)
            }
        }
    }
}
