use super::math::{argmax, compute_jacobian_matrix, DTypeOps};
use crate::backend::{Backend, BackendOther, MatrixMultiplication, TensorOps, TensorTyped};
use crate::tensor::{Dim1, Dim2, Dims, ITensor, Tensor, Tensor1, Tensor2, TensorBase, TensorBaseMut};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter, Write};
use std::iter::zip;
use std::ops::{Deref, DerefMut};

/// Probabilities are clipped into `[EPSILON, 1 - EPSILON]` before taking logarithms.
const CROSS_ENTROPY_EPSILON: f64 = 1e-7;

pub struct CpuBackend<DT: DTypeOps> {
    temp_matrix: RefCell<Tensor2<DT>>,
}

impl<DT: DTypeOps> CpuBackend<DT> {
    pub fn new() -> Self {
        CpuBackend {
            temp_matrix: RefCell::new(Tensor2::empty()),
        }
    }
}

impl<DT: DTypeOps> Default for CpuBackend<DT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<DT: DTypeOps> TensorTyped for CpuBackend<DT> {
    type Float = DT;
    type Tensor<D: Dims> = Tensor<DT, D>;
}

impl<DT: DTypeOps> TensorOps for CpuBackend<DT> {
    #[inline]
    fn new_tensor_exact<D: Dims>(&self, dims: D) -> Tensor<DT, D> {
        Tensor::zeroed(dims)
    }

    #[inline]
    fn resize_tensor<D: Dims>(&self, tensor: &mut Tensor<DT, D>, dims: D) {
        tensor.resize(DT::ZERO, dims)
    }

    fn write_tensor<T, D>(&self, tensor: &mut Tensor<DT, D>, native_src: &T)
    where
        T: TensorBase<Self::Float, D>,
        D: Dims,
    {
        assert_eq!(tensor.dims(), native_src.dims());
        tensor.as_mut().copy_from_slice(native_src.as_ref());
    }

    fn read_tensor<T, D>(&self, tensor: &Tensor<DT, D>, native_dst: &mut T)
    where
        T: TensorBaseMut<Self::Float, D>,
        D: Dims,
    {
        assert_eq!(tensor.dims(), native_dst.dims());
        native_dst.as_mut().copy_from_slice(tensor.as_ref());
    }

    #[inline]
    fn adapt_input<'a, D: Dims>(&self, _buff: &'a mut Tensor<DT, D>, input: &'a Tensor<DT, D>) -> &'a Tensor<DT, D> {
        input
    }

    #[inline]
    fn new_tensor_from_native<T, D>(&self, native: T) -> Tensor<DT, D>
    where
        T: TensorBase<Self::Float, D>,
        D: Dims,
    {
        native.into_owned()
    }
}

impl<DT: DTypeOps> MatrixMultiplication for CpuBackend<DT> {
    #[inline]
    fn matmul(&self, alpha: DT, a: &Tensor2<DT>, ta: bool, b: &Tensor2<DT>, tb: bool, beta: DT, c: &mut Tensor2<DT>) {
        DT::matrix_multiply(alpha, a, ta, b, tb, beta, c);
    }
}

impl<DT: DTypeOps> BackendOther for CpuBackend<DT> {
    fn column_sum(&self, alpha: DT, a: &Tensor2<DT>, beta: DT, b: &mut Tensor1<DT>) {
        let cols = a.dims().cols();
        assert_eq!(b.dims(), &Dim1(cols));
        b.as_mut().iter_mut().for_each(|x| *x *= beta);
        for row in a.as_ref().chunks_exact(cols.max(1)) {
            for (bi, &ai) in zip(b.as_mut().iter_mut(), row) {
                *bi += alpha * ai;
            }
        }
    }

    fn add_assign<D: Dims>(&self, alpha: DT, a: &Tensor<DT, D>, beta: DT, b: &mut Tensor<DT, D>) {
        assert_eq!(a.len(), b.len());
        for (&ai, bi) in zip(a, b) {
            *bi = alpha * ai + beta * *bi;
        }
    }

    fn add_row(&self, row: &Tensor1<DT>, target: &mut Tensor2<DT>) {
        assert_eq!(row.len(), target.dims().cols());
        for mut target_row in target.iter_major_axis_mut() {
            for (t, &r) in zip(target_row.iter_mut(), row) {
                *t += r;
            }
        }
    }

    fn mul_assign<D: Dims>(&self, a: &Tensor<DT, D>, b: &mut Tensor<DT, D>) {
        assert_eq!(a.dims(), b.dims());
        for (&ai, bi) in zip(a, b) {
            *bi *= ai;
        }
    }

    fn copy_reshaped<D1: Dims, D2: Dims>(&self, src: &Tensor<DT, D1>, dst: &mut Tensor<DT, D2>) {
        assert_eq!(src.len(), dst.len());
        dst.as_mut().copy_from_slice(src.as_ref());
    }

    fn relu(&self, leak: DT, activation: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        assert_eq!(activation.dims(), output.dims());
        for (o, &a) in zip(output, activation) {
            *o = if a < DT::ZERO { a * leak } else { a }
        }
    }

    fn relu_error(&self, leak: DT, activation: &Tensor2<DT>, out_error: &Tensor2<DT>, result: &mut Tensor2<DT>) {
        assert_eq!(activation.dims(), result.dims());
        assert_eq!(activation.dims(), out_error.dims());
        for ((r, &act), &err) in zip(zip(result, activation), out_error) {
            *r = if act < DT::ZERO { leak * err } else { err };
        }
    }

    fn softmax(&self, activation: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        assert_eq!(activation.dims(), output.dims());
        for (mut output_row, activation_row) in zip(output.iter_major_axis_mut(), activation.iter_major_axis()) {
            // shift by the row maximum to keep exp() finite
            let max = activation_row
                .as_ref()
                .iter()
                .copied()
                .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                .unwrap_or(DT::ZERO);
            let mut sum = DT::ZERO;
            for (t, &a) in zip(output_row.iter_mut(), activation_row) {
                let x = (a - max).exp();
                sum += x;
                *t = x;
            }
            for t in output_row.iter_mut() {
                *t /= sum
            }
        }
    }

    fn softmax_error(&self, output: &Tensor2<DT>, out_error: &Tensor2<DT>, result: &mut Tensor2<DT>) {
        let size = output.dims().cols();
        assert_eq!(output.dims(), result.dims());
        assert_eq!(output.dims(), out_error.dims());
        let mut temp = self.temp_matrix.borrow_mut();
        temp.resize(DT::ZERO, Dim2(size, size));
        for (mut result_row, (output_row, out_err_row)) in zip(
            result.iter_major_axis_mut(),
            zip(output.iter_major_axis(), out_error.iter_major_axis()),
        ) {
            compute_jacobian_matrix(output_row.as_ref(), temp.deref_mut());
            DT::matrix_multiply(
                DT::ONE,
                &out_err_row.as_row_matrix(),
                false,
                temp.deref(),
                false,
                DT::ZERO,
                &mut result_row.as_row_matrix_mut(),
            );
        }
    }

    fn categorical_cross_entropy(
        &self,
        output: &Tensor2<DT>,
        expected: &Tensor2<DT>,
        result: &mut Tensor1<DT>,
        result_deriv: &mut Tensor2<DT>,
    ) {
        assert_eq!(output.dims().rows(), result.len());
        assert_eq!(output.dims(), expected.dims());
        assert_eq!(output.dims(), result_deriv.dims());
        let eps = DT::from_f64(CROSS_ENTROPY_EPSILON);
        let batch = DT::from_usize(output.dims().rows());
        for (r, (mut rd_row, (o_row, e_row))) in zip(
            result,
            zip(
                result_deriv.iter_major_axis_mut(),
                zip(output.iter_major_axis(), expected.iter_major_axis()),
            ),
        ) {
            let mut sum = DT::ZERO;
            for (rd, (&o, &e)) in zip(rd_row.iter_mut(), zip(o_row, e_row)) {
                let p = o.max(eps).min(DT::ONE - eps);
                sum -= e * p.ln();
                // gradient of the batch mean
                *rd = -e / (p * batch);
            }
            *r = sum;
        }
    }

    fn sgd_step<D: Dims>(
        &self,
        learning_rate: DT,
        momentum: DT,
        grad: &Tensor<DT, D>,
        velocity: &mut Tensor<DT, D>,
        value: &mut Tensor<DT, D>,
    ) {
        assert_eq!(grad.dims(), value.dims());
        assert_eq!(velocity.dims(), value.dims());
        for ((x, v), &g) in zip(zip(value, velocity), grad) {
            *v = momentum * *v - learning_rate * g;
            *x += *v;
        }
    }

    fn adadelta_step<D: Dims>(
        &self,
        learning_rate: DT,
        rho: DT,
        epsilon: DT,
        grad: &Tensor<DT, D>,
        accum_grad: &mut Tensor<DT, D>,
        accum_delta: &mut Tensor<DT, D>,
        value: &mut Tensor<DT, D>,
    ) {
        assert_eq!(grad.dims(), value.dims());
        assert_eq!(accum_grad.dims(), value.dims());
        assert_eq!(accum_delta.dims(), value.dims());
        for ((x, (ag, ad)), &g) in zip(zip(value, zip(accum_grad, accum_delta)), grad) {
            *ag = rho * *ag + (DT::ONE - rho) * g * g;
            let delta = (*ad + epsilon).sqrt() / (*ag + epsilon).sqrt() * g;
            *ad = rho * *ad + (DT::ONE - rho) * delta * delta;
            *x -= learning_rate * delta;
        }
    }

    fn accum_confusion_matrix_multiclass(&self, matrix: &mut Tensor2<DT>, output: &Tensor2<DT>, expected: &Tensor2<DT>) {
        for (output_row, expected_row) in zip(output.iter_major_axis(), expected.iter_major_axis()) {
            let out_idx = argmax(output_row.as_ref());
            let expected_idx = argmax(expected_row.as_ref());
            matrix[[expected_idx, out_idx]] += DT::ONE;
        }
    }
}

impl<DT: DTypeOps> Backend for CpuBackend<DT> {}

impl<DT: DTypeOps> Debug for CpuBackend<DT> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CpuBackend<")?;
        f.write_str(std::any::type_name::<DT>())?;
        f.write_char('>')
    }
}
