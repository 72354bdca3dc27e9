use crate::dtype::DTypeFloat;
use crate::tensor::{Dim1, Dim2, Dim3, Dims, ITensor, Tensor, TensorBase, TensorBaseMut};
use std::fmt::Debug;

mod cpu;

pub use cpu::*;

pub trait TensorTyped {
    type Float: DTypeFloat;
    type Tensor<D: Dims>: ITensor<D> + Debug;
}

pub trait TensorOps: TensorTyped {
    fn new_tensor_exact<D: Dims>(&self, dims: D) -> Self::Tensor<D>;
    fn resize_tensor<D: Dims>(&self, tensor: &mut Self::Tensor<D>, dims: D);
    fn write_tensor<T, D>(&self, tensor: &mut Self::Tensor<D>, native_src: &T)
    where
        T: TensorBase<Self::Float, D>,
        D: Dims;
    fn read_tensor<T, D>(&self, tensor: &Self::Tensor<D>, native_dst: &mut T)
    where
        T: TensorBaseMut<Self::Float, D>,
        D: Dims;

    /// Returns a backend tensor holding `input`, using `buff` as staging space when the
    /// backend cannot read native memory directly.
    fn adapt_input<'a, D: Dims>(
        &self,
        buff: &'a mut Self::Tensor<D>,
        input: &'a Tensor<Self::Float, D>,
    ) -> &'a Self::Tensor<D>;

    fn resize_tensor_major<D: Dims>(&self, tensor: &mut Self::Tensor<D>, size: usize) {
        let dims = tensor.dims().resize_major(size);
        self.resize_tensor(tensor, dims);
    }

    fn new_tensor_from_native<T, D>(&self, native: T) -> Self::Tensor<D>
    where
        T: TensorBase<Self::Float, D>,
        D: Dims,
    {
        let mut tensor = self.new_tensor_exact(*native.dims());
        self.write_tensor(&mut tensor, &native);
        tensor
    }

    fn tensor_as_native<D: Dims>(&self, tensor: &Self::Tensor<D>) -> Tensor<Self::Float, D> {
        let mut native = Tensor::zeroed(*tensor.dims());
        self.read_tensor(tensor, &mut native);
        native
    }
}

pub trait MatrixMultiplication: TensorTyped {
    /// performs a generic matrix multiplication (gemm) operation: `c = alpha * op(a) * op(b) + beta * c`
    fn matmul(
        &self,
        alpha: Self::Float,
        a: &Self::Tensor<Dim2>,
        ta: bool,
        b: &Self::Tensor<Dim2>,
        tb: bool,
        beta: Self::Float,
        c: &mut Self::Tensor<Dim2>,
    );
}

pub trait BackendOther: TensorTyped {
    fn column_sum(&self, alpha: Self::Float, a: &Self::Tensor<Dim2>, beta: Self::Float, b: &mut Self::Tensor<Dim1>);

    fn add_assign<D: Dims>(&self, alpha: Self::Float, a: &Self::Tensor<D>, beta: Self::Float, b: &mut Self::Tensor<D>);

    /// adds `row` to every row of `target`
    fn add_row(&self, row: &Self::Tensor<Dim1>, target: &mut Self::Tensor<Dim2>);

    /// element-wise product `b = a * b`
    fn mul_assign<D: Dims>(&self, a: &Self::Tensor<D>, b: &mut Self::Tensor<D>);

    /// copies `src` into `dst`, which may have a different shape of the same length
    fn copy_reshaped<D1: Dims, D2: Dims>(&self, src: &Self::Tensor<D1>, dst: &mut Self::Tensor<D2>);

    /// computes the leaky ReLU function for all elements in a given tensor
    fn relu(&self, leak: Self::Float, activation: &Self::Tensor<Dim2>, output: &mut Self::Tensor<Dim2>);
    fn relu_error(
        &self,
        leak: Self::Float,
        activation: &Self::Tensor<Dim2>,
        out_error: &Self::Tensor<Dim2>,
        result: &mut Self::Tensor<Dim2>,
    );

    fn softmax(&self, activation: &Self::Tensor<Dim2>, output: &mut Self::Tensor<Dim2>);
    fn softmax_error(&self, output: &Self::Tensor<Dim2>, out_error: &Self::Tensor<Dim2>, result: &mut Self::Tensor<Dim2>);

    fn categorical_cross_entropy(
        &self,
        output: &Self::Tensor<Dim2>,
        expected: &Self::Tensor<Dim2>,
        result: &mut Self::Tensor<Dim1>,
        result_deriv: &mut Self::Tensor<Dim2>,
    );

    fn sgd_step<D: Dims>(
        &self,
        learning_rate: Self::Float,
        momentum: Self::Float,
        grad: &Self::Tensor<D>,
        velocity: &mut Self::Tensor<D>,
        value: &mut Self::Tensor<D>,
    );

    #[allow(clippy::too_many_arguments)]
    fn adadelta_step<D: Dims>(
        &self,
        learning_rate: Self::Float,
        rho: Self::Float,
        epsilon: Self::Float,
        grad: &Self::Tensor<D>,
        accum_grad: &mut Self::Tensor<D>,
        accum_delta: &mut Self::Tensor<D>,
        value: &mut Self::Tensor<D>,
    );

    fn accum_confusion_matrix_multiclass(
        &self,
        matrix: &mut Self::Tensor<Dim2>,
        output: &Self::Tensor<Dim2>,
        expected: &Self::Tensor<Dim2>,
    );
}

/// A 2-D sliding window over NHWC samples, with valid padding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Window2d {
    pub input: Dim3,
    pub kernel: (usize, usize),
    pub stride: (usize, usize),
}

impl Window2d {
    /// Output `(height, width)`, or `None` when the kernel does not fit the input.
    pub fn output_size(&self) -> Option<(usize, usize)> {
        let (kh, kw) = self.kernel;
        let (sh, sw) = self.stride;
        if kh == 0 || kw == 0 || sh == 0 || sw == 0 || kh > self.input.height() || kw > self.input.width() {
            return None;
        }
        Some(((self.input.height() - kh) / sh + 1, (self.input.width() - kw) / sw + 1))
    }

    #[inline]
    pub fn patch_len(&self) -> usize {
        self.kernel.0 * self.kernel.1 * self.input.channels()
    }
}

pub trait Convolution: TensorTyped {
    /// unfolds every window of every sample into a row of `cols`, shaped
    /// `(samples * out_h * out_w, kernel_h * kernel_w * channels)`
    fn im2col(&self, input: &Self::Tensor<Dim2>, window: &Window2d, cols: &mut Self::Tensor<Dim2>);

    /// folds `cols` back, summing overlapping windows into `result`
    fn col2im(&self, cols: &Self::Tensor<Dim2>, window: &Window2d, result: &mut Self::Tensor<Dim2>);

    fn max_pool(&self, input: &Self::Tensor<Dim2>, window: &Window2d, output: &mut Self::Tensor<Dim2>);

    /// routes each output error to the first maximal input of its window
    fn max_pool_error(
        &self,
        input: &Self::Tensor<Dim2>,
        output: &Self::Tensor<Dim2>,
        out_error: &Self::Tensor<Dim2>,
        window: &Window2d,
        result: &mut Self::Tensor<Dim2>,
    );
}

pub trait Backend: 'static + Debug + TensorTyped + TensorOps + MatrixMultiplication + BackendOther + Convolution {}
