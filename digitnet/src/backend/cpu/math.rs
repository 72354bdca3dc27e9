use crate::dtype::DTypeFloat;
use crate::tensor::{Dim2, ITensor, Tensor2, TensorBase, TensorBaseMut};
use std::cmp::Ordering;

/// Writes the softmax Jacobian `d a_i / d z_j` of the activated row `a` into `b`.
pub fn compute_jacobian_matrix<T: DTypeFloat>(a: &[T], b: &mut Tensor2<T>) {
    let size = a.len();
    assert_eq!(b.dims(), &Dim2(size, size));
    for (i, (row, &ai)) in b.as_mut().chunks_exact_mut(size).zip(a).enumerate() {
        for (j, (bij, &aj)) in row.iter_mut().zip(a).enumerate() {
            *bij = if i == j { ai * (T::ONE - ai) } else { -ai * aj };
        }
    }
}

pub fn argmax<T: Copy + PartialOrd>(a: &[T]) -> usize {
    a.iter()
        .enumerate()
        .max_by(|&(_, a), &(_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map_or(0, |(i, _)| i)
}

pub trait DTypeOps: DTypeFloat {
    #[allow(clippy::too_many_arguments)]
    fn matrix_multiply<A, B, C>(alpha: Self, a: &A, ta: bool, b: &B, tb: bool, beta: Self, c: &mut C)
    where
        A: TensorBase<Self, Dim2>,
        B: TensorBase<Self, Dim2>,
        C: TensorBaseMut<Self, Dim2>;
}

macro_rules! implement_dtype_ops {
    ($t: ident, $g: ident) => {
        impl DTypeOps for $t {
            fn matrix_multiply<A, B, C>(alpha: Self, a: &A, ta: bool, b: &B, tb: bool, beta: Self, c: &mut C)
            where
                A: TensorBase<Self, Dim2>,
                B: TensorBase<Self, Dim2>,
                C: TensorBaseMut<Self, Dim2>,
            {
                let &Dim2(a_rows, a_cols) = a.dims();
                let &Dim2(b_rows, b_cols) = b.dims();
                let &Dim2(_, c_cols) = c.dims();
                let (m, k, rsa, csa) = if ta {
                    (a_cols, a_rows, 1, a_cols as isize)
                } else {
                    (a_rows, a_cols, a_cols as isize, 1)
                };
                let (n, rsb, csb) = if tb {
                    assert_eq!(b_cols, k);
                    (b_rows, 1, b_cols as isize)
                } else {
                    assert_eq!(b_rows, k);
                    (b_cols, b_cols as isize, 1)
                };
                assert_eq!(c.dims(), &Dim2(m, n));
                // SAFETY: the dimension checks above keep every access inside the three buffers
                unsafe {
                    matrixmultiply::$g(
                        m,
                        k,
                        n,
                        alpha,
                        a.as_ref().as_ptr(),
                        rsa,
                        csa,
                        b.as_ref().as_ptr(),
                        rsb,
                        csb,
                        beta,
                        c.as_mut().as_mut_ptr(),
                        c_cols as isize,
                        1,
                    );
                }
            }
        }
    };
}

implement_dtype_ops!(f32, sgemm);
implement_dtype_ops!(f64, dgemm);

#[cfg(test)]
mod test {
    use super::{argmax, compute_jacobian_matrix, DTypeOps};
    use crate::tensor::{Dim2, Tensor};

    macro_rules! assert_slice_equal {
        ($a:ident, $b:expr) => {{
            let b = $b;
            if $a.as_ref().len() != b.len()
                || !std::iter::zip($a.as_ref(), &b).all(|(&i, &j)| (i - j).abs() <= f32::EPSILON)
            {
                panic!("slices not equal: left={:?}, right={:?}", $a.as_ref(), &b);
            }
        }};
    }

    #[test]
    fn test_mat_mul() {
        let a = Tensor::from_vec(vec![1., 2., 3., 4., 5., 6.], Dim2(2, 3));
        let b = Tensor::from_vec(vec![7., 8., 9., 10., 11., 12.], Dim2(3, 2));
        let c = Tensor::from_vec(vec![0.5, 1., 1., 0.25], Dim2(2, 2));

        let mut r2x2 = Tensor::filled(0f32, Dim2(2, 2));
        let mut r2x3 = Tensor::filled(0f32, Dim2(2, 3));
        let mut r3x2 = Tensor::filled(0f32, Dim2(3, 2));
        let mut r3x3 = Tensor::filled(0f32, Dim2(3, 3));

        r2x2.fill(100.); // existing values should be ignored
        f32::matrix_multiply(1.0, &a, false, &b, false, 0.0, &mut r2x2);
        assert_slice_equal!(r2x2, [58., 64., 139., 154.]);

        r2x2.fill(1.);
        f32::matrix_multiply(0.5, &a, false, &b, false, 5.0, &mut r2x2);
        assert_slice_equal!(r2x2, [34., 37., 74.5, 82.]);

        r3x3.fill(100.);
        f32::matrix_multiply(1.0, &b, false, &a, false, 0.0, &mut r3x3);
        assert_slice_equal!(r3x3, [39., 54., 69., 49., 68., 87., 59., 82., 105.]);

        // C X Bt
        r2x3.fill(100.);
        f32::matrix_multiply(1.0, &c, false, &b, true, 0.0, &mut r2x3);
        assert_slice_equal!(r2x3, [11.5, 14.5, 17.5, 9., 11.5, 14.]);

        // At X C
        r3x2.fill(100.);
        f32::matrix_multiply(1.0, &a, true, &c, false, 0.0, &mut r3x2);
        assert_slice_equal!(r3x2, [4.5, 2., 6., 3.25, 7.5, 4.5]);
    }

    #[test]
    fn test_jacobian_rows_sum_to_zero() {
        let a = [0.2f32, 0.3, 0.5];
        let mut j = Tensor::filled(0f32, Dim2(3, 3));
        compute_jacobian_matrix(&a, &mut j);
        for row in j.as_ref().chunks(3) {
            assert!(row.iter().sum::<f32>().abs() < 1e-6);
        }
        assert!((j.as_ref()[0] - 0.16).abs() < 1e-6);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(2, argmax(&[0.1, 0.2, 0.7]));
        assert_eq!(0, argmax::<f32>(&[]));
    }
}
