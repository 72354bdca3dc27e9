use num_traits::{Float, Num, NumAssignOps};
use std::fmt::Debug;

pub unsafe trait DType: 'static + Sized + Copy + Debug + Num + NumAssignOps + PartialOrd {
    const ZERO: Self;
    const ONE: Self;
    fn from_f64(val: f64) -> Self;
    fn from_usize(val: usize) -> Self;
    fn as_f64(self) -> f64;
    fn as_usize(self) -> usize;
}

pub unsafe trait DTypeFloat: DType + Float {}

macro_rules! impl_dtype {
    ($ty:ty, $one:expr, $zero:expr $(,$other_trait:ty)*) => {
        unsafe impl DType for $ty {
            const ZERO: Self = $zero;
            const ONE: Self = $one;
            #[inline]
            fn from_f64(val: f64) -> Self {
                val as $ty
            }
            #[inline]
            fn from_usize(val: usize) -> Self {
                val as $ty
            }
            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }
            #[inline]
            fn as_usize(self) -> usize {
                self as usize
            }
        }
        $(
        unsafe impl $other_trait for $ty {}
        )*
    };
}

impl_dtype!(f32, 1.0, 0.0, DTypeFloat);
impl_dtype!(f64, 1.0, 0.0, DTypeFloat);
