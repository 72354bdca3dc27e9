use crate::tensor::{Dim2, Dims, ITensor, Tensor, TensorView, TensorViewMut};

macro_rules! impl_tensor_extras {
    ($type_name: ident $(, $l: lifetime )?) => {
        impl<$($l,)? T, D: Dims> std::ops::Index<usize> for $type_name<$($l,)? T, D> {
            type Output = T;
            #[inline]
            fn index(&self, index: usize) -> &Self::Output {
                &self.as_ref()[index]
            }
        }

        impl<$($l,)? T> std::ops::Index<[usize; 2]> for $type_name<$($l,)? T, Dim2> {
            type Output = T;
            #[inline]
            fn index(&self, [row, col]: [usize; 2]) -> &Self::Output {
                let cols = self.dims().cols();
                debug_assert!(col < cols);
                &self.as_ref()[row * cols + col]
            }
        }

        impl<$($l,)? T, D: Dims> PartialEq<Tensor<T, D>> for $type_name<$($l,)? T, D> where T: PartialEq {
            fn eq(&self, other: &Tensor<T, D>) -> bool {
                self.dims() == other.dims() && self.as_ref() == other.as_ref()
            }
        }

        impl<$($l,)? 'b, T, D: Dims> PartialEq<TensorView<'b, T, D>> for $type_name<$($l,)? T, D> where T: PartialEq {
            fn eq(&self, other: &TensorView<'b, T, D>) -> bool {
                self.dims() == other.dims() && self.as_ref() == other.as_ref()
            }
        }
    };
}

macro_rules! impl_tensor_extras_mut {
    ($type_name: ident $(, $l: lifetime )?) => {
        impl<$($l,)? T, D: Dims> std::ops::IndexMut<usize> for $type_name<$($l,)? T, D> {
            #[inline]
            fn index_mut(&mut self, index: usize) -> &mut Self::Output {
                &mut self.as_mut()[index]
            }
        }

        impl<$($l,)? T> std::ops::IndexMut<[usize; 2]> for $type_name<$($l,)? T, Dim2> {
            #[inline]
            fn index_mut(&mut self, [row, col]: [usize; 2]) -> &mut Self::Output {
                let cols = self.dims().cols();
                debug_assert!(col < cols);
                &mut self.as_mut()[row * cols + col]
            }
        }
    };
}

impl_tensor_extras!(Tensor);
impl_tensor_extras_mut!(Tensor);
impl_tensor_extras!(TensorView, 'a);
impl_tensor_extras!(TensorViewMut, 'a);
impl_tensor_extras_mut!(TensorViewMut, 'a);
