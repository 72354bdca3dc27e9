use crate::tensor::{Dim2, Dims, ITensor, Tensor, TensorIter, TensorIterMut, TensorView, TensorViewMut};

pub trait TensorBase<T, D: Dims>: ITensor<D> + AsRef<[T]> {
    fn into_owned(self) -> Tensor<T, D>
    where
        T: Clone;

    #[inline]
    fn iter_major_axis(&self) -> TensorIter<'_, T, D::Less> {
        TensorIter::new(self.as_ref(), self.dims().without_first_axis())
    }

    #[inline]
    fn as_row_matrix(&self) -> TensorView<'_, T, Dim2> {
        TensorView::from_slice(self.as_ref(), Dim2(1, self.len()))
    }
}

pub trait TensorBaseMut<T, D: Dims>: TensorBase<T, D> + AsMut<[T]> {
    #[inline]
    fn iter_major_axis_mut(&mut self) -> TensorIterMut<'_, T, D::Less> {
        let out_dims = self.dims().without_first_axis();
        TensorIterMut::new(self.as_mut(), out_dims)
    }

    #[inline]
    fn as_row_matrix_mut(&mut self) -> TensorViewMut<'_, T, Dim2> {
        let dims = Dim2(1, self.len());
        TensorViewMut::from_slice(self.as_mut(), dims)
    }
}
