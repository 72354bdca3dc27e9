use crate::error::Error;
use crate::tensor::dims::{Dim1, Dim2, Dim3, Dim4, Dims};
use crate::tensor::{DimsZero, ITensor, TensorBase, TensorBaseMut};
use num_traits::Zero;

/// Row-major storage with a shape. Samples of a batch are laid out along the first axis.
#[derive(Clone)]
pub struct Tensor<T, D: Dims> {
    data: Vec<T>,
    dims: D,
}

pub type Tensor1<T> = Tensor<T, Dim1>;
pub type Tensor2<T> = Tensor<T, Dim2>;
pub type Tensor3<T> = Tensor<T, Dim3>;
pub type Tensor4<T> = Tensor<T, Dim4>;

impl<T, D: Dims> Tensor<T, D> {
    /// # Panics
    /// When `data` does not hold exactly `dims.tensor_len()` elements.
    pub fn from_vec(data: Vec<T>, dims: D) -> Self {
        assert_eq!(
            data.len(),
            dims.tensor_len(),
            "{} elements cannot fill shape {dims}",
            data.len()
        );
        Tensor { data, dims }
    }

    pub fn empty() -> Self
    where
        D: DimsZero,
    {
        Self::from_vec(Vec::new(), D::ZERO)
    }

    /// Reinterprets the row-major data under a different shape of equal length.
    pub fn reshape<D2: Dims>(self, dims: D2) -> Result<Tensor<T, D2>, Error> {
        match self.data.len() == dims.tensor_len() {
            true => Ok(Tensor { data: self.data, dims }),
            false => Err(Error::ShapeMismatch {
                expected: dims.as_vec(),
                actual: self.dims.as_vec(),
            }),
        }
    }
}

impl<T> Tensor1<T> {
    pub fn from_vec_1d(data: Vec<T>) -> Self {
        let dims = Dim1(data.len());
        Tensor { data, dims }
    }
}

impl<T> Tensor2<T> {
    pub fn from_vec_2d<const N: usize>(rows: Vec<[T; N]>) -> Self {
        let dims = Dim2(rows.len(), N);
        Tensor {
            data: rows.into_iter().flatten().collect(),
            dims,
        }
    }
}

impl<T: Clone, D: Dims> Tensor<T, D> {
    pub fn filled(value: T, dims: D) -> Self {
        Self::from_vec(vec![value; dims.tensor_len()], dims)
    }

    /// Changes the shape in place, keeping existing elements and padding with `fill`.
    pub fn resize(&mut self, fill: T, dims: D) {
        self.data.resize(dims.tensor_len(), fill);
        self.dims = dims;
    }

    #[inline]
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T: Zero + Clone, D: Dims> Tensor<T, D> {
    #[inline]
    pub fn zeroed(dims: D) -> Self {
        Self::filled(T::zero(), dims)
    }
}

impl<T, D: Dims> ITensor<D> for Tensor<T, D> {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    fn dims(&self) -> &D {
        &self.dims
    }
}

impl<T, D: Dims> AsRef<[T]> for Tensor<T, D> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        &self.data
    }
}

impl<T, D: Dims> AsMut<[T]> for Tensor<T, D> {
    #[inline]
    fn as_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T, D: Dims> TensorBase<T, D> for Tensor<T, D> {
    #[inline]
    fn into_owned(self) -> Tensor<T, D> {
        self
    }
}

impl<T, D: Dims> TensorBaseMut<T, D> for Tensor<T, D> {}

impl<'a, T, D: Dims> IntoIterator for &'a Tensor<T, D> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl<'a, T, D: Dims> IntoIterator for &'a mut Tensor<T, D> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.iter_mut()
    }
}

impl<T, D: Dims> IntoIterator for Tensor<T, D> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

/// Builds a [`Tensor1`] from a list or a [`Tensor2`] from a list of rows.
#[macro_export]
macro_rules! tensor {
    ($([$($x:expr),* $(,)*]),+ $(,)*) => {
        $crate::tensor::Tensor2::from_vec_2d(vec![$([$($x,)*],)*])
    };
    ($($x:expr),* $(,)*) => {
        $crate::tensor::Tensor1::from_vec_1d(vec![$($x,)*])
    };
}

#[cfg(test)]
mod test {
    use crate::tensor::{Dim2, Dim4, ITensor, Tensor};

    #[test]
    fn test_reshape() {
        let t = Tensor::from_vec((0..12).collect::<Vec<i32>>(), Dim4(3, 2, 2, 1));
        let t = t.reshape(Dim2(3, 4)).unwrap();
        assert_eq!(&Dim2(3, 4), t.dims());
        assert_eq!(&[4, 5, 6, 7], &t.as_ref()[4..8]);
        assert!(t.reshape(Dim2(5, 2)).is_err());
    }

    #[test]
    fn test_resize_keeps_prefix() {
        let mut t = Tensor::filled(1.0f32, Dim2(2, 3));
        t.resize(0.0, Dim2(4, 3));
        assert_eq!(12, t.len());
        assert_eq!(&[1.0, 0.0], &t.as_ref()[5..7]);
        t.resize(0.0, Dim2(1, 2));
        assert_eq!(&[1.0, 1.0], t.as_ref());
    }

    #[test]
    #[should_panic]
    fn test_from_vec_mismatch() {
        Tensor::from_vec(vec![1, 2, 3], Dim2(2, 2));
    }
}
