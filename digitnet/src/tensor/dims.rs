use std::fmt::{Debug, Display, Formatter, Write};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim0;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim1(pub usize);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim2(pub usize, pub usize);

impl Dim2 {
    #[inline]
    pub fn rows(&self) -> usize {
        self.0
    }
    #[inline]
    pub fn cols(&self) -> usize {
        self.1
    }
}

/// Shape of a single NHWC sample: `(height, width, channels)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim3(pub usize, pub usize, pub usize);

impl Dim3 {
    #[inline]
    pub fn height(&self) -> usize {
        self.0
    }
    #[inline]
    pub fn width(&self) -> usize {
        self.1
    }
    #[inline]
    pub fn channels(&self) -> usize {
        self.2
    }
    /// The shape of a sample that has been flattened into a single feature vector.
    #[inline]
    pub fn flat(size: usize) -> Self {
        Dim3(1, 1, size)
    }
}

/// Batch of NHWC samples: `(samples, height, width, channels)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dim4(pub usize, pub usize, pub usize, pub usize);

pub trait Dims: Copy + Debug + Eq + Display {
    const N: usize;
    type Less: Dims;
    fn first(&self) -> usize;
    fn tensor_len(&self) -> usize;
    fn as_vec(&self) -> Vec<usize>;
    fn without_first_axis(&self) -> Self::Less;
    fn resize_major(&self, size: usize) -> Self;
}

pub trait DimsZero: Dims {
    const ZERO: Self;
}

fn fmt_dims(dims: &[usize], f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_char('(')?;
    for (i, d) in dims.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        Display::fmt(d, f)?;
    }
    f.write_char(')')
}

macro_rules! impl_dims_display {
    ($($t:ty),*) => {
        $(
        impl Display for $t {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                fmt_dims(&self.as_vec(), f)
            }
        }
        )*
    };
}

impl_dims_display!(Dim0, Dim1, Dim2, Dim3, Dim4);

impl Dims for Dim0 {
    const N: usize = 0;
    type Less = Self;
    #[inline]
    fn first(&self) -> usize {
        1
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        1
    }
    fn as_vec(&self) -> Vec<usize> {
        Vec::new()
    }
    fn without_first_axis(&self) -> Self::Less {
        Dim0
    }
    fn resize_major(&self, _size: usize) -> Self {
        Dim0
    }
}

impl Dims for Dim1 {
    const N: usize = 1;
    type Less = Dim0;
    #[inline]
    fn first(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0]
    }
    fn without_first_axis(&self) -> Self::Less {
        Dim0
    }
    fn resize_major(&self, size: usize) -> Self {
        Dim1(size)
    }
}

impl Dims for Dim2 {
    const N: usize = 2;
    type Less = Dim1;
    #[inline]
    fn first(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1]
    }
    fn without_first_axis(&self) -> Self::Less {
        Dim1(self.1)
    }
    fn resize_major(&self, size: usize) -> Self {
        Dim2(size, self.1)
    }
}

impl Dims for Dim3 {
    const N: usize = 3;
    type Less = Dim2;
    #[inline]
    fn first(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1 * self.2
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1, self.2]
    }
    fn without_first_axis(&self) -> Self::Less {
        Dim2(self.1, self.2)
    }
    fn resize_major(&self, size: usize) -> Self {
        Dim3(size, self.1, self.2)
    }
}

impl Dims for Dim4 {
    const N: usize = 4;
    type Less = Dim3;
    #[inline]
    fn first(&self) -> usize {
        self.0
    }
    #[inline]
    fn tensor_len(&self) -> usize {
        self.0 * self.1 * self.2 * self.3
    }
    fn as_vec(&self) -> Vec<usize> {
        vec![self.0, self.1, self.2, self.3]
    }
    fn without_first_axis(&self) -> Self::Less {
        Dim3(self.1, self.2, self.3)
    }
    fn resize_major(&self, size: usize) -> Self {
        Dim4(size, self.1, self.2, self.3)
    }
}

impl DimsZero for Dim0 {
    const ZERO: Self = Dim0;
}
impl DimsZero for Dim1 {
    const ZERO: Self = Dim1(0);
}
impl DimsZero for Dim2 {
    const ZERO: Self = Dim2(0, 0);
}
impl DimsZero for Dim3 {
    const ZERO: Self = Dim3(0, 0, 0);
}
impl DimsZero for Dim4 {
    const ZERO: Self = Dim4(0, 0, 0, 0);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!("()", Dim0.to_string());
        assert_eq!("(5)", Dim1(5).to_string());
        assert_eq!("(60000, 28, 28, 1)", Dim4(60000, 28, 28, 1).to_string());
    }

    #[test]
    fn test_major_axis() {
        let dims = Dim4(128, 28, 28, 1);
        assert_eq!(Dim3(28, 28, 1), dims.without_first_axis());
        assert_eq!(Dim4(7, 28, 28, 1), dims.resize_major(7));
        assert_eq!(7 * 784, dims.resize_major(7).tensor_len());
    }
}
