use crate::tensor::{Dims, TensorView, TensorViewMut};
use std::slice::{ChunksExact, ChunksExactMut};

/// Iterates the major axis of a tensor, yielding one sub-view per index.
pub struct TensorIter<'a, T: 'a, D: Dims> {
    chunks: ChunksExact<'a, T>,
    out_dims: D,
}

impl<'a, T: 'a, D: Dims> TensorIter<'a, T, D> {
    pub(crate) fn new(data: &'a [T], out_dims: D) -> Self {
        // zero-sized sub-views only come from empty tensors
        let stride = out_dims.tensor_len().max(1);
        debug_assert_eq!(data.len() % stride, 0);
        TensorIter {
            chunks: data.chunks_exact(stride),
            out_dims,
        }
    }
}

impl<'a, T: 'a, D: Dims> Iterator for TensorIter<'a, T, D> {
    type Item = TensorView<'a, T, D>;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.chunks
            .next()
            .map(|chunk| TensorView::from_slice(chunk, self.out_dims))
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
    #[inline]
    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.chunks
            .nth(n)
            .map(|chunk| TensorView::from_slice(chunk, self.out_dims))
    }
}

impl<'a, T: 'a, D: Dims> ExactSizeIterator for TensorIter<'a, T, D> {}

pub struct TensorIterMut<'a, T: 'a, D: Dims> {
    chunks: ChunksExactMut<'a, T>,
    out_dims: D,
}

impl<'a, T: 'a, D: Dims> TensorIterMut<'a, T, D> {
    pub(crate) fn new(data: &'a mut [T], out_dims: D) -> Self {
        let stride = out_dims.tensor_len().max(1);
        debug_assert_eq!(data.len() % stride, 0);
        TensorIterMut {
            chunks: data.chunks_exact_mut(stride),
            out_dims,
        }
    }
}

impl<'a, T: 'a, D: Dims> Iterator for TensorIterMut<'a, T, D> {
    type Item = TensorViewMut<'a, T, D>;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.chunks
            .next()
            .map(|chunk| TensorViewMut::from_slice(chunk, self.out_dims))
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<'a, T: 'a, D: Dims> ExactSizeIterator for TensorIterMut<'a, T, D> {}
