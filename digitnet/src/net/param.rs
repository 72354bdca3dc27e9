use crate::backend::Backend;
use crate::tensor::{Dims, ITensor, TensorBase};
use std::fmt::{Debug, Formatter};

/// A trainable tensor with its gradient and two optimizer state slots of the same shape.
pub struct Param<B: Backend, D: Dims> {
    value: B::Tensor<D>,
    grad: B::Tensor<D>,
    slots: [B::Tensor<D>; 2],
}

impl<B: Backend, D: Dims> Param<B, D> {
    pub fn new<T>(backend: &B, value: T) -> Self
    where
        T: TensorBase<B::Float, D>,
    {
        let dims = *value.dims();
        Param {
            value: backend.new_tensor_from_native(value),
            grad: backend.new_tensor_exact(dims),
            slots: [backend.new_tensor_exact(dims), backend.new_tensor_exact(dims)],
        }
    }

    #[inline]
    pub fn value(&self) -> &B::Tensor<D> {
        &self.value
    }

    #[inline]
    pub fn grad(&self) -> &B::Tensor<D> {
        &self.grad
    }

    #[inline]
    pub fn grad_mut(&mut self) -> &mut B::Tensor<D> {
        &mut self.grad
    }

    #[inline]
    pub fn dims(&self) -> &D {
        self.value.dims()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut B::Tensor<D>, &B::Tensor<D>, [&mut B::Tensor<D>; 2]) {
        let [a, b] = &mut self.slots;
        (&mut self.value, &self.grad, [a, b])
    }
}

impl<B: Backend, D: Dims> Debug for Param<B, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.value, f)
    }
}
