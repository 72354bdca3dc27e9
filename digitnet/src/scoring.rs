use crate::backend::Backend;
use crate::dtype::DType;
use crate::tensor::{Dim2, ITensor, TensorBaseMut};
use std::fmt::Write;

pub trait Scorer<B: Backend> {
    fn process_batch(&mut self, backend: &B, output: &B::Tensor<Dim2>, expected: &B::Tensor<Dim2>);
}

pub struct NoOpScorer;

impl<B: Backend> Scorer<B> for NoOpScorer {
    #[inline]
    fn process_batch(&mut self, _backend: &B, _output: &B::Tensor<Dim2>, _expected: &B::Tensor<Dim2>) {}
}

/// Accumulates a confusion matrix indexed by `[expected class, predicted class]`.
pub struct MulticlassScorer<B: Backend> {
    matrix: B::Tensor<Dim2>,
    count: usize,
}

impl<B: Backend> MulticlassScorer<B> {
    pub fn new(backend: &B, classes: usize) -> Self {
        let matrix = backend.new_tensor_exact(Dim2(classes, classes));
        MulticlassScorer { matrix, count: 0 }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn correct(&self, backend: &B) -> usize {
        let matrix = backend.tensor_as_native(&self.matrix);
        let classes = matrix.dims().rows();
        (0..classes).map(|i| matrix[[i, i]].as_usize()).sum()
    }

    /// Fraction of processed samples whose arg-max prediction matched the expected class.
    pub fn accuracy(&self, backend: &B) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.correct(backend) as f64 / self.count as f64
        }
    }

    pub fn report(&self, backend: &B) -> String {
        let mut matrix = backend.tensor_as_native(&self.matrix);
        let count = self.count;
        let mut total_correct = 0;
        for (i, mut row) in matrix.iter_major_axis_mut().enumerate() {
            total_correct += row[i].as_usize();
            let total: usize = row.iter_mut().map(|e| e.as_usize()).sum();
            if total > 0 {
                let total = B::Float::from_usize(total);
                row.iter_mut().for_each(|e| *e /= total);
            }
        }
        let total_incorrect = count - total_correct;
        let percent_incorrect = if count == 0 {
            0.0
        } else {
            (total_incorrect as f64 / count as f64) * 100.0
        };
        let mut report = String::new();
        let _ = writeln!(report, "Confusion Matrix: {matrix:.3?}");
        let _ = write!(report, "Error rate: {percent_incorrect:.2}% ({total_incorrect}/{count})");
        report
    }
}

impl<B: Backend> Scorer<B> for MulticlassScorer<B> {
    fn process_batch(&mut self, backend: &B, output: &B::Tensor<Dim2>, expected: &B::Tensor<Dim2>) {
        self.count += output.dims().rows();
        backend.accum_confusion_matrix_multiclass(&mut self.matrix, output, expected);
    }
}

#[cfg(test)]
mod test {
    use super::{MulticlassScorer, Scorer};
    use crate::backend::CpuBackend;
    use crate::tensor::{Dim2, Tensor};

    #[test]
    fn test_accuracy() {
        let backend = CpuBackend::<f32>::new();
        let mut scorer = MulticlassScorer::new(&backend, 3);
        assert_eq!(0.0, scorer.accuracy(&backend));
        let output = Tensor::from_vec(vec![0.7, 0.2, 0.1, 0.1, 0.1, 0.8, 0.3, 0.6, 0.1, 0.2, 0.2, 0.6], Dim2(4, 3));
        let expected = Tensor::from_vec(vec![1., 0., 0., 0., 0., 1., 1., 0., 0., 0., 0., 1.], Dim2(4, 3));
        scorer.process_batch(&backend, &output, &expected);
        assert_eq!(4, scorer.count());
        assert_eq!(3, scorer.correct(&backend));
        assert!((scorer.accuracy(&backend) - 0.75).abs() < 1e-12);
        let report = scorer.report(&backend);
        assert!(report.ends_with("Error rate: 25.00% (1/4)"), "{report}");
    }
}
