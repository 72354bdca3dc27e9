use crate::tensor::Dim3;

pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("a network needs at least one layer")]
    EmptyNet,
    #[error("layer {layer_idx} ({layer}) does not fit input shape {input}: {reason}")]
    InvalidLayerGeometry {
        layer_idx: usize,
        layer: &'static str,
        input: Dim3,
        reason: String,
    },
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },
    #[error("{images} image samples but {labels} label samples")]
    MismatchedSampleCount { images: usize, labels: usize },
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("training callback failed")]
    Callback(#[source] CallbackError),
}
