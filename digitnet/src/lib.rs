pub mod activation;
pub mod backend;
pub mod dtype;
pub mod error;
pub mod loss;
pub mod net;
pub mod optimizer;
pub mod scoring;
pub mod tensor;

pub use error::{CallbackError, Error};
