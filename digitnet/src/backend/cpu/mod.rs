mod backend;
mod conv;
mod math;

pub use backend::CpuBackend;
pub use math::DTypeOps;
