pub mod base;
mod debug;
mod extras;
pub mod iter;
pub mod owned;
pub mod view;
#[cfg(any(test, feature = "approx"))]
mod approx;
