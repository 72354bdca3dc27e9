pub mod callbacks;
pub mod capture;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod experiment;
pub mod model;
pub mod observer;
pub mod pipeline;
pub mod report;
pub mod run;

pub use error::{Error, Result};
pub use experiment::{Experiment, RunOutcome};
pub use run::{Run, RunId};
