//! Inference module
//!
//! Serves predictions from the artifacts written by a training run.

mod engine;

pub use engine::{PredictPipeline, Prediction};
