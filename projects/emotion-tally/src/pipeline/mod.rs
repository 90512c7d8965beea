// Inference pipeline: worker pool, two-stage workers and the frame dispatcher

#[cfg(feature = "opencv")]
pub mod crop;
pub mod dispatcher;
#[cfg(feature = "opencv")]
pub mod dnn;
pub mod error;
pub mod pool;
pub mod tally;
#[cfg(test)]
mod testing;
pub mod types;
pub mod worker;

pub use error::{ModelLoadError, PoolError, PredictionError};
pub use pool::{PooledWorker, WorkerPool};
pub use worker::{InferenceWorker, Predictor};
