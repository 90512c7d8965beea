use std::path::PathBuf;
use thiserror::Error;

/// Which of a worker's two models failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    FaceDetector,
    EmotionClassifier,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::FaceDetector => "face detector",
            ModelKind::EmotionClassifier => "emotion classifier",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model file could not be read or parsed while building a worker.
#[derive(Debug, Error)]
#[error("failed to load {kind} model from {path:?}: {reason}")]
pub struct ModelLoadError {
    pub kind: ModelKind,
    pub path: PathBuf,
    pub reason: String,
}

impl ModelLoadError {
    pub fn new(kind: ModelKind, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by the worker pool itself.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool size must be at least 1")]
    InvalidSize,
    #[error("failed to construct worker {index}: {source}")]
    Construction {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("worker pool is closed")]
    Closed,
}

/// Per-task failures. The worker that raised one stays healthy.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("no frame loaded into worker")]
    NotLoaded,
    #[error("frame is empty")]
    EmptyFrame,
    #[error("classifier picked class {0} but the label catalog has {1} entries")]
    LabelOutOfRange(usize, usize),
    #[error("inference pipeline failed: {0}")]
    Pipeline(String),
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for PredictionError {
    fn from(e: opencv::Error) -> Self {
        PredictionError::Pipeline(e.to_string())
    }
}
