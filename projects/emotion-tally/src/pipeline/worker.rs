use crate::pipeline::error::PredictionError;
use crate::pipeline::types::{
    argmax, select_face, FaceCandidate, LabelCatalog, PixelRect, Prediction,
};
use std::sync::Arc;
use std::time::Instant;

/// An image buffer a worker can own and overwrite per task.
pub trait FrameBuffer: Send {
    /// A buffer with no frame in it yet.
    fn blank() -> Self;

    /// Overwrites this buffer with a copy of `src`.
    fn copy_from(&mut self, src: &Self) -> Result<(), PredictionError>;

    fn is_blank(&self) -> bool;

    /// (width, height) in pixels
    fn dimensions(&self) -> (i32, i32);
}

/// First inference stage: proposes face regions in detector output order.
pub trait FaceDetector: Send {
    type Image: FrameBuffer;

    fn detect(&mut self, image: &Self::Image) -> Result<Vec<FaceCandidate>, PredictionError>;
}

/// Second inference stage: scores one face region against the label set.
pub trait EmotionClassifier<I>: Send {
    fn classify(&mut self, image: &I, face: PixelRect) -> Result<Vec<f32>, PredictionError>;
}

/// Anything the dispatcher can hand a frame to and ask for a prediction.
pub trait Predictor: Send + 'static {
    type Frame;

    /// Copies `frame` into the worker's private buffer.
    fn load_frame(&mut self, frame: &Self::Frame) -> Result<(), PredictionError>;

    /// Runs inference on the most recently loaded frame.
    fn predict(&mut self) -> Result<Prediction, PredictionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Loaded,
    Predicting,
}

/// Owns one image buffer plus one loaded detection and classification
/// pipeline. Never shared: exclusive access comes from pool checkout.
pub struct InferenceWorker<D: FaceDetector, C> {
    id: usize,
    buffer: D::Image,
    state: WorkerState,
    detector: D,
    classifier: C,
    labels: Arc<LabelCatalog>,
}

impl<D, C> InferenceWorker<D, C>
where
    D: FaceDetector,
    C: EmotionClassifier<D::Image>,
{
    pub fn new(id: usize, detector: D, classifier: C, labels: Arc<LabelCatalog>) -> Self {
        Self {
            id,
            buffer: D::Image::blank(),
            state: WorkerState::Idle,
            detector,
            classifier,
            labels,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn run_pipelines(&mut self) -> Result<Prediction, PredictionError> {
        let face_start = Instant::now();
        let candidates = self.detector.detect(&self.buffer)?;
        tracing::debug!(
            "Worker {}: face step {:?} ({} candidates)",
            self.id,
            face_start.elapsed(),
            candidates.len()
        );

        let face = match select_face(&candidates) {
            Some(face) => face,
            None => return Ok(Prediction::none()),
        };

        let (width, height) = self.buffer.dimensions();
        let region = match face.bbox.to_pixels(width, height) {
            Some(region) => region,
            None => {
                tracing::debug!(
                    "Worker {}: accepted face {:?} lies outside the {}x{} frame",
                    self.id,
                    face.bbox,
                    width,
                    height
                );
                return Ok(Prediction::none());
            }
        };

        let emotion_start = Instant::now();
        let scores = self.classifier.classify(&self.buffer, region)?;
        let (index, confidence) = argmax(&scores)
            .ok_or_else(|| PredictionError::Pipeline("classifier returned no scores".into()))?;
        let label = self
            .labels
            .get(index)
            .ok_or(PredictionError::LabelOutOfRange(index, self.labels.len()))?;
        tracing::debug!(
            "Worker {}: emotion step {:?} -> {} ({:.3})",
            self.id,
            emotion_start.elapsed(),
            label,
            confidence
        );

        Ok(Prediction::new(label, confidence))
    }
}

impl<D, C> Predictor for InferenceWorker<D, C>
where
    D: FaceDetector + 'static,
    C: EmotionClassifier<D::Image> + 'static,
{
    type Frame = D::Image;

    fn load_frame(&mut self, frame: &D::Image) -> Result<(), PredictionError> {
        if frame.is_blank() {
            return Err(PredictionError::EmptyFrame);
        }
        self.buffer.copy_from(frame)?;
        self.state = WorkerState::Loaded;
        Ok(())
    }

    /// Detects faces, classifies the first accepted one and returns its label
    /// and score. Consumes the loaded frame: the worker is `Idle` afterwards
    /// whether or not inference succeeded.
    fn predict(&mut self) -> Result<Prediction, PredictionError> {
        if self.state != WorkerState::Loaded {
            return Err(PredictionError::NotLoaded);
        }
        self.state = WorkerState::Predicting;
        let result = self.run_pipelines();
        self.state = WorkerState::Idle;
        result
    }
}

impl<D: FaceDetector, C> Drop for InferenceWorker<D, C> {
    fn drop(&mut self) {
        tracing::debug!("Releasing inference worker {}", self.id);
    }
}
