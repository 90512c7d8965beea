// In-memory stand-ins for frames and inference pipelines, used by unit tests

use crate::pipeline::error::PredictionError;
use crate::pipeline::types::{FaceCandidate, PixelRect, Prediction};
use crate::pipeline::worker::{EmotionClassifier, FaceDetector, FrameBuffer, Predictor};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFrame {
    pub width: i32,
    pub height: i32,
    /// Stands in for pixel content.
    pub seed: u64,
}

impl FakeFrame {
    pub fn new(width: i32, height: i32, seed: u64) -> Self {
        Self {
            width,
            height,
            seed,
        }
    }
}

impl FrameBuffer for FakeFrame {
    fn blank() -> Self {
        Self::new(0, 0, 0)
    }

    fn copy_from(&mut self, src: &Self) -> Result<(), PredictionError> {
        self.clone_from(src);
        Ok(())
    }

    fn is_blank(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn dimensions(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}

pub struct FakeDetector {
    detections: Vec<FaceCandidate>,
    pub fail_next: bool,
}

impl FakeDetector {
    pub fn new(detections: Vec<FaceCandidate>) -> Self {
        Self {
            detections,
            fail_next: false,
        }
    }
}

impl FaceDetector for FakeDetector {
    type Image = FakeFrame;

    fn detect(&mut self, _image: &FakeFrame) -> Result<Vec<FaceCandidate>, PredictionError> {
        if std::mem::take(&mut self.fail_next) {
            return Err(PredictionError::Pipeline("blob has unexpected shape".into()));
        }
        Ok(self.detections.clone())
    }
}

pub struct FakeClassifier {
    scores: Vec<f32>,
    /// Every region handed to `classify`.
    pub seen: Arc<Mutex<Vec<PixelRect>>>,
}

impl FakeClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl EmotionClassifier<FakeFrame> for FakeClassifier {
    fn classify(&mut self, _image: &FakeFrame, face: PixelRect) -> Result<Vec<f32>, PredictionError> {
        self.seen.lock().unwrap().push(face);
        Ok(self.scores.clone())
    }
}

/// Predictor with scripted outcomes keyed on the frame seed:
/// seed 0 finds no face, odd seeds fail, even seeds predict "Happy".
pub struct ScriptedPredictor {
    loaded: Option<u64>,
    delay: Duration,
}

impl ScriptedPredictor {
    pub fn new(delay: Duration) -> Self {
        Self {
            loaded: None,
            delay,
        }
    }
}

impl Predictor for ScriptedPredictor {
    type Frame = FakeFrame;

    fn load_frame(&mut self, frame: &FakeFrame) -> Result<(), PredictionError> {
        if frame.is_blank() {
            return Err(PredictionError::EmptyFrame);
        }
        self.loaded = Some(frame.seed);
        Ok(())
    }

    fn predict(&mut self) -> Result<Prediction, PredictionError> {
        let seed = self.loaded.take().ok_or(PredictionError::NotLoaded)?;
        thread::sleep(self.delay);
        match seed {
            0 => Ok(Prediction::none()),
            s if s % 2 == 1 => Err(PredictionError::Pipeline("forward pass failed".into())),
            _ => Ok(Prediction::new("Happy", 0.9)),
        }
    }
}
