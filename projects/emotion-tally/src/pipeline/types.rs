/// Detection confidence a face candidate must strictly exceed to be classified.
pub const FACE_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Values per detection row in an SSD output blob:
/// [batch_id, class_id, confidence, left, top, right, bottom]
const SSD_ROW_LEN: usize = 7;

/// Normalized bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn from_corners(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: left,
            y: top,
            w: right - left,
            h: bottom - top,
        }
    }

    /// Scales the box to an image of `width` x `height` pixels, clamped to the
    /// image bounds. Returns `None` when nothing of the box is left.
    pub fn to_pixels(&self, width: i32, height: i32) -> Option<PixelRect> {
        let wf = width as f32;
        let hf = height as f32;

        let x = (self.x * wf).round() as i32;
        let y = (self.y * hf).round() as i32;
        let right = ((self.x + self.w) * wf).round() as i32;
        let bottom = ((self.y + self.h) * hf).round() as i32;

        let x_clamped = x.clamp(0, width);
        let y_clamped = y.clamp(0, height);
        let w_clamped = (right.clamp(0, width) - x_clamped).max(0);
        let h_clamped = (bottom.clamp(0, height) - y_clamped).max(0);

        if w_clamped == 0 || h_clamped == 0 {
            return None;
        }

        Some(PixelRect {
            x: x_clamped,
            y: y_clamped,
            width: w_clamped,
            height: h_clamped,
        })
    }
}

/// Pixel-space rectangle inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A face region proposed by the detection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCandidate {
    pub confidence: f32,
    pub bbox: BBox,
}

impl FaceCandidate {
    pub fn is_accepted(&self) -> bool {
        self.confidence > FACE_CONFIDENCE_THRESHOLD
    }
}

/// Picks the face to classify: the first accepted candidate in detector
/// output order. Further faces in the same frame are not classified.
pub fn select_face(candidates: &[FaceCandidate]) -> Option<&FaceCandidate> {
    candidates.iter().find(|c| c.is_accepted())
}

/// Decodes a flattened SSD detection blob (1x1xNx7) into candidates, keeping
/// detector order. A trailing partial row is ignored.
pub fn parse_ssd_detections(raw: &[f32]) -> Vec<FaceCandidate> {
    raw.chunks_exact(SSD_ROW_LEN)
        .map(|row| FaceCandidate {
            confidence: row[2],
            bbox: BBox::from_corners(row[3], row[4], row[5], row[6]),
        })
        .collect()
}

/// Index and value of the highest score. NaN scores never win.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}

/// Outcome of one `predict` call.
///
/// "No face found" is a normal outcome, represented by an empty label and a
/// zero confidence (see [`Prediction::none`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    pub fn none() -> Self {
        Self {
            label: String::new(),
            confidence: 0.0,
        }
    }

    /// A zero score is tallied the same as finding no face at all.
    pub fn is_none(&self) -> bool {
        self.label.is_empty() || self.confidence == 0.0
    }
}

/// Ordered class names, indexed by the classifier's output position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
    labels: Vec<String>,
}

pub const EMOTION_LABELS: [&str; 7] = [
    "Angry", "Disgust", "Fear", "Happy", "Neutral", "Sad", "Surprise",
];

impl LabelCatalog {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn emotions() -> Self {
        Self::new(EMOTION_LABELS)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelCatalog {
    fn default() -> Self {
        Self::emotions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(confidence: f32) -> FaceCandidate {
        FaceCandidate {
            confidence,
            bbox: BBox::from_corners(0.1, 0.1, 0.5, 0.5),
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(!candidate(0.5).is_accepted());
        assert!(candidate(0.5001).is_accepted());
        assert!(!candidate(0.2).is_accepted());
    }

    #[test]
    fn test_select_face_takes_first_accepted() {
        let candidates = vec![candidate(0.3), candidate(0.7), candidate(0.99)];
        let face = select_face(&candidates).unwrap();
        assert_eq!(face.confidence, 0.7);

        let rejected = vec![candidate(0.5), candidate(0.1)];
        assert!(select_face(&rejected).is_none());
        assert!(select_face(&[]).is_none());
    }

    #[test]
    fn test_parse_ssd_detections() {
        let raw = [
            0.0, 1.0, 0.9, 0.1, 0.2, 0.3, 0.4, // row 0
            0.0, 1.0, 0.4, 0.5, 0.5, 0.6, 0.6, // row 1
            0.0, 1.0, // partial row
        ];
        let parsed = parse_ssd_detections(&raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].confidence, 0.9);
        assert_eq!(parsed[0].bbox.x, 0.1);
        assert_eq!(parsed[0].bbox.y, 0.2);
        assert!((parsed[0].bbox.w - 0.2).abs() < 1e-6);
        assert!((parsed[0].bbox.h - 0.2).abs() < 1e-6);
        assert_eq!(parsed[1].confidence, 0.4);
    }

    #[test]
    fn test_bbox_to_pixels_clamps() {
        let bbox = BBox::from_corners(0.25, 0.5, 0.75, 1.0);
        assert_eq!(
            bbox.to_pixels(200, 100),
            Some(PixelRect {
                x: 50,
                y: 50,
                width: 100,
                height: 50
            })
        );

        // Detectors sometimes report boxes that spill past the frame edge.
        let spill = BBox::from_corners(-0.1, -0.2, 1.3, 0.5);
        assert_eq!(
            spill.to_pixels(100, 100),
            Some(PixelRect {
                x: 0,
                y: 0,
                width: 100,
                height: 50
            })
        );

        let outside = BBox::from_corners(1.2, 1.2, 1.5, 1.5);
        assert!(outside.to_pixels(100, 100).is_none());
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(argmax(&[0.5, 0.5]), Some((0, 0.5)));
        assert_eq!(argmax(&[f32::NAN, 0.3]), Some((1, 0.3)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_prediction_none() {
        let none = Prediction::none();
        assert!(none.is_none());
        assert_eq!(none.label, "");
        assert_eq!(none.confidence, 0.0);

        assert!(Prediction::new("Happy", 0.0).is_none());
        assert!(!Prediction::new("Happy", 0.8).is_none());
    }

    #[test]
    fn test_emotion_catalog() {
        let labels = LabelCatalog::emotions();
        assert_eq!(labels.len(), 7);
        assert_eq!(labels.get(0), Some("Angry"));
        assert_eq!(labels.get(6), Some("Surprise"));
        assert_eq!(labels.get(7), None);
        assert_eq!(LabelCatalog::default(), labels);
    }
}
