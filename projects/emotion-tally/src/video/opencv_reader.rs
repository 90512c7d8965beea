use super::{FrameSource, SourceSpec};
use anyhow::{anyhow, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_HW_ACCELERATION,
        VIDEO_ACCELERATION_ANY,
    },
};

pub struct OpencvReader {
    capture: VideoCapture,
    source_fps: Option<f64>,
    total_frames: Option<usize>,
}

impl OpencvReader {
    pub fn open(source: &SourceSpec) -> Result<Self> {
        let mut capture = match source {
            SourceSpec::Camera(index) => VideoCapture::new(*index, CAP_ANY)?,
            SourceSpec::File(path) => {
                let path_str = path
                    .to_str()
                    .ok_or_else(|| anyhow!("Video path is not valid UTF-8: {:?}", path))?;
                VideoCapture::from_file(path_str, CAP_ANY)?
            }
        };
        if !capture.is_opened()? {
            return Err(anyhow!("Error opening video capture device: {}", source));
        }

        // Try to enable hardware decoding (VideoToolbox on macOS, VA-API on Linux, etc.)
        match capture.set(CAP_PROP_HW_ACCELERATION, VIDEO_ACCELERATION_ANY as f64) {
            Ok(true) => tracing::debug!("Hardware acceleration enabled."),
            _ => tracing::debug!("Hardware acceleration not available or failed to enable."),
        }

        let fps = capture.get(CAP_PROP_FPS)?;
        let source_fps = (fps > 0.0).then_some(fps);
        if source_fps.is_none() {
            tracing::warn!("OpencvReader: {} did not report an FPS", source);
        }

        let total_frames = if source.is_file() {
            let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?;
            (raw_count > 0.0).then_some(raw_count as usize)
        } else {
            None
        };

        tracing::info!(
            "OpencvReader: opened {}, fps={:?}, stream_frames={:?}",
            source,
            source_fps,
            total_frames
        );

        Ok(Self {
            capture,
            source_fps,
            total_frames,
        })
    }
}

impl FrameSource for OpencvReader {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn frame_count(&self) -> Option<usize> {
        self.total_frames
    }

    fn source_fps(&self) -> Option<f64> {
        self.source_fps
    }

    fn skip_frames(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            if !self.capture.grab()? {
                break;
            }
        }
        Ok(())
    }
}
