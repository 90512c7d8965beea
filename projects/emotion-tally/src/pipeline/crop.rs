use crate::pipeline::error::PredictionError;
use crate::pipeline::types::PixelRect;
use crate::pipeline::worker::FrameBuffer;
use opencv::core;
use opencv::prelude::*;

impl FrameBuffer for core::Mat {
    fn blank() -> Self {
        core::Mat::default()
    }

    fn copy_from(&mut self, src: &Self) -> Result<(), PredictionError> {
        src.copy_to(self)?;
        Ok(())
    }

    fn is_blank(&self) -> bool {
        self.empty()
    }

    fn dimensions(&self) -> (i32, i32) {
        (self.cols(), self.rows())
    }
}

/// Copies a pixel rectangle out of `img`. The rectangle must lie inside the image.
pub fn crop_region(img: &core::Mat, rect: PixelRect) -> Result<core::Mat, PredictionError> {
    let size = img.size()?;
    if rect.width <= 0
        || rect.height <= 0
        || rect.x < 0
        || rect.y < 0
        || rect.x + rect.width > size.width
        || rect.y + rect.height > size.height
    {
        return Err(PredictionError::Pipeline(format!(
            "Invalid crop {:?} for {}x{} frame",
            rect, size.width, size.height
        )));
    }

    let roi = core::Rect::new(rect.x, rect.y, rect.width, rect.height);
    let cropped = core::Mat::roi(img, roi)?;

    let mut out = core::Mat::default();
    cropped.copy_to(&mut out)?;

    Ok(out)
}
