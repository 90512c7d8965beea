use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress display for a capture session: a bar with ETA when the total
/// frame count is known (video files), a spinner otherwise (cameras).
pub fn capture_progress(total_frames: Option<usize>) -> Result<ProgressBar> {
    let pb = match total_frames {
        Some(total) => {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} fps, {eta})")?
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} frames ({per_sec:.1.yellow} fps) {msg}")?,
            );
            pb.enable_steady_tick(Duration::from_millis(200));
            pb
        }
    };
    Ok(pb)
}
