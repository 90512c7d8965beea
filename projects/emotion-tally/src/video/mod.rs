pub mod progress;
pub mod source;

#[cfg(feature = "opencv")]
pub mod opencv_reader;

#[cfg(feature = "opencv")]
pub use opencv_reader::OpencvReader;
pub use source::SourceSpec;

#[cfg(feature = "opencv")]
pub trait FrameSource: Send {
    /// Reads the next frame. `Ok(None)` once the device closes or the stream ends.
    /// A returned frame may be empty; callers skip those.
    fn next_frame(&mut self) -> anyhow::Result<Option<opencv::core::Mat>>;
    /// Frames in the stream, when the source is a file that reports it.
    fn frame_count(&self) -> Option<usize>;
    fn source_fps(&self) -> Option<f64>;
    /// Grabs and discards up to `count` frames.
    fn skip_frames(&mut self, count: usize) -> anyhow::Result<()>;
}
