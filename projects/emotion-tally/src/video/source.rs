use std::fmt;
use std::path::PathBuf;

/// Where frames come from: a capture device index or a video file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Camera(i32),
    File(PathBuf),
}

impl SourceSpec {
    /// A bare integer selects a camera; anything else is a file path.
    pub fn parse(source: &str) -> Self {
        match source.trim().parse::<i32>() {
            Ok(index) if index >= 0 => SourceSpec::Camera(index),
            _ => SourceSpec::File(PathBuf::from(source)),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, SourceSpec::File(_))
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Camera(index) => write!(f, "camera {}", index),
            SourceSpec::File(path) => write!(f, "{}", path.display()),
        }
    }
}
