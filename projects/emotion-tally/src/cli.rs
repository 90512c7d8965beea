use clap::Parser;
use emotion_tally::config::{ComputeBackend, ComputeTarget, SessionConfig, WorkerConfig};
use emotion_tally::pipeline::types::EMOTION_LABELS;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera index or video file to read frames from
    #[arg(long, env = "EMOTION_TALLY_SOURCE", default_value = "0")]
    pub source: String,

    /// Number of inference workers (each loads its own copy of both models)
    #[arg(long, env = "EMOTION_TALLY_WORKERS", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Face detection weights
    #[arg(long, env = "EMOTION_TALLY_FACE_MODEL", default_value = "./face.caffemodel")]
    pub face_model: PathBuf,

    /// Face detection network definition
    #[arg(long, env = "EMOTION_TALLY_FACE_CONFIG", default_value = "./face.prototxt")]
    pub face_config: PathBuf,

    /// Emotion classification model
    #[arg(long, env = "EMOTION_TALLY_EMOTION_MODEL", default_value = "./tf/saved_model.pb")]
    pub emotion_model: PathBuf,

    /// Emotion classification network definition, if the model needs one
    #[arg(long, env = "EMOTION_TALLY_EMOTION_CONFIG")]
    pub emotion_config: Option<PathBuf>,

    /// DNN backend for both networks
    #[arg(long, env = "EMOTION_TALLY_BACKEND", value_enum, default_value_t = ComputeBackend::Default)]
    pub backend: ComputeBackend,

    /// DNN target device for both networks
    #[arg(long, env = "EMOTION_TALLY_TARGET", value_enum, default_value_t = ComputeTarget::Cpu)]
    pub target: ComputeTarget,

    /// Class names in classifier output order
    #[arg(long, env = "EMOTION_TALLY_LABELS", value_delimiter = ',', default_values_t = EMOTION_LABELS.map(String::from))]
    pub labels: Vec<String>,

    /// Show frames in a window (ESC stops capture)
    #[arg(long)]
    pub display: bool,

    /// Drop frames instead of waiting when every worker is busy
    #[arg(long, env = "EMOTION_TALLY_SKIP_WHEN_BUSY")]
    pub skip_when_busy: bool,

    /// Frames to grab and discard after each dispatched frame
    #[arg(long, env = "EMOTION_TALLY_GRAB_SKIP", default_value_t = 15)]
    pub grab_skip: usize,

    /// Stop after dispatching this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Write one CSV row per completed prediction
    #[arg(long)]
    pub results_csv: Option<PathBuf>,

    /// Write a JSON summary at the end of the run
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn into_config(self) -> SessionConfig {
        SessionConfig {
            source: self.source,
            workers: usize::from(self.workers),
            models: WorkerConfig {
                face_model: self.face_model,
                face_config: self.face_config,
                emotion_model: self.emotion_model,
                emotion_config: self.emotion_config,
                backend: self.backend,
                target: self.target,
            },
            labels: self.labels,
            display: self.display,
            skip_when_busy: self.skip_when_busy,
            grab_skip: self.grab_skip,
            max_frames: self.max_frames,
            results_csv: self.results_csv,
            report: self.report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Args::try_parse_from(["emotion-tally"]).unwrap().into_config();
        assert_eq!(config.source, "0");
        assert_eq!(config.workers, 4);
        assert_eq!(config.labels.len(), 7);
        assert_eq!(config.labels[3], "Happy");
        assert_eq!(config.grab_skip, 15);
        assert!(!config.skip_when_busy);
        assert_eq!(config.models.target, ComputeTarget::Cpu);
    }

    #[test]
    fn test_overrides() {
        let config = Args::try_parse_from([
            "emotion-tally",
            "--source",
            "clip.mp4",
            "--workers",
            "2",
            "--labels",
            "Calm,Tense",
            "--target",
            "opencl-fp16",
            "--skip-when-busy",
        ])
        .unwrap()
        .into_config();
        assert_eq!(config.source, "clip.mp4");
        assert_eq!(config.workers, 2);
        assert_eq!(config.labels, vec!["Calm", "Tense"]);
        assert_eq!(config.models.target, ComputeTarget::OpenclFp16);
        assert!(config.skip_when_busy);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Args::try_parse_from(["emotion-tally", "--workers", "0"]).is_err());
    }
}
