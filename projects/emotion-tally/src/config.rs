use clap::ValueEnum;
use std::path::PathBuf;

/// DNN computation backend requested for both pipelines of every worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ComputeBackend {
    #[default]
    Default,
    Halide,
    Openvino,
    Opencv,
    Vulkan,
    Cuda,
}

/// Device the DNN backend should run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ComputeTarget {
    #[default]
    Cpu,
    Opencl,
    OpenclFp16,
    Myriad,
    Vulkan,
    Fpga,
    Cuda,
    CudaFp16,
}

/// Model files and compute placement used to build each worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub face_model: PathBuf,
    pub face_config: PathBuf,
    pub emotion_model: PathBuf,
    /// Empty when the emotion model carries its own graph definition.
    pub emotion_config: Option<PathBuf>,
    pub backend: ComputeBackend,
    pub target: ComputeTarget,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            face_model: PathBuf::from("face.caffemodel"),
            face_config: PathBuf::from("face.prototxt"),
            emotion_model: PathBuf::from("tf/saved_model.pb"),
            emotion_config: None,
            backend: ComputeBackend::default(),
            target: ComputeTarget::default(),
        }
    }
}

/// Everything a capture session needs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Camera index (e.g. "0") or video file path
    pub source: String,
    pub workers: usize,
    pub models: WorkerConfig,
    pub labels: Vec<String>,
    pub display: bool,
    pub skip_when_busy: bool,
    /// Frames grabbed and discarded after each dispatched frame
    pub grab_skip: usize,
    pub max_frames: Option<u64>,
    pub results_csv: Option<PathBuf>,
    pub report: Option<PathBuf>,
}
