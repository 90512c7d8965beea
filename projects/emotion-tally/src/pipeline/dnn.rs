// OpenCV DNN implementations of the two inference stages
//
// Face detection is a Caffe SSD (300x300 input, 1x1xNx7 output); emotion
// classification takes a 64x64 single-channel crop and returns one score per
// label.

use crate::config::{ComputeBackend, ComputeTarget, WorkerConfig};
use crate::pipeline::crop::crop_region;
use crate::pipeline::error::{ModelKind, ModelLoadError, PredictionError};
use crate::pipeline::types::{parse_ssd_detections, FaceCandidate, LabelCatalog, PixelRect};
use crate::pipeline::worker::{EmotionClassifier, FaceDetector, InferenceWorker};
use opencv::core::{Mat, Scalar, Size, CV_32F};
use opencv::prelude::*;
use opencv::{dnn, imgproc};
use std::path::Path;
use std::sync::Arc;

const FACE_INPUT_SIZE: i32 = 300;
const EMOTION_INPUT_SIZE: i32 = 64;

/// A worker backed by OpenCV DNN pipelines.
pub type EmotionWorker = InferenceWorker<DnnFaceDetector, DnnEmotionClassifier>;

fn blob_mean() -> Scalar {
    Scalar::new(104.0, 117.0, 123.0, 0.0)
}

fn backend_id(backend: ComputeBackend) -> i32 {
    match backend {
        ComputeBackend::Default => dnn::DNN_BACKEND_DEFAULT,
        ComputeBackend::Halide => dnn::DNN_BACKEND_HALIDE,
        ComputeBackend::Openvino => dnn::DNN_BACKEND_INFERENCE_ENGINE,
        ComputeBackend::Opencv => dnn::DNN_BACKEND_OPENCV,
        ComputeBackend::Vulkan => dnn::DNN_BACKEND_VKCOM,
        ComputeBackend::Cuda => dnn::DNN_BACKEND_CUDA,
    }
}

fn target_id(target: ComputeTarget) -> i32 {
    match target {
        ComputeTarget::Cpu => dnn::DNN_TARGET_CPU,
        ComputeTarget::Opencl => dnn::DNN_TARGET_OPENCL,
        ComputeTarget::OpenclFp16 => dnn::DNN_TARGET_OPENCL_FP16,
        ComputeTarget::Myriad => dnn::DNN_TARGET_MYRIAD,
        ComputeTarget::Vulkan => dnn::DNN_TARGET_VULKAN,
        ComputeTarget::Fpga => dnn::DNN_TARGET_FPGA,
        ComputeTarget::Cuda => dnn::DNN_TARGET_CUDA,
        ComputeTarget::CudaFp16 => dnn::DNN_TARGET_CUDA_FP16,
    }
}

fn path_str(kind: ModelKind, path: &Path) -> Result<&str, ModelLoadError> {
    if !path.is_file() {
        return Err(ModelLoadError::new(kind, path, "file not found"));
    }
    path.to_str()
        .ok_or_else(|| ModelLoadError::new(kind, path, "path is not valid UTF-8"))
}

/// Reads a network, letting OpenCV pick the framework from the file
/// extensions, and applies the requested backend and target.
fn load_net(
    kind: ModelKind,
    model: &Path,
    config: Option<&Path>,
    backend: ComputeBackend,
    target: ComputeTarget,
) -> Result<dnn::Net, ModelLoadError> {
    let model_str = path_str(kind, model)?;
    let config_str = match config {
        Some(config) => path_str(kind, config)?,
        None => "",
    };

    let fail = |e: opencv::Error| ModelLoadError::new(kind, model, e);
    let mut net = dnn::read_net(model_str, config_str, "").map_err(fail)?;
    if net.empty().map_err(fail)? {
        return Err(ModelLoadError::new(kind, model, "network is empty"));
    }
    net.set_preferable_backend(backend_id(backend)).map_err(fail)?;
    net.set_preferable_target(target_id(target)).map_err(fail)?;

    tracing::debug!("Loaded {} model from {:?}", kind, model);
    Ok(net)
}

/// Runs a single forward pass and returns the output as a flat f32 vector.
fn forward(net: &mut dnn::Net, blob: &Mat) -> Result<Vec<f32>, PredictionError> {
    net.set_input(blob, "", 1.0, Scalar::default())?;
    let output = net.forward_single("")?;
    Ok(output.data_typed::<f32>()?.to_vec())
}

pub struct DnnFaceDetector {
    net: dnn::Net,
}

impl DnnFaceDetector {
    pub fn new(
        model: &Path,
        config: &Path,
        backend: ComputeBackend,
        target: ComputeTarget,
    ) -> Result<Self, ModelLoadError> {
        let net = load_net(ModelKind::FaceDetector, model, Some(config), backend, target)?;
        Ok(Self { net })
    }
}

impl FaceDetector for DnnFaceDetector {
    type Image = Mat;

    fn detect(&mut self, image: &Mat) -> Result<Vec<FaceCandidate>, PredictionError> {
        let blob = dnn::blob_from_image(
            image,
            1.0,
            Size::new(FACE_INPUT_SIZE, FACE_INPUT_SIZE),
            blob_mean(),
            false,
            false,
            CV_32F,
        )?;
        let raw = forward(&mut self.net, &blob)?;
        Ok(parse_ssd_detections(&raw))
    }
}

pub struct DnnEmotionClassifier {
    net: dnn::Net,
}

impl DnnEmotionClassifier {
    pub fn new(
        model: &Path,
        config: Option<&Path>,
        backend: ComputeBackend,
        target: ComputeTarget,
    ) -> Result<Self, ModelLoadError> {
        let net = load_net(ModelKind::EmotionClassifier, model, config, backend, target)?;
        Ok(Self { net })
    }
}

impl EmotionClassifier<Mat> for DnnEmotionClassifier {
    fn classify(&mut self, image: &Mat, face: PixelRect) -> Result<Vec<f32>, PredictionError> {
        let roi = crop_region(image, face)?;
        let gray = if roi.channels() == 1 {
            roi
        } else {
            let mut gray = Mat::default();
            imgproc::cvt_color_def(&roi, &mut gray, imgproc::COLOR_BGR2GRAY)?;
            gray
        };

        let blob = dnn::blob_from_image(
            &gray,
            1.0,
            Size::new(EMOTION_INPUT_SIZE, EMOTION_INPUT_SIZE),
            blob_mean(),
            false,
            false,
            CV_32F,
        )?;
        forward(&mut self.net, &blob)
    }
}

/// Loads both pipelines for one worker. Called once per worker at pool
/// construction.
pub fn build_worker(
    id: usize,
    config: &WorkerConfig,
    labels: Arc<LabelCatalog>,
) -> Result<EmotionWorker, ModelLoadError> {
    let detector = DnnFaceDetector::new(
        &config.face_model,
        &config.face_config,
        config.backend,
        config.target,
    )?;
    let classifier = DnnEmotionClassifier::new(
        &config.emotion_model,
        config.emotion_config.as_deref(),
        config.backend,
        config.target,
    )?;
    Ok(InferenceWorker::new(id, detector, classifier, labels))
}
