use thiserror::Error;

use crate::models::Pose;

/// Frame size assumed when a source does not report one.
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// One captured video frame handed to the estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB, row-major. May be empty for sources that carry
    /// pre-computed poses.
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(sequence: u64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            sequence,
            width: if width == 0 { DEFAULT_FRAME_WIDTH } else { width },
            height: if height == 0 { DEFAULT_FRAME_HEIGHT } else { height },
            pixels,
        }
    }

    /// Solid grey square used to warm the model up before the first real frame.
    pub fn warm_up() -> Self {
        let side = 257;
        Self::new(0, side, side, vec![128; (side * side * 3) as usize])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Ready,
    /// Device is open but no decodable frame yet.
    NotReady,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("Selected camera not found")]
    NotFound,
    #[error("Camera is busy or unavailable")]
    Busy,
    #[error("Camera does not support required settings")]
    Unsupported,
    #[error("Failed to access camera")]
    Other(String),
}

impl CaptureError {
    /// Maps a device-layer error name onto the user-facing categories.
    pub fn from_device_error(name: &str, detail: impl Into<String>) -> Self {
        match name {
            "NotAllowedError" | "PermissionDenied" => CaptureError::PermissionDenied,
            "NotFoundError" | "NotFound" => CaptureError::NotFound,
            "NotReadableError" | "Busy" => CaptureError::Busy,
            "OverconstrainedError" | "Unsupported" => CaptureError::Unsupported,
            _ => CaptureError::Other(detail.into()),
        }
    }

    /// Permission problems are not fixed by switching devices.
    pub fn suggests_default_device(&self) -> bool {
        !matches!(self, CaptureError::PermissionDenied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("pose estimation failed: {0}")]
    Failed(String),
    #[error("all {attempts} inference profiles failed")]
    Exhausted { attempts: usize },
    #[error("model load failed: {0}")]
    ModelLoad(String),
}

/// Video input. Implementations own the device handle.
pub trait FrameSource {
    fn open(&mut self) -> Result<(), CaptureError>;
    fn status(&self) -> FrameStatus;
    fn grab(&mut self) -> Frame;
    fn close(&mut self) {}
}

/// Estimator tuning knobs. `None` leaves the estimator's own default in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceProfile {
    pub name: &'static str,
    pub image_scale_factor: Option<f64>,
    pub output_stride: Option<u32>,
    pub max_detections: Option<u32>,
    pub score_threshold: Option<f64>,
    pub nms_radius: Option<u32>,
    pub flip_horizontal: bool,
}

impl InferenceProfile {
    pub const fn defaults() -> Self {
        Self {
            name: "defaults",
            image_scale_factor: None,
            output_stride: None,
            max_detections: None,
            score_threshold: None,
            nms_radius: None,
            flip_horizontal: false,
        }
    }

    pub const fn high_accuracy() -> Self {
        Self {
            name: "high-accuracy",
            image_scale_factor: Some(0.7),
            output_stride: Some(32),
            max_detections: Some(1),
            score_threshold: Some(0.2),
            nms_radius: Some(20),
            flip_horizontal: false,
        }
    }

    pub const fn fast() -> Self {
        Self {
            name: "fast",
            image_scale_factor: Some(0.5),
            output_stride: Some(16),
            ..Self::defaults()
        }
    }

    pub const fn warm_up() -> Self {
        Self {
            name: "warm-up",
            image_scale_factor: Some(0.5),
            output_stride: Some(32),
            ..Self::defaults()
        }
    }

    pub fn is_bare(&self) -> bool {
        self.image_scale_factor.is_none()
            && self.output_stride.is_none()
            && self.max_detections.is_none()
            && self.score_threshold.is_none()
            && self.nms_radius.is_none()
    }
}

/// Degrade order used for every fresh inference.
pub fn inference_ladder() -> Vec<InferenceProfile> {
    vec![
        InferenceProfile::high_accuracy(),
        InferenceProfile::fast(),
        InferenceProfile::defaults(),
    ]
}

#[allow(async_fn_in_trait)]
pub trait PoseEstimator {
    async fn estimate(&self, frame: &Frame, profile: &InferenceProfile)
        -> Result<Pose, InferenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    ResNet50,
    MobileNetV1,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    pub architecture: Architecture,
    pub output_stride: u32,
    pub input_resolution: u32,
    pub quant_bytes: Option<u32>,
    pub multiplier: Option<f64>,
}

#[allow(async_fn_in_trait)]
pub trait ModelLoader {
    type Model: PoseEstimator;

    async fn load(&mut self, profile: &ModelProfile) -> Result<Self::Model, InferenceError>;
}
