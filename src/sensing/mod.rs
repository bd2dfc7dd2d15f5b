pub mod estimator;
pub mod ladder;
pub mod replay;
pub mod scheduler;

pub use estimator::{
    inference_ladder, CaptureError, Frame, FrameSource, FrameStatus, InferenceError,
    InferenceProfile, ModelLoader, ModelProfile, PoseEstimator,
};
pub use ladder::{load_model, model_ladder, try_in_order, warm_up};
pub use replay::{read_pose_lines, ReplayEstimator, ReplayLoader, ReplaySource};
pub use scheduler::{CycleOutcome, DetectionScheduler, SchedulerState, StopHandle};
