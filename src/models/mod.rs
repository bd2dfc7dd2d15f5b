pub mod achievement;
pub mod pose;
pub mod score;
pub mod stats;

pub use achievement::{AchievementId, AchievementRecord, AchievementState};
pub use pose::{BodyPart, HistoryEntry, Keypoint, Pose, PoseHistory, Position, POSE_HISTORY_CAPACITY};
pub use score::{Contribution, DetailMetrics, PostureCategory, ScoreReason, ScoreResult, Signal};
pub use stats::{LogEntry, SessionStats, MAX_LOG_ENTRIES};
