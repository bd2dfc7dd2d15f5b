pub mod config;
pub mod heuristic;

pub use config::{CategoryCuts, ScoringConfig, ScoringPreset, TierTable};
pub use heuristic::{score, score_pose};
