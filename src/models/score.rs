use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PostureCategory {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl PostureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureCategory::Poor => "Poor",
            PostureCategory::Fair => "Fair",
            PostureCategory::Good => "Good",
            PostureCategory::Excellent => "Excellent",
        }
    }
}

/// Signals that feed the point-based score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Signal {
    HeadAlignment,
    ForwardHead,
    ShoulderLevel,
    Upright,
    ShoulderRounding,
    DetectionQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub signal: Signal,
    pub label: String,
    pub points: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScoreReason {
    LowConfidence,
}

/// 0-100 diagnostic percentages, computed independently of the points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetailMetrics {
    pub head_alignment: u8,
    pub forward_head: u8,
    pub shoulder_level: u8,
    pub posture: u8,
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub score: u8,
    pub category: PostureCategory,
    pub components: Vec<Contribution>,
    pub details: DetailMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ScoreReason>,
}

impl ScoreResult {
    pub fn is_low_confidence(&self) -> bool {
        self.reason == Some(ScoreReason::LowConfidence)
    }

    pub fn contribution(&self, signal: Signal) -> Option<&Contribution> {
        self.components.iter().find(|c| c.signal == signal)
    }
}
