use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capacity of the rolling pose history.
pub const POSE_HISTORY_CAPACITY: usize = 100;

/// Body-part labels produced by the estimator (COCO-17 ordering).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(&self, other: &Position) -> Position {
        Position {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    /// Finite and away from the origin; estimators emit (0,0) for parts they
    /// could not place.
    pub fn is_plausible(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.x != 0.0 && self.y != 0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Keypoint {
    pub part: BodyPart,
    pub position: Position,
    /// Estimator confidence in [0, 1].
    #[serde(alias = "score")]
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(part: BodyPart, x: f64, y: f64, confidence: f64) -> Self {
        Self {
            part,
            position: Position::new(x, y),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>, captured_at: DateTime<Utc>) -> Self {
        Self {
            keypoints,
            captured_at,
        }
    }

    /// Last keypoint wins when an estimator reports a part twice.
    pub fn keypoint(&self, part: BodyPart) -> Option<&Keypoint> {
        self.keypoints.iter().rev().find(|k| k.part == part)
    }

    pub fn average_confidence(&self) -> f64 {
        if self.keypoints.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .keypoints
            .iter()
            .map(|k| {
                if k.confidence.is_finite() {
                    k.confidence.clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .sum();
        total / self.keypoints.len() as f64
    }

    pub fn has_plausible_keypoint(&self) -> bool {
        self.keypoints.iter().any(|k| k.position.is_plausible())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub pose: Pose,
    pub score: u8,
}

/// FIFO ring of the most recent scored poses.
#[derive(Debug, Clone)]
pub struct PoseHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for PoseHistory {
    fn default() -> Self {
        Self::with_capacity(POSE_HISTORY_CAPACITY)
    }
}

impl PoseHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Mean score of the newest `window` entries, only when that many exist.
    pub fn trailing_average(&self, window: usize) -> Option<f64> {
        if window == 0 || self.entries.len() < window {
            return None;
        }
        let total: u32 = self
            .entries
            .iter()
            .rev()
            .take(window)
            .map(|e| u32::from(e.score))
            .sum();
        Some(f64::from(total) / window as f64)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: u8) -> HistoryEntry {
        HistoryEntry {
            recorded_at: Utc::now(),
            pose: Pose::new(Vec::new(), Utc::now()),
            score,
        }
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = PoseHistory::with_capacity(3);
        for score in [10, 20, 30, 40] {
            history.push(entry(score));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().map(|e| e.score), Some(40));
        assert_eq!(history.trailing_average(3), Some(30.0));
    }

    #[test]
    fn trailing_average_requires_full_window() {
        let mut history = PoseHistory::with_capacity(5);
        history.push(entry(100));
        assert_eq!(history.trailing_average(5), None);
        assert_eq!(history.trailing_average(1), Some(100.0));
    }

    #[test]
    fn origin_keypoints_are_not_plausible() {
        let pose = Pose::new(
            vec![
                Keypoint::new(BodyPart::Nose, 0.0, 0.0, 0.9),
                Keypoint::new(BodyPart::LeftShoulder, f64::NAN, 10.0, 0.9),
            ],
            Utc::now(),
        );
        assert!(!pose.has_plausible_keypoint());
    }

    #[test]
    fn pose_accepts_estimator_score_field() {
        let raw = r#"{"keypoints":[{"part":"nose","position":{"x":1.0,"y":2.0},"score":0.5}]}"#;
        let pose: Pose = serde_json::from_str(raw).unwrap();
        assert_eq!(pose.keypoint(BodyPart::Nose).map(|k| k.confidence), Some(0.5));
    }
}
