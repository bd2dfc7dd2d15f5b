use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};

use crate::models::Pose;

use super::estimator::{
    CaptureError, Frame, FrameSource, FrameStatus, InferenceError, InferenceProfile, ModelLoader,
    ModelProfile, PoseEstimator, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH,
};

/// Reads one JSON pose per line. Blank lines are skipped.
pub fn read_pose_lines(path: &Path) -> Result<Vec<Pose>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read poses from {}", path.display()))?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Pose>(line)
                .with_context(|| format!("invalid pose on line {}", index + 1))
        })
        .collect()
}

/// Frame source over recorded poses; frame `n` carries recorded pose `n`.
pub struct ReplaySource {
    poses: Rc<[Pose]>,
    cursor: usize,
    opened: bool,
}

impl ReplaySource {
    pub fn new(poses: Vec<Pose>) -> Self {
        Self {
            poses: poses.into(),
            cursor: 0,
            opened: false,
        }
    }

    pub fn estimator(&self) -> ReplayEstimator {
        ReplayEstimator {
            poses: Rc::clone(&self.poses),
        }
    }

    pub fn loader(&self) -> ReplayLoader {
        ReplayLoader {
            poses: Rc::clone(&self.poses),
        }
    }

    pub fn remaining(&self) -> usize {
        self.poses.len().saturating_sub(self.cursor)
    }
}

impl FrameSource for ReplaySource {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.poses.is_empty() {
            return Err(CaptureError::NotFound);
        }
        self.opened = true;
        Ok(())
    }

    fn status(&self) -> FrameStatus {
        if !self.opened {
            FrameStatus::NotReady
        } else if self.cursor >= self.poses.len() {
            FrameStatus::Ended
        } else {
            FrameStatus::Ready
        }
    }

    fn grab(&mut self) -> Frame {
        let frame = Frame::new(
            self.cursor as u64,
            DEFAULT_FRAME_WIDTH,
            DEFAULT_FRAME_HEIGHT,
            Vec::new(),
        );
        self.cursor += 1;
        frame
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

pub struct ReplayEstimator {
    poses: Rc<[Pose]>,
}

impl PoseEstimator for ReplayEstimator {
    async fn estimate(
        &self,
        frame: &Frame,
        _profile: &InferenceProfile,
    ) -> Result<Pose, InferenceError> {
        usize::try_from(frame.sequence)
            .ok()
            .and_then(|index| self.poses.get(index))
            .cloned()
            .ok_or_else(|| {
                InferenceError::Failed(format!("no recorded pose for frame {}", frame.sequence))
            })
    }
}

pub struct ReplayLoader {
    poses: Rc<[Pose]>,
}

impl ModelLoader for ReplayLoader {
    type Model = ReplayEstimator;

    async fn load(&mut self, _profile: &ModelProfile) -> Result<ReplayEstimator, InferenceError> {
        Ok(ReplayEstimator {
            poses: Rc::clone(&self.poses),
        })
    }
}
