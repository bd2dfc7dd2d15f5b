use chrono::{DateTime, Local};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::Pose;
use crate::performance::PerformanceMonitor;
use crate::utils::clock::elapsed_ms;

use super::estimator::{
    inference_ladder, CaptureError, FrameSource, FrameStatus, InferenceProfile, PoseEstimator,
};
use super::ladder::try_in_order;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// What one scheduling opportunity did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Not running, or stop was requested.
    Inactive,
    /// Display interval has not elapsed.
    Throttled,
    /// Source is open but has no frame yet.
    FrameUnavailable,
    /// Source ended; the scheduler is back to idle.
    SourceEnded,
    /// Inference not due; the last pose is reused.
    Cached(Pose),
    /// Fresh inference result.
    Fresh {
        pose: Pose,
        profile: &'static str,
        latency_ms: f64,
    },
    /// Inference not due and nothing cached yet.
    Waiting,
    /// Every inference profile failed; nothing to score this cycle.
    Missed,
    /// Stop was requested while inference was in flight.
    Discarded,
}

impl CycleOutcome {
    pub fn pose(&self) -> Option<&Pose> {
        match self {
            CycleOutcome::Cached(pose) | CycleOutcome::Fresh { pose, .. } => Some(pose),
            _ => None,
        }
    }
}

/// Cloneable stop trigger for callbacks that do not own the scheduler.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Two-cadence gate in front of the estimator: display ticks are throttled
/// to the display interval, and fresh inference runs at most once per
/// inference interval with the cached pose filling the gaps.
pub struct DetectionScheduler<S, E> {
    source: S,
    estimator: E,
    ladder: Vec<InferenceProfile>,
    display_interval_ms: u64,
    inference_interval_ms: u64,
    state: SchedulerState,
    last_display: Option<DateTime<Local>>,
    last_inference: Option<DateTime<Local>>,
    cached: Option<Pose>,
    cancel_token: CancellationToken,
}

impl<S: FrameSource, E: PoseEstimator> DetectionScheduler<S, E> {
    pub fn new(
        source: S,
        estimator: E,
        display_interval_ms: u64,
        inference_interval_ms: u64,
    ) -> Self {
        Self {
            source,
            estimator,
            ladder: inference_ladder(),
            display_interval_ms,
            inference_interval_ms,
            state: SchedulerState::Idle,
            last_display: None,
            last_inference: None,
            cached: None,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_ladder(mut self, ladder: Vec<InferenceProfile>) -> Self {
        if !ladder.is_empty() {
            self.ladder = ladder;
        }
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running && !self.cancel_token.is_cancelled()
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state == SchedulerState::Running && !self.cancel_token.is_cancelled() {
            return Ok(());
        }

        self.source.open()?;
        self.cancel_token = CancellationToken::new();
        self.state = SchedulerState::Running;
        self.last_display = None;
        self.last_inference = None;
        self.cached = None;
        log_info!(
            "detection started (display every {}ms, inference every {}ms)",
            self.display_interval_ms,
            self.inference_interval_ms
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        self.cancel_token.cancel();
        self.halt();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.cancel_token.clone(),
        }
    }

    pub fn display_interval_ms(&self) -> u64 {
        self.display_interval_ms
    }

    pub fn set_display_interval_ms(&mut self, interval_ms: u64) {
        self.display_interval_ms = interval_ms.max(1);
    }

    pub fn inference_interval_ms(&self) -> u64 {
        self.inference_interval_ms
    }

    pub fn set_inference_interval_ms(&mut self, interval_ms: u64) {
        self.inference_interval_ms = interval_ms;
    }

    pub fn cached_pose(&self) -> Option<&Pose> {
        self.cached.as_ref()
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    fn halt(&mut self) {
        if self.state == SchedulerState::Running {
            self.source.close();
            self.state = SchedulerState::Idle;
            log_info!("detection stopped");
        }
    }

    /// One scheduling opportunity. Never blocks except on the estimator.
    pub async fn tick(
        &mut self,
        now: DateTime<Local>,
        perf: &mut PerformanceMonitor,
    ) -> CycleOutcome {
        if self.state != SchedulerState::Running {
            return CycleOutcome::Inactive;
        }
        if self.cancel_token.is_cancelled() {
            self.halt();
            return CycleOutcome::Inactive;
        }

        if !is_due(self.last_display, now, self.display_interval_ms) {
            return CycleOutcome::Throttled;
        }

        match self.source.status() {
            FrameStatus::Ready => {}
            FrameStatus::NotReady => return CycleOutcome::FrameUnavailable,
            FrameStatus::Ended => {
                log_warn!("video source ended");
                self.halt();
                return CycleOutcome::SourceEnded;
            }
        }

        self.last_display = Some(now);

        if !is_due(self.last_inference, now, self.inference_interval_ms) {
            return match &self.cached {
                Some(pose) => CycleOutcome::Cached(pose.clone()),
                None => CycleOutcome::Waiting,
            };
        }

        // Anchored before the call so a failing estimator is retried on the
        // inference cadence, not on every display tick.
        self.last_inference = Some(now);

        let frame = self.source.grab();
        let started = Instant::now();
        let estimator = &self.estimator;
        let frame_ref = &frame;
        let result = try_in_order(&self.ladder, move |profile| {
            estimator.estimate(frame_ref, profile)
        })
        .await;

        let (mut pose, profile) = match result {
            Ok((pose, profile)) => (pose, profile.name),
            Err(err) => {
                if self.cancel_token.is_cancelled() {
                    self.halt();
                    return CycleOutcome::Discarded;
                }
                log_warn!("frame {} skipped: {err}", frame.sequence);
                return CycleOutcome::Missed;
            }
        };

        if !pose.has_plausible_keypoint() {
            log_debug!("no plausible keypoints in frame {}, retrying bare", frame.sequence);
            match self
                .estimator
                .estimate(&frame, &InferenceProfile::defaults())
                .await
            {
                Ok(retry) => pose = retry,
                Err(err) => log_debug!("bare retry failed: {err}"),
            }
        }

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        if self.cancel_token.is_cancelled() {
            self.halt();
            return CycleOutcome::Discarded;
        }

        perf.record_latency(latency_ms);
        self.cached = Some(pose.clone());

        CycleOutcome::Fresh {
            pose,
            profile,
            latency_ms,
        }
    }
}

/// True when no anchor exists, the interval has passed, or the clock went
/// backwards (which re-anchors on the caller's side).
fn is_due(anchor: Option<DateTime<Local>>, now: DateTime<Local>, interval_ms: u64) -> bool {
    match anchor {
        None => true,
        Some(anchor) => match elapsed_ms(anchor, now) {
            Some(elapsed) => elapsed >= interval_ms,
            None => true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyPart, Keypoint};
    use crate::sensing::estimator::{Frame, InferenceError};
    use chrono::{Duration, TimeZone, Utc};
    use std::cell::{Cell, RefCell};
    use std::time::Duration as StdDuration;

    struct StubSource {
        status: Cell<FrameStatus>,
        grabbed: Cell<u64>,
        open_error: Option<CaptureError>,
    }

    impl StubSource {
        fn ready() -> Self {
            Self {
                status: Cell::new(FrameStatus::Ready),
                grabbed: Cell::new(0),
                open_error: None,
            }
        }
    }

    impl FrameSource for StubSource {
        fn open(&mut self) -> Result<(), CaptureError> {
            match &self.open_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn status(&self) -> FrameStatus {
            self.status.get()
        }

        fn grab(&mut self) -> Frame {
            let seq = self.grabbed.get() + 1;
            self.grabbed.set(seq);
            Frame::new(seq, 640, 480, Vec::new())
        }
    }

    /// Fails the profiles listed in `failing`, sleeps `delay` per call and
    /// records each profile it sees.
    struct StubEstimator {
        failing: Vec<&'static str>,
        delay: StdDuration,
        calls: RefCell<Vec<&'static str>>,
        degenerate_first: Cell<bool>,
    }

    impl StubEstimator {
        fn healthy() -> Self {
            Self {
                failing: Vec::new(),
                delay: StdDuration::from_millis(0),
                calls: RefCell::new(Vec::new()),
                degenerate_first: Cell::new(false),
            }
        }
    }

    fn good_pose() -> Pose {
        Pose::new(
            vec![
                Keypoint::new(BodyPart::Nose, 100.0, 50.0, 0.9),
                Keypoint::new(BodyPart::LeftShoulder, 70.0, 100.0, 0.9),
                Keypoint::new(BodyPart::RightShoulder, 130.0, 100.0, 0.9),
            ],
            Utc::now(),
        )
    }

    impl PoseEstimator for StubEstimator {
        async fn estimate(
            &self,
            _frame: &Frame,
            profile: &InferenceProfile,
        ) -> Result<Pose, InferenceError> {
            self.calls.borrow_mut().push(profile.name);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.contains(&profile.name) {
                return Err(InferenceError::Failed(format!("{} rejected", profile.name)));
            }
            if self.degenerate_first.replace(false) {
                return Ok(Pose::new(
                    vec![Keypoint::new(BodyPart::Nose, 0.0, 0.0, 0.1)],
                    Utc::now(),
                ));
            }
            Ok(good_pose())
        }
    }

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn inference_runs_at_most_once_per_interval() {
        let mut scheduler =
            DetectionScheduler::new(StubSource::ready(), StubEstimator::healthy(), 33, 5_000);
        let mut perf = PerformanceMonitor::new();
        scheduler.start().unwrap();

        let mut fresh = 0;
        let mut cached = 0;
        let mut throttled = 0;
        // 20 seconds of 10ms polling.
        for step in 0..2_000 {
            let now = t0() + Duration::milliseconds(step * 10);
            match scheduler.tick(now, &mut perf).await {
                CycleOutcome::Fresh { .. } => fresh += 1,
                CycleOutcome::Cached(_) => cached += 1,
                CycleOutcome::Throttled => throttled += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(fresh, 4);
        assert!(cached > 400, "cached was {cached}");
        assert!(throttled > 1_000);
        assert_eq!(scheduler.estimator().calls.borrow().len(), 4);
    }

    #[tokio::test]
    async fn ladder_degrades_to_defaults() {
        let estimator = StubEstimator {
            failing: vec!["high-accuracy", "fast"],
            ..StubEstimator::healthy()
        };
        let mut scheduler = DetectionScheduler::new(StubSource::ready(), estimator, 33, 500);
        let mut perf = PerformanceMonitor::new();
        scheduler.start().unwrap();

        match scheduler.tick(t0(), &mut perf).await {
            CycleOutcome::Fresh { profile, .. } => assert_eq!(profile, "defaults"),
            other => panic!("expected fresh pose, got {other:?}"),
        }
        assert_eq!(
            *scheduler.estimator().calls.borrow(),
            vec!["high-accuracy", "fast", "defaults"]
        );
    }

    #[tokio::test]
    async fn exhausted_ladder_skips_cycle_and_waits_for_cadence() {
        let estimator = StubEstimator {
            failing: vec!["high-accuracy", "fast", "defaults"],
            ..StubEstimator::healthy()
        };
        let mut scheduler = DetectionScheduler::new(StubSource::ready(), estimator, 33, 500);
        let mut perf = PerformanceMonitor::new();
        scheduler.start().unwrap();

        assert_eq!(scheduler.tick(t0(), &mut perf).await, CycleOutcome::Missed);
        assert!(scheduler.is_running());
        let later = t0() + Duration::milliseconds(100);
        assert_eq!(scheduler.tick(later, &mut perf).await, CycleOutcome::Waiting);
        let due = t0() + Duration::milliseconds(500);
        assert_eq!(scheduler.tick(due, &mut perf).await, CycleOutcome::Missed);
        assert_eq!(scheduler.estimator().calls.borrow().len(), 6);
        assert_eq!(perf.average_latency_ms(), None);
    }

    #[tokio::test]
    async fn degenerate_pose_gets_one_bare_retry() {
        let estimator = StubEstimator::healthy();
        estimator.degenerate_first.set(true);
        let mut scheduler = DetectionScheduler::new(StubSource::ready(), estimator, 33, 500);
        let mut perf = PerformanceMonitor::new();
        scheduler.start().unwrap();

        let outcome = scheduler.tick(t0(), &mut perf).await;
        assert!(outcome.pose().is_some_and(|p| p.has_plausible_keypoint()));
        assert_eq!(
            *scheduler.estimator().calls.borrow(),
            vec!["high-accuracy", "defaults"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_recorded() {
        let estimator = StubEstimator {
            delay: StdDuration::from_millis(120),
            ..StubEstimator::healthy()
        };
        let mut scheduler = DetectionScheduler::new(StubSource::ready(), estimator, 33, 500);
        let mut perf = PerformanceMonitor::new();
        scheduler.start().unwrap();

        match scheduler.tick(t0(), &mut perf).await {
            CycleOutcome::Fresh { latency_ms, .. } => assert!(latency_ms >= 120.0),
            other => panic!("expected fresh pose, got {other:?}"),
        }
        assert!(perf.average_latency_ms().is_some_and(|l| l >= 120.0));
    }

    #[tokio::test]
    async fn stop_handle_halts_next_tick() {
        let mut scheduler =
            DetectionScheduler::new(StubSource::ready(), StubEstimator::healthy(), 33, 500);
        let mut perf = PerformanceMonitor::new();
        scheduler.start().unwrap();
        let handle = scheduler.stop_handle();
        handle.stop();

        assert_eq!(scheduler.tick(t0(), &mut perf).await, CycleOutcome::Inactive);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        assert!(!scheduler.stop_handle().is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_inference_discards_result() {
        let estimator = StubEstimator {
            delay: StdDuration::from_millis(100),
            ..StubEstimator::healthy()
        };
        let mut scheduler = DetectionScheduler::new(StubSource::ready(), estimator, 33, 500);
        let mut perf = PerformanceMonitor::new();
        scheduler.start().unwrap();
        let handle = scheduler.stop_handle();

        let (outcome, _) = tokio::join!(scheduler.tick(t0(), &mut perf), async {
            tokio::time::sleep(StdDuration::from_millis(50)).await;
            handle.stop();
        });

        assert_eq!(outcome, CycleOutcome::Discarded);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.cached_pose(), None);
        assert_eq!(perf.average_latency_ms(), None);
        assert_eq!(scheduler.estimator().calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn ended_source_returns_to_idle() {
        let mut scheduler =
            DetectionScheduler::new(StubSource::ready(), StubEstimator::healthy(), 33, 500);
        let mut perf = PerformanceMonitor::new();
        scheduler.start().unwrap();
        scheduler.source.status.set(FrameStatus::Ended);

        assert_eq!(scheduler.tick(t0(), &mut perf).await, CycleOutcome::SourceEnded);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn open_failure_keeps_scheduler_idle() {
        let source = StubSource {
            open_error: Some(CaptureError::Busy),
            ..StubSource::ready()
        };
        let mut scheduler = DetectionScheduler::new(source, StubEstimator::healthy(), 33, 500);
        assert_eq!(scheduler.start(), Err(CaptureError::Busy));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
