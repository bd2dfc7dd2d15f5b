mod types;

pub use types::{HealthStatus, PerformanceSample, PerformanceSnapshot, SystemMetrics};

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::utils::clock::elapsed_ms;

const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const LATENCY_WINDOW: usize = 5;
const FPS_WINDOW_MS: u64 = 1000;

const POOR_LATENCY_MS: f64 = 500.0;
const POOR_FPS: f64 = 5.0;
const FAIR_LATENCY_MS: f64 = 200.0;
const FAIR_FPS: f64 = 15.0;
const EXCELLENT_LATENCY_MS: f64 = 50.0;
const EXCELLENT_FPS: f64 = 25.0;

/// Average latency above which adaptive mode lowers the display cadence.
pub const ADAPTIVE_CEILING_MS: f64 = 150.0;
pub const ADAPTIVE_FPS_STEP: u32 = 5;
pub const ADAPTIVE_MIN_FPS: u32 = 5;

/// Tracks inference latency and display frame rate for one session.
pub struct PerformanceMonitor {
    latencies: VecDeque<PerformanceSample>,
    frame_count: u64,
    frames_in_window: u32,
    window_started_at: Option<DateTime<Local>>,
    fps: Option<f64>,
    auto_adjusted: bool,
    system: System,
    pid: Pid,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // CPU usage is a delta between refreshes, so take the baseline now.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            frame_count: 0,
            frames_in_window: 0,
            window_started_at: None,
            fps: None,
            auto_adjusted: false,
            system,
            pid,
        }
    }

    /// Non-finite or negative samples are ignored.
    pub fn record_latency(&mut self, latency_ms: f64) {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return;
        }
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(PerformanceSample {
            detection_latency_ms: latency_ms,
        });
    }

    pub fn average_latency_ms(&self) -> Option<f64> {
        if self.latencies.is_empty() {
            return None;
        }
        let total: f64 = self.latencies.iter().map(|s| s.detection_latency_ms).sum();
        Some(total / self.latencies.len() as f64)
    }

    /// Counts one completed display cycle. The frame rate is published once
    /// per elapsed second.
    pub fn record_frame(&mut self, now: DateTime<Local>) {
        self.frame_count += 1;
        self.frames_in_window += 1;

        let Some(started) = self.window_started_at else {
            self.window_started_at = Some(now);
            return;
        };

        match elapsed_ms(started, now) {
            Some(elapsed) if elapsed >= FPS_WINDOW_MS => {
                self.fps = Some(f64::from(self.frames_in_window) * 1000.0 / elapsed as f64);
                self.frames_in_window = 0;
                self.window_started_at = Some(now);
            }
            Some(_) => {}
            None => {
                self.frames_in_window = 1;
                self.window_started_at = Some(now);
            }
        }
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn status(&self) -> HealthStatus {
        let latency = self.average_latency_ms();
        let fps = self.fps;

        if latency.is_some_and(|l| l > POOR_LATENCY_MS) || fps.is_some_and(|f| f < POOR_FPS) {
            HealthStatus::Poor
        } else if latency.is_some_and(|l| l > FAIR_LATENCY_MS) || fps.is_some_and(|f| f < FAIR_FPS)
        {
            HealthStatus::Fair
        } else if latency.is_some_and(|l| l < EXCELLENT_LATENCY_MS)
            && fps.is_some_and(|f| f >= EXCELLENT_FPS)
        {
            HealthStatus::Excellent
        } else {
            HealthStatus::Normal
        }
    }

    /// One-shot throttle: returns the lowered target fps the first time the
    /// average latency exceeds the ceiling while adaptive mode is on.
    pub fn adapt(&mut self, adaptive_mode: bool, current_fps: u32) -> Option<u32> {
        if !adaptive_mode || self.auto_adjusted {
            return None;
        }
        let latency = self.average_latency_ms()?;
        if latency <= ADAPTIVE_CEILING_MS {
            return None;
        }

        self.auto_adjusted = true;
        let lowered = current_fps
            .saturating_sub(ADAPTIVE_FPS_STEP)
            .max(ADAPTIVE_MIN_FPS);
        log_info!(
            "average detection latency {:.0}ms over {:.0}ms, target fps {} -> {}",
            latency,
            ADAPTIVE_CEILING_MS,
            current_fps,
            lowered
        );
        (lowered != current_fps).then_some(lowered)
    }

    pub fn auto_adjusted(&self) -> bool {
        self.auto_adjusted
    }

    /// Re-arms the adaptive throttle after the user picks a new cadence.
    pub fn reset_adjustment(&mut self) {
        self.auto_adjusted = false;
    }

    pub fn sample_system_metrics(&mut self) -> SystemMetrics {
        let pid = self.pid;
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]));

        match self.system.process(pid) {
            Some(process) => SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            },
            None => SystemMetrics::default(),
        }
    }

    pub fn snapshot(&mut self) -> PerformanceSnapshot {
        let system = self.sample_system_metrics();
        PerformanceSnapshot {
            frame_count: self.frame_count,
            average_latency_ms: self.average_latency_ms(),
            fps: self.fps,
            status: self.status(),
            auto_adjusted: self.auto_adjusted,
            system,
        }
    }

    pub fn reset(&mut self) {
        self.latencies.clear();
        self.frame_count = 0;
        self.frames_in_window = 0;
        self.window_started_at = None;
        self.fps = None;
        self.auto_adjusted = false;
        let pid = self.pid;
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]));
    }
}
