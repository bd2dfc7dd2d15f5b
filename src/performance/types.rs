use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Poor,
    Fair,
    Normal,
    Excellent,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Poor => "poor",
            HealthStatus::Fair => "fair",
            HealthStatus::Normal => "normal",
            HealthStatus::Excellent => "excellent",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub detection_latency_ms: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub frame_count: u64,
    pub average_latency_ms: Option<f64>,
    pub fps: Option<f64>,
    pub status: HealthStatus,
    pub auto_adjusted: bool,
    pub system: SystemMetrics,
}
