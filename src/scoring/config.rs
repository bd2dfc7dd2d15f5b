use serde::{Deserialize, Serialize};

use crate::models::PostureCategory;

/// The two tuning variants of the heuristic. They use different tier
/// boundaries and base scores and are not meant to agree with each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ScoringPreset {
    #[default]
    Classic,
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    /// First tier whose `value < bound` wins.
    Below,
    /// First tier whose `value > bound` wins.
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub bound: f64,
    pub points: i32,
    pub label: &'static str,
}

const fn tier(bound: f64, points: i32, label: &'static str) -> Tier {
    Tier {
        bound,
        points,
        label,
    }
}

/// Ordered buckets for one signal. Values that match no tier (including
/// NaN) land in `otherwise`, the last bucket in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    pub compare: Compare,
    pub tiers: Vec<Tier>,
    pub otherwise: Tier,
}

impl TierTable {
    fn below(tiers: &[Tier], otherwise: (i32, &'static str)) -> Self {
        Self {
            compare: Compare::Below,
            tiers: tiers.to_vec(),
            otherwise: tier(f64::INFINITY, otherwise.0, otherwise.1),
        }
    }

    fn above(tiers: &[Tier], otherwise: (i32, &'static str)) -> Self {
        Self {
            compare: Compare::Above,
            tiers: tiers.to_vec(),
            otherwise: tier(f64::NEG_INFINITY, otherwise.0, otherwise.1),
        }
    }

    pub fn bucket(&self, value: f64) -> &Tier {
        self.tiers
            .iter()
            .find(|t| match self.compare {
                Compare::Below => value < t.bound,
                Compare::Above => value > t.bound,
            })
            .unwrap_or(&self.otherwise)
    }
}

/// Category cut points, checked from the top. Must be strictly decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryCuts {
    pub excellent: u8,
    pub good: u8,
    pub fair: u8,
}

impl CategoryCuts {
    pub fn categorize(&self, score: u8) -> PostureCategory {
        if score >= self.excellent {
            PostureCategory::Excellent
        } else if score >= self.good {
            PostureCategory::Good
        } else if score >= self.fair {
            PostureCategory::Fair
        } else {
            PostureCategory::Poor
        }
    }
}

/// Every tunable constant of the posture heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub preset: ScoringPreset,
    pub base_score: i32,
    /// Returned as-is when a required keypoint is missing or unsure.
    pub sentinel_score: u8,
    pub floor: u8,
    pub ceiling: u8,
    pub min_confidence: f64,
    pub elbow_min_confidence: f64,
    /// Substituted when the shoulders are horizontally coincident.
    pub fallback_width: f64,
    /// Forward-head reference distance as a fraction of shoulder width.
    pub forward_reference_factor: f64,
    /// Multiplies deviation measures before bucketing; >1 is stricter.
    pub sensitivity: f64,

    pub head_alignment: TierTable,
    pub forward_head: TierTable,
    pub shoulder_level: TierTable,
    pub upright: TierTable,
    pub shoulder_rounding: TierTable,
    pub detection_quality: TierTable,

    pub cuts: CategoryCuts,
}

impl ScoringConfig {
    pub fn for_preset(preset: ScoringPreset) -> Self {
        match preset {
            ScoringPreset::Classic => Self::classic(),
            ScoringPreset::Extended => Self::extended(),
        }
    }

    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        if sensitivity.is_finite() && sensitivity > 0.0 {
            self.sensitivity = sensitivity;
        }
        self
    }

    pub fn classic() -> Self {
        Self {
            preset: ScoringPreset::Classic,
            base_score: 40,
            sentinel_score: 35,
            floor: 30,
            ceiling: 100,
            min_confidence: 0.2,
            elbow_min_confidence: 0.3,
            fallback_width: 100.0,
            forward_reference_factor: 0.25,
            sensitivity: 1.0,
            head_alignment: TierTable::below(
                &[
                    tier(0.15, 20, "Perfect head alignment"),
                    tier(0.3, 12, "Good head alignment"),
                    tier(0.5, 5, "Fair head alignment"),
                    tier(0.7, -8, "Poor head alignment"),
                ],
                (-20, "Very poor head alignment"),
            ),
            // Bounds are multiples of the reference distance.
            forward_head: TierTable::below(
                &[
                    tier(-0.3, 20, "Excellent head position"),
                    tier(0.3, 12, "Good head position"),
                    tier(1.0, 2, "Slightly forward head"),
                    tier(2.0, -10, "Forward head posture"),
                ],
                (-20, "Severe forward head"),
            ),
            // Pixels.
            shoulder_level: TierTable::below(
                &[
                    tier(8.0, 15, "Perfect shoulder level"),
                    tier(18.0, 8, "Good shoulder level"),
                    tier(30.0, 2, "Slightly uneven shoulders"),
                    tier(45.0, -5, "Uneven shoulders"),
                ],
                (-15, "Very uneven shoulders"),
            ),
            upright: TierTable::above(
                &[
                    tier(0.9, 15, "Excellent posture, chest up"),
                    tier(0.6, 8, "Good shoulder position"),
                    tier(0.3, 2, "Neutral shoulder position"),
                    tier(0.0, -5, "Slightly slouched"),
                ],
                (-15, "Heavily slouched"),
            ),
            shoulder_rounding: TierTable::below(
                &[
                    tier(0.0, 5, "Shoulders back"),
                    tier(0.1, 3, "Neutral shoulders"),
                    tier(0.2, 0, "Slightly rounded shoulders"),
                    tier(0.35, -5, "Rounded shoulders"),
                ],
                (-10, "Severely rounded shoulders"),
            ),
            detection_quality: TierTable::below(
                &[
                    tier(0.3, -5, "Poor detection quality"),
                    tier(0.8, 0, "Typical detection quality"),
                ],
                (5, "Excellent detection quality"),
            ),
            cuts: CategoryCuts {
                excellent: 85,
                good: 70,
                fair: 55,
            },
        }
    }

    pub fn extended() -> Self {
        Self {
            preset: ScoringPreset::Extended,
            base_score: 50,
            sentinel_score: 25,
            floor: 20,
            ceiling: 100,
            min_confidence: 0.25,
            elbow_min_confidence: 0.35,
            fallback_width: 100.0,
            forward_reference_factor: 0.3,
            sensitivity: 1.0,
            head_alignment: TierTable::below(
                &[
                    tier(0.1, 15, "Perfect head alignment"),
                    tier(0.2, 10, "Good head alignment"),
                    tier(0.35, 3, "Fair head alignment"),
                    tier(0.5, -5, "Poor head alignment"),
                    tier(0.7, -12, "Very poor head alignment"),
                ],
                (-20, "Head far off center"),
            ),
            forward_head: TierTable::below(
                &[
                    tier(-0.5, 15, "Excellent head position"),
                    tier(0.0, 10, "Good head position"),
                    tier(0.5, 2, "Neutral head position"),
                    tier(1.0, -6, "Slightly forward head"),
                    tier(2.0, -12, "Forward head posture"),
                ],
                (-20, "Severe forward head"),
            ),
            shoulder_level: TierTable::below(
                &[
                    tier(6.0, 12, "Perfect shoulder level"),
                    tier(15.0, 7, "Good shoulder level"),
                    tier(25.0, 2, "Slightly uneven shoulders"),
                    tier(40.0, -5, "Uneven shoulders"),
                    tier(55.0, -10, "Very uneven shoulders"),
                ],
                (-15, "Severely uneven shoulders"),
            ),
            upright: TierTable::above(
                &[
                    tier(1.0, 12, "Tall upright posture"),
                    tier(0.75, 6, "Upright posture"),
                    tier(0.5, 0, "Neutral posture"),
                    tier(0.3, -8, "Slouching"),
                ],
                (-15, "Heavily slouched"),
            ),
            shoulder_rounding: TierTable::below(
                &[
                    tier(0.0, 8, "Shoulders back"),
                    tier(0.1, 4, "Neutral shoulders"),
                    tier(0.2, 0, "Slightly rounded shoulders"),
                    tier(0.35, -6, "Rounded shoulders"),
                ],
                (-12, "Severely rounded shoulders"),
            ),
            detection_quality: TierTable::below(
                &[
                    tier(0.4, -6, "Poor detection quality"),
                    tier(0.85, 0, "Typical detection quality"),
                ],
                (4, "Excellent detection quality"),
            ),
            cuts: CategoryCuts {
                excellent: 88,
                good: 75,
                fair: 60,
            },
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::classic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_points_are_strictly_ordered() {
        for config in [ScoringConfig::classic(), ScoringConfig::extended()] {
            assert!(config.cuts.excellent > config.cuts.good);
            assert!(config.cuts.good > config.cuts.fair);
            assert!(config.cuts.fair > config.floor);
            assert!(config.sentinel_score >= config.floor);
            assert!(config.floor >= 20);
        }
    }

    #[test]
    fn boundary_scores_map_to_one_category() {
        let extended = ScoringConfig::extended();
        assert_eq!(extended.cuts.categorize(88), PostureCategory::Excellent);
        assert_eq!(extended.cuts.categorize(87), PostureCategory::Good);
        assert_eq!(extended.cuts.categorize(75), PostureCategory::Good);
        assert_eq!(extended.cuts.categorize(74), PostureCategory::Fair);

        let classic = ScoringConfig::classic();
        assert_eq!(classic.cuts.categorize(88), PostureCategory::Excellent);
        assert_eq!(classic.cuts.categorize(75), PostureCategory::Good);
        assert_eq!(classic.cuts.categorize(54), PostureCategory::Poor);
    }

    #[test]
    fn nan_lands_in_fallback_bucket() {
        let config = ScoringConfig::classic();
        assert_eq!(config.head_alignment.bucket(f64::NAN).points, -20);
        assert_eq!(config.upright.bucket(f64::NAN).points, -15);
        // Confidence counts up, so its fallback is the best bucket.
        let quality = config.detection_quality.bucket(f64::NAN);
        assert_eq!(quality.points, 5);
        assert_eq!(quality, &config.detection_quality.otherwise);
    }

    #[test]
    fn tier_tables_are_monotonic() {
        for config in [ScoringConfig::classic(), ScoringConfig::extended()] {
            for table in [
                &config.head_alignment,
                &config.forward_head,
                &config.shoulder_level,
                &config.upright,
                &config.shoulder_rounding,
            ] {
                let mut points: Vec<i32> = table.tiers.iter().map(|t| t.points).collect();
                points.push(table.otherwise.points);
                assert!(points.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }
}
