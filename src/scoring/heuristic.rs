use crate::models::{
    BodyPart, Contribution, DetailMetrics, Keypoint, Pose, ScoreReason, ScoreResult, Signal,
};
use crate::scoring::config::{ScoringConfig, TierTable};

const REQUIRED_PARTS: [BodyPart; 3] = [BodyPart::Nose, BodyPart::LeftShoulder, BodyPart::RightShoulder];

/// Pixel offsets at which the forward-head and shoulder-level detail
/// percentages reach zero.
const FORWARD_HEAD_DETAIL_SPAN: f64 = 50.0;
const SHOULDER_LEVEL_DETAIL_SPAN: f64 = 30.0;
/// Neck ratio treated as 100% upright in the detail view.
const UPRIGHT_DETAIL_IDEAL: f64 = 0.9;

/// Scores a pose with the default (classic) tuning.
pub fn score(pose: &Pose) -> ScoreResult {
    score_pose(pose, &ScoringConfig::default())
}

/// Converts one pose into a bounded score, a category, a per-signal
/// breakdown and detail percentages. Pure: the same pose and config always
/// produce the same result.
pub fn score_pose(pose: &Pose, config: &ScoringConfig) -> ScoreResult {
    let Some([nose, left, right]) = required_keypoints(pose, config.min_confidence) else {
        return low_confidence(config);
    };

    let nose = nose.position;
    let left_shoulder = left.position;
    let right_shoulder = right.position;
    let mid = left_shoulder.midpoint(&right_shoulder);
    let width = effective_width((left_shoulder.x - right_shoulder.x).abs(), config.fallback_width);

    let mut total = config.base_score;
    let mut components = Vec::with_capacity(6);

    let head_ratio = (nose.x - mid.x).abs() / width;
    apply(
        &mut total,
        &mut components,
        Signal::HeadAlignment,
        &config.head_alignment,
        head_ratio * config.sensitivity,
    );

    // Image y grows downward, so a head raised above the shoulders is negative.
    let vertical_offset = nose.y - mid.y;
    let reference = width * config.forward_reference_factor;
    apply(
        &mut total,
        &mut components,
        Signal::ForwardHead,
        &config.forward_head,
        vertical_offset / reference,
    );

    let level_diff = (left_shoulder.y - right_shoulder.y).abs();
    apply(
        &mut total,
        &mut components,
        Signal::ShoulderLevel,
        &config.shoulder_level,
        level_diff * config.sensitivity,
    );

    let neck_ratio = (mid.y - nose.y) / width;
    apply(
        &mut total,
        &mut components,
        Signal::Upright,
        &config.upright,
        neck_ratio,
    );

    match shoulder_rounding(pose, left, right, mid.x, width, config.elbow_min_confidence) {
        Some(inward) => apply(
            &mut total,
            &mut components,
            Signal::ShoulderRounding,
            &config.shoulder_rounding,
            inward * config.sensitivity,
        ),
        None => components.push(Contribution {
            signal: Signal::ShoulderRounding,
            label: "Shoulder rounding not detectable (+0)".to_string(),
            points: 0,
        }),
    }

    let avg_confidence = pose.average_confidence();
    apply(
        &mut total,
        &mut components,
        Signal::DetectionQuality,
        &config.detection_quality,
        avg_confidence,
    );

    let score = total.clamp(i32::from(config.floor), i32::from(config.ceiling)) as u8;

    ScoreResult {
        score,
        category: config.cuts.categorize(score),
        components,
        details: DetailMetrics {
            head_alignment: percent(100.0 - head_ratio * 100.0),
            forward_head: percent(
                100.0 - vertical_offset.abs() / FORWARD_HEAD_DETAIL_SPAN * 100.0,
            ),
            shoulder_level: percent(100.0 - level_diff / SHOULDER_LEVEL_DETAIL_SPAN * 100.0),
            posture: percent(neck_ratio / UPRIGHT_DETAIL_IDEAL * 100.0),
            confidence: percent(avg_confidence * 100.0),
        },
        reason: None,
    }
}

fn apply(
    total: &mut i32,
    components: &mut Vec<Contribution>,
    signal: Signal,
    table: &TierTable,
    value: f64,
) {
    let tier = table.bucket(value);
    *total += tier.points;
    components.push(Contribution {
        signal,
        label: format!("{} ({:+})", tier.label, tier.points),
        points: tier.points,
    });
}

fn required_keypoints(pose: &Pose, min_confidence: f64) -> Option<[&Keypoint; 3]> {
    let mut found = [None; 3];
    for (slot, part) in found.iter_mut().zip(REQUIRED_PARTS) {
        let keypoint = pose.keypoint(part)?;
        // Negated so a NaN confidence is rejected too.
        if !(keypoint.confidence >= min_confidence) {
            return None;
        }
        *slot = Some(keypoint);
    }
    Some([found[0]?, found[1]?, found[2]?])
}

fn low_confidence(config: &ScoringConfig) -> ScoreResult {
    ScoreResult {
        score: config.sentinel_score,
        category: config.cuts.categorize(config.sentinel_score),
        components: vec![Contribution {
            signal: Signal::DetectionQuality,
            label: "Low confidence on head or shoulders".to_string(),
            points: 0,
        }],
        details: DetailMetrics::default(),
        reason: Some(ScoreReason::LowConfidence),
    }
}

fn effective_width(width: f64, fallback: f64) -> f64 {
    if width.is_finite() && width > f64::EPSILON {
        width
    } else {
        fallback
    }
}

/// Average inward drift of the confident elbows, as a fraction of shoulder
/// width. Positive means the elbow sits toward the body midline relative to
/// its shoulder, the 2-D signature of rounded shoulders.
fn shoulder_rounding(
    pose: &Pose,
    left_shoulder: &Keypoint,
    right_shoulder: &Keypoint,
    mid_x: f64,
    width: f64,
    min_confidence: f64,
) -> Option<f64> {
    let sides = [
        (BodyPart::LeftElbow, left_shoulder),
        (BodyPart::RightElbow, right_shoulder),
    ];

    let offsets: Vec<f64> = sides
        .iter()
        .filter_map(|(elbow_part, shoulder)| {
            let elbow = pose.keypoint(*elbow_part)?;
            if !(elbow.confidence >= min_confidence) || !elbow.position.is_plausible() {
                return None;
            }
            let toward_mid = (mid_x - shoulder.position.x).signum();
            Some((elbow.position.x - shoulder.position.x) * toward_mid / width)
        })
        .filter(|v| v.is_finite())
        .collect();

    if offsets.is_empty() {
        None
    } else {
        Some(offsets.iter().sum::<f64>() / offsets.len() as f64)
    }
}

fn percent(value: f64) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostureCategory;
    use crate::scoring::config::ScoringPreset;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn pose(points: &[(BodyPart, f64, f64, f64)]) -> Pose {
        Pose::new(
            points
                .iter()
                .map(|(part, x, y, c)| Keypoint::new(*part, *x, *y, *c))
                .collect(),
            Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap(),
        )
    }

    fn upright_pose() -> Pose {
        pose(&[
            (BodyPart::Nose, 100.0, 50.0, 0.9),
            (BodyPart::LeftShoulder, 70.0, 100.0, 0.9),
            (BodyPart::RightShoulder, 130.0, 100.0, 0.9),
        ])
    }

    #[test]
    fn centered_upright_pose_scores_high() {
        let result = score(&upright_pose());
        assert!(result.category >= PostureCategory::Good);
        assert!(result.contribution(Signal::HeadAlignment).unwrap().points > 0);
        assert!(result.contribution(Signal::ShoulderLevel).unwrap().points > 0);
        assert_eq!(result.details.head_alignment, 100);
        assert_eq!(result.details.shoulder_level, 100);
        assert!(result.reason.is_none());
    }

    #[test]
    fn extended_preset_also_rates_upright_pose_high() {
        let result = score_pose(&upright_pose(), &ScoringConfig::for_preset(ScoringPreset::Extended));
        assert!(result.category >= PostureCategory::Good);
        assert_eq!(result.contribution(Signal::HeadAlignment).unwrap().points, 15);
    }

    #[test]
    fn missing_left_shoulder_returns_sentinel() {
        let result = score(&pose(&[
            (BodyPart::Nose, 100.0, 50.0, 0.99),
            (BodyPart::RightShoulder, 130.0, 100.0, 0.99),
        ]));
        assert_eq!(result.score, 35);
        assert_eq!(result.category, PostureCategory::Poor);
        assert!(result.is_low_confidence());
    }

    #[test]
    fn unsure_nose_returns_sentinel() {
        let result = score(&pose(&[
            (BodyPart::Nose, 100.0, 50.0, 0.1),
            (BodyPart::LeftShoulder, 70.0, 100.0, 0.9),
            (BodyPart::RightShoulder, 130.0, 100.0, 0.9),
        ]));
        assert!(result.is_low_confidence());
    }

    #[test]
    fn coincident_shoulders_use_fallback_width() {
        let result = score(&pose(&[
            (BodyPart::Nose, 100.0, 50.0, 0.9),
            (BodyPart::LeftShoulder, 100.0, 100.0, 0.9),
            (BodyPart::RightShoulder, 100.0, 100.0, 0.9),
        ]));
        assert!((30..=100).contains(&result.score));
        assert_eq!(result.details.head_alignment, 100);
    }

    #[test]
    fn missing_elbows_are_flagged_not_fatal() {
        let result = score(&upright_pose());
        let rounding = result.contribution(Signal::ShoulderRounding).unwrap();
        assert_eq!(rounding.points, 0);
        assert!(rounding.label.contains("not detectable"));
    }

    #[test]
    fn elbows_drifting_inward_cost_points() {
        let mut open = upright_pose();
        open.keypoints.push(Keypoint::new(BodyPart::LeftElbow, 60.0, 160.0, 0.8));
        open.keypoints.push(Keypoint::new(BodyPart::RightElbow, 140.0, 160.0, 0.8));
        let mut rounded = upright_pose();
        rounded.keypoints.push(Keypoint::new(BodyPart::LeftElbow, 95.0, 160.0, 0.8));
        rounded.keypoints.push(Keypoint::new(BodyPart::RightElbow, 105.0, 160.0, 0.8));

        let config = ScoringConfig::extended();
        let open_points = score_pose(&open, &config)
            .contribution(Signal::ShoulderRounding)
            .unwrap()
            .points;
        let rounded_points = score_pose(&rounded, &config)
            .contribution(Signal::ShoulderRounding)
            .unwrap()
            .points;
        assert!(open_points > 0);
        assert!(rounded_points < 0);
    }

    #[test]
    fn slumped_forward_head_scores_poor() {
        let result = score(&pose(&[
            (BodyPart::Nose, 160.0, 130.0, 0.25),
            (BodyPart::LeftShoulder, 70.0, 100.0, 0.25),
            (BodyPart::RightShoulder, 130.0, 150.0, 0.25),
        ]));
        assert_eq!(result.category, PostureCategory::Poor);
        assert_eq!(result.score, 30);
    }

    fn arb_part() -> impl Strategy<Value = BodyPart> {
        prop_oneof![
            Just(BodyPart::Nose),
            Just(BodyPart::LeftShoulder),
            Just(BodyPart::RightShoulder),
            Just(BodyPart::LeftElbow),
            Just(BodyPart::RightElbow),
            Just(BodyPart::LeftHip),
        ]
    }

    fn arb_pose() -> impl Strategy<Value = Pose> {
        prop::collection::vec(
            (arb_part(), -1000.0f64..1000.0, -1000.0f64..1000.0, 0.0f64..1.0),
            0..10,
        )
        .prop_map(|points| pose(&points))
    }

    proptest! {
        #[test]
        fn score_stays_in_bounds(p in arb_pose()) {
            for config in [ScoringConfig::classic(), ScoringConfig::extended()] {
                let result = score_pose(&p, &config);
                prop_assert!((20..=100).contains(&result.score));
                prop_assert_eq!(result.category, config.cuts.categorize(result.score));
            }
        }

        #[test]
        fn scoring_is_idempotent(p in arb_pose()) {
            prop_assert_eq!(score(&p), score(&p));
        }

        #[test]
        fn no_left_shoulder_always_sentinel(p in arb_pose()) {
            let mut p = p;
            p.keypoints.retain(|k| k.part != BodyPart::LeftShoulder);
            prop_assert_eq!(score(&p).score, 35);
        }
    }
}
