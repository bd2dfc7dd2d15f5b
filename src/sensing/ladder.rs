use std::future::Future;

use crate::settings::ModelType;

use super::estimator::{
    Architecture, Frame, InferenceError, InferenceProfile, ModelLoader, ModelProfile,
    PoseEstimator,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Runs `attempt` over `profiles` in order and returns the first success
/// along with the profile that produced it.
pub async fn try_in_order<'a, P, T, F, Fut>(
    profiles: &'a [P],
    mut attempt: F,
) -> Result<(T, &'a P), InferenceError>
where
    F: FnMut(&'a P) -> Fut,
    Fut: Future<Output = Result<T, InferenceError>>,
{
    for (index, profile) in profiles.iter().enumerate() {
        match attempt(profile).await {
            Ok(value) => return Ok((value, profile)),
            Err(err) => {
                log_debug!("attempt {} of {} failed: {err}", index + 1, profiles.len());
            }
        }
    }

    Err(InferenceError::Exhausted {
        attempts: profiles.len(),
    })
}

/// Model variants in load order: the accurate ResNet first, then a finer
/// stride, then the light MobileNet.
pub fn model_ladder(preferred: ModelType) -> Vec<ModelProfile> {
    let mut ladder = vec![
        ModelProfile {
            architecture: Architecture::ResNet50,
            output_stride: 32,
            input_resolution: 257,
            quant_bytes: Some(2),
            multiplier: None,
        },
        ModelProfile {
            architecture: Architecture::ResNet50,
            output_stride: 16,
            input_resolution: 513,
            quant_bytes: Some(4),
            multiplier: None,
        },
        ModelProfile {
            architecture: Architecture::MobileNetV1,
            output_stride: 16,
            input_resolution: 513,
            quant_bytes: None,
            multiplier: Some(1.0),
        },
    ];

    let wanted = match preferred {
        ModelType::ResNet50 => Architecture::ResNet50,
        ModelType::MobileNetV1 => Architecture::MobileNetV1,
    };
    // Stable: keeps the relative order within each architecture.
    ladder.sort_by_key(|profile| profile.architecture != wanted);
    ladder
}

/// Loads the first model variant that succeeds.
pub async fn load_model<L: ModelLoader>(
    loader: &mut L,
    preferred: ModelType,
) -> Result<(L::Model, ModelProfile), InferenceError> {
    let ladder = model_ladder(preferred);
    for profile in &ladder {
        match loader.load(profile).await {
            Ok(model) => {
                log_info!(
                    "loaded {:?} model (stride {}, {}px)",
                    profile.architecture,
                    profile.output_stride,
                    profile.input_resolution
                );
                return Ok((model, *profile));
            }
            Err(err) => log_warn!("{:?} model load failed: {err}", profile.architecture),
        }
    }

    Err(InferenceError::ModelLoad(format!(
        "none of {} model variants could be loaded",
        ladder.len()
    )))
}

/// Primes the estimator with a blank frame. Failure only costs latency on
/// the first real frame, so it is logged and ignored.
pub async fn warm_up<E: PoseEstimator>(estimator: &E) {
    let frame = Frame::warm_up();
    match estimator.estimate(&frame, &InferenceProfile::warm_up()).await {
        Ok(_) => log_debug!("model warm-up complete"),
        Err(err) => log_warn!("model warm-up failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::estimator::inference_ladder;
    use std::cell::RefCell;

    #[tokio::test]
    async fn first_success_wins() {
        let ladder = inference_ladder();
        let seen = RefCell::new(Vec::new());
        let (value, profile) = try_in_order(&ladder, |profile| {
            seen.borrow_mut().push(profile.name);
            let ok = profile.name == "fast";
            async move {
                if ok {
                    Ok(7)
                } else {
                    Err(InferenceError::Failed("boom".into()))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(profile.name, "fast");
        assert_eq!(*seen.borrow(), vec!["high-accuracy", "fast"]);
    }

    #[tokio::test]
    async fn exhaustion_reports_attempt_count() {
        let ladder = inference_ladder();
        let result: Result<(u8, _), _> = try_in_order(&ladder, |_| async {
            Err(InferenceError::Failed("nope".into()))
        })
        .await;
        assert_eq!(
            result.unwrap_err(),
            InferenceError::Exhausted { attempts: 3 }
        );
    }

    #[test]
    fn preferred_architecture_moves_first() {
        let ladder = model_ladder(ModelType::MobileNetV1);
        assert_eq!(ladder[0].architecture, Architecture::MobileNetV1);
        assert_eq!(ladder[1].output_stride, 32);
        assert_eq!(ladder[2].output_stride, 16);

        let ladder = model_ladder(ModelType::ResNet50);
        assert_eq!(ladder[0].input_resolution, 257);
        assert_eq!(ladder[2].architecture, Architecture::MobileNetV1);
    }
}
