use chrono::Utc;
use thiserror::Error;

use crate::models::{RiskAssessment, RiskFeatureVector, RiskLevel, Trend};
use crate::policy::RiskPolicy;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Rule-based weighted-risk scorer. Pure computation: takes a feature
/// snapshot and the previous assessment, returns a fresh assessment, never
/// touches storage.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    policy: RiskPolicy,
}

impl RiskScorer {
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    pub fn compute(
        &self,
        features: &RiskFeatureVector,
        previous: Option<&RiskAssessment>,
    ) -> Result<RiskAssessment, RiskError> {
        if !features.attendance_rate.is_finite() {
            return Err(RiskError::InvalidInput(format!(
                "attendance_rate is not a finite number: {}",
                features.attendance_rate
            )));
        }
        if !features.average_score.is_finite() {
            return Err(RiskError::InvalidInput(format!(
                "average_score is not a finite number: {}",
                features.average_score
            )));
        }

        // Out-of-range values are clamped, not rejected, to tolerate sparse
        // or noisy upstream data.
        let attendance_rate = features.attendance_rate.clamp(0.0, 100.0);
        let average_score = features.average_score.clamp(0.0, 100.0);
        let behavior_score = if features.behavior_score.is_finite() {
            features.behavior_score.clamp(1.0, 10.0)
        } else {
            crate::features::DEFAULT_BEHAVIOR_SCORE
        };
        let engagement_score = if features.engagement_score.is_finite() {
            features.engagement_score.clamp(0.0, 100.0)
        } else {
            crate::features::DEFAULT_ENGAGEMENT_SCORE
        };

        let p = &self.policy;
        let attendance_factor = round2((100.0 - attendance_rate).max(0.0) * p.attendance_weight);
        let academic_factor = round2((100.0 - average_score).max(0.0) * p.academic_weight);
        let behavior_factor = round2(((10.0 - behavior_score) * 2.0).max(0.0) * p.behavior_weight);
        let engagement_factor = round2((100.0 - engagement_score).max(0.0) * p.engagement_weight);

        let mut risk_score = round2(
            (attendance_factor + academic_factor + behavior_factor + engagement_factor)
                .clamp(0.0, 100.0),
        );

        let mut risk_level = if risk_score >= p.critical_threshold {
            RiskLevel::Critical
        } else if risk_score >= p.high_threshold {
            RiskLevel::High
        } else if risk_score >= p.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        // Critical overrides may only raise the level and score, so a severe
        // single-factor problem is never masked by otherwise-good averages.
        if attendance_rate < p.attendance_override_below {
            risk_level = risk_level.max(RiskLevel::High);
            risk_score = risk_score.max(p.attendance_override_floor).min(100.0);
        }
        if average_score < p.academic_override_below {
            risk_level = risk_level.max(RiskLevel::High);
            risk_score = risk_score.max(p.academic_override_floor).min(100.0);
        }

        let trend = match previous {
            Some(prev) if risk_score > prev.risk_score + p.trend_margin => Trend::Declining,
            Some(prev) if risk_score < prev.risk_score - p.trend_margin => Trend::Improving,
            Some(_) => Trend::Stable,
            None => Trend::Stable,
        };

        Ok(RiskAssessment {
            risk_score,
            risk_level,
            attendance_factor,
            academic_factor,
            behavior_factor,
            engagement_factor,
            trend,
            computed_at: Utc::now(),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(attendance: f64, score: f64, behavior: f64, engagement: f64) -> RiskFeatureVector {
        RiskFeatureVector {
            attendance_rate: attendance,
            average_score: score,
            behavior_score: behavior,
            engagement_score: engagement,
        }
    }

    fn scorer() -> RiskScorer {
        RiskScorer::default()
    }

    #[test]
    fn perfect_inputs_score_zero() {
        let result = scorer()
            .compute(&features(100.0, 100.0, 10.0, 100.0), None)
            .unwrap();
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.trend, Trend::Stable);
    }

    #[test]
    fn low_attendance_forces_at_least_high() {
        for attendance in [0.0, 25.0, 59.9] {
            let result = scorer()
                .compute(&features(attendance, 100.0, 10.0, 100.0), None)
                .unwrap();
            assert!(
                result.risk_level >= RiskLevel::High,
                "attendance {attendance} produced {:?}",
                result.risk_level
            );
            assert!(result.risk_score >= 85.0);
        }
    }

    #[test]
    fn low_average_score_forces_at_least_high() {
        let result = scorer()
            .compute(&features(100.0, 35.0, 10.0, 100.0), None)
            .unwrap();
        assert!(result.risk_level >= RiskLevel::High);
        assert!(result.risk_score >= 80.0);
    }

    #[test]
    fn score_is_monotone_in_attendance_and_academics() {
        let s = scorer();
        let mut last_by_attendance = f64::INFINITY;
        let mut last_by_score = f64::INFINITY;
        for step in 0..=20 {
            let value = step as f64 * 5.0;
            let a = s.compute(&features(value, 70.0, 7.0, 50.0), None).unwrap();
            let b = s.compute(&features(70.0, value, 7.0, 50.0), None).unwrap();
            assert!(a.risk_score <= last_by_attendance);
            assert!(b.risk_score <= last_by_score);
            last_by_attendance = a.risk_score;
            last_by_score = b.risk_score;
        }
    }

    #[test]
    fn identical_inputs_are_idempotent_modulo_timestamp() {
        let input = features(72.0, 64.0, 6.0, 55.0);
        let first = scorer().compute(&input, None).unwrap();
        let second = scorer().compute(&input, None).unwrap();
        assert_eq!(first.risk_score, second.risk_score);
        assert_eq!(first.risk_level, second.risk_level);
        assert_eq!(first.attendance_factor, second.attendance_factor);
        assert_eq!(first.academic_factor, second.academic_factor);
        assert_eq!(first.behavior_factor, second.behavior_factor);
        assert_eq!(first.engagement_factor, second.engagement_factor);
        assert_eq!(first.trend, second.trend);
    }

    #[test]
    fn rescoring_unchanged_features_is_stable() {
        let input = features(72.0, 64.0, 6.0, 55.0);
        let s = scorer();
        let first = s.compute(&input, None).unwrap();
        let second = s.compute(&input, Some(&first)).unwrap();
        assert_eq!(second.trend, Trend::Stable);
    }

    #[test]
    fn trend_tracks_score_movement_beyond_the_margin() {
        let s = scorer();
        let baseline = s.compute(&features(90.0, 90.0, 9.0, 90.0), None).unwrap();
        let worse = s
            .compute(&features(70.0, 70.0, 5.0, 40.0), Some(&baseline))
            .unwrap();
        assert_eq!(worse.trend, Trend::Declining);
        let better = s
            .compute(&features(95.0, 95.0, 10.0, 95.0), Some(&worse))
            .unwrap();
        assert_eq!(better.trend, Trend::Improving);
    }

    #[test]
    fn worst_case_inputs_stay_in_range() {
        let result = scorer()
            .compute(&features(0.0, 0.0, 1.0, 0.0), None)
            .unwrap();
        assert_eq!(result.risk_score, 91.8);
        assert_eq!(result.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn factor_sum_above_one_hundred_clamps() {
        let mut policy = RiskPolicy::default();
        policy.attendance_weight = 0.8;
        policy.academic_weight = 0.8;
        let s = RiskScorer::new(policy);
        let result = s.compute(&features(0.0, 0.0, 1.0, 0.0), None).unwrap();
        assert_eq!(result.risk_score, 100.0);
        assert_eq!(result.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn worked_scenario_matches_the_formula() {
        let result = scorer()
            .compute(&features(45.0, 55.0, 5.0, 40.0), None)
            .unwrap();
        assert_eq!(result.attendance_factor, 22.0);
        assert_eq!(result.academic_factor, 18.0);
        assert_eq!(result.behavior_factor, 1.0);
        assert_eq!(result.engagement_factor, 6.0);
        // Raw 47 would be Medium; attendance 45 < 60 overrides to High/85.
        assert_eq!(result.risk_score, 85.0);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn out_of_range_inputs_are_clamped_not_rejected() {
        let result = scorer()
            .compute(&features(130.0, 250.0, 14.0, -20.0), None)
            .unwrap();
        assert_eq!(result.attendance_factor, 0.0);
        assert_eq!(result.academic_factor, 0.0);
        assert_eq!(result.behavior_factor, 0.0);
        assert_eq!(result.engagement_factor, 10.0);
    }

    #[test]
    fn non_finite_required_inputs_are_rejected() {
        assert!(scorer()
            .compute(&features(f64::NAN, 80.0, 7.0, 50.0), None)
            .is_err());
        assert!(scorer()
            .compute(&features(80.0, f64::NEG_INFINITY, 7.0, 50.0), None)
            .is_err());
    }

    #[test]
    fn custom_policy_shifts_the_override() {
        let mut policy = RiskPolicy::default();
        policy.attendance_override_below = 70.0;
        let s = RiskScorer::new(policy);
        let result = s.compute(&features(65.0, 95.0, 9.0, 90.0), None).unwrap();
        assert!(result.risk_level >= RiskLevel::High);
    }
}
