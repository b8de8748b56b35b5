use std::path::Path;

use serde::{Deserialize, Serialize};

/// Weight and threshold configuration for the risk formula. The source
/// material disagreed on several of these values (attendance override at 60
/// vs 70, academic override at 40 vs 50), so they are policy rather than
/// constants; `Default` picks the most common variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub attendance_weight: f64,
    pub academic_weight: f64,
    pub behavior_weight: f64,
    pub engagement_weight: f64,

    pub critical_threshold: f64,
    pub high_threshold: f64,
    pub medium_threshold: f64,

    /// Attendance below this forces the level to at least High.
    pub attendance_override_below: f64,
    /// Score floor applied with the attendance override.
    pub attendance_override_floor: f64,
    /// Average score below this forces the level to at least High.
    pub academic_override_below: f64,
    pub academic_override_floor: f64,

    /// Score movement beyond this margin flips the trend off Stable.
    pub trend_margin: f64,

    /// Window, in days, of records feeding the feature vector.
    pub window_days: i64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            attendance_weight: 0.4,
            academic_weight: 0.4,
            behavior_weight: 0.1,
            engagement_weight: 0.1,
            critical_threshold: 80.0,
            high_threshold: 60.0,
            medium_threshold: 40.0,
            attendance_override_below: 60.0,
            attendance_override_floor: 85.0,
            academic_override_below: 40.0,
            academic_override_floor: 80.0,
            trend_margin: 5.0,
            window_days: 30,
        }
    }
}

impl RiskPolicy {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let policy: Self = serde_json::from_str(&raw)?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let policy = RiskPolicy::default();
        let sum = policy.attendance_weight
            + policy.academic_weight
            + policy.behavior_weight
            + policy.engagement_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let policy: RiskPolicy =
            serde_json::from_str(r#"{"attendance_override_below": 70.0}"#).unwrap();
        assert_eq!(policy.attendance_override_below, 70.0);
        assert_eq!(policy.academic_override_below, 40.0);
        assert_eq!(policy.window_days, 30);
    }
}
