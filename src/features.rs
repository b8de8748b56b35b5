use chrono::{Duration, NaiveDate, Utc};

use crate::models::{
    AcademicRecord, AttendanceRecord, AttendanceStatus, RiskFeatureVector, StudentProfile,
};

pub const DEFAULT_BEHAVIOR_SCORE: f64 = 7.0;
pub const DEFAULT_ENGAGEMENT_SCORE: f64 = 50.0;

pub fn cutoff_date(window_days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(window_days.max(1))
}

/// Effective attendance rate over the window. Late counts as half present
/// and Excused days drop out of the denominator. With no countable days the
/// rate defaults to 100: absence of evidence is not evidence of risk.
pub fn attendance_rate(records: &[AttendanceRecord]) -> f64 {
    let mut counted = 0usize;
    let mut effective_present = 0.0f64;

    for record in records {
        match record.status {
            AttendanceStatus::Present => {
                counted += 1;
                effective_present += 1.0;
            }
            AttendanceStatus::Late => {
                counted += 1;
                effective_present += 0.5;
            }
            AttendanceStatus::Absent => counted += 1,
            AttendanceStatus::Excused => {}
        }
    }

    if counted == 0 {
        100.0
    } else {
        (effective_present / counted as f64) * 100.0
    }
}

/// Mean assessment percentage over the window, defaulting to 100 when the
/// student has no graded work. A malformed row (max_score of zero) poisons
/// the mean with NaN on purpose so the scorer rejects it.
pub fn average_score(records: &[AcademicRecord]) -> f64 {
    if records.is_empty() {
        return 100.0;
    }

    let total: f64 = records.iter().map(|r| r.percentage()).sum();
    total / records.len() as f64
}

pub fn extract(
    attendance: &[AttendanceRecord],
    academics: &[AcademicRecord],
    profile: StudentProfile,
) -> RiskFeatureVector {
    let (behavior_score, engagement_score) = match profile {
        StudentProfile::Basic => (DEFAULT_BEHAVIOR_SCORE, DEFAULT_ENGAGEMENT_SCORE),
        StudentProfile::Extended(signal) => (signal.behavior_score, signal.engagement_score),
    };

    RiskFeatureVector {
        attendance_rate: attendance_rate(attendance),
        average_score: average_score(academics),
        behavior_score,
        engagement_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BehavioralSignal;
    use chrono::Utc;

    fn day(days_ago: i64) -> chrono::NaiveDate {
        Utc::now().date_naive() - Duration::days(days_ago)
    }

    fn attendance(status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            date: day(1),
            status,
        }
    }

    #[test]
    fn empty_window_assumes_full_attendance() {
        assert_eq!(attendance_rate(&[]), 100.0);
        assert_eq!(average_score(&[]), 100.0);
    }

    #[test]
    fn late_counts_half_and_excused_is_skipped() {
        let records = vec![
            attendance(AttendanceStatus::Present),
            attendance(AttendanceStatus::Late),
            attendance(AttendanceStatus::Absent),
            attendance(AttendanceStatus::Excused),
        ];
        // 1.5 effective present over 3 counted days
        assert!((attendance_rate(&records) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn average_score_is_mean_of_percentages() {
        let records = vec![
            AcademicRecord {
                score: 80.0,
                max_score: 100.0,
                assessment_type: "exam".to_string(),
                date: day(2),
            },
            AcademicRecord {
                score: 30.0,
                max_score: 50.0,
                assessment_type: "quiz".to_string(),
                date: day(4),
            },
        ];
        assert!((average_score(&records) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn zero_max_score_poisons_the_mean() {
        let records = vec![AcademicRecord {
            score: 10.0,
            max_score: 0.0,
            assessment_type: "quiz".to_string(),
            date: day(1),
        }];
        assert!(average_score(&records).is_nan());
    }

    #[test]
    fn basic_profile_uses_defaults() {
        let features = extract(&[], &[], StudentProfile::Basic);
        assert_eq!(features.behavior_score, DEFAULT_BEHAVIOR_SCORE);
        assert_eq!(features.engagement_score, DEFAULT_ENGAGEMENT_SCORE);
    }

    #[test]
    fn extended_profile_carries_the_signal() {
        let features = extract(
            &[],
            &[],
            StudentProfile::Extended(BehavioralSignal {
                behavior_score: 4.0,
                engagement_score: 25.0,
            }),
        );
        assert_eq!(features.behavior_score, 4.0);
        assert_eq!(features.engagement_score, 25.0);
    }
}
