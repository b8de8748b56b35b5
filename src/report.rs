use std::fmt::Write;

use crate::models::{RiskAssessment, RiskLevel, StudentRecord};
use crate::store::AlertRecord;

pub fn level_mix(assessments: &[(StudentRecord, RiskAssessment)]) -> Vec<(RiskLevel, usize)> {
    let levels = [
        RiskLevel::Critical,
        RiskLevel::High,
        RiskLevel::Medium,
        RiskLevel::Low,
    ];
    levels
        .into_iter()
        .map(|level| {
            let count = assessments
                .iter()
                .filter(|(_, a)| a.risk_level == level)
                .count();
            (level, count)
        })
        .collect()
}

pub fn build_report(
    assessments: &[(StudentRecord, RiskAssessment)],
    alerts: &[AlertRecord],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Dropout Risk Report");
    let _ = writeln!(
        output,
        "Generated {} across {} assessed students",
        chrono::Utc::now().format("%Y-%m-%d"),
        assessments.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Level Mix");

    if assessments.is_empty() {
        let _ = writeln!(output, "No students have been assessed yet.");
    } else {
        for (level, count) in level_mix(assessments) {
            let _ = writeln!(output, "- {}: {} students", level.as_str(), count);
        }
    }

    let mut ranked = assessments.to_vec();
    ranked.sort_by(|a, b| {
        b.1.risk_score
            .partial_cmp(&a.1.risk_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    if ranked.is_empty() {
        let _ = writeln!(output, "No assessments available.");
    } else {
        for (student, assessment) in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) score {:.2} [{}], trend {}",
                student.full_name,
                student.email,
                student.cohort,
                assessment.risk_score,
                assessment.risk_level.as_str(),
                assessment.trend.as_str()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Escalations");

    if alerts.is_empty() {
        let _ = writeln!(output, "No escalation alerts in this window.");
    } else {
        for alert in alerts.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) escalated to {} at score {:.2} on {}",
                alert.student_name,
                alert.student_email,
                alert.risk_level.as_str(),
                alert.risk_score,
                alert.created_at.format("%Y-%m-%d")
            );
        }
    }

    output
}
