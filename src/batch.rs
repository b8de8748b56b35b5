use uuid::Uuid;

use crate::classifier::{classifier_features, DropoutClassifier};
use crate::features;
use crate::models::RiskLevel;
use crate::risk::RiskScorer;
use crate::store::DataStore;

/// Result of a batch run. Failures are collected, never fatal: a broken
/// student row must not stop the rest of the cohort from being scored.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub updated_count: usize,
    pub failed_count: usize,
    pub alerts_sent: usize,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn fully_succeeded(&self) -> bool {
        self.failed_count == 0
    }
}

/// Recompute and persist risk for one student or the whole roster.
/// Sequential by design; per-student errors are recorded and skipped.
pub async fn update_risk_scores<S: DataStore>(
    store: &S,
    scorer: &RiskScorer,
    classifier: Option<&DropoutClassifier>,
    student_id: Option<Uuid>,
) -> anyhow::Result<BatchOutcome> {
    let ids = match student_id {
        Some(id) => vec![id],
        None => store.student_ids().await?,
    };

    let mut outcome = BatchOutcome::default();

    for id in ids {
        match score_student(store, scorer, classifier, id).await {
            Ok(alerted) => {
                outcome.updated_count += 1;
                if alerted {
                    outcome.alerts_sent += 1;
                }
            }
            Err(err) => {
                log::warn!("risk update failed for student {id}: {err:#}");
                outcome.failed_count += 1;
                outcome.errors.push(format!("{id}: {err:#}"));
            }
        }
    }

    Ok(outcome)
}

async fn score_student<S: DataStore>(
    store: &S,
    scorer: &RiskScorer,
    classifier: Option<&DropoutClassifier>,
    id: Uuid,
) -> anyhow::Result<bool> {
    let student = store
        .find_student(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("student not found"))?;

    let since = features::cutoff_date(scorer.policy().window_days);
    let attendance = store.recent_attendance(id, since).await?;
    let academics = store.recent_academics(id, since).await?;
    let profile = store.student_profile(id).await?;

    let vector = features::extract(&attendance, &academics, profile);
    let previous = store.current_assessment(id).await?;
    let assessment = scorer.compute(&vector, previous.as_ref())?;

    if let Some(model) = classifier {
        let prediction = model.predict(&classifier_features(&vector, &assessment));
        log::info!(
            "classifier for {}: p(at-risk) {:.3}, confidence {:.1}",
            student.email,
            prediction.probability_at_risk,
            prediction.confidence
        );
    }

    store.upsert_assessment(id, &assessment).await?;

    let alerted = should_alert(previous.as_ref().map(|p| p.risk_level), &assessment);
    if alerted {
        store.record_alert(&student, &assessment).await?;
    }

    log::debug!(
        "scored {}: {} ({:.2}, {})",
        student.email,
        assessment.risk_level.as_str(),
        assessment.risk_score,
        assessment.trend.as_str()
    );

    Ok(alerted)
}

/// Alert only on escalation into High/Critical, so a student sitting at a
/// stable High does not page staff on every batch run.
fn should_alert(
    previous_level: Option<RiskLevel>,
    assessment: &crate::models::RiskAssessment,
) -> bool {
    assessment.risk_level >= RiskLevel::High
        && previous_level.map_or(true, |prev| prev < assessment.risk_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AcademicRecord, AttendanceRecord, AttendanceStatus, StudentProfile, StudentRecord,
    };
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, Utc};

    fn student(name: &str) -> StudentRecord {
        StudentRecord {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: format!("{}@eduguard.test", name.to_lowercase().replace(' ', ".")),
            cohort: "2026".to_string(),
        }
    }

    fn recent_date(days_ago: i64) -> chrono::NaiveDate {
        Utc::now().date_naive() - Duration::days(days_ago)
    }

    fn attendance_run(present: usize, absent: usize) -> Vec<AttendanceRecord> {
        let mut records = Vec::new();
        for i in 0..present {
            records.push(AttendanceRecord {
                date: recent_date(i as i64 + 1),
                status: AttendanceStatus::Present,
            });
        }
        for i in 0..absent {
            records.push(AttendanceRecord {
                date: recent_date(i as i64 + 1),
                status: AttendanceStatus::Absent,
            });
        }
        records
    }

    fn exam(score: f64, max_score: f64) -> AcademicRecord {
        AcademicRecord {
            score,
            max_score,
            assessment_type: "exam".to_string(),
            date: recent_date(3),
        }
    }

    #[tokio::test]
    async fn malformed_student_is_skipped_not_fatal() {
        let healthy_a = student("Avery Lee");
        let healthy_b = student("Jules Moreno");
        let broken = student("Kiara Patel");
        let broken_id = broken.id;

        let mut store = MemoryStore::default();
        store
            .attendance
            .insert(healthy_a.id, attendance_run(9, 1));
        store.academics.insert(healthy_a.id, vec![exam(85.0, 100.0)]);
        store
            .attendance
            .insert(healthy_b.id, attendance_run(8, 2));
        store.academics.insert(healthy_b.id, vec![exam(70.0, 100.0)]);
        // max_score 0 poisons the average and trips InvalidInput
        store.academics.insert(broken.id, vec![exam(10.0, 0.0)]);
        store.students = vec![healthy_a, healthy_b, broken];

        let outcome = update_risk_scores(&store, &RiskScorer::default(), None, None)
            .await
            .unwrap();

        assert_eq!(outcome.updated_count, 2);
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with(&broken_id.to_string()));
        assert!(!outcome.fully_succeeded());
    }

    #[tokio::test]
    async fn escalation_into_high_records_one_alert() {
        let at_risk = student("Sam Okafor");
        let id = at_risk.id;

        let mut store = MemoryStore::default();
        // 3 of 10 days present: attendance 30, well under the override
        store.attendance.insert(id, attendance_run(3, 7));
        store.academics.insert(id, vec![exam(45.0, 100.0)]);
        store.students = vec![at_risk];

        let scorer = RiskScorer::default();
        let first = update_risk_scores(&store, &scorer, None, Some(id))
            .await
            .unwrap();
        assert_eq!(first.alerts_sent, 1);

        // Same data, same level: no second alert, trend settles to Stable.
        let second = update_risk_scores(&store, &scorer, None, Some(id))
            .await
            .unwrap();
        assert_eq!(second.alerts_sent, 0);
        let assessment = store.current_assessment(id).await.unwrap().unwrap();
        assert_eq!(assessment.trend, crate::models::Trend::Stable);
        assert_eq!(store.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rise_from_stored_medium_to_high_alerts() {
        let slipping = student("Lena Fischer");
        let id = slipping.id;

        let mut store = MemoryStore::default();
        // Data that scores High via the attendance override
        store.attendance.insert(id, attendance_run(3, 7));
        store.academics.insert(id, vec![exam(45.0, 100.0)]);
        store.students = vec![slipping];

        // Last run left the student at Medium
        let previous = crate::models::RiskAssessment {
            risk_score: 45.0,
            risk_level: crate::models::RiskLevel::Medium,
            attendance_factor: 20.0,
            academic_factor: 19.4,
            behavior_factor: 0.6,
            engagement_factor: 5.0,
            trend: crate::models::Trend::Stable,
            computed_at: Utc::now(),
        };
        store.assessments.lock().unwrap().insert(id, previous);

        let outcome = update_risk_scores(&store, &RiskScorer::default(), None, Some(id))
            .await
            .unwrap();
        assert_eq!(outcome.alerts_sent, 1);

        let current = store.current_assessment(id).await.unwrap().unwrap();
        assert_eq!(current.risk_level, crate::models::RiskLevel::High);
        assert_eq!(current.trend, crate::models::Trend::Declining);
    }

    #[tokio::test]
    async fn student_with_no_records_scores_low() {
        let fresh = student("Noor Haddad");
        let id = fresh.id;
        let mut store = MemoryStore::default();
        store.students = vec![fresh];
        store.profiles.insert(id, StudentProfile::Basic);

        let outcome = update_risk_scores(&store, &RiskScorer::default(), None, None)
            .await
            .unwrap();
        assert_eq!(outcome.updated_count, 1);
        assert_eq!(outcome.alerts_sent, 0);

        let assessment = store.current_assessment(id).await.unwrap().unwrap();
        assert_eq!(assessment.risk_level, crate::models::RiskLevel::Low);
        // behavior default 7 and engagement default 50 leave a small residue
        assert!((assessment.risk_score - 5.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_explicit_student_is_a_recorded_failure() {
        let store = MemoryStore::default();
        let outcome =
            update_risk_scores(&store, &RiskScorer::default(), None, Some(Uuid::new_v4()))
                .await
                .unwrap();
        assert_eq!(outcome.updated_count, 0);
        assert_eq!(outcome.failed_count, 1);
    }
}
