use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    AcademicRecord, AttendanceRecord, RiskAssessment, StudentProfile, StudentRecord,
};

/// Read side of an alert row, for reporting.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub student_name: String,
    pub student_email: String,
    pub risk_level: crate::models::RiskLevel,
    pub risk_score: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Persistence capabilities the risk pipeline needs. Injected into callers
/// so the scorer stays pure and batch logic is testable without Postgres.
pub trait DataStore {
    async fn student_ids(&self) -> anyhow::Result<Vec<Uuid>>;
    async fn find_student(&self, id: Uuid) -> anyhow::Result<Option<StudentRecord>>;
    async fn recent_attendance(
        &self,
        student_id: Uuid,
        since: NaiveDate,
    ) -> anyhow::Result<Vec<AttendanceRecord>>;
    async fn recent_academics(
        &self,
        student_id: Uuid,
        since: NaiveDate,
    ) -> anyhow::Result<Vec<AcademicRecord>>;
    async fn student_profile(&self, student_id: Uuid) -> anyhow::Result<StudentProfile>;
    async fn current_assessment(&self, student_id: Uuid)
        -> anyhow::Result<Option<RiskAssessment>>;
    async fn upsert_assessment(
        &self,
        student_id: Uuid,
        assessment: &RiskAssessment,
    ) -> anyhow::Result<()>;
    async fn record_alert(
        &self,
        student: &StudentRecord,
        assessment: &RiskAssessment,
    ) -> anyhow::Result<()>;
    async fn all_assessments(&self) -> anyhow::Result<Vec<(StudentRecord, RiskAssessment)>>;
    async fn recent_alerts(&self, limit: usize) -> anyhow::Result<Vec<AlertRecord>>;
}
