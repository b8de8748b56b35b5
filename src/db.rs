use chrono::{Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AcademicRecord, AttendanceRecord, AttendanceStatus, BehavioralSignal, RiskAssessment,
    RiskLevel, StudentProfile, StudentRecord, Trend,
};
use crate::store::{AlertRecord, DataStore};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_db(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn upsert_student(
        &self,
        full_name: &str,
        email: &str,
        cohort: &str,
    ) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO eduguard.students (id, full_name, email, cohort)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, cohort = EXCLUDED.cohort
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(full_name)
        .bind(email)
        .bind(cohort)
        .fetch_one(&self.pool)
        .await?
        .get("id");
        Ok(id)
    }

    pub async fn seed(&self) -> anyhow::Result<()> {
        let today = Utc::now().date_naive();
        let roster = [
            ("Avery Lee", "avery.lee@eduguard.edu", "2026"),
            ("Jules Moreno", "jules.moreno@eduguard.edu", "2025"),
            ("Kiara Patel", "kiara.patel@eduguard.edu", "2026"),
        ];

        let mut ids = Vec::new();
        for (name, email, cohort) in roster {
            ids.push(self.upsert_student(name, email, cohort).await?);
        }

        // Avery: solid. Jules: slipping grades. Kiara: attendance collapse.
        let attendance_plans: [&[(i64, AttendanceStatus)]; 3] = [
            &[
                (1, AttendanceStatus::Present),
                (2, AttendanceStatus::Present),
                (3, AttendanceStatus::Late),
                (5, AttendanceStatus::Present),
            ],
            &[
                (1, AttendanceStatus::Present),
                (2, AttendanceStatus::Absent),
                (4, AttendanceStatus::Present),
                (6, AttendanceStatus::Excused),
            ],
            &[
                (1, AttendanceStatus::Absent),
                (2, AttendanceStatus::Absent),
                (3, AttendanceStatus::Absent),
                (5, AttendanceStatus::Present),
            ],
        ];

        for (student_idx, plan) in attendance_plans.iter().enumerate() {
            for (day_offset, status) in plan.iter() {
                sqlx::query(
                    r#"
                    INSERT INTO eduguard.attendance (id, student_id, date, status, source_key)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (source_key) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(ids[student_idx])
                .bind(today - Duration::days(*day_offset))
                .bind(status.as_str())
                .bind(format!("seed-att-{student_idx}-{day_offset}"))
                .execute(&self.pool)
                .await?;
            }
        }

        let academic_plans: [&[(i64, f64, f64, &str)]; 3] = [
            &[(4, 88.0, 100.0, "exam"), (10, 42.0, 50.0, "quiz")],
            &[(3, 52.0, 100.0, "exam"), (9, 18.0, 50.0, "quiz")],
            &[(6, 61.0, 100.0, "exam")],
        ];

        for (student_idx, plan) in academic_plans.iter().enumerate() {
            for (day_offset, score, max_score, kind) in plan.iter() {
                sqlx::query(
                    r#"
                    INSERT INTO eduguard.academic_records
                    (id, student_id, score, max_score, assessment_type, date, source_key)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (source_key) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(ids[student_idx])
                .bind(score)
                .bind(max_score)
                .bind(kind)
                .bind(today - Duration::days(*day_offset))
                .bind(format!("seed-acad-{student_idx}-{day_offset}"))
                .execute(&self.pool)
                .await?;
            }
        }

        // Only Kiara has behavioral tracking enabled.
        sqlx::query(
            r#"
            INSERT INTO eduguard.behavioral_signals
            (student_id, behavior_score, engagement_score, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (student_id) DO UPDATE
            SET behavior_score = EXCLUDED.behavior_score,
                engagement_score = EXCLUDED.engagement_score,
                updated_at = now()
            "#,
        )
        .bind(ids[2])
        .bind(4.0f64)
        .bind(30.0f64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn import_attendance_csv(&self, csv_path: &std::path::Path) -> anyhow::Result<usize> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            full_name: String,
            email: String,
            cohort: String,
            date: NaiveDate,
            status: String,
            source_key: Option<String>,
        }

        let mut reader = csv::Reader::from_path(csv_path)?;
        let mut inserted = 0usize;

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            let Some(status) = AttendanceStatus::parse(&row.status) else {
                log::warn!("skipping {}: unknown attendance status {:?}", row.email, row.status);
                continue;
            };

            let student_id = self
                .upsert_student(&row.full_name, &row.email, &row.cohort)
                .await?;
            let source_key = row
                .source_key
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

            let result = sqlx::query(
                r#"
                INSERT INTO eduguard.attendance (id, student_id, date, status, source_key)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(student_id)
            .bind(row.date)
            .bind(status.as_str())
            .bind(source_key)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    pub async fn import_academics_csv(&self, csv_path: &std::path::Path) -> anyhow::Result<usize> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            full_name: String,
            email: String,
            cohort: String,
            score: f64,
            max_score: f64,
            assessment_type: String,
            date: NaiveDate,
            source_key: Option<String>,
        }

        let mut reader = csv::Reader::from_path(csv_path)?;
        let mut inserted = 0usize;

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            if !academic_row_valid(row.score, row.max_score) {
                log::warn!(
                    "skipping {}: score {} out of range for max {}",
                    row.email,
                    row.score,
                    row.max_score
                );
                continue;
            }

            let student_id = self
                .upsert_student(&row.full_name, &row.email, &row.cohort)
                .await?;
            let source_key = row
                .source_key
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

            let result = sqlx::query(
                r#"
                INSERT INTO eduguard.academic_records
                (id, student_id, score, max_score, assessment_type, date, source_key)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(student_id)
            .bind(row.score)
            .bind(row.max_score)
            .bind(&row.assessment_type)
            .bind(row.date)
            .bind(source_key)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        Ok(inserted)
    }
}

/// A graded row must have a positive max_score: a zero-point assessment
/// would make the percentage non-finite and wedge the student's batch runs
/// on invalid input.
fn academic_row_valid(score: f64, max_score: f64) -> bool {
    max_score > 0.0 && score >= 0.0 && score <= max_score
}

fn assessment_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<RiskAssessment> {
    let level: String = row.get("risk_level");
    let trend: String = row.get("trend");
    Ok(RiskAssessment {
        risk_score: row.get("risk_score"),
        risk_level: RiskLevel::parse(&level)
            .ok_or_else(|| anyhow::anyhow!("unknown risk level {level:?}"))?,
        attendance_factor: row.get("attendance_factor"),
        academic_factor: row.get("academic_factor"),
        behavior_factor: row.get("behavior_factor"),
        engagement_factor: row.get("engagement_factor"),
        trend: Trend::parse(&trend).ok_or_else(|| anyhow::anyhow!("unknown trend {trend:?}"))?,
        computed_at: row.get("computed_at"),
    })
}

impl DataStore for PgStore {
    async fn student_ids(&self) -> anyhow::Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM eduguard.students ORDER BY full_name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn find_student(&self, id: Uuid) -> anyhow::Result<Option<StudentRecord>> {
        let row = sqlx::query(
            "SELECT id, full_name, email, cohort FROM eduguard.students WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| StudentRecord {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            cohort: row.get("cohort"),
        }))
    }

    async fn recent_attendance(
        &self,
        student_id: Uuid,
        since: NaiveDate,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query(
            "SELECT date, status FROM eduguard.attendance \
             WHERE student_id = $1 AND date >= $2 ORDER BY date",
        )
        .bind(student_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            records.push(AttendanceRecord {
                date: row.get("date"),
                status: AttendanceStatus::parse(&status)
                    .ok_or_else(|| anyhow::anyhow!("unknown attendance status {status:?}"))?,
            });
        }
        Ok(records)
    }

    async fn recent_academics(
        &self,
        student_id: Uuid,
        since: NaiveDate,
    ) -> anyhow::Result<Vec<AcademicRecord>> {
        let rows = sqlx::query(
            "SELECT score, max_score, assessment_type, date FROM eduguard.academic_records \
             WHERE student_id = $1 AND date >= $2 ORDER BY date",
        )
        .bind(student_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AcademicRecord {
                score: row.get("score"),
                max_score: row.get("max_score"),
                assessment_type: row.get("assessment_type"),
                date: row.get("date"),
            })
            .collect())
    }

    async fn student_profile(&self, student_id: Uuid) -> anyhow::Result<StudentProfile> {
        let row = sqlx::query(
            "SELECT behavior_score, engagement_score FROM eduguard.behavioral_signals \
             WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => StudentProfile::Extended(BehavioralSignal {
                behavior_score: row.get("behavior_score"),
                engagement_score: row.get("engagement_score"),
            }),
            None => StudentProfile::Basic,
        })
    }

    async fn current_assessment(
        &self,
        student_id: Uuid,
    ) -> anyhow::Result<Option<RiskAssessment>> {
        let row = sqlx::query(
            "SELECT risk_score, risk_level, attendance_factor, academic_factor, \
             behavior_factor, engagement_factor, trend, computed_at \
             FROM eduguard.risk_assessments WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(assessment_from_row).transpose()
    }

    async fn upsert_assessment(
        &self,
        student_id: Uuid,
        assessment: &RiskAssessment,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO eduguard.risk_assessments
            (student_id, risk_score, risk_level, attendance_factor, academic_factor,
             behavior_factor, engagement_factor, trend, computed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (student_id) DO UPDATE
            SET risk_score = EXCLUDED.risk_score,
                risk_level = EXCLUDED.risk_level,
                attendance_factor = EXCLUDED.attendance_factor,
                academic_factor = EXCLUDED.academic_factor,
                behavior_factor = EXCLUDED.behavior_factor,
                engagement_factor = EXCLUDED.engagement_factor,
                trend = EXCLUDED.trend,
                computed_at = EXCLUDED.computed_at
            "#,
        )
        .bind(student_id)
        .bind(assessment.risk_score)
        .bind(assessment.risk_level.as_str())
        .bind(assessment.attendance_factor)
        .bind(assessment.academic_factor)
        .bind(assessment.behavior_factor)
        .bind(assessment.engagement_factor)
        .bind(assessment.trend.as_str())
        .bind(assessment.computed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_alert(
        &self,
        student: &StudentRecord,
        assessment: &RiskAssessment,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO eduguard.alerts (id, student_id, risk_level, risk_score, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student.id)
        .bind(assessment.risk_level.as_str())
        .bind(assessment.risk_score)
        .bind(assessment.computed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all_assessments(&self) -> anyhow::Result<Vec<(StudentRecord, RiskAssessment)>> {
        let rows = sqlx::query(
            "SELECT s.id, s.full_name, s.email, s.cohort, \
             r.risk_score, r.risk_level, r.attendance_factor, r.academic_factor, \
             r.behavior_factor, r.engagement_factor, r.trend, r.computed_at \
             FROM eduguard.risk_assessments r \
             JOIN eduguard.students s ON s.id = r.student_id \
             ORDER BY r.risk_score DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let student = StudentRecord {
                id: row.get("id"),
                full_name: row.get("full_name"),
                email: row.get("email"),
                cohort: row.get("cohort"),
            };
            results.push((student, assessment_from_row(&row)?));
        }
        Ok(results)
    }

    async fn recent_alerts(&self, limit: usize) -> anyhow::Result<Vec<AlertRecord>> {
        let rows = sqlx::query(
            "SELECT s.full_name, s.email, a.risk_level, a.risk_score, a.created_at \
             FROM eduguard.alerts a \
             JOIN eduguard.students s ON s.id = a.student_id \
             ORDER BY a.created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut alerts = Vec::with_capacity(rows.len());
        for row in rows {
            let level: String = row.get("risk_level");
            alerts.push(AlertRecord {
                student_name: row.get("full_name"),
                student_email: row.get("email"),
                risk_level: RiskLevel::parse(&level)
                    .ok_or_else(|| anyhow::anyhow!("unknown risk level {level:?}"))?,
                risk_score: row.get("risk_score"),
                created_at: row.get("created_at"),
            });
        }
        Ok(alerts)
    }
}
