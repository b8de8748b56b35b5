use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Present" => Some(Self::Present),
            "Absent" => Some(Self::Absent),
            "Late" => Some(Self::Late),
            "Excused" => Some(Self::Excused),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
            Self::Late => "Late",
            Self::Excused => "Excused",
        }
    }
}

/// Immutable once recorded; belongs to exactly one student.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone)]
pub struct AcademicRecord {
    pub score: f64,
    pub max_score: f64,
    pub assessment_type: String,
    pub date: NaiveDate,
}

impl AcademicRecord {
    /// Rows violating `0 <= score <= max_score` (a zero or negative
    /// max_score in particular) produce a non-finite percentage, which the
    /// scorer later rejects as invalid input.
    pub fn percentage(&self) -> f64 {
        if self.max_score > 0.0 {
            (self.score / self.max_score) * 100.0
        } else {
            f64::NAN
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BehavioralSignal {
    pub behavior_score: f64,
    pub engagement_score: f64,
}

/// Feature availability is a type-level fact: students either have only the
/// attendance/academic history (Basic) or carry behavioral tracking too.
#[derive(Debug, Clone, Copy)]
pub enum StudentProfile {
    Basic,
    Extended(BehavioralSignal),
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub cohort: String,
}

/// Derived fresh from the last-N-days window; never stored.
#[derive(Debug, Clone, Copy)]
pub struct RiskFeatureVector {
    pub attendance_rate: f64,
    pub average_score: f64,
    pub behavior_score: f64,
    pub engagement_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            "Critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Improving" => Some(Self::Improving),
            "Stable" => Some(Self::Stable),
            "Declining" => Some(Self::Declining),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "Improving",
            Self::Stable => "Stable",
            Self::Declining => "Declining",
        }
    }
}

/// One current assessment per student, overwritten on every recompute. The
/// previous value only survives long enough to derive `trend` and to decide
/// whether an escalation alert fires.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub attendance_factor: f64,
    pub academic_factor: f64,
    pub behavior_factor: f64,
    pub engagement_factor: f64,
    pub trend: Trend,
    pub computed_at: DateTime<Utc>,
}
