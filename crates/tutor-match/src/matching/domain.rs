use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::windows::WindowStats;

/// Identifier wrapper for tutors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TutorId(pub String);

/// Identifier wrapper for students.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

/// Identifier wrapper for tutoring sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for TutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tutor demographics and teaching preferences consumed read-only by scoring.
///
/// Pace, communication style, and confidence are 1-5 scales; any of the
/// optional attributes may be absent and scoring substitutes explicit
/// defaults for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorProfile {
    pub id: TutorId,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub age: Option<u8>,
    pub teaching_style: Option<String>,
    pub preferred_pace: Option<u8>,
    pub communication_style: Option<u8>,
    pub confidence_level: Option<u8>,
    pub experience_years: Option<u8>,
}

/// Student demographics and matching preferences. Created once, rarely
/// mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentId,
    pub name: String,
    pub age: Option<u8>,
    pub preferred_teaching_style: Option<String>,
    pub preferred_pace: Option<u8>,
    pub communication_style_preference: Option<u8>,
    pub urgency_level: Option<u8>,
    pub previous_tutoring_experience: u32,
    pub previous_satisfaction: Option<u8>,
}

/// Terminal state of a scheduled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Rescheduled,
    NoShow,
}

impl SessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SessionStatus::Completed => "completed",
            SessionStatus::Rescheduled => "rescheduled",
            SessionStatus::NoShow => "no_show",
        }
    }
}

/// A single tutoring session as recorded by the scheduling system.
///
/// `completed_time` is only present when the status is `Completed`, and is
/// never before `scheduled_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub tutor_id: TutorId,
    pub student_id: StudentId,
    pub scheduled_time: DateTime<Utc>,
    pub completed_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub duration_minutes: Option<u32>,
}

/// Which party asked to move a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleInitiator {
    Tutor,
    Student,
}

/// Reschedule detail attached 1:1 to a session whose status is
/// `Rescheduled`. `new_time`, when present, is strictly after
/// `original_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleRecord {
    pub session_id: SessionId,
    pub initiator: RescheduleInitiator,
    pub original_time: DateTime<Utc>,
    pub new_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

impl RescheduleRecord {
    /// Lead time between the cancellation and the session it moved.
    /// Negative when the cancellation arrived after the scheduled start.
    pub fn hours_before_session(&self) -> f64 {
        let lead = self.original_time - self.cancelled_at;
        lead.num_minutes() as f64 / 60.0
    }
}

/// Derived per-tutor risk record, recomputed atomically on every update.
///
/// This is a cached artifact: it can always be rebuilt from session and
/// reschedule history, so losing it degrades latency, not correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorRiskSummary {
    pub tutor_id: TutorId,
    pub reschedule_rate_7d: f64,
    pub reschedule_rate_30d: f64,
    pub reschedule_rate_90d: f64,
    pub total_sessions_7d: u32,
    pub total_sessions_30d: u32,
    pub total_sessions_90d: u32,
    pub tutor_reschedules_7d: u32,
    pub tutor_reschedules_30d: u32,
    pub tutor_reschedules_90d: u32,
    pub is_high_risk: bool,
    pub risk_threshold: f64,
    pub last_calculated_at: DateTime<Utc>,
}

impl TutorRiskSummary {
    /// Builds a summary from freshly computed window statistics.
    ///
    /// `is_high_risk` is derived here and nowhere else: true exactly when at
    /// least one window rate strictly exceeds the threshold.
    pub fn from_windows(
        tutor_id: TutorId,
        week: WindowStats,
        month: WindowStats,
        quarter: WindowStats,
        risk_threshold: f64,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        let rates = [
            week.reschedule_rate,
            month.reschedule_rate,
            quarter.reschedule_rate,
        ];
        let is_high_risk = rates.iter().any(|rate| *rate > risk_threshold);

        Self {
            tutor_id,
            reschedule_rate_7d: week.reschedule_rate,
            reschedule_rate_30d: month.reschedule_rate,
            reschedule_rate_90d: quarter.reschedule_rate,
            total_sessions_7d: week.total_sessions,
            total_sessions_30d: month.total_sessions,
            total_sessions_90d: quarter.total_sessions,
            tutor_reschedules_7d: week.tutor_reschedules,
            tutor_reschedules_30d: month.tutor_reschedules,
            tutor_reschedules_90d: quarter.tutor_reschedules,
            is_high_risk,
            risk_threshold,
            last_calculated_at: calculated_at,
        }
    }
}

/// Discretized churn risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Cached churn prediction, unique per (student, tutor) pair.
///
/// Created lazily on first request, overwritten in place on forced refresh
/// (which also drops the cached explanation derived from the old numbers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPrediction {
    pub student_id: StudentId,
    pub tutor_id: TutorId,
    pub churn_probability: f64,
    pub risk_level: RiskLevel,
    pub compatibility_score: f64,
    pub pace_mismatch: f64,
    pub style_mismatch: f64,
    pub communication_mismatch: f64,
    pub age_difference: u32,
    pub explanation: Option<String>,
    pub model_version: Option<String>,
}
