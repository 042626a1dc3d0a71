use std::time::Duration;

use chrono::{DateTime, Utc};

use super::domain::{
    MatchPrediction, RescheduleRecord, SessionRecord, StudentId, StudentProfile, TutorId,
    TutorProfile, TutorRiskSummary,
};

/// Error enumeration for backing-store failures.
///
/// `Conflict` is the unique-key serialization point: concurrent writers race
/// to insert and exactly one wins; the loser observes this variant.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to tutor and student profiles.
pub trait ProfileStore: Send + Sync {
    fn tutor(&self, id: &TutorId) -> Result<Option<TutorProfile>, StoreError>;
    fn student(&self, id: &StudentId) -> Result<Option<StudentProfile>, StoreError>;
    fn tutors(&self) -> Result<Vec<TutorProfile>, StoreError>;
    fn students(&self) -> Result<Vec<StudentProfile>, StoreError>;
}

/// Read access to session and reschedule history, filtered by tutor and
/// time range.
pub trait SessionStore: Send + Sync {
    fn sessions_for_tutor(
        &self,
        tutor: &TutorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, StoreError>;

    fn reschedules_for_tutor(
        &self,
        tutor: &TutorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<RescheduleRecord>, StoreError>;
}

/// Persistence for the per-tutor risk summary. `upsert` must be atomic:
/// create when absent, overwrite in place otherwise.
pub trait RiskSummaryStore: Send + Sync {
    fn fetch(&self, tutor: &TutorId) -> Result<Option<TutorRiskSummary>, StoreError>;
    fn upsert(&self, summary: TutorRiskSummary) -> Result<TutorRiskSummary, StoreError>;
}

/// Persistence for cached match predictions, keyed by the (student, tutor)
/// unique pair.
///
/// `insert` must fail with `StoreError::Conflict` when a row for the pair
/// already exists; callers convert that into a read of the winner's row.
pub trait PredictionRepository: Send + Sync {
    fn fetch_pair(
        &self,
        student: &StudentId,
        tutor: &TutorId,
    ) -> Result<Option<MatchPrediction>, StoreError>;

    fn insert(&self, prediction: MatchPrediction) -> Result<MatchPrediction, StoreError>;

    fn update(&self, prediction: MatchPrediction) -> Result<(), StoreError>;
}

/// Optional TTL'd accelerator for tutor risk summaries.
///
/// Infallible on purpose: a cache that is down behaves exactly like a cache
/// that is empty, and reads fall through to the summary store.
pub trait SummaryCache: Send + Sync {
    fn get(&self, tutor: &TutorId) -> Option<TutorRiskSummary>;
    fn put(&self, summary: &TutorRiskSummary, ttl: Duration);
    fn invalidate(&self, tutor: &TutorId);
}

/// Cache disabled: every read goes to the backing store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl SummaryCache for NoCache {
    fn get(&self, _tutor: &TutorId) -> Option<TutorRiskSummary> {
        None
    }

    fn put(&self, _summary: &TutorRiskSummary, _ttl: Duration) {}

    fn invalidate(&self, _tutor: &TutorId) {}
}
