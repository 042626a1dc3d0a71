use std::fmt;

use super::domain::{StudentId, TutorId};
use super::repository::StoreError;

/// Caller-facing error taxonomy for the matching engine.
///
/// Conflicts on the prediction unique key never appear here: they are
/// resolved locally into a read of the winning row. Classifier outages are
/// likewise absorbed by the rule-based fallback.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("tutor {0} not found")]
    TutorNotFound(TutorId),
    #[error("student {0} not found")]
    StudentNotFound(StudentId),
    #[error("profiles not found: {0}")]
    MissingProfiles(MissingProfiles),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Every id that failed to resolve during cost-matrix construction, so the
/// caller can fix its input in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingProfiles {
    pub students: Vec<StudentId>,
    pub tutors: Vec<TutorId>,
}

impl MissingProfiles {
    pub fn is_empty(&self) -> bool {
        self.students.is_empty() && self.tutors.is_empty()
    }
}

impl fmt::Display for MissingProfiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let students: Vec<&str> = self.students.iter().map(|id| id.0.as_str()).collect();
        let tutors: Vec<&str> = self.tutors.iter().map(|id| id.0.as_str()).collect();
        write!(
            f,
            "students [{}], tutors [{}]",
            students.join(", "),
            tutors.join(", ")
        )
    }
}

/// Malformed caller input, rejected before any store work begins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("student and tutor pools must be equal length (got {students} students and {tutors} tutors)")]
    UnequalPools { students: usize, tutors: usize },
    #[error("at least {minimum} students and tutors are required (got {actual})")]
    PoolTooSmall { minimum: usize, actual: usize },
    #[error("candidate pool of {actual} exceeds the configured maximum of {maximum}")]
    PoolTooLarge { maximum: usize, actual: usize },
    #[error("duplicate {side} id: {id}")]
    DuplicateId { side: &'static str, id: String },
    #[error("rate window must cover at least one day (got {days})")]
    InvalidWindow { days: u32 },
}
