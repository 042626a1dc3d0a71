//! Tutor risk scoring, per-pair churn prediction, and optimal assignment.
//!
//! The module is organized leaf-first: pure computations (`windows`,
//! `features`) feed the stateful services (`risk`, `predictions`,
//! `assignment`), which reach persistence only through the trait seams in
//! `repository` and `classifier`.

pub mod assignment;
pub mod classifier;
pub mod domain;
pub mod error;
pub mod features;
pub mod predictions;
pub mod repository;
pub mod risk;
pub mod windows;

#[cfg(test)]
mod tests;

pub use assignment::{AssignmentSolver, MatchedPair, MatchingOutcome, MIN_POOL_SIZE};
pub use classifier::{
    ChurnModel, ChurnScorer, ClassifierArtifact, ClassifierError, ClassifierStore,
    JsonArtifactStore, LogisticModel, ModelMetadata, RiskThresholds, ScoringThresholds,
};
pub use domain::{
    MatchPrediction, RescheduleInitiator, RescheduleRecord, RiskLevel, SessionId, SessionRecord,
    SessionStatus, StudentId, StudentProfile, TutorId, TutorProfile, TutorRiskSummary,
};
pub use error::{MatchingError, MissingProfiles, ValidationError};
pub use features::{
    compatibility_score, extract_features, mismatch_scores, FeatureVector, MismatchScores,
};
pub use predictions::PredictionService;
pub use repository::{
    NoCache, PredictionRepository, ProfileStore, RiskSummaryStore, SessionStore, StoreError,
    SummaryCache,
};
pub use risk::RiskFlagEngine;
pub use windows::{window_stats, WindowStats, RATE_WINDOW_DAYS};
