use std::sync::Arc;

use tracing::{debug, info};

use super::classifier::{ChurnScorer, ClassifierStore};
use super::domain::{
    MatchPrediction, RiskLevel, StudentId, StudentProfile, TutorId, TutorProfile, TutorRiskSummary,
};
use super::error::MatchingError;
use super::features::{compatibility_score, extract_features, mismatch_scores, MismatchScores};
use super::repository::{PredictionRepository, ProfileStore, RiskSummaryStore, StoreError};

/// Freshly computed derived fields for one pair, before persistence.
struct ComputedPrediction {
    mismatch: MismatchScores,
    compatibility: f64,
    churn_probability: f64,
    risk_level: RiskLevel,
    model_version: Option<String>,
}

/// Single source of truth for per-pair predictions: owns the cached record,
/// delegates numeric scoring to the feature extractor and churn scorer.
pub struct PredictionService<P, R, M, C> {
    profiles: Arc<P>,
    summaries: Arc<R>,
    predictions: Arc<M>,
    scorer: Arc<ChurnScorer<C>>,
}

impl<P, R, M, C> PredictionService<P, R, M, C>
where
    P: ProfileStore,
    R: RiskSummaryStore,
    M: PredictionRepository,
    C: ClassifierStore,
{
    pub fn new(
        profiles: Arc<P>,
        summaries: Arc<R>,
        predictions: Arc<M>,
        scorer: Arc<ChurnScorer<C>>,
    ) -> Self {
        Self {
            profiles,
            summaries,
            predictions,
            scorer,
        }
    }

    pub fn scorer(&self) -> &ChurnScorer<C> {
        &self.scorer
    }

    /// Current risk summary for a tutor, used as a scoring input.
    pub(crate) fn summary_for(
        &self,
        tutor_id: &TutorId,
    ) -> Result<Option<TutorRiskSummary>, MatchingError> {
        Ok(self.summaries.fetch(tutor_id)?)
    }

    /// Returns the cached prediction for the pair, computing and inserting
    /// it on first request. `force_refresh` recomputes every derived field
    /// in place and drops the cached explanation.
    pub fn get_or_create(
        &self,
        student_id: &StudentId,
        tutor_id: &TutorId,
        force_refresh: bool,
    ) -> Result<MatchPrediction, MatchingError> {
        let student = self
            .profiles
            .student(student_id)?
            .ok_or_else(|| MatchingError::StudentNotFound(student_id.clone()))?;
        let tutor = self
            .profiles
            .tutor(tutor_id)?
            .ok_or_else(|| MatchingError::TutorNotFound(tutor_id.clone()))?;
        let stats = self.summaries.fetch(tutor_id)?;

        self.get_or_create_for(&student, &tutor, stats.as_ref(), force_refresh)
    }

    /// Pair-level variant for callers that already hold the resolved
    /// profiles (bulk refresh, cost-matrix construction).
    pub fn get_or_create_for(
        &self,
        student: &StudentProfile,
        tutor: &TutorProfile,
        tutor_stats: Option<&TutorRiskSummary>,
        force_refresh: bool,
    ) -> Result<MatchPrediction, MatchingError> {
        if let Some(existing) = self.predictions.fetch_pair(&student.id, &tutor.id)? {
            if !force_refresh {
                return Ok(existing);
            }

            let computed = self.compute(student, tutor, tutor_stats);
            let mut refreshed = existing;
            apply_computed(&mut refreshed, computed);
            // The explanation narrates the numbers it was generated from;
            // those numbers just changed.
            refreshed.explanation = None;
            self.predictions.update(refreshed.clone())?;
            debug!(
                student = %student.id,
                tutor = %tutor.id,
                "refreshed match prediction"
            );
            return Ok(refreshed);
        }

        let computed = self.compute(student, tutor, tutor_stats);
        let mut prediction = MatchPrediction {
            student_id: student.id.clone(),
            tutor_id: tutor.id.clone(),
            churn_probability: 0.0,
            risk_level: RiskLevel::Low,
            compatibility_score: 0.0,
            pace_mismatch: 0.0,
            style_mismatch: 0.0,
            communication_mismatch: 0.0,
            age_difference: 0,
            explanation: None,
            model_version: None,
        };
        apply_computed(&mut prediction, computed);

        match self.predictions.insert(prediction) {
            Ok(stored) => Ok(stored),
            Err(StoreError::Conflict) => {
                // Lost the first-insert race on the (student, tutor) unique
                // key; the winner's row is authoritative.
                debug!(
                    student = %student.id,
                    tutor = %tutor.id,
                    "prediction insert conflicted, reading winner"
                );
                self.predictions
                    .fetch_pair(&student.id, &tutor.id)?
                    .ok_or_else(|| {
                        MatchingError::Store(StoreError::Unavailable(
                            "prediction vanished after insert conflict".to_string(),
                        ))
                    })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Force-refreshes every prediction involving the tutor; call when the
    /// tutor's profile or risk statistics change. Returns the pair count.
    pub fn refresh_for_tutor(&self, tutor_id: &TutorId) -> Result<usize, MatchingError> {
        let tutor = self
            .profiles
            .tutor(tutor_id)?
            .ok_or_else(|| MatchingError::TutorNotFound(tutor_id.clone()))?;
        let stats = self.summaries.fetch(tutor_id)?;

        let students = self.profiles.students()?;
        for student in &students {
            self.get_or_create_for(student, &tutor, stats.as_ref(), true)?;
        }

        info!(tutor = %tutor_id, refreshed = students.len(), "refreshed predictions for tutor");
        Ok(students.len())
    }

    /// Force-refreshes every prediction involving the student. Returns the
    /// pair count.
    pub fn refresh_for_student(&self, student_id: &StudentId) -> Result<usize, MatchingError> {
        let student = self
            .profiles
            .student(student_id)?
            .ok_or_else(|| MatchingError::StudentNotFound(student_id.clone()))?;

        let tutors = self.profiles.tutors()?;
        for tutor in &tutors {
            let stats = self.summaries.fetch(&tutor.id)?;
            self.get_or_create_for(&student, tutor, stats.as_ref(), true)?;
        }

        info!(student = %student_id, refreshed = tutors.len(), "refreshed predictions for student");
        Ok(tutors.len())
    }

    /// Force-refreshes the full student x tutor cross product. Idempotent:
    /// re-running after a partial failure recomputes already-fresh rows
    /// without creating duplicates.
    pub fn refresh_all(&self) -> Result<usize, MatchingError> {
        let students = self.profiles.students()?;
        let tutors = self.profiles.tutors()?;

        let mut refreshed = 0;
        for tutor in &tutors {
            let stats = self.summaries.fetch(&tutor.id)?;
            for student in &students {
                self.get_or_create_for(student, tutor, stats.as_ref(), true)?;
                refreshed += 1;
            }
        }

        info!(refreshed, "refreshed all match predictions");
        Ok(refreshed)
    }

    fn compute(
        &self,
        student: &StudentProfile,
        tutor: &TutorProfile,
        tutor_stats: Option<&TutorRiskSummary>,
    ) -> ComputedPrediction {
        let mismatch = mismatch_scores(student, tutor);
        let compatibility = compatibility_score(&mismatch);
        let features = extract_features(student, tutor, tutor_stats);
        let (churn_probability, model_version) =
            self.scorer.churn_probability(&features, compatibility);
        let risk_level = self.scorer.risk_level(churn_probability);

        ComputedPrediction {
            mismatch,
            compatibility,
            churn_probability,
            risk_level,
            model_version,
        }
    }
}

fn apply_computed(prediction: &mut MatchPrediction, computed: ComputedPrediction) {
    prediction.churn_probability = computed.churn_probability;
    prediction.risk_level = computed.risk_level;
    prediction.compatibility_score = computed.compatibility;
    prediction.pace_mismatch = computed.mismatch.pace;
    prediction.style_mismatch = computed.mismatch.style;
    prediction.communication_mismatch = computed.mismatch.communication;
    prediction.age_difference = computed.mismatch.age as u32;
    prediction.model_version = computed.model_version;
}
