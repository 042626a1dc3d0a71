use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};

use crate::matching::classifier::{
    ChurnModel, ChurnScorer, ClassifierArtifact, ClassifierError, ClassifierStore, ModelMetadata,
    ScoringThresholds,
};
use crate::matching::domain::{
    MatchPrediction, RescheduleInitiator, RescheduleRecord, SessionId, SessionRecord,
    SessionStatus, StudentId, StudentProfile, TutorId, TutorProfile, TutorRiskSummary,
};
use crate::matching::predictions::PredictionService;
use crate::matching::repository::{
    PredictionRepository, ProfileStore, RiskSummaryStore, SessionStore, StoreError, SummaryCache,
};

pub(super) fn student(id: &str) -> StudentProfile {
    StudentProfile {
        id: StudentId(id.to_string()),
        name: format!("Student {id}"),
        age: Some(16),
        preferred_teaching_style: Some("structured".to_string()),
        preferred_pace: Some(3),
        communication_style_preference: Some(3),
        urgency_level: Some(3),
        previous_tutoring_experience: 4,
        previous_satisfaction: Some(4),
    }
}

pub(super) fn tutor(id: &str) -> TutorProfile {
    TutorProfile {
        id: TutorId(id.to_string()),
        name: format!("Tutor {id}"),
        email: Some(format!("{id}@example.com")),
        is_active: true,
        age: Some(28),
        teaching_style: Some("structured".to_string()),
        preferred_pace: Some(3),
        communication_style: Some(3),
        confidence_level: Some(4),
        experience_years: Some(5),
    }
}

pub(super) fn session(
    id: &str,
    tutor_id: &str,
    scheduled: DateTime<Utc>,
    status: SessionStatus,
) -> SessionRecord {
    SessionRecord {
        id: SessionId(id.to_string()),
        tutor_id: TutorId(tutor_id.to_string()),
        student_id: StudentId("s-any".to_string()),
        scheduled_time: scheduled,
        completed_time: match status {
            SessionStatus::Completed => Some(scheduled + Duration::hours(1)),
            _ => None,
        },
        status,
        duration_minutes: Some(60),
    }
}

pub(super) fn reschedule(
    session_id: &str,
    initiator: RescheduleInitiator,
    original: DateTime<Utc>,
) -> RescheduleRecord {
    RescheduleRecord {
        session_id: SessionId(session_id.to_string()),
        initiator,
        original_time: original,
        new_time: Some(original + Duration::days(1)),
        reason: None,
        cancelled_at: original - Duration::hours(30),
    }
}

/// In-memory implementation of every storage seam, keyed the way the real
/// store would be.
#[derive(Default)]
pub(super) struct MemoryStore {
    tutors: Mutex<BTreeMap<TutorId, TutorProfile>>,
    students: Mutex<BTreeMap<StudentId, StudentProfile>>,
    sessions: Mutex<Vec<SessionRecord>>,
    reschedules: Mutex<Vec<RescheduleRecord>>,
    summaries: Mutex<BTreeMap<TutorId, TutorRiskSummary>>,
    predictions: Mutex<BTreeMap<(StudentId, TutorId), MatchPrediction>>,
}

impl MemoryStore {
    pub(super) fn add_tutor(&self, profile: TutorProfile) {
        self.tutors
            .lock()
            .expect("tutor mutex poisoned")
            .insert(profile.id.clone(), profile);
    }

    pub(super) fn add_student(&self, profile: StudentProfile) {
        self.students
            .lock()
            .expect("student mutex poisoned")
            .insert(profile.id.clone(), profile);
    }

    pub(super) fn add_session(&self, record: SessionRecord) {
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .push(record);
    }

    pub(super) fn add_reschedule(&self, record: RescheduleRecord) {
        self.reschedules
            .lock()
            .expect("reschedule mutex poisoned")
            .push(record);
    }

    pub(super) fn prediction_count(&self) -> usize {
        self.predictions
            .lock()
            .expect("prediction mutex poisoned")
            .len()
    }

    pub(super) fn set_explanation(&self, student: &StudentId, tutor: &TutorId, text: &str) {
        let mut guard = self.predictions.lock().expect("prediction mutex poisoned");
        let record = guard
            .get_mut(&(student.clone(), tutor.clone()))
            .expect("prediction present");
        record.explanation = Some(text.to_string());
    }
}

impl ProfileStore for MemoryStore {
    fn tutor(&self, id: &TutorId) -> Result<Option<TutorProfile>, StoreError> {
        Ok(self
            .tutors
            .lock()
            .expect("tutor mutex poisoned")
            .get(id)
            .cloned())
    }

    fn student(&self, id: &StudentId) -> Result<Option<StudentProfile>, StoreError> {
        Ok(self
            .students
            .lock()
            .expect("student mutex poisoned")
            .get(id)
            .cloned())
    }

    fn tutors(&self) -> Result<Vec<TutorProfile>, StoreError> {
        Ok(self
            .tutors
            .lock()
            .expect("tutor mutex poisoned")
            .values()
            .cloned()
            .collect())
    }

    fn students(&self) -> Result<Vec<StudentProfile>, StoreError> {
        Ok(self
            .students
            .lock()
            .expect("student mutex poisoned")
            .values()
            .cloned()
            .collect())
    }
}

impl SessionStore for MemoryStore {
    fn sessions_for_tutor(
        &self,
        tutor: &TutorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .expect("session mutex poisoned")
            .iter()
            .filter(|record| record.tutor_id == *tutor && record.scheduled_time >= since)
            .cloned()
            .collect())
    }

    fn reschedules_for_tutor(
        &self,
        tutor: &TutorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<RescheduleRecord>, StoreError> {
        let sessions = self.sessions.lock().expect("session mutex poisoned");
        let in_scope: Vec<SessionId> = sessions
            .iter()
            .filter(|record| record.tutor_id == *tutor && record.scheduled_time >= since)
            .map(|record| record.id.clone())
            .collect();
        drop(sessions);

        Ok(self
            .reschedules
            .lock()
            .expect("reschedule mutex poisoned")
            .iter()
            .filter(|record| in_scope.contains(&record.session_id))
            .cloned()
            .collect())
    }
}

impl RiskSummaryStore for MemoryStore {
    fn fetch(&self, tutor: &TutorId) -> Result<Option<TutorRiskSummary>, StoreError> {
        Ok(self
            .summaries
            .lock()
            .expect("summary mutex poisoned")
            .get(tutor)
            .cloned())
    }

    fn upsert(&self, summary: TutorRiskSummary) -> Result<TutorRiskSummary, StoreError> {
        self.summaries
            .lock()
            .expect("summary mutex poisoned")
            .insert(summary.tutor_id.clone(), summary.clone());
        Ok(summary)
    }
}

impl PredictionRepository for MemoryStore {
    fn fetch_pair(
        &self,
        student: &StudentId,
        tutor: &TutorId,
    ) -> Result<Option<MatchPrediction>, StoreError> {
        Ok(self
            .predictions
            .lock()
            .expect("prediction mutex poisoned")
            .get(&(student.clone(), tutor.clone()))
            .cloned())
    }

    fn insert(&self, prediction: MatchPrediction) -> Result<MatchPrediction, StoreError> {
        let mut guard = self.predictions.lock().expect("prediction mutex poisoned");
        let key = (prediction.student_id.clone(), prediction.tutor_id.clone());
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        guard.insert(key, prediction.clone());
        Ok(prediction)
    }

    fn update(&self, prediction: MatchPrediction) -> Result<(), StoreError> {
        let mut guard = self.predictions.lock().expect("prediction mutex poisoned");
        let key = (prediction.student_id.clone(), prediction.tutor_id.clone());
        if !guard.contains_key(&key) {
            return Err(StoreError::NotFound);
        }
        guard.insert(key, prediction);
        Ok(())
    }
}

/// TTL-aware cache over a plain map, for asserting read-through and
/// invalidation behavior.
#[derive(Default)]
pub(super) struct MemoryCache {
    entries: Mutex<HashMap<TutorId, (TutorRiskSummary, Instant)>>,
}

impl SummaryCache for MemoryCache {
    fn get(&self, tutor: &TutorId) -> Option<TutorRiskSummary> {
        let mut guard = self.entries.lock().expect("cache mutex poisoned");
        match guard.get(tutor) {
            Some((summary, deadline)) if Instant::now() < *deadline => Some(summary.clone()),
            Some(_) => {
                guard.remove(tutor);
                None
            }
            None => None,
        }
    }

    fn put(&self, summary: &TutorRiskSummary, ttl: StdDuration) {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(summary.tutor_id.clone(), (summary.clone(), Instant::now() + ttl));
    }

    fn invalidate(&self, tutor: &TutorId) {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .remove(tutor);
    }
}

/// Store whose every access fails, for asserting that validation runs
/// before any store work.
pub(super) struct UnavailableStore;

impl ProfileStore for UnavailableStore {
    fn tutor(&self, _id: &TutorId) -> Result<Option<TutorProfile>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn student(&self, _id: &StudentId) -> Result<Option<StudentProfile>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn tutors(&self) -> Result<Vec<TutorProfile>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn students(&self) -> Result<Vec<StudentProfile>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

impl RiskSummaryStore for UnavailableStore {
    fn fetch(&self, _tutor: &TutorId) -> Result<Option<TutorRiskSummary>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn upsert(&self, _summary: TutorRiskSummary) -> Result<TutorRiskSummary, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

impl PredictionRepository for UnavailableStore {
    fn fetch_pair(
        &self,
        _student: &StudentId,
        _tutor: &TutorId,
    ) -> Result<Option<MatchPrediction>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _prediction: MatchPrediction) -> Result<MatchPrediction, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _prediction: MatchPrediction) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Model that always returns the same probability.
pub(super) struct FixedModel(pub(super) f64);

impl ChurnModel for FixedModel {
    fn predict_probability(&self, _features: &[f64]) -> Result<f64, ClassifierError> {
        Ok(self.0)
    }
}

/// Classifier store stub: serves a fixed-probability artifact, or fails to
/// load when `probability` is `None`. Counts loads so reload semantics can
/// be asserted.
pub(super) struct StubClassifierStore {
    probability: Option<f64>,
    version: String,
    loads: Arc<AtomicUsize>,
}

impl StubClassifierStore {
    pub(super) fn fixed(probability: f64) -> Self {
        Self {
            probability: Some(probability),
            version: "v1.0".to_string(),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn missing() -> Self {
        Self {
            probability: None,
            version: "v1.0".to_string(),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn load_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl ClassifierStore for StubClassifierStore {
    fn load(&self) -> Result<ClassifierArtifact, ClassifierError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.probability {
            Some(probability) => Ok(ClassifierArtifact {
                model: Arc::new(FixedModel(probability)),
                feature_order: Vec::new(),
                metadata: ModelMetadata {
                    version: self.version.clone(),
                },
            }),
            None => Err(ClassifierError::ArtifactMissing(
                "stub artifact withheld".to_string(),
            )),
        }
    }
}

pub(super) type MemoryPredictionService =
    PredictionService<MemoryStore, MemoryStore, MemoryStore, StubClassifierStore>;

pub(super) fn prediction_service(
    store: Arc<MemoryStore>,
    classifier: StubClassifierStore,
) -> Arc<MemoryPredictionService> {
    let scorer = Arc::new(ChurnScorer::new(classifier, ScoringThresholds::default()));
    Arc::new(PredictionService::new(
        Arc::clone(&store),
        Arc::clone(&store),
        store,
        scorer,
    ))
}
