use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::RiskLevel;
use super::features::FeatureVector;

/// Errors raised while loading or invoking the classifier. None of these
/// reach callers of the scorer: they all degrade to the rule-based fallback.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier artifact missing: {0}")]
    ArtifactMissing(String),
    #[error("classifier artifact malformed: {0}")]
    Malformed(String),
    #[error("classifier prediction failed: {0}")]
    Prediction(String),
}

/// Opaque, swappable churn classifier. Implementations must be safe to call
/// concurrently.
pub trait ChurnModel: Send + Sync {
    fn predict_probability(&self, features: &[f64]) -> Result<f64, ClassifierError>;
}

/// Version tag and provenance for a loaded classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
}

/// A loaded classifier together with its declared feature ordering.
pub struct ClassifierArtifact {
    pub model: Arc<dyn ChurnModel>,
    pub feature_order: Vec<String>,
    pub metadata: ModelMetadata,
}

impl std::fmt::Debug for ClassifierArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierArtifact")
            .field("feature_order", &self.feature_order)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Backing store for classifier artifacts, loaded by logical name at
/// construction and reloaded on demand after retraining.
pub trait ClassifierStore: Send + Sync {
    fn load(&self) -> Result<ClassifierArtifact, ClassifierError>;
}

/// A probability bucket boundary pair. `low` and `high` are exclusive upper
/// bounds for the low and medium buckets respectively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub low: f64,
    pub high: f64,
}

impl RiskThresholds {
    /// Serving defaults for match churn risk.
    pub const fn match_risk() -> Self {
        Self {
            low: 0.30,
            high: 0.70,
        }
    }

    /// Serving defaults for per-session reschedule risk, which carries a
    /// lower base rate than match churn.
    pub const fn reschedule_risk() -> Self {
        Self {
            low: 0.15,
            high: 0.35,
        }
    }

    pub fn level(&self, probability: f64) -> RiskLevel {
        if probability < self.low {
            RiskLevel::Low
        } else if probability < self.high {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// The two independently configured threshold pairs used at serving time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringThresholds {
    pub match_risk: RiskThresholds,
    pub reschedule_risk: RiskThresholds,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            match_risk: RiskThresholds::match_risk(),
            reschedule_risk: RiskThresholds::reschedule_risk(),
        }
    }
}

/// Churn scorer wrapping a cached, versioned classifier.
///
/// The artifact is loaded lazily, shared read-mostly across callers, and
/// swapped only by `reload()`; in-flight predictions keep the artifact they
/// already cloned. When the artifact cannot be loaded or invoked, scoring
/// degrades to the deterministic inverse-compatibility rule and the
/// degradation is logged, never surfaced.
pub struct ChurnScorer<C> {
    store: C,
    thresholds: ScoringThresholds,
    cached: RwLock<Option<Arc<ClassifierArtifact>>>,
}

impl<C: ClassifierStore> ChurnScorer<C> {
    pub fn new(store: C, thresholds: ScoringThresholds) -> Self {
        Self {
            store,
            thresholds,
            cached: RwLock::new(None),
        }
    }

    /// Forces the next prediction to reload the artifact from the backing
    /// store. Call after retraining.
    pub fn reload(&self) {
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        *cached = None;
        info!("classifier cache cleared, next prediction reloads the artifact");
    }

    /// The version tag of the currently cached artifact, if one is loaded.
    pub fn model_version(&self) -> Option<String> {
        let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
        cached
            .as_ref()
            .map(|artifact| artifact.metadata.version.clone())
    }

    /// Predicts the churn probability for an extracted feature vector.
    ///
    /// Returns the clamped probability and the version tag of the model that
    /// produced it; the tag is `None` when the rule-based fallback was used.
    pub fn churn_probability(
        &self,
        features: &FeatureVector,
        compatibility: f64,
    ) -> (f64, Option<String>) {
        let artifact = match self.artifact() {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(error = %err, "classifier unavailable, using rule-based churn estimate");
                return (fallback_probability(compatibility), None);
            }
        };

        let vector = features.ordered(&artifact.feature_order);
        match artifact.model.predict_probability(&vector) {
            Ok(probability) => (
                probability.clamp(0.0, 1.0),
                Some(artifact.metadata.version.clone()),
            ),
            Err(err) => {
                warn!(error = %err, "classifier prediction failed, using rule-based churn estimate");
                (fallback_probability(compatibility), None)
            }
        }
    }

    /// Buckets a match churn probability.
    pub fn risk_level(&self, probability: f64) -> RiskLevel {
        self.thresholds.match_risk.level(probability)
    }

    /// Buckets a per-session reschedule probability.
    pub fn reschedule_risk_level(&self, probability: f64) -> RiskLevel {
        self.thresholds.reschedule_risk.level(probability)
    }

    fn artifact(&self) -> Result<Arc<ClassifierArtifact>, ClassifierError> {
        {
            let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(artifact) = cached.as_ref() {
                return Ok(Arc::clone(artifact));
            }
        }

        let loaded = Arc::new(self.store.load()?);
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        // A concurrent loader may have won the race; keep whichever artifact
        // landed first so readers observe one consistent version.
        if let Some(artifact) = cached.as_ref() {
            return Ok(Arc::clone(artifact));
        }
        info!(version = %loaded.metadata.version, "loaded churn classifier");
        *cached = Some(Arc::clone(&loaded));
        Ok(loaded)
    }
}

fn fallback_probability(compatibility: f64) -> f64 {
    (1.0 - compatibility).clamp(0.0, 1.0)
}

/// Logistic model over the artifact's declared feature ordering.
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticModel {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }
}

impl ChurnModel for LogisticModel {
    fn predict_probability(&self, features: &[f64]) -> Result<f64, ClassifierError> {
        if features.len() != self.weights.len() {
            return Err(ClassifierError::Prediction(format!(
                "expected {} features, got {}",
                self.weights.len(),
                features.len()
            )));
        }

        let logit: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(weight, value)| weight * value)
            .sum::<f64>()
            + self.bias;

        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactFile {
    version: String,
    feature_order: Vec<String>,
    weights: Vec<f64>,
    bias: f64,
}

/// Loads a logistic-regression artifact from a JSON file on disk.
///
/// The file carries `{version, feature_order, weights, bias}`; a missing
/// file maps to `ArtifactMissing` and any parse or shape problem to
/// `Malformed`, both of which the scorer absorbs via its fallback.
pub struct JsonArtifactStore {
    path: PathBuf,
}

impl JsonArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ClassifierStore for JsonArtifactStore {
    fn load(&self) -> Result<ClassifierArtifact, ClassifierError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            ClassifierError::ArtifactMissing(format!("{}: {err}", self.path.display()))
        })?;

        let file: ArtifactFile = serde_json::from_str(&raw).map_err(|err| {
            ClassifierError::Malformed(format!("{}: {err}", self.path.display()))
        })?;

        if file.feature_order.len() != file.weights.len() {
            return Err(ClassifierError::Malformed(format!(
                "{}: {} feature names but {} weights",
                self.path.display(),
                file.feature_order.len(),
                file.weights.len()
            )));
        }

        Ok(ClassifierArtifact {
            model: Arc::new(LogisticModel::new(file.weights, file.bias)),
            feature_order: file.feature_order,
            metadata: ModelMetadata {
                version: file.version,
            },
        })
    }
}
