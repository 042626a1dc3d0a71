use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{StudentProfile, TutorProfile, TutorRiskSummary};

/// Weights folding the four mismatch dimensions into one compatibility
/// score.
const PACE_WEIGHT: f64 = 0.30;
const STYLE_WEIGHT: f64 = 0.30;
const COMMUNICATION_WEIGHT: f64 = 0.20;
const AGE_WEIGHT: f64 = 0.20;

/// Normalization caps: a mismatch at or beyond the cap contributes its full
/// weight.
const PACE_CAP: f64 = 4.0;
const COMMUNICATION_CAP: f64 = 4.0;
const AGE_CAP: f64 = 20.0;

/// Substitutes when either side of a dimension is missing.
const DEFAULT_SCALE_MISMATCH: f64 = 2.5;
const DEFAULT_STYLE_MISMATCH: f64 = 0.5;
const DEFAULT_AGE_DIFFERENCE: f64 = 10.0;

/// Single-dimension distances between a student's preferences and a tutor's
/// attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MismatchScores {
    /// Absolute pace difference on the 1-5 scale (0-4).
    pub pace: f64,
    /// 0 when teaching styles match case-insensitively, 1 otherwise.
    pub style: f64,
    /// Absolute communication-style difference on the 1-5 scale (0-4).
    pub communication: f64,
    /// Absolute age difference in years, unbounded.
    pub age: f64,
}

/// Derives the four mismatch scores for a pair. Total: every missing
/// attribute takes its explicit default instead of failing.
pub fn mismatch_scores(student: &StudentProfile, tutor: &TutorProfile) -> MismatchScores {
    let pace = match (student.preferred_pace, tutor.preferred_pace) {
        (Some(wanted), Some(offered)) => scale_distance(wanted, offered),
        _ => DEFAULT_SCALE_MISMATCH,
    };

    let style = match (&student.preferred_teaching_style, &tutor.teaching_style) {
        (Some(wanted), Some(offered)) => {
            if wanted.eq_ignore_ascii_case(offered) {
                0.0
            } else {
                1.0
            }
        }
        _ => DEFAULT_STYLE_MISMATCH,
    };

    let communication = match (
        student.communication_style_preference,
        tutor.communication_style,
    ) {
        (Some(wanted), Some(offered)) => scale_distance(wanted, offered),
        _ => DEFAULT_SCALE_MISMATCH,
    };

    let age = match (student.age, tutor.age) {
        (Some(student_age), Some(tutor_age)) => scale_distance(student_age, tutor_age),
        _ => DEFAULT_AGE_DIFFERENCE,
    };

    MismatchScores {
        pace,
        style,
        communication,
        age,
    }
}

/// Folds mismatch scores into a single [0, 1] compatibility score; higher
/// means better aligned. Deterministic and order-independent.
pub fn compatibility_score(mismatch: &MismatchScores) -> f64 {
    let weighted_mismatch = PACE_WEIGHT * (mismatch.pace / PACE_CAP).min(1.0)
        + STYLE_WEIGHT * mismatch.style.min(1.0)
        + COMMUNICATION_WEIGHT * (mismatch.communication / COMMUNICATION_CAP).min(1.0)
        + AGE_WEIGHT * (mismatch.age / AGE_CAP).min(1.0);

    (1.0 - weighted_mismatch).clamp(0.0, 1.0)
}

/// Named feature map handed to the churn classifier.
///
/// The classifier declares its own feature ordering; `ordered` serializes
/// this map against that ordering, substituting 0.0 for names the map does
/// not carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn ordered(&self, feature_order: &[String]) -> Vec<f64> {
        feature_order
            .iter()
            .map(|name| self.values.get(name).copied().unwrap_or(0.0))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds the full feature map for one (student, tutor) pair, including the
/// tutor's 30-day risk statistics when a summary is available.
pub fn extract_features(
    student: &StudentProfile,
    tutor: &TutorProfile,
    tutor_stats: Option<&TutorRiskSummary>,
) -> FeatureVector {
    let mismatch = mismatch_scores(student, tutor);
    let mut features = FeatureVector::default();

    features.insert("pace_mismatch", mismatch.pace);
    features.insert("style_mismatch", mismatch.style);
    features.insert("communication_mismatch", mismatch.communication);
    features.insert("age_difference", mismatch.age);

    features.insert("student_age", optional_scale(student.age, 15.0));
    features.insert("student_pace", optional_scale(student.preferred_pace, 3.0));
    features.insert(
        "student_urgency",
        optional_scale(student.urgency_level, 3.0),
    );
    features.insert(
        "student_experience",
        f64::from(student.previous_tutoring_experience),
    );
    features.insert(
        "student_satisfaction",
        optional_scale(student.previous_satisfaction, 3.0),
    );

    features.insert("tutor_age", optional_scale(tutor.age, 30.0));
    features.insert(
        "tutor_experience",
        optional_scale(tutor.experience_years, 2.0),
    );
    features.insert(
        "tutor_confidence",
        optional_scale(tutor.confidence_level, 3.0),
    );
    features.insert("tutor_pace", optional_scale(tutor.preferred_pace, 3.0));

    match tutor_stats {
        Some(stats) => {
            features.insert("tutor_reschedule_rate_30d", stats.reschedule_rate_30d);
            features.insert(
                "tutor_total_sessions_30d",
                f64::from(stats.total_sessions_30d),
            );
            features.insert(
                "tutor_is_high_risk",
                if stats.is_high_risk { 1.0 } else { 0.0 },
            );
        }
        None => {
            features.insert("tutor_reschedule_rate_30d", 0.0);
            features.insert("tutor_total_sessions_30d", 0.0);
            features.insert("tutor_is_high_risk", 0.0);
        }
    }

    features.insert("compatibility_score", compatibility_score(&mismatch));

    features
}

fn scale_distance(left: u8, right: u8) -> f64 {
    f64::from(left.abs_diff(right))
}

fn optional_scale(value: Option<u8>, default: f64) -> f64 {
    value.map_or(default, f64::from)
}
