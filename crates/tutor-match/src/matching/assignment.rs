use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::classifier::ClassifierStore;
use super::domain::{MatchPrediction, RiskLevel, StudentId, TutorId};
use super::error::{MatchingError, MissingProfiles, ValidationError};
use super::predictions::PredictionService;
use super::repository::{PredictionRepository, ProfileStore, RiskSummaryStore};

/// Smallest pool the assignment problem is defined over.
pub const MIN_POOL_SIZE: usize = 2;

/// One matched pair with the full prediction detail behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    pub student_id: StudentId,
    pub tutor_id: TutorId,
    pub churn_probability: f64,
    pub compatibility_score: f64,
    pub risk_level: RiskLevel,
    pub pace_mismatch: f64,
    pub style_mismatch: f64,
    pub communication_mismatch: f64,
    pub age_difference: u32,
}

impl MatchedPair {
    fn from_prediction(prediction: &MatchPrediction) -> Self {
        Self {
            student_id: prediction.student_id.clone(),
            tutor_id: prediction.tutor_id.clone(),
            churn_probability: prediction.churn_probability,
            compatibility_score: prediction.compatibility_score,
            risk_level: prediction.risk_level,
            pace_mismatch: prediction.pace_mismatch,
            style_mismatch: prediction.style_mismatch,
            communication_mismatch: prediction.communication_mismatch,
            age_difference: prediction.age_difference,
        }
    }
}

/// The globally optimal 1-to-1 pairing and its aggregate risk profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchingOutcome {
    pub matches: Vec<MatchedPair>,
    pub total_churn_risk: f64,
    pub avg_churn_risk: f64,
    pub total_compatibility: f64,
    pub avg_compatibility: f64,
}

/// Builds churn-probability cost matrices over a candidate pool and solves
/// the assignment problem on them.
pub struct AssignmentSolver<P, R, M, C> {
    profiles: Arc<P>,
    predictions: Arc<PredictionService<P, R, M, C>>,
    max_pool_size: usize,
}

impl<P, R, M, C> AssignmentSolver<P, R, M, C>
where
    P: ProfileStore,
    R: RiskSummaryStore,
    M: PredictionRepository,
    C: ClassifierStore,
{
    pub fn new(
        profiles: Arc<P>,
        predictions: Arc<PredictionService<P, R, M, C>>,
        max_pool_size: usize,
    ) -> Self {
        Self {
            profiles,
            predictions,
            max_pool_size,
        }
    }

    /// Finds the minimum-total-churn perfect matching between the two pools.
    ///
    /// Input is validated before any store work so malformed requests fail
    /// fast and cheap. The returned assignment is provably optimal; ties
    /// between equally cheap assignments break deterministically for a given
    /// cost matrix.
    pub fn run_optimal_matching(
        &self,
        student_ids: &[StudentId],
        tutor_ids: &[TutorId],
    ) -> Result<MatchingOutcome, MatchingError> {
        validate_pools(student_ids, tutor_ids, self.max_pool_size)?;

        debug!(
            students = student_ids.len(),
            tutors = tutor_ids.len(),
            "building cost matrix"
        );
        let (cost, grid) = self.build_cost_matrix(student_ids, tutor_ids)?;

        let assignment = solve_assignment(&cost);

        let mut matches = Vec::with_capacity(assignment.len());
        let mut total_churn_risk = 0.0;
        let mut total_compatibility = 0.0;

        for (student_index, tutor_index) in assignment.into_iter().enumerate() {
            let prediction = &grid[student_index][tutor_index];
            total_churn_risk += prediction.churn_probability;
            total_compatibility += prediction.compatibility_score;
            matches.push(MatchedPair::from_prediction(prediction));
        }

        let n = matches.len() as f64;
        let outcome = MatchingOutcome {
            total_churn_risk,
            avg_churn_risk: total_churn_risk / n,
            total_compatibility,
            avg_compatibility: total_compatibility / n,
            matches,
        };

        info!(
            pairs = outcome.matches.len(),
            total_churn_risk = outcome.total_churn_risk,
            "optimal matching complete"
        );

        Ok(outcome)
    }

    /// Resolves every candidate id and fills `cost[i][j]` with the churn
    /// probability of pairing student `i` with tutor `j`, creating cached
    /// predictions as needed.
    ///
    /// Ids that do not resolve are reported together, never silently
    /// dropped.
    #[allow(clippy::type_complexity)]
    pub fn build_cost_matrix(
        &self,
        student_ids: &[StudentId],
        tutor_ids: &[TutorId],
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<MatchPrediction>>), MatchingError> {
        let mut missing = MissingProfiles::default();

        let mut students = Vec::with_capacity(student_ids.len());
        for id in student_ids {
            match self.profiles.student(id)? {
                Some(student) => students.push(student),
                None => missing.students.push(id.clone()),
            }
        }

        let mut tutors = Vec::with_capacity(tutor_ids.len());
        for id in tutor_ids {
            match self.profiles.tutor(id)? {
                Some(tutor) => tutors.push(tutor),
                None => missing.tutors.push(id.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(MatchingError::MissingProfiles(missing));
        }

        let mut tutor_stats = Vec::with_capacity(tutors.len());
        for tutor in &tutors {
            tutor_stats.push(self.predictions.summary_for(&tutor.id)?);
        }

        let mut cost = vec![vec![0.0; tutors.len()]; students.len()];
        let mut grid = Vec::with_capacity(students.len());

        for (i, student) in students.iter().enumerate() {
            let mut row = Vec::with_capacity(tutors.len());
            for (j, tutor) in tutors.iter().enumerate() {
                let prediction = self.predictions.get_or_create_for(
                    student,
                    tutor,
                    tutor_stats[j].as_ref(),
                    false,
                )?;
                cost[i][j] = prediction.churn_probability;
                row.push(prediction);
            }
            grid.push(row);
        }

        Ok((cost, grid))
    }
}

fn validate_pools(
    student_ids: &[StudentId],
    tutor_ids: &[TutorId],
    max_pool_size: usize,
) -> Result<(), ValidationError> {
    if student_ids.len() != tutor_ids.len() {
        return Err(ValidationError::UnequalPools {
            students: student_ids.len(),
            tutors: tutor_ids.len(),
        });
    }

    if student_ids.len() < MIN_POOL_SIZE {
        return Err(ValidationError::PoolTooSmall {
            minimum: MIN_POOL_SIZE,
            actual: student_ids.len(),
        });
    }

    if student_ids.len() > max_pool_size {
        return Err(ValidationError::PoolTooLarge {
            maximum: max_pool_size,
            actual: student_ids.len(),
        });
    }

    let mut seen_students = HashSet::with_capacity(student_ids.len());
    for id in student_ids {
        if !seen_students.insert(id) {
            return Err(ValidationError::DuplicateId {
                side: "student",
                id: id.0.clone(),
            });
        }
    }

    let mut seen_tutors = HashSet::with_capacity(tutor_ids.len());
    for id in tutor_ids {
        if !seen_tutors.insert(id) {
            return Err(ValidationError::DuplicateId {
                side: "tutor",
                id: id.0.clone(),
            });
        }
    }

    Ok(())
}

/// Solves the n x n assignment problem, returning the tutor column chosen
/// for each student row.
///
/// Kuhn-Munkres with row/column potentials and shortest augmenting paths,
/// O(n^3). The returned permutation minimizes the total cost over all
/// perfect matchings; ties break toward the first minimum scanned, so the
/// result is deterministic for a given matrix.
pub(crate) fn solve_assignment(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    // 1-based arrays with column 0 as the virtual root of each augmenting
    // search, per the standard formulation.
    let mut potential_row = vec![0.0_f64; n + 1];
    let mut potential_col = vec![0.0_f64; n + 1];
    let mut matched_row = vec![0_usize; n + 1];
    let mut predecessor = vec![0_usize; n + 1];

    for row in 1..=n {
        matched_row[0] = row;
        let mut current_col = 0_usize;
        let mut min_reduced = vec![f64::INFINITY; n + 1];
        let mut visited = vec![false; n + 1];

        loop {
            visited[current_col] = true;
            let active_row = matched_row[current_col];
            let mut delta = f64::INFINITY;
            let mut next_col = 0_usize;

            for col in 1..=n {
                if visited[col] {
                    continue;
                }
                let reduced = cost[active_row - 1][col - 1]
                    - potential_row[active_row]
                    - potential_col[col];
                if reduced < min_reduced[col] {
                    min_reduced[col] = reduced;
                    predecessor[col] = current_col;
                }
                if min_reduced[col] < delta {
                    delta = min_reduced[col];
                    next_col = col;
                }
            }

            for col in 0..=n {
                if visited[col] {
                    potential_row[matched_row[col]] += delta;
                    potential_col[col] -= delta;
                } else {
                    min_reduced[col] -= delta;
                }
            }

            current_col = next_col;
            if matched_row[current_col] == 0 {
                break;
            }
        }

        // Walk the augmenting path back to the root, flipping assignments.
        while current_col != 0 {
            let prev_col = predecessor[current_col];
            matched_row[current_col] = matched_row[prev_col];
            current_col = prev_col;
        }
    }

    let mut assignment = vec![0_usize; n];
    for col in 1..=n {
        if matched_row[col] > 0 {
            assignment[matched_row[col] - 1] = col - 1;
        }
    }
    assignment
}
