use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing::debug;

use super::domain::{TutorId, TutorRiskSummary};
use super::error::MatchingError;
use super::repository::{ProfileStore, RiskSummaryStore, SessionStore, SummaryCache};
use super::windows::{window_stats, RATE_WINDOW_DAYS};

/// Aggregates multi-window reschedule rates into the tutor's persisted risk
/// record and keeps the read-through cache honest.
pub struct RiskFlagEngine<P, S, R, C> {
    profiles: Arc<P>,
    sessions: Arc<S>,
    summaries: Arc<R>,
    cache: Arc<C>,
    risk_threshold: f64,
    cache_ttl: StdDuration,
}

impl<P, S, R, C> RiskFlagEngine<P, S, R, C>
where
    P: ProfileStore,
    S: SessionStore,
    R: RiskSummaryStore,
    C: SummaryCache,
{
    pub fn new(
        profiles: Arc<P>,
        sessions: Arc<S>,
        summaries: Arc<R>,
        cache: Arc<C>,
        risk_threshold: f64,
        cache_ttl: StdDuration,
    ) -> Self {
        Self {
            profiles,
            sessions,
            summaries,
            cache,
            risk_threshold,
            cache_ttl,
        }
    }

    /// Recomputes all window rates for a tutor and upserts the risk summary
    /// in one store call, then invalidates the cached copy.
    ///
    /// The high-risk flag is derived inside the summary constructor from the
    /// freshly computed rates, so a reader never observes a flag that
    /// disagrees with the rates stored beside it.
    pub fn recompute(&self, tutor_id: &TutorId) -> Result<TutorRiskSummary, MatchingError> {
        let tutor = self
            .profiles
            .tutor(tutor_id)?
            .ok_or_else(|| MatchingError::TutorNotFound(tutor_id.clone()))?;

        let now = Utc::now();
        let widest = Duration::days(i64::from(RATE_WINDOW_DAYS[2]));
        let sessions = self.sessions.sessions_for_tutor(&tutor.id, now - widest)?;
        let reschedules = self
            .sessions
            .reschedules_for_tutor(&tutor.id, now - widest)?;

        let week = window_stats(&sessions, &reschedules, now, RATE_WINDOW_DAYS[0])?;
        let month = window_stats(&sessions, &reschedules, now, RATE_WINDOW_DAYS[1])?;
        let quarter = window_stats(&sessions, &reschedules, now, RATE_WINDOW_DAYS[2])?;

        let summary = TutorRiskSummary::from_windows(
            tutor.id.clone(),
            week,
            month,
            quarter,
            self.risk_threshold,
            now,
        );

        let stored = self.summaries.upsert(summary)?;
        self.cache.invalidate(tutor_id);

        debug!(
            tutor = %tutor_id,
            rate_7d = stored.reschedule_rate_7d,
            rate_30d = stored.reschedule_rate_30d,
            rate_90d = stored.reschedule_rate_90d,
            high_risk = stored.is_high_risk,
            "recomputed tutor risk summary"
        );

        Ok(stored)
    }

    /// Read-through accessor for a tutor's risk summary.
    ///
    /// Cache hits short-circuit; misses read the summary store and fill the
    /// cache under the configured TTL. A missing or degraded cache only
    /// costs latency.
    pub fn summary(&self, tutor_id: &TutorId) -> Result<Option<TutorRiskSummary>, MatchingError> {
        if let Some(hit) = self.cache.get(tutor_id) {
            return Ok(Some(hit));
        }

        let summary = self.summaries.fetch(tutor_id)?;
        if let Some(summary) = &summary {
            self.cache.put(summary, self.cache_ttl);
        }

        Ok(summary)
    }
}
