use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::{RescheduleInitiator, RescheduleRecord, SessionId, SessionRecord};
use super::error::ValidationError;

/// The fixed windows a tutor risk summary is computed over, in days.
pub const RATE_WINDOW_DAYS: [u32; 3] = [7, 30, 90];

/// Reschedule statistics for one tutor over one fixed day window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub window_days: u32,
    pub total_sessions: u32,
    pub tutor_reschedules: u32,
    /// Tutor-initiated reschedules as a percentage of total sessions,
    /// rounded to two decimals. 0.0 when the window holds no sessions.
    pub reschedule_rate: f64,
}

/// Computes the tutor-initiated reschedule rate over the trailing window.
///
/// Pure function of the supplied history: `sessions` and `reschedules` are
/// the tutor's records (reschedules joined 1:1 by session id), and only
/// sessions scheduled at or after `now - window_days` count. A reschedule
/// counts when its session is inside the window and the tutor initiated it.
pub fn window_stats(
    sessions: &[SessionRecord],
    reschedules: &[RescheduleRecord],
    now: DateTime<Utc>,
    window_days: u32,
) -> Result<WindowStats, ValidationError> {
    if window_days == 0 {
        return Err(ValidationError::InvalidWindow { days: window_days });
    }

    let cutoff = now - Duration::days(i64::from(window_days));

    let in_window: HashSet<&SessionId> = sessions
        .iter()
        .filter(|session| session.scheduled_time >= cutoff)
        .map(|session| &session.id)
        .collect();

    let total_sessions = in_window.len() as u32;

    let tutor_reschedules = reschedules
        .iter()
        .filter(|reschedule| {
            reschedule.initiator == RescheduleInitiator::Tutor
                && in_window.contains(&reschedule.session_id)
        })
        .count() as u32;

    let reschedule_rate = if total_sessions == 0 {
        0.0
    } else {
        round_rate(f64::from(tutor_reschedules) / f64::from(total_sessions) * 100.0)
    };

    Ok(WindowStats {
        window_days,
        total_sessions,
        tutor_reschedules,
        reschedule_rate,
    })
}

fn round_rate(rate: f64) -> f64 {
    (rate * 100.0).round() / 100.0
}
