//! Risk scoring and optimal student-tutor assignment for an online tutoring
//! marketplace.
//!
//! The crate is the core engine only: it computes time-windowed reschedule
//! rates and risk flags for tutors, scores student-tutor compatibility and
//! churn risk, owns the cached per-pair prediction records, and solves the
//! minimum-cost assignment problem over a candidate pool. Transport,
//! persistence technology, and notification delivery live with the callers,
//! which plug in through the traits in [`matching::repository`] and
//! [`matching::classifier`].

pub mod config;
pub mod matching;
pub mod telemetry;
