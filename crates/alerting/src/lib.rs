//! Alert Issuance Policy
//!
//! Decides which forecast steps become new alerts: per-level confidence
//! thresholds plus a rolling suppression window against the alert store.

mod policy;

pub use policy::{AlertCandidate, DedupConfig, DedupPolicy};
