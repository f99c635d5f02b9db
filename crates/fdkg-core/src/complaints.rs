//! Misbehavior records
//!
//! A complaint is an append-only accusation that a received share failed
//! verification. This module only records and tallies; deciding exclusion
//! or retry is a policy question that lives above the protocol engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ParticipantId;

/// Why a share was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintReason {
    /// The share did not match the issuer's published commitment
    CommitmentMismatch,
    /// The sealed share could not be opened
    Undecryptable,
}

impl std::fmt::Display for ComplaintReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplaintReason::CommitmentMismatch => write!(f, "commitment mismatch"),
            ComplaintReason::Undecryptable => write!(f, "undecryptable share"),
        }
    }
}

/// An accusation that `accused` issued `accuser` an invalid share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub accuser: ParticipantId,
    pub accused: ParticipantId,
    pub reason: ComplaintReason,
    pub filed_at: DateTime<Utc>,
}

impl Complaint {
    pub fn new(accuser: ParticipantId, accused: ParticipantId, reason: ComplaintReason) -> Self {
        Self {
            accuser,
            accused,
            reason,
            filed_at: Utc::now(),
        }
    }
}

/// Append-only complaint registry keyed by `(accuser, accused)`.
///
/// Filing is idempotent per key, so duplicate delivery of the same bad
/// share never double-counts, and entries are never retracted.
#[derive(Debug, Default)]
pub struct ComplaintLog {
    entries: BTreeMap<(ParticipantId, ParticipantId), Complaint>,
}

impl ComplaintLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a complaint. Returns `false` if this accuser already
    /// complained about this accused participant.
    pub fn file(&mut self, complaint: Complaint) -> bool {
        let key = (complaint.accuser, complaint.accused);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, complaint);
        true
    }

    /// Total number of complaints on record
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Complaints naming one participant as the accused
    pub fn against(&self, accused: ParticipantId) -> usize {
        self.entries.keys().filter(|(_, a)| *a == accused).count()
    }

    /// Iterate complaints in `(accuser, accused)` order
    pub fn iter(&self) -> impl Iterator<Item = &Complaint> {
        self.entries.values()
    }
}
