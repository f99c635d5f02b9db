//! Records exchanged through the broadcast log

use serde::{Deserialize, Serialize};

use crate::channel::SealedShare;
use crate::complaints::Complaint;
use crate::types::ParticipantId;

/// Broadcast of an issuer's Feldman commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentRecord {
    /// Issuing participant
    pub issuer: ParticipantId,
    /// Commitments to polynomial coefficients (compressed points)
    pub commitments: Vec<Vec<u8>>,
}

/// Point-to-point share delivery, sealed to its recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRecord {
    pub sealed: SealedShare,
}

impl ShareRecord {
    pub fn issuer(&self) -> ParticipantId {
        self.sealed.from
    }

    pub fn recipient(&self) -> ParticipantId {
        self.sealed.to
    }
}

/// Outcome of checking one received share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Valid,
    Invalid,
}

/// Announcement that a participant verified an issuer's share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Participant that ran the check
    pub verifier: ParticipantId,
    /// Issuer whose share was checked
    pub issuer: ParticipantId,
    pub outcome: VerificationOutcome,
}

/// Typed record on the broadcast log.
///
/// The serde tag is the wire `type` discriminator replicas filter on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogRecord {
    PolynomialCommitment(CommitmentRecord),
    ShareDistribution(ShareRecord),
    ShareVerification(VerificationRecord),
    Complaint(Complaint),
}

/// The `type` discriminator of a [`LogRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    PolynomialCommitment,
    ShareDistribution,
    ShareVerification,
    Complaint,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::PolynomialCommitment => "polynomial_commitment",
            RecordKind::ShareDistribution => "share_distribution",
            RecordKind::ShareVerification => "share_verification",
            RecordKind::Complaint => "complaint",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LogRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            LogRecord::PolynomialCommitment(_) => RecordKind::PolynomialCommitment,
            LogRecord::ShareDistribution(_) => RecordKind::ShareDistribution,
            LogRecord::ShareVerification(_) => RecordKind::ShareVerification,
            LogRecord::Complaint(_) => RecordKind::Complaint,
        }
    }

    /// The participant that wrote this record
    pub fn origin(&self) -> ParticipantId {
        match self {
            LogRecord::PolynomialCommitment(r) => r.issuer,
            LogRecord::ShareDistribution(r) => r.issuer(),
            LogRecord::ShareVerification(r) => r.verifier,
            LogRecord::Complaint(c) => c.accuser,
        }
    }
}
