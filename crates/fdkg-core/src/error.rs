//! Error types for DKG operations

use crate::types::ParticipantId;
use thiserror::Error;

/// Result type alias for DKG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a DKG round
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid round configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// System entropy source failed; the round must be aborted
    #[error("Entropy source failed: {0}")]
    Entropy(String),

    /// The randomness oracle could not be reached
    #[error("Randomness oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The randomness proof did not verify
    #[error("Randomness proof rejected: {0}")]
    ProofVerification(String),

    /// A received share failed verification against the issuer's commitment
    #[error("Invalid share from participant {issuer}: {reason}")]
    InvalidShare {
        issuer: ParticipantId,
        reason: String,
    },

    /// A sealed share could not be opened
    #[error("Share decryption failed: {0}")]
    Decryption(String),

    /// A bounded wait on the broadcast log expired
    #[error("Replication timeout waiting for {0}")]
    ReplicationTimeout(String),

    /// Signing was requested before the round produced a final share
    #[error("No final share: the round has not finalized")]
    NoFinalShare,

    /// Evaluation point outside the valid participant domain
    #[error("Invalid participant index: {0}")]
    InvalidParticipantIndex(u16),

    /// A round operation was invoked out of phase order
    #[error("Phase violation: {0}")]
    PhaseViolation(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Broadcast log error
    #[error("Log error: {0}")]
    Log(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
