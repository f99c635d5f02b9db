//! # fdkg-core
//!
//! Joint-Feldman distributed key generation: N mutually distrusting
//! participants derive a shared group public key such that no one ever
//! holds the full secret, while any threshold subset can later cooperate
//! to use it.
//!
//! The crate provides the protocol engine:
//! - Shamir polynomials with Feldman commitments ([`vss`])
//! - authenticated point-to-point share delivery ([`channel`])
//! - per-participant round state machine and async driver ([`keygen`])
//! - complaint registry for misbehaving issuers ([`complaints`])
//! - share aggregation and out-of-band reconstruction ([`aggregate`])
//! - partial signatures over the final share ([`sign`])
//!
//! Participants synchronize exclusively through an append-only broadcast
//! log behind the [`log::BroadcastLog`] trait; see the `share-log-*`
//! crates for the HTTP-backed implementation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fdkg_core::{keygen, CryptoContext, RoundConfig};
//!
//! let mut round = keygen::DkgRound::new(ctx, config);
//! let share = keygen::run_dkg(&mut round, &channel, &mut entropy, &log, timeout).await?;
//! let partial = round.signer()?.sign(b"message");
//! ```

pub mod aggregate;
pub mod channel;
pub mod complaints;
pub mod error;
pub mod keygen;
pub mod log;
pub mod randomness;
pub mod shares;
pub mod sign;
pub mod types;
pub mod vss;

pub use error::{Error, Result};
pub use types::{
    CompletionPolicy, CryptoContext, FinalShare, ParticipantId, RoundConfig, RoundId,
};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default threshold for a 3-participant setup
pub const DEFAULT_THRESHOLD: u16 = 2;

/// Default number of participants
pub const DEFAULT_PARTICIPANTS: u16 = 3;
