//! Broadcast log interface
//!
//! The single shared mutable resource participants synchronize through: an
//! append-only, eventually consistent, multi-writer log. The engine asks
//! only for at-least-once delivery, a replayable snapshot in stable
//! per-writer order, and filtering by record type; everything stronger
//! (ordering across writers, exactly-once) is deliberately not assumed.

use crate::keygen::{LogRecord, RecordKind};
use crate::types::{ParticipantId, RoundId};
use crate::Result;

pub use ::async_trait::async_trait;

/// Handle to an appended record, opaque to the engine
pub type RecordHandle = String;

/// Append-only replicated record log
#[async_trait]
pub trait BroadcastLog: Send + Sync {
    /// Durably publish a record to all replicas
    async fn append(&self, round: &RoundId, record: &LogRecord) -> Result<RecordHandle>;

    /// Snapshot of all records of one kind, replayable from the start.
    /// May contain duplicates; consumers must be idempotent.
    async fn records(&self, round: &RoundId, kind: RecordKind) -> Result<Vec<LogRecord>>;

    /// Announce this participant's replica as reachable
    async fn join(&self, round: &RoundId, participant: ParticipantId) -> Result<()>;

    /// Number of participant replicas currently reachable
    async fn peers(&self, round: &RoundId) -> Result<usize>;
}

/// In-memory log for testing
pub mod memory;

pub use memory::MemoryLog;
