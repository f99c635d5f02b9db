//! Share Log Library
//!
//! Append-only, multi-writer record store backing the DKG broadcast log.
//! Records are content-addressed, sequenced per writer, and filterable by
//! their `type` discriminator; replicas replay them in stable per-writer
//! order. Retention is TTL-based so finished rounds age out of memory.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Invalid record format: {0}")]
    InvalidFormat(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Identity of one appended record
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecordId {
    /// Round the record belongs to (hex round identifier)
    pub round: String,
    /// Writing participant
    pub writer: u16,
    /// Position in the writer's own append order
    pub seq: u64,
    /// Record `type` discriminator
    pub kind: String,
}

impl RecordId {
    /// Content address for lookup
    pub fn hash(&self) -> String {
        let data = format!("{}:{}:{}:{}", self.round, self.writer, self.seq, self.kind);
        hex::encode(blake3::hash(data.as_bytes()).as_bytes())
    }
}

/// One stored record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Record identity
    pub id: RecordId,
    /// Record payload (JSON bytes)
    pub payload: Vec<u8>,
    /// Append timestamp
    pub appended_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

/// Append-only record store
#[derive(Clone)]
pub struct RecordStore {
    /// Records indexed by content hash
    records: Arc<DashMap<String, StoredRecord>>,
    /// Next sequence number per (round, writer)
    sequences: Arc<DashMap<(String, u16), Arc<AtomicU64>>>,
    /// Reachable writers per round
    peers: Arc<DashMap<String, DashSet<u16>>>,
    /// Record TTL in seconds
    ttl_seconds: i64,
}

impl RecordStore {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            sequences: Arc::new(DashMap::new()),
            peers: Arc::new(DashMap::new()),
            ttl_seconds,
        }
    }

    /// Append a record, assigning the writer's next sequence number
    pub fn append(&self, round: &str, writer: u16, kind: &str, payload: Vec<u8>) -> Result<RecordId> {
        let counter = self
            .sequences
            .entry((round.to_string(), writer))
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone();
        let seq = counter.fetch_add(1, Ordering::SeqCst);

        let id = RecordId {
            round: round.to_string(),
            writer,
            seq,
            kind: kind.to_string(),
        };
        let now = Utc::now();
        let record = StoredRecord {
            id: id.clone(),
            payload,
            appended_at: now,
            expires_at: now + chrono::Duration::seconds(self.ttl_seconds),
        };

        self.records.insert(id.hash(), record);
        tracing::debug!(round, writer, kind, seq, "Record appended");
        Ok(id)
    }

    /// Get a record by identity
    pub fn get(&self, id: &RecordId) -> Result<StoredRecord> {
        let hash = id.hash();
        self.records
            .get(&hash)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(hash))
    }

    /// All records of a round, optionally filtered by discriminator, in
    /// stable `(writer, seq)` order
    pub fn round_records(&self, round: &str, kind: Option<&str>) -> Vec<StoredRecord> {
        let mut records: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|entry| {
                entry.id.round == round
                    && kind.map(|k| entry.id.kind == k).unwrap_or(true)
            })
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| (r.id.writer, r.id.seq));
        records
    }

    /// Mark a writer's replica as reachable for a round
    pub fn join(&self, round: &str, writer: u16) {
        self.peers
            .entry(round.to_string())
            .or_default()
            .insert(writer);
    }

    /// Writers whose replicas are reachable for a round
    pub fn peers(&self, round: &str) -> Vec<u16> {
        let mut writers: Vec<u16> = self
            .peers
            .get(round)
            .map(|set| set.iter().map(|w| *w).collect())
            .unwrap_or_default();
        writers.sort_unstable();
        writers
    }

    /// Remove expired records
    pub fn cleanup(&self) {
        let before = self.records.len();
        let now = Utc::now();
        self.records.retain(|_, record| record.expires_at > now);
        let dropped = before - self.records.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Expired records removed");
        }
    }

    /// Total records currently held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(3600) // 1 hour default TTL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_hash_is_stable() {
        let id1 = RecordId {
            round: "round1".into(),
            writer: 1,
            seq: 0,
            kind: "polynomial_commitment".into(),
        };
        let id2 = id1.clone();
        let id3 = RecordId { seq: 1, ..id1.clone() };

        assert_eq!(id1.hash(), id2.hash());
        assert_ne!(id1.hash(), id3.hash());
    }

    #[test]
    fn append_sequences_per_writer() {
        let store = RecordStore::new(3600);

        let a = store.append("r", 1, "complaint", vec![1]).unwrap();
        let b = store.append("r", 1, "complaint", vec![2]).unwrap();
        let c = store.append("r", 2, "complaint", vec![3]).unwrap();

        assert_eq!((a.seq, b.seq, c.seq), (0, 1, 0));
        assert_eq!(store.get(&a).unwrap().payload, vec![1]);
    }

    #[test]
    fn round_records_filter_and_order() {
        let store = RecordStore::new(3600);
        store.append("r", 2, "share_distribution", vec![1]).unwrap();
        store.append("r", 1, "share_distribution", vec![2]).unwrap();
        store.append("r", 1, "complaint", vec![3]).unwrap();
        store.append("other", 1, "complaint", vec![4]).unwrap();

        let shares = store.round_records("r", Some("share_distribution"));
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].id.writer, 1);
        assert_eq!(shares[1].id.writer, 2);

        let all = store.round_records("r", None);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn peers_track_distinct_writers() {
        let store = RecordStore::default();
        store.join("r", 3);
        store.join("r", 1);
        store.join("r", 1);

        assert_eq!(store.peers("r"), vec![1, 3]);
        assert!(store.peers("other").is_empty());
    }

    #[test]
    fn cleanup_drops_expired_records() {
        let store = RecordStore::new(-1);
        store.append("r", 1, "complaint", vec![1]).unwrap();
        assert_eq!(store.len(), 1);
        store.cleanup();
        assert!(store.is_empty());
    }
}
