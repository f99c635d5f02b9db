//! In-memory broadcast log implementation for testing

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::{async_trait, BroadcastLog, RecordHandle};
use crate::keygen::{LogRecord, RecordKind};
use crate::types::{ParticipantId, RoundId};
use crate::Result;

/// Shared in-process log. Cloning yields another handle onto the same
/// underlying records, so one instance serves every participant of a test.
#[derive(Clone)]
pub struct MemoryLog {
    records: Arc<DashMap<RoundId, Vec<LogRecord>>>,
    peers: Arc<DashMap<RoundId, BTreeSet<ParticipantId>>>,
    notify: broadcast::Sender<()>,
}

impl MemoryLog {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(128);
        Self {
            records: Arc::new(DashMap::new()),
            peers: Arc::new(DashMap::new()),
            notify,
        }
    }

    /// Total records appended to a round, duplicates included
    pub fn len(&self, round: &RoundId) -> usize {
        self.records.get(round).map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, round: &RoundId) -> bool {
        self.len(round) == 0
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastLog for MemoryLog {
    async fn append(&self, round: &RoundId, record: &LogRecord) -> Result<RecordHandle> {
        let mut entry = self.records.entry(*round).or_default();
        entry.push(record.clone());
        let handle = format!("{}:{}", hex::encode(&round[..8]), entry.len());
        drop(entry);

        let _ = self.notify.send(());
        Ok(handle)
    }

    async fn records(&self, round: &RoundId, kind: RecordKind) -> Result<Vec<LogRecord>> {
        Ok(self
            .records
            .get(round)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|record| record.kind() == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn join(&self, round: &RoundId, participant: ParticipantId) -> Result<()> {
        self.peers.entry(*round).or_default().insert(participant);
        let _ = self.notify.send(());
        Ok(())
    }

    async fn peers(&self, round: &RoundId) -> Result<usize> {
        Ok(self.peers.get(round).map(|p| p.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::{CommitmentRecord, VerificationOutcome, VerificationRecord};

    #[tokio::test]
    async fn records_filter_by_kind() {
        let log = MemoryLog::new();
        let round = [1u8; 32];

        log.append(
            &round,
            &LogRecord::PolynomialCommitment(CommitmentRecord {
                issuer: 1,
                commitments: vec![],
            }),
        )
        .await
        .unwrap();
        log.append(
            &round,
            &LogRecord::ShareVerification(VerificationRecord {
                verifier: 2,
                issuer: 1,
                outcome: VerificationOutcome::Valid,
            }),
        )
        .await
        .unwrap();

        let commitments = log.records(&round, RecordKind::PolynomialCommitment).await.unwrap();
        assert_eq!(commitments.len(), 1);
        let complaints = log.records(&round, RecordKind::Complaint).await.unwrap();
        assert!(complaints.is_empty());
    }

    #[tokio::test]
    async fn peers_count_distinct_joins() {
        let log = MemoryLog::new();
        let round = [2u8; 32];

        assert_eq!(log.peers(&round).await.unwrap(), 0);
        log.join(&round, 1).await.unwrap();
        log.join(&round, 2).await.unwrap();
        log.join(&round, 2).await.unwrap();
        assert_eq!(log.peers(&round).await.unwrap(), 2);
    }
}
