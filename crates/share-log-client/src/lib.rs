//! Share Log Client
//!
//! HTTP implementation of the core [`BroadcastLog`] trait against a
//! `share-log-svc` instance. Records travel as base64-wrapped JSON; the
//! service's `kind` column mirrors each record's own `type` discriminator
//! so replicas can filter without decoding payloads.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use fdkg_core::keygen::{LogRecord, RecordKind};
use fdkg_core::log::{BroadcastLog, RecordHandle};
use fdkg_core::{Error, ParticipantId, Result, RoundId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP-backed broadcast log
pub struct LogClient {
    /// HTTP client
    client: Client,
    /// Log service URL
    url: String,
    /// Request timeout
    timeout: Duration,
}

impl LogClient {
    /// Create a client against a service URL
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct AppendRequest {
    round: String,
    writer: u16,
    kind: String,
    payload: String,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RecordEntry {
    kind: String,
    payload: String,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<RecordEntry>,
}

#[derive(Debug, Serialize)]
struct JoinRequest {
    round: String,
    writer: u16,
}

#[derive(Debug, Deserialize)]
struct PeersResponse {
    count: usize,
}

#[async_trait]
impl BroadcastLog for LogClient {
    #[instrument(skip(self, record), fields(kind = %record.kind()))]
    async fn append(&self, round: &RoundId, record: &LogRecord) -> Result<RecordHandle> {
        let payload = serde_json::to_vec(record)?;
        let req = AppendRequest {
            round: hex::encode(round),
            writer: record.origin(),
            kind: record.kind().as_str().to_string(),
            payload: STANDARD.encode(payload),
        };

        let response = self
            .client
            .post(format!("{}/v1/records", self.url))
            .json(&req)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Log(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Log(format!(
                "Append failed with status: {}",
                response.status()
            )));
        }

        let appended: AppendResponse = response
            .json()
            .await
            .map_err(|e| Error::Log(e.to_string()))?;

        debug!(handle = %appended.id, "Record appended");
        Ok(appended.id)
    }

    async fn records(&self, round: &RoundId, kind: RecordKind) -> Result<Vec<LogRecord>> {
        let response = self
            .client
            .get(format!("{}/v1/records", self.url))
            .query(&[
                ("round", hex::encode(round)),
                ("kind", kind.as_str().to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Log(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Log(format!(
                "Fetch failed with status: {}",
                response.status()
            )));
        }

        let fetched: RecordsResponse = response
            .json()
            .await
            .map_err(|e| Error::Log(e.to_string()))?;

        let mut records = Vec::with_capacity(fetched.records.len());
        for entry in fetched.records {
            let bytes = STANDARD
                .decode(&entry.payload)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            let record: LogRecord = serde_json::from_slice(&bytes)?;
            // The service's kind column is advisory; the payload's own
            // discriminator is authoritative
            if record.kind().as_str() != entry.kind || record.kind() != kind {
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }

    async fn join(&self, round: &RoundId, participant: ParticipantId) -> Result<()> {
        let req = JoinRequest {
            round: hex::encode(round),
            writer: participant,
        };
        let response = self
            .client
            .post(format!("{}/v1/peers", self.url))
            .json(&req)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Log(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Log(format!(
                "Join failed with status: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn peers(&self, round: &RoundId) -> Result<usize> {
        let response = self
            .client
            .get(format!("{}/v1/peers", self.url))
            .query(&[("round", hex::encode(round))])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Log(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Log(format!(
                "Peers failed with status: {}",
                response.status()
            )));
        }

        let peers: PeersResponse = response
            .json()
            .await
            .map_err(|e| Error::Log(e.to_string()))?;
        Ok(peers.count)
    }
}
