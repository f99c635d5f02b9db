//! Share Log Service
//!
//! HTTP service hosting a shared replica of the DKG broadcast log.
//! Participants append typed records, poll them back by round and type
//! discriminator, and announce their replicas through the peer endpoints.

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use share_log::RecordStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

/// Share log service CLI arguments
#[derive(Parser, Debug)]
#[command(name = "share-log-svc")]
#[command(about = "Broadcast log service for DKG rounds")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Record TTL in seconds
    #[arg(long, default_value = "3600")]
    ttl: i64,
}

/// Application state
struct AppState {
    store: RecordStore,
}

/// Request to append a record
#[derive(Debug, Serialize, Deserialize)]
struct AppendRequest {
    round: String,
    writer: u16,
    kind: String,
    payload: String, // base64 encoded
}

/// Query for fetching records
#[derive(Debug, Deserialize)]
struct RecordsQuery {
    round: String,
    kind: Option<String>,
}

/// One record in a fetch response
#[derive(Debug, Serialize, Deserialize)]
struct RecordEntry {
    writer: u16,
    seq: u64,
    kind: String,
    payload: String, // base64 encoded
}

/// Request to announce a reachable replica
#[derive(Debug, Serialize, Deserialize)]
struct JoinRequest {
    round: String,
    writer: u16,
}

/// Query for listing reachable replicas
#[derive(Debug, Deserialize)]
struct PeersQuery {
    round: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!(listen = %args.listen, ttl = args.ttl, "Starting share log service");

    let state = Arc::new(AppState {
        store: RecordStore::new(args.ttl),
    });

    // Spawn cleanup task
    let cleanup_store = state.store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_store.cleanup();
        }
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/records", post(append_record))
        .route("/v1/records", get(fetch_records))
        .route("/v1/peers", post(join_round))
        .route("/v1/peers", get(fetch_peers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(address = %args.listen, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "share-log-svc",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Append a record to the log
async fn append_record(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AppendRequest>,
) -> impl IntoResponse {
    let payload = match b64::decode(&req.payload) {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("Invalid base64: {}", e) })),
            );
        }
    };

    match state.store.append(&req.round, req.writer, &req.kind, payload) {
        Ok(id) => {
            info!(
                round = %req.round,
                writer = req.writer,
                kind = %req.kind,
                seq = id.seq,
                "Record appended"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({ "id": id.hash(), "seq": id.seq })),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

/// Fetch records for a round, optionally filtered by discriminator
async fn fetch_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> impl IntoResponse {
    let records: Vec<RecordEntry> = state
        .store
        .round_records(&query.round, query.kind.as_deref())
        .into_iter()
        .map(|record| RecordEntry {
            writer: record.id.writer,
            seq: record.id.seq,
            kind: record.id.kind,
            payload: b64::encode(&record.payload),
        })
        .collect();

    Json(serde_json::json!({ "records": records }))
}

/// Announce a participant replica as reachable
async fn join_round(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinRequest>,
) -> impl IntoResponse {
    state.store.join(&req.round, req.writer);
    info!(round = %req.round, writer = req.writer, "Replica joined");
    Json(serde_json::json!({ "ok": true }))
}

/// List reachable replicas for a round
async fn fetch_peers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeersQuery>,
) -> impl IntoResponse {
    let writers = state.store.peers(&query.round);
    Json(serde_json::json!({ "count": writers.len(), "writers": writers }))
}

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};

    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(s)
    }
}
