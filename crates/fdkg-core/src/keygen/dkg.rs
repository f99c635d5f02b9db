//! Async driver for one DKG round
//!
//! Wires a [`DkgRound`] state machine to a [`BroadcastLog`]. All waits are
//! bounded polling loops against a single deadline; an exhausted deadline
//! surfaces [`Error::ReplicationTimeout`]. Dropping the returned future
//! cancels the round; the caller keeps the state machine and its partial
//! state (received shares, complaints) for diagnostics.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{DkgRound, LogRecord, RecordKind};
use crate::channel::ShareChannel;
use crate::log::BroadcastLog;
use crate::randomness::RandomnessSource;
use crate::types::FinalShare;
use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run a participant through a full DKG round.
///
/// Retries of a failed round must start from a fresh [`DkgRound`] (and
/// therefore a fresh polynomial); mixing commitments from different
/// coefficient sets breaks verification for everyone.
#[instrument(skip_all, fields(participant = round.config().participant, n = round.config().n, threshold = round.config().threshold))]
pub async fn run_dkg<L: BroadcastLog>(
    round: &mut DkgRound,
    channel: &ShareChannel,
    randomness: &mut (dyn RandomnessSource + Send),
    log: &L,
    timeout: Duration,
) -> Result<FinalShare> {
    info!("Starting DKG round");
    let deadline = Instant::now() + timeout;
    let round_id = round.config().round_id;
    let n = round.config().n as usize;

    // Wait for every participant's replica before publishing anything
    log.join(&round_id, round.config().participant).await?;
    loop {
        if log.peers(&round_id).await? >= n {
            break;
        }
        pause(deadline, "participant replicas to join").await?;
    }

    // Publish our commitment, then collect everyone's
    round.generate_polynomial(randomness)?;
    let commitment = round.commitment_record()?;
    log.append(&round_id, &commitment).await?;
    debug!("Commitment published");

    loop {
        for record in log.records(&round_id, RecordKind::PolynomialCommitment).await? {
            if let LogRecord::PolynomialCommitment(r) = &record {
                if let Err(e) = round.observe_commitment(r) {
                    warn!(issuer = r.issuer, error = %e, "Commitment rejected");
                }
            }
        }
        if round.have_all_commitments() {
            break;
        }
        pause(deadline, "polynomial commitments").await?;
    }
    debug!(count = round.commitment_count(), "All commitments collected");

    // Distribute sealed shares
    for record in round.share_records(channel)? {
        log.append(&round_id, &record).await?;
    }
    debug!("Shares distributed");

    // Collect, verify, and react until the completion policy holds
    loop {
        for record in log.records(&round_id, RecordKind::ShareDistribution).await? {
            if let LogRecord::ShareDistribution(r) = &record {
                match round.observe_share(r, channel) {
                    Ok(reactions) => {
                        for reaction in reactions {
                            log.append(&round_id, &reaction).await?;
                        }
                    }
                    // Out-of-order share; picked up again next poll
                    Err(Error::PhaseViolation(_)) => continue,
                    Err(e) => warn!(issuer = r.issuer(), error = %e, "Share dropped"),
                }
            }
        }
        for record in log.records(&round_id, RecordKind::Complaint).await? {
            if let LogRecord::Complaint(c) = &record {
                round.observe_complaint(c);
            }
        }
        for record in log.records(&round_id, RecordKind::ShareVerification).await? {
            if let LogRecord::ShareVerification(r) = &record {
                round.observe_verification(r);
            }
        }
        if round.policy_satisfied() {
            break;
        }
        pause(deadline, "verified shares").await?;
    }

    round.mark_verified()?;
    let final_share = round.finalize()?.clone();

    info!(
        verified = round.verified_count(),
        complaints = round.complaints().count(),
        group_public_key = hex::encode(&final_share.group_public_key),
        "DKG round finalized"
    );

    Ok(final_share)
}

/// Sleep one poll interval, or fail if that would cross the deadline
async fn pause(deadline: Instant, waiting_for: &str) -> Result<()> {
    if Instant::now() + POLL_INTERVAL >= deadline {
        return Err(Error::ReplicationTimeout(waiting_for.into()));
    }
    tokio::time::sleep(POLL_INTERVAL).await;
    Ok(())
}
