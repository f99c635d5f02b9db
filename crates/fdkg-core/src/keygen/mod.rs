//! One participant's walk through a DKG round
//!
//! Each participant runs [`DkgRound`], a sequential state machine whose
//! phases only move forward. Records from the broadcast log feed in through
//! [`DkgRound::apply`]; the machine owns its polynomial, received shares,
//! and complaint registry exclusively, so it is safe on any thread without
//! locking. All I/O lives in the async driver ([`run_dkg`]).

mod dkg;
mod messages;

pub use dkg::run_dkg;
pub use messages::*;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::aggregate;
use crate::channel::ShareChannel;
use crate::complaints::{Complaint, ComplaintLog, ComplaintReason};
use crate::randomness::RandomnessSource;
use crate::shares::{Share, ShareSet};
use crate::sign::ThresholdSigner;
use crate::types::{CompletionPolicy, CryptoContext, FinalShare, ParticipantId, RoundConfig};
use crate::vss::{CommitmentVector, Polynomial};
use crate::{Error, Result};

/// Protocol phase of one participant. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    PolynomialGenerated,
    CommitmentPublished,
    SharesDistributed,
    SharesVerified,
    Finalized,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::PolynomialGenerated => "polynomial_generated",
            Phase::CommitmentPublished => "commitment_published",
            Phase::SharesDistributed => "shares_distributed",
            Phase::SharesVerified => "shares_verified",
            Phase::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// State of one participant across one DKG round
pub struct DkgRound {
    ctx: CryptoContext,
    config: RoundConfig,
    phase: Phase,
    polynomial: Option<Polynomial>,
    issued: Option<ShareSet>,
    commitments: BTreeMap<ParticipantId, CommitmentVector>,
    received: BTreeMap<ParticipantId, Share>,
    attestations: BTreeMap<(ParticipantId, ParticipantId), VerificationOutcome>,
    complaints: ComplaintLog,
    final_share: Option<FinalShare>,
}

impl DkgRound {
    pub fn new(ctx: CryptoContext, config: RoundConfig) -> Self {
        Self {
            ctx,
            config,
            phase: Phase::Idle,
            polynomial: None,
            issued: None,
            commitments: BTreeMap::new(),
            received: BTreeMap::new(),
            attestations: BTreeMap::new(),
            complaints: ComplaintLog::new(),
            final_share: None,
        }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Complaints known to this participant, own and observed
    pub fn complaints(&self) -> &ComplaintLog {
        &self.complaints
    }

    pub fn final_share(&self) -> Option<&FinalShare> {
        self.final_share.as_ref()
    }

    fn advance(&mut self, from: Phase, to: Phase) -> Result<()> {
        if self.phase != from {
            return Err(Error::PhaseViolation(format!(
                "{} requires phase {}, currently {}",
                to, from, self.phase
            )));
        }
        self.phase = to;
        Ok(())
    }

    /// Draw the secret contribution and blind coefficients
    pub fn generate_polynomial<S: RandomnessSource + ?Sized>(
        &mut self,
        randomness: &mut S,
    ) -> Result<()> {
        self.advance(Phase::Idle, Phase::PolynomialGenerated)?;
        let secret = randomness
            .generate(1)?
            .pop()
            .ok_or_else(|| Error::Entropy("Empty draw for secret contribution".into()))?;
        let polynomial = Polynomial::generate(secret, self.config.threshold, randomness)?;
        self.polynomial = Some(polynomial);
        Ok(())
    }

    /// Commit to our polynomial and emit the broadcast record
    pub fn commitment_record(&mut self) -> Result<LogRecord> {
        self.advance(Phase::PolynomialGenerated, Phase::CommitmentPublished)?;
        let polynomial = self
            .polynomial
            .as_ref()
            .ok_or_else(|| Error::PhaseViolation("No polynomial generated".into()))?;
        let commitment = CommitmentVector::commit(&self.ctx, polynomial);
        let record = CommitmentRecord {
            issuer: self.config.participant,
            commitments: commitment.to_bytes(),
        };
        self.commitments.insert(self.config.participant, commitment);
        Ok(LogRecord::PolynomialCommitment(record))
    }

    /// Absorb another issuer's commitment. Duplicates are ignored.
    pub fn observe_commitment(&mut self, record: &CommitmentRecord) -> Result<bool> {
        if record.issuer == 0 || record.issuer > self.config.n {
            return Err(Error::InvalidConfig(format!(
                "Commitment from unknown participant {}",
                record.issuer
            )));
        }
        if self.commitments.contains_key(&record.issuer) {
            return Ok(false);
        }
        let commitment = CommitmentVector::from_bytes(&record.commitments)?;
        if commitment.len() != self.config.threshold as usize {
            return Err(Error::InvalidConfig(format!(
                "Commitment from {} has {} coefficients, round threshold is {}",
                record.issuer,
                commitment.len(),
                self.config.threshold
            )));
        }
        debug!(issuer = record.issuer, "Commitment recorded");
        self.commitments.insert(record.issuer, commitment);
        Ok(true)
    }

    pub fn commitment_count(&self) -> usize {
        self.commitments.len()
    }

    pub fn have_all_commitments(&self) -> bool {
        self.commitments.len() == self.config.n as usize
    }

    /// Evaluate our polynomial at every index and seal the results.
    ///
    /// Our own share is consumed directly; the returned records carry one
    /// sealed share per other participant plus our self-verification.
    pub fn share_records(&mut self, channel: &ShareChannel) -> Result<Vec<LogRecord>> {
        self.advance(Phase::CommitmentPublished, Phase::SharesDistributed)?;
        let polynomial = self
            .polynomial
            .as_ref()
            .ok_or_else(|| Error::PhaseViolation("No polynomial generated".into()))?;
        let me = self.config.participant;
        let issued = ShareSet::generate(me, polynomial, self.config.participants())?;

        let mut records = Vec::with_capacity(self.config.n as usize);
        for (recipient, share) in issued.iter() {
            if *recipient == me {
                continue;
            }
            let sealed = channel.seal(share, *recipient)?;
            records.push(LogRecord::ShareDistribution(ShareRecord { sealed }));
        }

        // Our own share skips the channel but not the verification path
        let own = issued
            .for_recipient(me)
            .ok_or_else(|| Error::PhaseViolation("Own share missing from share set".into()))?
            .clone();
        records.extend(self.accept_share(me, own)?);
        self.issued = Some(issued);

        Ok(records)
    }

    /// Open, verify, and register a share sealed for us.
    ///
    /// Returns the records to publish in reaction: always a verification
    /// announcement, plus a complaint when the share is rejected. Shares
    /// addressed to other participants and duplicates yield no reaction.
    pub fn observe_share(
        &mut self,
        record: &ShareRecord,
        channel: &ShareChannel,
    ) -> Result<Vec<LogRecord>> {
        let me = self.config.participant;
        let issuer = record.issuer();
        if record.recipient() != me || issuer == me {
            return Ok(Vec::new());
        }
        if issuer == 0 || issuer > self.config.n {
            warn!(issuer, "Share from unknown participant ignored");
            return Ok(Vec::new());
        }
        if self.attestations.contains_key(&(me, issuer)) {
            return Ok(Vec::new());
        }
        if !self.commitments.contains_key(&issuer) {
            // Out-of-order delivery; retry once the commitment arrives
            return Err(Error::PhaseViolation(format!(
                "Share from {} arrived before its commitment",
                issuer
            )));
        }

        match channel.open(&record.sealed) {
            Ok(share) => self.accept_share(issuer, share),
            Err(Error::Decryption(reason)) => {
                warn!(issuer, %reason, "Share could not be opened");
                Ok(self.reject_share(issuer, ComplaintReason::Undecryptable))
            }
            Err(e) => Err(e),
        }
    }

    /// Verify a successfully opened share and register the outcome
    fn accept_share(&mut self, issuer: ParticipantId, share: Share) -> Result<Vec<LogRecord>> {
        let me = self.config.participant;
        let commitment = self
            .commitments
            .get(&issuer)
            .ok_or_else(|| Error::PhaseViolation(format!("No commitment from {}", issuer)))?;

        if !commitment.verify_share(&self.ctx, &share, self.config.n) {
            return Ok(self.reject_share(issuer, ComplaintReason::CommitmentMismatch));
        }

        debug!(issuer, "Share verified");
        self.received.insert(issuer, share);
        self.attestations
            .insert((me, issuer), VerificationOutcome::Valid);
        Ok(vec![LogRecord::ShareVerification(VerificationRecord {
            verifier: me,
            issuer,
            outcome: VerificationOutcome::Valid,
        })])
    }

    /// Register a rejected share: exactly one complaint, never aggregated
    fn reject_share(&mut self, issuer: ParticipantId, reason: ComplaintReason) -> Vec<LogRecord> {
        let me = self.config.participant;
        self.attestations
            .insert((me, issuer), VerificationOutcome::Invalid);

        let complaint = Complaint::new(me, issuer, reason);
        let mut records = vec![LogRecord::ShareVerification(VerificationRecord {
            verifier: me,
            issuer,
            outcome: VerificationOutcome::Invalid,
        })];
        if self.complaints.file(complaint.clone()) {
            warn!(accused = issuer, %reason, "Complaint filed");
            records.push(LogRecord::Complaint(complaint));
        }
        records
    }

    /// Record another participant's verification announcement
    pub fn observe_verification(&mut self, record: &VerificationRecord) {
        self.attestations
            .entry((record.verifier, record.issuer))
            .or_insert(record.outcome);
    }

    /// Record a complaint observed on the log
    pub fn observe_complaint(&mut self, complaint: &Complaint) {
        self.complaints.file(complaint.clone());
    }

    /// Dispatch one log record to the matching handler
    pub fn apply(&mut self, record: &LogRecord, channel: &ShareChannel) -> Result<Vec<LogRecord>> {
        match record {
            LogRecord::PolynomialCommitment(r) => {
                self.observe_commitment(r)?;
                Ok(Vec::new())
            }
            LogRecord::ShareDistribution(r) => self.observe_share(r, channel),
            LogRecord::ShareVerification(r) => {
                self.observe_verification(r);
                Ok(Vec::new())
            }
            LogRecord::Complaint(c) => {
                self.observe_complaint(c);
                Ok(Vec::new())
            }
        }
    }

    /// Number of verified shares in hand, own included
    pub fn verified_count(&self) -> usize {
        self.received.len()
    }

    /// Whether the configured completion policy is satisfied
    pub fn policy_satisfied(&self) -> bool {
        match self.config.policy {
            CompletionPolicy::All => self.received.len() == self.config.n as usize,
            CompletionPolicy::Quorum(q) => self.received.len() >= q as usize,
        }
    }

    /// Close the verification phase once the completion policy holds
    pub fn mark_verified(&mut self) -> Result<()> {
        if !self.policy_satisfied() {
            return Err(Error::PhaseViolation(format!(
                "Completion policy not satisfied: {} verified shares",
                self.received.len()
            )));
        }
        self.advance(Phase::SharesDistributed, Phase::SharesVerified)
    }

    /// Aggregate the verified shares into this participant's final share
    pub fn finalize(&mut self) -> Result<&FinalShare> {
        self.advance(Phase::SharesVerified, Phase::Finalized)?;
        let final_share =
            aggregate::finalize(&self.ctx, &self.config, &self.received, &self.commitments)?;
        Ok(self.final_share.insert(final_share))
    }

    /// A signer over the final share; fails until the round has finalized
    pub fn signer(&self) -> Result<ThresholdSigner<'_>> {
        let share = self.final_share.as_ref().ok_or(Error::NoFinalShare)?;
        Ok(ThresholdSigner::new(&self.ctx, share))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelIdentity;
    use crate::randomness::LocalEntropy;
    use crate::sign::verify_partial;
    use crate::types::encode_point;
    use k256::{elliptic_curve::Field, Scalar};

    struct Participant {
        round: DkgRound,
        channel: ShareChannel,
    }

    /// Wire up `n` participants with channels and published commitments
    fn setup(n: u16, threshold: u16, policy: CompletionPolicy) -> Vec<Participant> {
        let ctx = CryptoContext::new();
        let round_id = [9u8; 32];
        let identities: Vec<ChannelIdentity> =
            (0..n).map(|_| ChannelIdentity::generate()).collect();
        let directory: BTreeMap<ParticipantId, [u8; 32]> = identities
            .iter()
            .enumerate()
            .map(|(i, id)| (i as u16 + 1, id.public_key()))
            .collect();

        let mut participants: Vec<Participant> = identities
            .iter()
            .enumerate()
            .map(|(i, identity)| {
                let me = i as u16 + 1;
                let config = RoundConfig::new(n, threshold, me)
                    .unwrap()
                    .with_policy(policy)
                    .unwrap()
                    .with_round_id(round_id);
                Participant {
                    round: DkgRound::new(ctx.clone(), config),
                    channel: ShareChannel::new(me, identity, directory.clone()),
                }
            })
            .collect();

        let mut commitment_records = Vec::new();
        for p in &mut participants {
            p.round.generate_polynomial(&mut LocalEntropy).unwrap();
            commitment_records.push(p.round.commitment_record().unwrap());
        }
        for p in &mut participants {
            for record in &commitment_records {
                p.round.apply(record, &p.channel).unwrap();
            }
            assert!(p.round.have_all_commitments());
        }

        participants
    }

    fn exchange_shares(participants: &mut [Participant]) -> Vec<LogRecord> {
        let mut distributed = Vec::new();
        for p in participants.iter_mut() {
            distributed.extend(p.round.share_records(&p.channel).unwrap());
        }
        let mut reactions = Vec::new();
        for p in participants.iter_mut() {
            for record in &distributed {
                reactions.extend(p.round.apply(record, &p.channel).unwrap());
            }
        }
        reactions
    }

    #[test]
    fn honest_round_finalizes_with_zero_complaints() {
        let mut participants = setup(3, 2, CompletionPolicy::All);
        let reactions = exchange_shares(&mut participants);
        assert!(!reactions
            .iter()
            .any(|r| r.kind() == RecordKind::Complaint));

        let mut group_keys = Vec::new();
        for p in &mut participants {
            assert!(p.round.policy_satisfied());
            p.round.mark_verified().unwrap();
            let share = p.round.finalize().unwrap();
            group_keys.push(share.group_public_key.clone());
            assert_eq!(p.round.complaints().count(), 0);
        }
        assert_eq!(group_keys[0], group_keys[1]);
        assert_eq!(group_keys[1], group_keys[2]);
    }

    #[test]
    fn tampered_share_draws_one_complaint_and_round_survives() {
        let mut participants = setup(3, 2, CompletionPolicy::Quorum(2));

        // Everyone distributes honestly except participant 2, whose share
        // for participant 1 is off by one.
        let mut distributed = Vec::new();
        for (i, p) in participants.iter_mut().enumerate() {
            if i as u16 + 1 != 2 {
                distributed.extend(p.round.share_records(&p.channel).unwrap());
            }
        }
        {
            let cheat = &mut participants[1];
            let records = cheat.round.share_records(&cheat.channel).unwrap();
            for record in records {
                match record {
                    LogRecord::ShareDistribution(r) if r.recipient() == 1 => {
                        // Reseal participant 1's share with the value off by one
                        let issued = cheat.round.issued.as_ref().unwrap();
                        let honest = issued.for_recipient(1).unwrap();
                        let forged = Share::new(1, honest.y + Scalar::ONE);
                        let sealed = cheat.channel.seal(&forged, 1).unwrap();
                        distributed
                            .push(LogRecord::ShareDistribution(ShareRecord { sealed }));
                    }
                    other => distributed.push(other),
                }
            }
        }

        for p in participants.iter_mut() {
            for record in &distributed {
                p.round.apply(record, &p.channel).unwrap();
            }
        }

        let victim = &mut participants[0];
        assert_eq!(victim.round.complaints().count(), 1);
        assert_eq!(victim.round.complaints().against(2), 1);
        // The bad share is excluded, but quorum still holds: own + participant 3
        assert_eq!(victim.round.verified_count(), 2);
        victim.round.mark_verified().unwrap();
        let share = victim.round.finalize().unwrap();
        assert_eq!(share.participant, 1);
    }

    #[test]
    fn duplicate_records_are_not_reprocessed() {
        let mut participants = setup(3, 2, CompletionPolicy::All);
        let distributed: Vec<LogRecord> = {
            let p = &mut participants[1];
            p.round.share_records(&p.channel).unwrap()
        };

        let victim = &mut participants[0];
        let mut reactions = Vec::new();
        for record in distributed.iter().chain(distributed.iter()) {
            reactions.extend(victim.round.apply(record, &victim.channel).unwrap());
        }
        // Second delivery of the same share yields no second verification
        let verifications = reactions
            .iter()
            .filter(|r| r.kind() == RecordKind::ShareVerification)
            .count();
        assert_eq!(verifications, 1);
    }

    #[test]
    fn phases_only_move_forward() {
        let ctx = CryptoContext::new();
        let config = RoundConfig::new(3, 2, 1).unwrap();
        let mut round = DkgRound::new(ctx, config);

        assert!(matches!(
            round.commitment_record(),
            Err(Error::PhaseViolation(_))
        ));
        round.generate_polynomial(&mut LocalEntropy).unwrap();
        assert!(matches!(
            round.generate_polynomial(&mut LocalEntropy),
            Err(Error::PhaseViolation(_))
        ));
        assert!(matches!(round.signer(), Err(Error::NoFinalShare)));
    }

    #[test]
    fn finalized_round_signs_verifiably() {
        let mut participants = setup(3, 2, CompletionPolicy::All);
        exchange_shares(&mut participants);

        for p in &mut participants {
            p.round.mark_verified().unwrap();
            p.round.finalize().unwrap();
        }
        for p in &participants {
            let signer = p.round.signer().unwrap();
            let signature = signer.sign(b"test message");
            let ctx = CryptoContext::new();
            let point = encode_point(
                &p.round.final_share().unwrap().verifying_point(&ctx),
            );
            assert!(verify_partial(&ctx, &signature, &point, b"test message").unwrap());
        }
    }
}
