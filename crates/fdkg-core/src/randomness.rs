//! Entropy sources for polynomial coefficients
//!
//! Two implementations: [`LocalEntropy`] draws from the operating system's
//! CSPRNG, and [`OracleEntropy`] adapts an external verifiable-randomness
//! oracle. Oracle output is authenticated but *public*: every participant
//! can see the same draw, so it is never used directly as a private
//! coefficient. Coefficients are derived by hashing the draw together with
//! the consuming participant's ID and the coefficient index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce},
    Scalar,
};
use rand::rngs::OsRng;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::types::{CryptoContext, ParticipantId};
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Supplies field elements for polynomial coefficients
pub trait RandomnessSource {
    /// Draw `count` field elements
    fn generate(&mut self, count: usize) -> Result<Vec<Scalar>>;
}

/// Entropy from the operating system's CSPRNG
pub struct LocalEntropy;

impl RandomnessSource for LocalEntropy {
    fn generate(&mut self, count: usize) -> Result<Vec<Scalar>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let mut bytes = [0u8; 32];
            OsRng
                .try_fill_bytes(&mut bytes)
                .map_err(|e| Error::Entropy(e.to_string()))?;
            out.push(<Scalar as Reduce<U256>>::reduce_bytes(&bytes.into()));
        }
        Ok(out)
    }
}

/// Randomness with an attached, independently checkable proof
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VrfProof {
    /// Request this proof answers
    pub request_id: Uuid,

    /// Random values (32 bytes each)
    pub values: Vec<Vec<u8>>,

    /// Proof of correct generation
    pub proof: Vec<u8>,

    /// When the oracle produced the draw
    pub issued_at: DateTime<Utc>,

    /// Which oracle produced it
    pub origin: String,
}

/// External verifiable-randomness oracle
#[async_trait]
pub trait VrfOracle: Send + Sync {
    /// Request `count` random values with a proof
    async fn request_randomness(&self, count: usize) -> Result<VrfProof>;

    /// Check a proof. Every consumer must call this independently before
    /// trusting the values; accepting an unverified proof off the network
    /// is a protocol violation.
    fn verify_proof(&self, proof: &VrfProof) -> bool;
}

/// Entropy derived from a verified oracle draw.
///
/// The draw is shared public randomness. Each coefficient is
/// `H(domain || value_i || participant || i)`, so two participants seeded
/// from the same proof still obtain unrelated polynomials.
#[derive(Debug)]
pub struct OracleEntropy {
    proof: VrfProof,
    participant: ParticipantId,
    domain: Vec<u8>,
    consumed: usize,
}

impl OracleEntropy {
    /// Request a draw and re-verify its proof before accepting it
    pub async fn request<O: VrfOracle + ?Sized>(
        oracle: &O,
        ctx: &CryptoContext,
        participant: ParticipantId,
        count: usize,
    ) -> Result<Self> {
        let proof = oracle.request_randomness(count).await?;
        if !oracle.verify_proof(&proof) {
            return Err(Error::ProofVerification(format!(
                "Oracle {} returned an unverifiable proof for request {}",
                proof.origin, proof.request_id
            )));
        }
        if proof.values.len() < count {
            return Err(Error::ProofVerification(format!(
                "Oracle returned {} values, requested {}",
                proof.values.len(),
                count
            )));
        }
        Ok(Self {
            proof,
            participant,
            domain: ctx.domain().to_vec(),
            consumed: 0,
        })
    }

    /// The verified proof backing this source
    pub fn proof(&self) -> &VrfProof {
        &self.proof
    }
}

impl RandomnessSource for OracleEntropy {
    fn generate(&mut self, count: usize) -> Result<Vec<Scalar>> {
        // A value is consumed exactly once per draw; reuse would correlate
        // coefficients across calls
        let remaining = self.proof.values.len() - self.consumed;
        if count > remaining {
            return Err(Error::Entropy(format!(
                "Draw has {} unconsumed values, {} requested",
                remaining, count
            )));
        }
        let start = self.consumed;
        let out = self.proof.values[start..start + count]
            .iter()
            .enumerate()
            .map(|(offset, value)| {
                let index = (start + offset) as u32;
                let mut hasher = Sha256::new();
                hasher.update(&self.domain);
                hasher.update(b"oracle-coeff");
                hasher.update(value);
                hasher.update(self.participant.to_be_bytes());
                hasher.update(index.to_be_bytes());
                let digest: [u8; 32] = hasher.finalize().into();
                <Scalar as Reduce<U256>>::reduce_bytes(&digest.into())
            })
            .collect();
        self.consumed += count;
        Ok(out)
    }
}

/// Keyed-HMAC randomness beacon.
///
/// Stand-in for a real VRF service: anyone holding the beacon key can both
/// produce and verify draws, so it provides authenticity only within a
/// deployment that distributes the key out of band. The test suite and the
/// local demo harness use it; production substitutes a genuine VRF behind
/// the [`VrfOracle`] trait.
pub struct KeyedBeacon {
    key: [u8; 32],
    origin: String,
}

impl KeyedBeacon {
    pub fn new(key: [u8; 32], origin: impl Into<String>) -> Self {
        Self {
            key,
            origin: origin.into(),
        }
    }

    fn tag(&self, request_id: &Uuid) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(request_id.as_bytes());
        mac.finalize().into_bytes().into()
    }

    fn derive_value(tag: &[u8; 32], index: u32) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(tag);
        hasher.update(index.to_be_bytes());
        hasher.finalize().to_vec()
    }
}

#[async_trait]
impl VrfOracle for KeyedBeacon {
    async fn request_randomness(&self, count: usize) -> Result<VrfProof> {
        if count == 0 {
            return Err(Error::OracleUnavailable("Empty randomness request".into()));
        }
        let request_id = Uuid::new_v4();
        let tag = self.tag(&request_id);
        let values = (0..count as u32)
            .map(|i| Self::derive_value(&tag, i))
            .collect();
        Ok(VrfProof {
            request_id,
            values,
            proof: tag.to_vec(),
            issued_at: Utc::now(),
            origin: self.origin.clone(),
        })
    }

    fn verify_proof(&self, proof: &VrfProof) -> bool {
        let expected = self.tag(&proof.request_id);
        if !bool::from(expected.as_slice().ct_eq(proof.proof.as_slice())) {
            return false;
        }
        proof
            .values
            .iter()
            .enumerate()
            .all(|(i, value)| *value == Self::derive_value(&expected, i as u32))
    }
}
