//! Core types shared across the DKG protocol

use k256::{
    elliptic_curve::{
        bigint::U256,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Field,
    },
    AffinePoint, ProjectivePoint, Scalar,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Unique, stable identifier for a participant.
///
/// Also the polynomial evaluation point, so the valid domain is `1..=n`;
/// zero is reserved for the secret itself.
pub type ParticipantId = u16;

/// Unique identifier for one DKG round
pub type RoundId = [u8; 32];

/// Curve parameters injected into every component that performs group
/// arithmetic. Holds the generator and a domain-separation tag so no
/// component reaches for global curve state.
#[derive(Clone)]
pub struct CryptoContext {
    generator: ProjectivePoint,
    domain: Vec<u8>,
}

impl CryptoContext {
    /// Context over secp256k1 with the default domain tag
    pub fn new() -> Self {
        Self::with_domain(b"fdkg/v1".to_vec())
    }

    /// Context with a caller-chosen domain-separation tag
    pub fn with_domain(domain: Vec<u8>) -> Self {
        Self {
            generator: ProjectivePoint::GENERATOR,
            domain,
        }
    }

    /// The group generator `G`
    pub fn generator(&self) -> &ProjectivePoint {
        &self.generator
    }

    /// Domain-separation tag mixed into every hash this context produces
    pub fn domain(&self) -> &[u8] {
        &self.domain
    }

    /// Hash length-prefixed byte strings under the domain tag and reduce
    /// the digest into the scalar field.
    pub fn hash_to_scalar(&self, parts: &[&[u8]]) -> Scalar {
        let mut hasher = Sha256::new();
        hasher.update(&self.domain);
        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        let digest: [u8; 32] = hasher.finalize().into();
        <Scalar as Reduce<U256>>::reduce_bytes(&digest.into())
    }
}

impl Default for CryptoContext {
    fn default() -> Self {
        Self::new()
    }
}

/// When a participant may finalize its share of the group secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionPolicy {
    /// Wait for a verified share from every one of the `n` participants.
    /// No tolerance for offline or misbehaving issuers.
    All,
    /// Finalize once this many verified shares (including our own) are in.
    /// Must be at least the threshold.
    Quorum(u16),
}

/// Configuration for one participant in one DKG round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Round identifier
    pub round_id: RoundId,

    /// Number of participants
    pub n: u16,

    /// Threshold (t-of-n)
    pub threshold: u16,

    /// This participant's ID, in `1..=n`
    pub participant: ParticipantId,

    /// Finalization policy for this round
    pub policy: CompletionPolicy,
}

impl RoundConfig {
    /// Create a configuration, validating the participant domain
    pub fn new(n: u16, threshold: u16, participant: ParticipantId) -> Result<Self> {
        if threshold > n {
            return Err(Error::InvalidConfig(
                "Threshold cannot exceed number of participants".into(),
            ));
        }
        if threshold < 2 {
            return Err(Error::InvalidConfig(
                "Threshold must be at least 2".into(),
            ));
        }
        if participant == 0 || participant > n {
            return Err(Error::InvalidConfig(format!(
                "Participant ID {} outside 1..={}",
                participant, n
            )));
        }

        Ok(Self {
            round_id: rand::random(),
            n,
            threshold,
            participant,
            policy: CompletionPolicy::All,
        })
    }

    /// Replace the finalization policy
    pub fn with_policy(mut self, policy: CompletionPolicy) -> Result<Self> {
        if let CompletionPolicy::Quorum(q) = policy {
            if q < self.threshold || q > self.n {
                return Err(Error::InvalidConfig(format!(
                    "Quorum {} outside {}..={}",
                    q, self.threshold, self.n
                )));
            }
        }
        self.policy = policy;
        Ok(self)
    }

    /// Pin the round identifier (all participants of a round must agree on it)
    pub fn with_round_id(mut self, round_id: RoundId) -> Self {
        self.round_id = round_id;
        self
    }

    /// All participant IDs of this round
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> {
        1..=self.n
    }
}

/// A participant's fragment of the jointly generated group secret.
///
/// Produced once all required shares are received and verified; this is the
/// terminal state of a successful round for a participant.
#[derive(Clone, Serialize, Deserialize)]
pub struct FinalShare {
    /// Owning participant
    pub participant: ParticipantId,

    /// Number of participants in the round that produced this share
    pub n: u16,

    /// Threshold of the round that produced this share
    pub threshold: u16,

    /// The secret fragment
    #[serde(with = "scalar_serde")]
    secret: Scalar,

    /// Group public key (compressed)
    pub group_public_key: Vec<u8>,
}

impl FinalShare {
    pub(crate) fn new(
        participant: ParticipantId,
        n: u16,
        threshold: u16,
        secret: Scalar,
        group_public_key: Vec<u8>,
    ) -> Self {
        Self {
            participant,
            n,
            threshold,
            secret,
            group_public_key,
        }
    }

    /// The secret scalar. Callers must not persist this outside the share.
    pub fn secret(&self) -> &Scalar {
        &self.secret
    }

    /// `G * secret`, the point partial signatures verify against
    pub fn verifying_point(&self, ctx: &CryptoContext) -> ProjectivePoint {
        ctx.generator() * &self.secret
    }

    /// Group public key as a curve point
    pub fn group_point(&self) -> Result<ProjectivePoint> {
        decode_point(&self.group_public_key)
    }
}

impl Drop for FinalShare {
    fn drop(&mut self) {
        self.secret = Scalar::ZERO;
    }
}

impl std::fmt::Debug for FinalShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalShare")
            .field("participant", &self.participant)
            .field("n", &self.n)
            .field("threshold", &self.threshold)
            .field("group_public_key", &hex::encode(&self.group_public_key))
            .finish_non_exhaustive()
    }
}

/// Encode a curve point as compressed SEC1 bytes
pub fn encode_point(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

/// Decode compressed SEC1 bytes into a curve point
pub fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    let encoded = k256::EncodedPoint::from_bytes(bytes)
        .map_err(|e| Error::Serialization(format!("Invalid point encoding: {}", e)))?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| Error::Serialization("Point not on curve".into()))?;
    Ok(ProjectivePoint::from(affine))
}

pub(crate) mod scalar_serde {
    use k256::{
        elliptic_curve::{bigint::U256, ops::Reduce},
        Scalar,
    };
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(scalar: &Scalar, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes = scalar.to_bytes();
        serializer.serialize_bytes(bytes.as_slice())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Scalar, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid scalar length"))?;
        Ok(<Scalar as Reduce<U256>>::reduce_bytes(&array.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validates_domain() {
        assert!(RoundConfig::new(3, 2, 1).is_ok());
        assert!(RoundConfig::new(3, 4, 1).is_err());
        assert!(RoundConfig::new(3, 1, 1).is_err());
        assert!(RoundConfig::new(3, 2, 0).is_err());
        assert!(RoundConfig::new(3, 2, 4).is_err());
    }

    #[test]
    fn quorum_policy_bounded_by_threshold() {
        let config = RoundConfig::new(5, 3, 1).unwrap();
        assert!(config.clone().with_policy(CompletionPolicy::Quorum(3)).is_ok());
        assert!(config.clone().with_policy(CompletionPolicy::Quorum(2)).is_err());
        assert!(config.with_policy(CompletionPolicy::Quorum(6)).is_err());
    }

    #[test]
    fn point_encoding_round_trips() {
        let ctx = CryptoContext::new();
        let point = ctx.generator() * &Scalar::from(7u64);
        let bytes = encode_point(&point);
        assert_eq!(bytes.len(), 33);
        assert_eq!(decode_point(&bytes).unwrap(), point);
    }

    #[test]
    fn hash_to_scalar_separates_domains() {
        let a = CryptoContext::with_domain(b"a".to_vec()).hash_to_scalar(&[b"x"]);
        let b = CryptoContext::with_domain(b"b".to_vec()).hash_to_scalar(&[b"x"]);
        assert_ne!(a, b);
    }
}
