//! Partial signatures over the final share
//!
//! A finalized participant signs message digests with its final share as
//! the private scalar, producing a Schnorr partial signature that verifies
//! against the participant's share-derived public point. Combining partials
//! into a group signature is the next consumer's job, not ours.

use hmac::{Hmac, Mac};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce},
    ProjectivePoint, Scalar,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{decode_point, encode_point, scalar_serde, CryptoContext, FinalShare, ParticipantId};
use crate::Result;

type HmacSha256 = Hmac<Sha256>;

/// One participant's signature fragment over a message digest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSignature {
    /// Signing participant
    pub participant: ParticipantId,

    /// Commitment point `R` (compressed)
    pub big_r: Vec<u8>,

    /// Response scalar `s`
    #[serde(with = "scalar_serde")]
    pub s: Scalar,

    /// SHA-256 digest of the signed message
    pub digest: Vec<u8>,
}

/// Signs message digests with a participant's final share
pub struct ThresholdSigner<'a> {
    ctx: &'a CryptoContext,
    share: &'a FinalShare,
}

impl<'a> ThresholdSigner<'a> {
    pub fn new(ctx: &'a CryptoContext, share: &'a FinalShare) -> Self {
        Self { ctx, share }
    }

    /// Produce a partial signature over `message`.
    ///
    /// The nonce is derived deterministically from the share and digest,
    /// so signing never touches an RNG and repeated calls agree.
    pub fn sign(&self, message: &[u8]) -> PartialSignature {
        let digest: [u8; 32] = Sha256::digest(message).into();

        let share_bytes = self.share.secret().to_bytes();
        let mut mac =
            HmacSha256::new_from_slice(&share_bytes).expect("HMAC accepts any key length");
        mac.update(self.ctx.domain());
        mac.update(&digest);
        mac.update(self.share.participant.to_be_bytes().as_slice());
        let nonce_bytes: [u8; 32] = mac.finalize().into_bytes().into();
        let k = <Scalar as Reduce<U256>>::reduce_bytes(&nonce_bytes.into());

        let big_r = self.ctx.generator() * &k;
        let public = self.share.verifying_point(self.ctx);
        let e = challenge(self.ctx, &big_r, &public, &digest);
        let s = k + e * self.share.secret();

        PartialSignature {
            participant: self.share.participant,
            big_r: encode_point(&big_r),
            s,
            digest: digest.to_vec(),
        }
    }
}

/// Check a partial signature against the signer's public point.
///
/// `verifying_point` is the compressed `G * final_share` the signer
/// published; any participant can run this check.
pub fn verify_partial(
    ctx: &CryptoContext,
    signature: &PartialSignature,
    verifying_point: &[u8],
    message: &[u8],
) -> Result<bool> {
    let digest: [u8; 32] = Sha256::digest(message).into();
    if signature.digest != digest {
        return Ok(false);
    }

    let big_r = decode_point(&signature.big_r)?;
    let public = decode_point(verifying_point)?;
    let e = challenge(ctx, &big_r, &public, &digest);

    let lhs = ctx.generator() * &signature.s;
    let rhs = big_r + public * &e;
    Ok(lhs == rhs)
}

fn challenge(
    ctx: &CryptoContext,
    big_r: &ProjectivePoint,
    public: &ProjectivePoint,
    digest: &[u8; 32],
) -> Scalar {
    ctx.hash_to_scalar(&[
        b"partial-sig",
        &encode_point(big_r),
        &encode_point(public),
        digest,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FinalShare;
    use k256::elliptic_curve::Field;
    use rand::rngs::OsRng;

    fn sample_share(ctx: &CryptoContext) -> FinalShare {
        let secret = Scalar::random(&mut OsRng);
        let group = ctx.generator() * &Scalar::random(&mut OsRng);
        FinalShare::new(1, 3, 2, secret, encode_point(&group))
    }

    #[test]
    fn partial_signature_verifies_against_share_point() {
        let ctx = CryptoContext::new();
        let share = sample_share(&ctx);
        let signer = ThresholdSigner::new(&ctx, &share);

        let signature = signer.sign(b"test message");
        let point = encode_point(&share.verifying_point(&ctx));

        assert!(verify_partial(&ctx, &signature, &point, b"test message").unwrap());
    }

    #[test]
    fn signing_is_deterministic() {
        let ctx = CryptoContext::new();
        let share = sample_share(&ctx);
        let signer = ThresholdSigner::new(&ctx, &share);

        let first = signer.sign(b"payload");
        let second = signer.sign(b"payload");
        assert_eq!(first.big_r, second.big_r);
        assert_eq!(first.s, second.s);
    }

    #[test]
    fn verification_rejects_wrong_message_and_key() {
        let ctx = CryptoContext::new();
        let share = sample_share(&ctx);
        let other = sample_share(&ctx);
        let signer = ThresholdSigner::new(&ctx, &share);

        let signature = signer.sign(b"test message");
        let point = encode_point(&share.verifying_point(&ctx));
        let wrong_point = encode_point(&other.verifying_point(&ctx));

        assert!(!verify_partial(&ctx, &signature, &point, b"another message").unwrap());
        assert!(!verify_partial(&ctx, &signature, &wrong_point, b"test message").unwrap());
    }

    #[test]
    fn tampered_response_scalar_fails() {
        let ctx = CryptoContext::new();
        let share = sample_share(&ctx);
        let signer = ThresholdSigner::new(&ctx, &share);

        let mut signature = signer.sign(b"test message");
        signature.s += Scalar::ONE;
        let point = encode_point(&share.verifying_point(&ctx));

        assert!(!verify_partial(&ctx, &signature, &point, b"test message").unwrap());
    }
}
