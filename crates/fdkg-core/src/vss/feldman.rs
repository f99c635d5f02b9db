//! Feldman commitments over polynomial coefficients

use k256::{elliptic_curve::Field, ProjectivePoint, Scalar};

use crate::shares::Share;
use crate::types::{decode_point, encode_point, CryptoContext, ParticipantId};
use crate::vss::Polynomial;
use crate::Result;

/// Public commitment `[G*a_0, …, G*a_{t-1}]` to a polynomial.
///
/// Safe to broadcast: the points bind the issuer to its coefficients while
/// revealing nothing about them.
#[derive(Clone, PartialEq)]
pub struct CommitmentVector {
    points: Vec<ProjectivePoint>,
}

impl CommitmentVector {
    /// Commit to every coefficient of a polynomial
    pub fn commit(ctx: &CryptoContext, polynomial: &Polynomial) -> Self {
        let points = polynomial
            .coefficients()
            .iter()
            .map(|coefficient| ctx.generator() * coefficient)
            .collect();
        Self { points }
    }

    /// Number of committed coefficients; equals the issuer's threshold
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Commitment to the constant term, `G * a_0`
    pub fn constant_point(&self) -> &ProjectivePoint {
        &self.points[0]
    }

    /// Compressed SEC1 wire encoding
    pub fn to_bytes(&self) -> Vec<Vec<u8>> {
        self.points.iter().map(encode_point).collect()
    }

    /// Decode a wire encoding, rejecting off-curve points
    pub fn from_bytes(encoded: &[Vec<u8>]) -> Result<Self> {
        let points = encoded
            .iter()
            .map(|bytes| decode_point(bytes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { points })
    }

    /// `Σ A_i * x^i`, the public image of the issuer's polynomial at `x`
    fn expected_point(&self, x: ParticipantId) -> ProjectivePoint {
        let x = Scalar::from(x as u64);
        let mut x_power = Scalar::ONE;
        let mut acc = ProjectivePoint::IDENTITY;
        for point in &self.points {
            acc += point * &x_power;
            x_power *= x;
        }
        acc
    }

    /// Check `G * share.y == Σ A_i * share.x^i`.
    ///
    /// Rejects evaluation points outside the participant domain `1..=n`;
    /// equality is on curve points, so any bias in the share value fails
    /// with overwhelming probability.
    pub fn verify_share(&self, ctx: &CryptoContext, share: &Share, n: u16) -> bool {
        if share.x == 0 || share.x > n {
            return false;
        }
        ctx.generator() * &share.y == self.expected_point(share.x)
    }
}

impl std::fmt::Debug for CommitmentVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitmentVector")
            .field("len", &self.points.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomness::LocalEntropy;
    use crate::types::encode_point;

    fn sample(threshold: u16) -> (CryptoContext, Polynomial, CommitmentVector) {
        let ctx = CryptoContext::new();
        let poly = Polynomial::generate(Scalar::from(11u64), threshold, &mut LocalEntropy).unwrap();
        let commitment = CommitmentVector::commit(&ctx, &poly);
        (ctx, poly, commitment)
    }

    #[test]
    fn commitment_length_equals_threshold() {
        for threshold in 2..=5 {
            let (_, _, commitment) = sample(threshold);
            assert_eq!(commitment.len(), threshold as usize);
        }
    }

    #[test]
    fn constant_commitment_is_generator_times_secret() {
        let (ctx, poly, commitment) = sample(3);
        let expected = ctx.generator() * poly.secret();
        assert_eq!(
            encode_point(commitment.constant_point()),
            encode_point(&expected)
        );
    }

    #[test]
    fn honest_shares_verify_at_every_index() {
        let n = 6u16;
        let (ctx, poly, commitment) = sample(4);
        for x in 1..=n {
            let share = Share::new(x, poly.evaluate(x).unwrap());
            assert!(commitment.verify_share(&ctx, &share, n));
        }
    }

    #[test]
    fn tampered_share_fails() {
        let (ctx, poly, commitment) = sample(3);
        let honest = poly.evaluate(2).unwrap();
        let tampered = Share::new(2, honest + Scalar::ONE);
        assert!(!commitment.verify_share(&ctx, &tampered, 5));
    }

    #[test]
    fn out_of_domain_index_is_rejected() {
        let (ctx, poly, commitment) = sample(2);
        let share = Share::new(4, poly.evaluate(4).unwrap());
        // Index 4 verifies in a 5-participant domain but not a 3-participant one
        assert!(commitment.verify_share(&ctx, &share, 5));
        assert!(!commitment.verify_share(&ctx, &share, 3));
        assert!(!commitment.verify_share(&ctx, &Share::new(0, Scalar::ONE), 3));
    }

    #[test]
    fn wire_encoding_round_trips() {
        let (_, _, commitment) = sample(3);
        let decoded = CommitmentVector::from_bytes(&commitment.to_bytes()).unwrap();
        assert!(decoded == commitment);
    }
}
