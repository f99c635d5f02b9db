//! Share aggregation
//!
//! Two deliberately separate operations live here:
//!
//! - [`finalize`]: a participant's fragment of the *group* secret is the
//!   sum of the shares every issuer sent it. The group polynomial is the
//!   sum of all individual polynomials, so summation is the whole step;
//!   no interpolation is involved.
//! - [`reconstruct`]: Lagrange interpolation at zero over at least
//!   threshold-many *final* shares recovers the full group secret. That is
//!   an out-of-band recovery step and is never performed inside a round.

use std::collections::BTreeMap;

use k256::{elliptic_curve::Field, ProjectivePoint, Scalar};

use crate::shares::Share;
use crate::types::{encode_point, CryptoContext, FinalShare, ParticipantId, RoundConfig};
use crate::vss::CommitmentVector;
use crate::{Error, Result};

/// Combine the verified shares a participant received into its final share.
///
/// `received` holds one verified share per qualified issuer; the group
/// public key is the sum of those issuers' constant-term commitments, so an
/// issuer excluded by complaints contributes to neither.
pub fn finalize(
    ctx: &CryptoContext,
    config: &RoundConfig,
    received: &BTreeMap<ParticipantId, Share>,
    commitments: &BTreeMap<ParticipantId, CommitmentVector>,
) -> Result<FinalShare> {
    if received.is_empty() {
        return Err(Error::PhaseViolation(
            "No verified shares to aggregate".into(),
        ));
    }

    let mut secret = Scalar::ZERO;
    let mut group_key = ProjectivePoint::IDENTITY;
    for (issuer, share) in received {
        let commitment = commitments.get(issuer).ok_or_else(|| {
            Error::PhaseViolation(format!("No commitment on record for issuer {}", issuer))
        })?;
        secret += share.y;
        group_key += commitment.constant_point();
    }

    Ok(FinalShare::new(
        config.participant,
        config.n,
        config.threshold,
        secret,
        encode_point(&group_key),
    ))
}

/// Recover the group secret from at least threshold-many final shares via
/// Lagrange interpolation at zero.
///
/// Callers are responsible for supplying `t` or more shares; with fewer,
/// the result is field noise, not the secret.
pub fn reconstruct(shares: &[(ParticipantId, Scalar)]) -> Result<Scalar> {
    if shares.is_empty() {
        return Err(Error::InvalidConfig("No shares to interpolate".into()));
    }

    let mut secret = Scalar::ZERO;
    for (i, (x_i, y_i)) in shares.iter().enumerate() {
        if *x_i == 0 {
            return Err(Error::InvalidParticipantIndex(0));
        }
        let x_i_scalar = Scalar::from(*x_i as u64);

        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;
        for (j, (x_j, _)) in shares.iter().enumerate() {
            if i == j {
                continue;
            }
            if x_j == x_i {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate evaluation point {}",
                    x_i
                )));
            }
            let x_j_scalar = Scalar::from(*x_j as u64);
            numerator *= x_j_scalar;
            denominator *= x_j_scalar - x_i_scalar;
        }

        let inverse = Option::<Scalar>::from(denominator.invert())
            .ok_or_else(|| Error::Crypto("Singular interpolation denominator".into()))?;
        secret += *y_i * numerator * inverse;
    }

    Ok(secret)
}
