//! Share creation and per-recipient bookkeeping

use std::collections::BTreeMap;

use k256::{elliptic_curve::Field, Scalar};

use crate::types::ParticipantId;
use crate::vss::Polynomial;
use crate::Result;

/// One point evaluation `(x, f(x))` of an issuer's polynomial.
///
/// Secret until delivered to the participant at index `x`; exactly one
/// share exists per (issuer, recipient) pair.
#[derive(Clone, PartialEq)]
pub struct Share {
    /// Recipient index, the evaluation point
    pub x: ParticipantId,
    /// Evaluation `f(x)`
    pub y: Scalar,
}

impl Share {
    pub fn new(x: ParticipantId, y: Scalar) -> Self {
        Self { x, y }
    }
}

impl Drop for Share {
    fn drop(&mut self) {
        self.y = Scalar::ZERO;
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share").field("x", &self.x).finish_non_exhaustive()
    }
}

/// All shares one issuer computed for a round, keyed by recipient.
///
/// Includes the issuer's own share; the issuer consumes that one directly
/// instead of routing it through the channel.
pub struct ShareSet {
    issuer: ParticipantId,
    shares: BTreeMap<ParticipantId, Share>,
}

impl ShareSet {
    /// Evaluate the polynomial at every participant index
    pub fn generate(
        issuer: ParticipantId,
        polynomial: &Polynomial,
        participants: impl IntoIterator<Item = ParticipantId>,
    ) -> Result<Self> {
        let mut shares = BTreeMap::new();
        for participant in participants {
            let y = polynomial.evaluate(participant)?;
            shares.insert(participant, Share::new(participant, y));
        }
        Ok(Self { issuer, shares })
    }

    pub fn issuer(&self) -> ParticipantId {
        self.issuer
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// The share destined for one recipient
    pub fn for_recipient(&self, recipient: ParticipantId) -> Option<&Share> {
        self.shares.get(&recipient)
    }

    /// Iterate `(recipient, share)` pairs in recipient order
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &Share)> {
        self.shares.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomness::LocalEntropy;

    #[test]
    fn one_share_per_participant_including_issuer() {
        let poly = Polynomial::generate(Scalar::from(5u64), 2, &mut LocalEntropy).unwrap();
        let set = ShareSet::generate(2, &poly, 1..=3).unwrap();

        assert_eq!(set.len(), 3);
        for x in 1..=3u16 {
            let share = set.for_recipient(x).unwrap();
            assert_eq!(share.x, x);
            assert_eq!(share.y, poly.evaluate(x).unwrap());
        }
    }

    #[test]
    fn refuses_index_zero() {
        let poly = Polynomial::generate(Scalar::from(5u64), 2, &mut LocalEntropy).unwrap();
        assert!(ShareSet::generate(1, &poly, 0..=2).is_err());
    }
}
