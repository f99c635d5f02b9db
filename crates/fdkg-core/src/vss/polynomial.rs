//! Secret-sharing polynomials

use k256::{elliptic_curve::Field, Scalar};

use crate::randomness::RandomnessSource;
use crate::types::ParticipantId;
use crate::{Error, Result};

/// A degree-(t-1) polynomial over the scalar field.
///
/// Coefficient zero is the owning participant's private contribution to the
/// group secret. The polynomial never leaves the participant that generated
/// it; only commitments and point evaluations are transmitted.
pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    /// Build `[secret, r_1, …, r_{t-1}]` from a secret and an entropy source
    pub fn generate<S: RandomnessSource + ?Sized>(
        secret: Scalar,
        threshold: u16,
        randomness: &mut S,
    ) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::InvalidConfig("Threshold must be nonzero".into()));
        }
        let mut coefficients = Vec::with_capacity(threshold as usize);
        coefficients.push(secret);
        coefficients.extend(randomness.generate(threshold as usize - 1)?);
        Ok(Self { coefficients })
    }

    /// Wrap explicit coefficients; the constant term is the secret
    pub fn from_coefficients(coefficients: Vec<Scalar>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(Error::InvalidConfig("Polynomial has no coefficients".into()));
        }
        Ok(Self { coefficients })
    }

    /// The private contribution `a_0`
    pub fn secret(&self) -> &Scalar {
        &self.coefficients[0]
    }

    /// Number of coefficients, which equals the sharing threshold
    pub fn threshold(&self) -> u16 {
        self.coefficients.len() as u16
    }

    pub(crate) fn coefficients(&self) -> &[Scalar] {
        &self.coefficients
    }

    /// Horner evaluation at a participant index.
    ///
    /// `x = 0` is the secret itself and is never a valid evaluation point.
    pub fn evaluate(&self, x: ParticipantId) -> Result<Scalar> {
        if x == 0 {
            return Err(Error::InvalidParticipantIndex(0));
        }
        let x = Scalar::from(x as u64);
        let mut acc = Scalar::ZERO;
        for coefficient in self.coefficients.iter().rev() {
            acc = acc * x + coefficient;
        }
        Ok(acc)
    }
}

impl Drop for Polynomial {
    fn drop(&mut self) {
        for coefficient in &mut self.coefficients {
            *coefficient = Scalar::ZERO;
        }
    }
}

impl std::fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Polynomial")
            .field("threshold", &self.threshold())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomness::LocalEntropy;
    use k256::elliptic_curve::{bigint::U256, ops::Reduce};
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    /// Reproducible entropy for regression tests
    struct SeededEntropy(ChaCha20Rng);

    impl RandomnessSource for SeededEntropy {
        fn generate(&mut self, count: usize) -> Result<Vec<Scalar>> {
            Ok((0..count)
                .map(|_| {
                    let mut bytes = [0u8; 32];
                    self.0.fill_bytes(&mut bytes);
                    <Scalar as Reduce<U256>>::reduce_bytes(&bytes.into())
                })
                .collect())
        }
    }

    #[test]
    fn generate_places_secret_at_constant_term() {
        let secret = Scalar::from(42u64);
        let poly = Polynomial::generate(secret, 3, &mut LocalEntropy).unwrap();
        assert_eq!(poly.threshold(), 3);
        assert_eq!(*poly.secret(), secret);
    }

    #[test]
    fn evaluation_matches_hand_computation() {
        // f(x) = 5 + 3x + 2x^2
        let poly = Polynomial::from_coefficients(vec![
            Scalar::from(5u64),
            Scalar::from(3u64),
            Scalar::from(2u64),
        ])
        .unwrap();

        assert_eq!(poly.evaluate(1).unwrap(), Scalar::from(10u64));
        assert_eq!(poly.evaluate(2).unwrap(), Scalar::from(19u64));
        assert_eq!(poly.evaluate(3).unwrap(), Scalar::from(32u64));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let poly = Polynomial::generate(Scalar::from(9u64), 4, &mut LocalEntropy).unwrap();
        let first = poly.evaluate(7).unwrap();
        let second = poly.evaluate(7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn identical_seeds_give_identical_polynomials() {
        let make = || {
            let mut source = SeededEntropy(ChaCha20Rng::seed_from_u64(42));
            Polynomial::generate(Scalar::from(8u64), 3, &mut source).unwrap()
        };
        let a = make();
        let b = make();
        for x in 1..=5 {
            assert_eq!(a.evaluate(x).unwrap(), b.evaluate(x).unwrap());
        }
    }

    #[test]
    fn zero_is_not_an_evaluation_point() {
        let poly = Polynomial::generate(Scalar::from(1u64), 2, &mut LocalEntropy).unwrap();
        assert!(matches!(
            poly.evaluate(0),
            Err(Error::InvalidParticipantIndex(0))
        ));
    }
}
