//! Verifiable secret sharing
//!
//! Shamir polynomials over the secp256k1 scalar field plus Feldman
//! commitments, which let a share recipient check its share against the
//! issuer's public coefficients without learning them.

mod feldman;
mod polynomial;

pub use feldman::CommitmentVector;
pub use polynomial::Polynomial;
