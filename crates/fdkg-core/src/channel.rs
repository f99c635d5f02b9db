//! Authenticated point-to-point delivery of shares
//!
//! Confidentiality is a channel responsibility, not part of the polynomial
//! math: shares travel over the shared broadcast log sealed to their
//! recipient. Sealing is ephemeral X25519 ECDH with a ChaCha20-Poly1305
//! AEAD; the sender and recipient indices are bound as associated data, so
//! a sealed share replayed under different routing fails to open.

use std::collections::BTreeMap;

use aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce},
    Scalar,
};
use rand::rngs::OsRng;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::shares::Share;
use crate::types::ParticipantId;
use crate::{Error, Result};

const KEY_LABEL: &[u8] = b"fdkg/share-channel/v1";
const NONCE_LEN: usize = 12;

/// A participant's long-lived channel keypair
pub struct ChannelIdentity {
    secret: StaticSecret,
}

impl ChannelIdentity {
    /// Generate a fresh keypair from the OS CSPRNG
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Public half, published to the other participants
    pub fn public_key(&self) -> [u8; 32] {
        PublicKey::from(&self.secret).to_bytes()
    }
}

/// A share sealed for exactly one recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedShare {
    /// Issuing participant
    pub from: ParticipantId,
    /// Intended recipient
    pub to: ParticipantId,
    /// Ephemeral X25519 public key
    pub ephemeral: Vec<u8>,
    /// AEAD nonce
    pub nonce: Vec<u8>,
    /// Encrypted share value
    pub ciphertext: Vec<u8>,
}

/// Seals outgoing shares and opens incoming ones for one participant
pub struct ShareChannel {
    participant: ParticipantId,
    secret: StaticSecret,
    directory: BTreeMap<ParticipantId, PublicKey>,
}

impl ShareChannel {
    /// Build a channel from our identity and the public keys of every
    /// participant in the round
    pub fn new(
        participant: ParticipantId,
        identity: &ChannelIdentity,
        directory: BTreeMap<ParticipantId, [u8; 32]>,
    ) -> Self {
        let directory = directory
            .into_iter()
            .map(|(id, pk)| (id, PublicKey::from(pk)))
            .collect();
        Self {
            participant,
            secret: identity.secret.clone(),
            directory,
        }
    }

    /// Seal a share for its recipient
    pub fn seal(&self, share: &Share, recipient: ParticipantId) -> Result<SealedShare> {
        if share.x != recipient {
            return Err(Error::InvalidConfig(format!(
                "Share evaluated at {} sealed for recipient {}",
                share.x, recipient
            )));
        }
        let recipient_key = self.directory.get(&recipient).ok_or_else(|| {
            Error::InvalidConfig(format!("No channel key for participant {}", recipient))
        })?;

        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(recipient_key);
        let mut key = derive_key(shared.as_bytes(), &ephemeral_public, recipient_key);

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut plaintext: [u8; 32] = share.y.to_bytes().into();
        let aad = routing_aad(self.participant, recipient);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::Crypto("Share sealing failed".into()))?;

        plaintext.zeroize();
        key.zeroize();

        Ok(SealedShare {
            from: self.participant,
            to: recipient,
            ephemeral: ephemeral_public.as_bytes().to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    /// Open a share sealed for us.
    ///
    /// Any malformed, replayed, or tampered input fails with
    /// [`Error::Decryption`]; callers treat that exactly like an invalid
    /// share.
    pub fn open(&self, sealed: &SealedShare) -> Result<Share> {
        if sealed.to != self.participant {
            return Err(Error::Decryption(format!(
                "Share sealed for participant {}, we are {}",
                sealed.to, self.participant
            )));
        }
        let ephemeral: [u8; 32] = sealed
            .ephemeral
            .as_slice()
            .try_into()
            .map_err(|_| Error::Decryption("Malformed ephemeral key".into()))?;
        if sealed.nonce.len() != NONCE_LEN {
            return Err(Error::Decryption("Malformed nonce".into()));
        }

        let ephemeral_public = PublicKey::from(ephemeral);
        let own_public = PublicKey::from(&self.secret);
        let shared = self.secret.diffie_hellman(&ephemeral_public);
        let mut key = derive_key(shared.as_bytes(), &ephemeral_public, &own_public);

        let aad = routing_aad(sealed.from, sealed.to);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let result = cipher.decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: &aad,
            },
        );
        key.zeroize();

        let mut plaintext =
            result.map_err(|_| Error::Decryption("Authentication failed".into()))?;
        let value: [u8; 32] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| Error::Decryption("Malformed share value".into()))?;
        let y = <Scalar as Reduce<U256>>::reduce_bytes(&value.into());
        plaintext.zeroize();

        Ok(Share::new(sealed.to, y))
    }
}

fn derive_key(shared: &[u8], ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_LABEL);
    hasher.update(shared);
    hasher.update(ephemeral.as_bytes());
    hasher.update(recipient.as_bytes());
    hasher.finalize().into()
}

fn routing_aad(from: ParticipantId, to: ParticipantId) -> [u8; 4] {
    let mut aad = [0u8; 4];
    aad[..2].copy_from_slice(&from.to_be_bytes());
    aad[2..].copy_from_slice(&to.to_be_bytes());
    aad
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_pair() -> (ShareChannel, ShareChannel) {
        let alice = ChannelIdentity::generate();
        let bob = ChannelIdentity::generate();
        let directory: BTreeMap<_, _> =
            [(1, alice.public_key()), (2, bob.public_key())].into();
        (
            ShareChannel::new(1, &alice, directory.clone()),
            ShareChannel::new(2, &bob, directory),
        )
    }

    #[test]
    fn sealed_share_opens_for_recipient() {
        let (alice, bob) = channel_pair();
        let share = Share::new(2, Scalar::from(77u64));

        let sealed = alice.seal(&share, 2).unwrap();
        let opened = bob.open(&sealed).unwrap();

        assert_eq!(opened, share);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let (alice, bob) = channel_pair();
        let share = Share::new(2, Scalar::from(77u64));

        let mut sealed = alice.seal(&share, 2).unwrap();
        sealed.ciphertext[0] ^= 1;

        assert!(matches!(bob.open(&sealed), Err(Error::Decryption(_))));
    }

    #[test]
    fn rerouted_share_fails_to_open() {
        let (alice, bob) = channel_pair();
        let share = Share::new(2, Scalar::from(77u64));

        // Claiming a different issuer breaks the routing AAD
        let mut sealed = alice.seal(&share, 2).unwrap();
        sealed.from = 2;

        assert!(matches!(bob.open(&sealed), Err(Error::Decryption(_))));
    }

    #[test]
    fn wrong_recipient_cannot_open() {
        let (alice, _) = channel_pair();
        let share = Share::new(1, Scalar::from(9u64));

        let sealed_for_self = alice.seal(&share, 1).unwrap();
        let mut misrouted = sealed_for_self;
        misrouted.to = 2;

        // Our channel refuses shares addressed elsewhere
        assert!(matches!(alice.open(&misrouted), Err(Error::Decryption(_))));
    }
}
