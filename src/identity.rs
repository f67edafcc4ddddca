use std::fmt;

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of an [`Identity`] in bytes.
pub const IDENTITY_LEN: usize = 20;

/// Length of an [`ElectionId`] in bytes.
pub const ELECTION_ID_LEN: usize = 32;

/// Domain tag for deriving election context IDs.
const CONTEXT_TAG: &[u8] = b"ELECTION-LEDGER:CONTEXT";

/// An opaque voter or admin identifier.
///
/// Identities derived from keys are the last 20 bytes of SHA-256 over the
/// uncompressed secp256k1 public key, without its SEC1 tag byte.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
pub struct Identity(#[serde(with = "crate::serde_bytestring")] [u8; IDENTITY_LEN]);

impl Identity {
    /// The all-zero identity. Never a valid signer.
    pub const ZERO: Identity = Identity([0; IDENTITY_LEN]);

    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Derive the identity that owns the given verification key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = PublicKey::from(key).to_encoded_point(false);
        let hash = Sha256::digest(&point.as_bytes()[1..]);
        let mut bytes = [0; IDENTITY_LEN];
        bytes.copy_from_slice(&hash[hash.len() - IDENTITY_LEN..]);
        Self(bytes)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

/// The signing context of a single election.
///
/// Bound into every signed vote message and into the genesis of the vote
/// chain, so nothing produced for one election is accepted by another.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
pub struct ElectionId(#[serde(with = "crate::serde_bytestring")] [u8; ELECTION_ID_LEN]);

impl ElectionId {
    /// Create a fresh context from caller-supplied bytes and a random salt.
    pub fn new(unique_bytes: &[&[u8]], mut rng: impl RngCore + CryptoRng) -> Self {
        let mut salt = [0; 32];
        rng.fill_bytes(&mut salt);

        let mut hasher = Sha256::new();
        hasher.update(CONTEXT_TAG);
        for bytes in unique_bytes {
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }
        hasher.update(salt);
        Self(hasher.finalize().into())
    }

    pub const fn from_bytes(bytes: [u8; ELECTION_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ELECTION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElectionId({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use k256::ecdsa::SigningKey;

    #[test]
    fn test_identity_from_key() {
        let mut rng = rand::thread_rng();
        let key = SigningKey::random(&mut rng);
        let identity = Identity::from_verifying_key(key.verifying_key());

        assert!(!identity.is_zero());
        assert_eq!(identity, Identity::from_verifying_key(key.verifying_key()));

        let other = SigningKey::random(&mut rng);
        assert_ne!(identity, Identity::from_verifying_key(other.verifying_key()));
    }

    #[test]
    fn test_display() {
        let mut bytes = [0; IDENTITY_LEN];
        bytes[0] = 0xab;
        bytes[19] = 0x01;
        assert_eq!(
            Identity::from_bytes(bytes).to_string(),
            "0xab00000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_election_ids_are_unique() {
        let mut rng = rand::thread_rng();
        let a = ElectionId::new(&[b"Student Council"], &mut rng);
        let b = ElectionId::new(&[b"Student Council"], &mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde() {
        let identity = Identity::from_bytes([7; IDENTITY_LEN]);
        let json = serde_json::to_string(&identity).unwrap();
        assert_eq!(serde_json::from_str::<Identity>(&json).unwrap(), identity);
    }
}
