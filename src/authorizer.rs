//! Authentication of vote requests.
//!
//! A request either comes directly from an already-authenticated identity, or
//! is relayed on a voter's behalf together with a recoverable secp256k1
//! signature over a canonical message. Signed requests carry a per-identity
//! nonce that must match exactly and is consumed on success.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::identity::{ElectionId, Identity};
use crate::voters::VoterRegistry;

/// Length of an encoded signature: `r || s || v`.
pub const SIGNATURE_LEN: usize = 65;

/// Domain separation prefix applied before the final hash.
const MESSAGE_PREFIX: &[u8] = b"\x19Election Signed Message:\n32";

/// A failure to authenticate a signed vote request.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("signature must be 65 bytes, got {0}")]
    BadSignatureLength(usize),
    #[error("signature was not produced by the claimed voter")]
    InvalidRecoveredSigner,
    #[error("expected nonce {expected}, got {provided}")]
    NonceMismatch { expected: u64, provided: u64 },
    #[error("no signer could be recovered from the signature")]
    ZeroAddressRecovered,
}

/// Proof that an identity passed authentication.
///
/// Only obtainable from an [`IdentityAuthorizer`], and consumed by the ledger
/// when a vote is cast.
#[derive(Debug)]
pub struct AuthorizedVoter {
    identity: Identity,
}

impl AuthorizedVoter {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// Authenticates vote requests within one election's signing context.
#[derive(Debug, Clone)]
pub struct IdentityAuthorizer {
    context: ElectionId,
}

impl IdentityAuthorizer {
    pub fn new(context: ElectionId) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ElectionId {
        &self.context
    }

    /// The caller is the identity, e.g. it submitted a signed transaction itself.
    pub fn verify_direct(&self, identity: Identity) -> AuthorizedVoter {
        AuthorizedVoter { identity }
    }

    /// Authenticate a relayed vote and consume the voter's nonce.
    ///
    /// The nonce is only consumed once the signature is known to come from
    /// `identity`, and stays consumed even if the vote itself is later refused.
    pub fn verify_signed(
        &self,
        voters: &mut VoterRegistry,
        candidate_index: u64,
        identity: Identity,
        nonce: u64,
        signature: &[u8],
    ) -> Result<AuthorizedVoter, AuthError> {
        let signer = self.recover_signer(candidate_index, &identity, nonce, signature)?;
        if signer != identity {
            return Err(AuthError::InvalidRecoveredSigner);
        }

        let record = voters.record_mut(identity);
        if record.nonce != nonce {
            return Err(AuthError::NonceMismatch {
                expected: record.nonce,
                provided: nonce,
            });
        }
        record.nonce += 1;

        debug!(voter = %identity, nonce, "signed authorization accepted");
        Ok(AuthorizedVoter { identity })
    }

    /// Recover who signed the canonical message for these parameters.
    pub fn recover_signer(
        &self,
        candidate_index: u64,
        identity: &Identity,
        nonce: u64,
        signature: &[u8],
    ) -> Result<Identity, AuthError> {
        let digest = signed_message_digest(&self.context, identity, candidate_index, nonce);
        recover(&digest, signature)
    }
}

/// The digest a voter signs to authorize a vote for `candidate_index`.
pub fn signed_message_digest(
    context: &ElectionId,
    identity: &Identity,
    candidate_index: u64,
    nonce: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(context.as_bytes());
    hasher.update(identity.as_bytes());
    hasher.update(candidate_index.to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    let inner = hasher.finalize();

    let mut hasher = Sha256::new();
    hasher.update(MESSAGE_PREFIX);
    hasher.update(inner);
    hasher.finalize().into()
}

/// Recover the signing identity, accepting either `v` convention and
/// normalizing high-S signatures first.
fn recover(digest: &[u8; 32], signature: &[u8]) -> Result<Identity, AuthError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(AuthError::BadSignatureLength(signature.len()));
    }

    let v = match signature[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        _ => return Err(AuthError::ZeroAddressRecovered),
    };
    let mut recovery_id = RecoveryId::from_byte(v).ok_or(AuthError::ZeroAddressRecovered)?;
    let mut signature =
        Signature::from_slice(&signature[..64]).map_err(|_| AuthError::ZeroAddressRecovered)?;
    if let Some(normalized) = signature.normalize_s() {
        // Negating s mirrors the recovered point, so the parity flips too.
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|_| AuthError::ZeroAddressRecovered)?;
    let signer = Identity::from_verifying_key(&key);
    if signer.is_zero() {
        return Err(AuthError::ZeroAddressRecovered);
    }

    Ok(signer)
}

/// A voter's signing key, for producing signed vote requests.
#[derive(Clone)]
pub struct VoterKey {
    signing_key: SigningKey,
    identity: Identity,
}

impl VoterKey {
    pub fn random(mut rng: impl RngCore + CryptoRng) -> Self {
        Self::from_signing_key(SigningKey::random(&mut rng))
    }

    /// Load a 32-byte secret key.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        SigningKey::from_slice(bytes).ok().map(Self::from_signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let identity = Identity::from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            identity,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Sign a vote for `candidate_index` in the given election, with `v` in
    /// the 27/28 convention.
    pub fn sign_vote(
        &self,
        context: &ElectionId,
        candidate_index: u64,
        nonce: u64,
    ) -> Result<[u8; SIGNATURE_LEN], k256::ecdsa::Error> {
        let digest = signed_message_digest(context, &self.identity, candidate_index, nonce);
        let (signature, recovery_id) = self.signing_key.sign_prehash_recoverable(&digest)?;

        let mut bytes = [0; SIGNATURE_LEN];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Order of the secp256k1 group, big-endian.
    const CURVE_ORDER: [u8; 32] = [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36,
        0x41, 0x41,
    ];

    /// Turn a low-S signature into the equivalent high-S one.
    fn to_high_s(signature: &[u8; SIGNATURE_LEN]) -> [u8; SIGNATURE_LEN] {
        let mut high = *signature;
        let mut borrow = 0u16;
        for i in (0..32).rev() {
            let lhs = CURVE_ORDER[i] as u16;
            let rhs = signature[32 + i] as u16 + borrow;
            if lhs >= rhs {
                high[32 + i] = (lhs - rhs) as u8;
                borrow = 0;
            } else {
                high[32 + i] = (lhs + 256 - rhs) as u8;
                borrow = 1;
            }
        }
        high[64] = 27 + ((high[64] - 27) ^ 1);
        high
    }

    fn setup() -> (IdentityAuthorizer, VoterRegistry, VoterKey) {
        let mut rng = rand::thread_rng();
        let context = ElectionId::new(&[b"authorizer"], &mut rng);
        (
            IdentityAuthorizer::new(context),
            VoterRegistry::new(),
            VoterKey::random(&mut rng),
        )
    }

    #[test]
    fn test_signed_vote() {
        let (authorizer, mut voters, key) = setup();
        let signature = key.sign_vote(authorizer.context(), 1, 0).unwrap();

        let voter = authorizer
            .verify_signed(&mut voters, 1, key.identity(), 0, &signature)
            .unwrap();
        assert_eq!(voter.identity(), &key.identity());
        assert_eq!(voters.nonce(&key.identity()), 1);
        // Authorization alone does not count as voting.
        assert!(!voters.has_voted(&key.identity()));
    }

    #[test]
    fn test_replay_rejected() {
        let (authorizer, mut voters, key) = setup();
        let signature = key.sign_vote(authorizer.context(), 1, 0).unwrap();
        assert!(authorizer
            .verify_signed(&mut voters, 1, key.identity(), 0, &signature)
            .is_ok());

        assert_eq!(
            authorizer
                .verify_signed(&mut voters, 1, key.identity(), 0, &signature)
                .unwrap_err(),
            AuthError::NonceMismatch {
                expected: 1,
                provided: 0
            }
        );
        assert_eq!(voters.nonce(&key.identity()), 1);
    }

    #[test]
    fn test_future_nonce_rejected() {
        let (authorizer, mut voters, key) = setup();
        let signature = key.sign_vote(authorizer.context(), 0, 1).unwrap();
        assert_eq!(
            authorizer
                .verify_signed(&mut voters, 0, key.identity(), 1, &signature)
                .unwrap_err(),
            AuthError::NonceMismatch {
                expected: 0,
                provided: 1
            }
        );
        assert_eq!(voters.nonce(&key.identity()), 0);
    }

    #[test]
    fn test_wrong_signer() {
        let (authorizer, mut voters, key) = setup();
        let impostor = VoterKey::random(rand::thread_rng());
        // The impostor signs a message naming the real voter.
        let digest = signed_message_digest(authorizer.context(), &key.identity(), 0, 0);
        let (signature, recovery_id) = impostor.signing_key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = [0; SIGNATURE_LEN];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte();

        assert_eq!(
            authorizer
                .verify_signed(&mut voters, 0, key.identity(), 0, &bytes)
                .unwrap_err(),
            AuthError::InvalidRecoveredSigner
        );
        assert_eq!(voters.nonce(&key.identity()), 0);
    }

    #[test]
    fn test_signature_bound_to_candidate_and_context() {
        let (authorizer, mut voters, key) = setup();
        let signature = key.sign_vote(authorizer.context(), 0, 0).unwrap();
        assert_eq!(
            authorizer
                .verify_signed(&mut voters, 1, key.identity(), 0, &signature)
                .unwrap_err(),
            AuthError::InvalidRecoveredSigner
        );

        let other = IdentityAuthorizer::new(ElectionId::new(&[b"other"], rand::thread_rng()));
        assert_eq!(
            other
                .verify_signed(&mut voters, 0, key.identity(), 0, &signature)
                .unwrap_err(),
            AuthError::InvalidRecoveredSigner
        );
        assert_eq!(voters.nonce(&key.identity()), 0);
    }

    #[test]
    fn test_bad_length() {
        let (authorizer, mut voters, key) = setup();
        let signature = key.sign_vote(authorizer.context(), 0, 0).unwrap();
        assert_eq!(
            authorizer
                .verify_signed(&mut voters, 0, key.identity(), 0, &signature[..64])
                .unwrap_err(),
            AuthError::BadSignatureLength(64)
        );
        assert_eq!(voters.nonce(&key.identity()), 0);
    }

    #[test]
    fn test_unrecoverable() {
        let (authorizer, mut voters, key) = setup();
        let mut signature = key.sign_vote(authorizer.context(), 0, 0).unwrap();

        // Unknown v.
        signature[64] = 5;
        assert_eq!(
            authorizer
                .verify_signed(&mut voters, 0, key.identity(), 0, &signature)
                .unwrap_err(),
            AuthError::ZeroAddressRecovered
        );

        // Zero r and s.
        let zero = [0; SIGNATURE_LEN];
        assert_eq!(
            authorizer
                .verify_signed(&mut voters, 0, key.identity(), 0, &zero)
                .unwrap_err(),
            AuthError::ZeroAddressRecovered
        );
        assert_eq!(voters.nonce(&key.identity()), 0);
    }

    #[test]
    fn test_v_encodings() {
        let (authorizer, mut voters, key) = setup();

        // 27/28 convention.
        let signature = key.sign_vote(authorizer.context(), 0, 0).unwrap();
        assert!(signature[64] == 27 || signature[64] == 28);
        assert!(authorizer
            .verify_signed(&mut voters, 0, key.identity(), 0, &signature)
            .is_ok());

        // 0/1 convention.
        let mut signature = key.sign_vote(authorizer.context(), 0, 1).unwrap();
        signature[64] -= 27;
        assert!(authorizer
            .verify_signed(&mut voters, 0, key.identity(), 1, &signature)
            .is_ok());
        assert_eq!(voters.nonce(&key.identity()), 2);
    }

    #[test]
    fn test_high_s_normalized() {
        let (authorizer, mut voters, key) = setup();
        let signature = key.sign_vote(authorizer.context(), 2, 0).unwrap();
        let high = to_high_s(&signature);
        assert_ne!(signature, high);

        assert_eq!(
            authorizer.recover_signer(2, &key.identity(), 0, &high),
            Ok(key.identity())
        );
        assert!(authorizer
            .verify_signed(&mut voters, 2, key.identity(), 0, &high)
            .is_ok());
    }

    #[test]
    fn test_key_round_trip() {
        let key = VoterKey::random(rand::thread_rng());
        let loaded = VoterKey::from_bytes(&key.signing_key.to_bytes()).unwrap();
        assert_eq!(loaded.identity(), key.identity());
        assert!(VoterKey::from_bytes(&[0; 32]).is_none());
    }
}
