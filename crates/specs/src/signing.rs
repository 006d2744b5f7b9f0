//! secp256k1 signing and recovery over 32-byte prehashes.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use primitives::{Address, B256, U256};

/// Errors producing or checking signatures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// The secret key is zero or not below the curve order.
    #[error("invalid secret key {0}")]
    InvalidSecretKey(B256),
    /// Signing failed.
    #[error("signing failed: {0}")]
    Sign(String),
    /// The signature does not recover to a public key.
    #[error("signature does not recover to an address")]
    Unrecoverable,
}

/// A recoverable signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// Parity of the curve point's y coordinate.
    pub y_parity: u8,
    /// `r` value.
    pub r: U256,
    /// `s` value.
    pub s: U256,
}

/// Address controlled by a secret key.
pub fn address_of(secret_key: &B256) -> Result<Address, SigningError> {
    let key = signing_key(secret_key)?;
    let public_key = key.verifying_key().to_encoded_point(false);
    Ok(Address::from_raw_public_key(&public_key.as_bytes()[1..]))
}

/// Signs `hash` with `secret_key`. The result has a low `s`.
pub fn sign_hash(secret_key: &B256, hash: &B256) -> Result<RecoverableSignature, SigningError> {
    let key = signing_key(secret_key)?;
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(hash.as_slice())
        .map_err(|e| SigningError::Sign(e.to_string()))?;
    let bytes = signature.to_bytes();
    Ok(RecoverableSignature {
        y_parity: recovery_id.to_byte() & 1,
        r: U256::from_be_slice(&bytes[..32]),
        s: U256::from_be_slice(&bytes[32..]),
    })
}

/// Recovers the signer of `hash`.
pub fn recover(hash: &B256, signature: &RecoverableSignature) -> Result<Address, SigningError> {
    let r: [u8; 32] = signature.r.to_be_bytes();
    let s: [u8; 32] = signature.s.to_be_bytes();
    let sig =
        Signature::from_scalars(r, s).map_err(|_| SigningError::Unrecoverable)?;
    let recovery_id =
        RecoveryId::from_byte(signature.y_parity).ok_or(SigningError::Unrecoverable)?;
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &sig, recovery_id)
        .map_err(|_| SigningError::Unrecoverable)?;
    let public_key = key.to_encoded_point(false);
    Ok(Address::from_raw_public_key(&public_key.as_bytes()[1..]))
}

fn signing_key(secret_key: &B256) -> Result<SigningKey, SigningError> {
    SigningKey::from_slice(secret_key.as_slice())
        .map_err(|_| SigningError::InvalidSecretKey(*secret_key))
}
