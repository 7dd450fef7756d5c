//! Payer signature recovery for payment authorizations.
//!
//! Wallets sign an EIP-191 personal message. When the authorization does
//! not carry the exact message, it is rebuilt from a fixed template over the
//! network, asset, payer, recipient and amount.

use crate::chain::normalize_address;
use crate::error::{Error, Result};
use crate::payment::types::{PaymentAuthorization, PaymentRequirements};
use alloy_primitives::{eip191_hash_message, Address};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use tracing::debug;

/// Header line of the canonical payment message.
pub const MESSAGE_HEADER: &str = "x402 payment authorization";

/// Signature length in bytes (`r || s || v`).
pub const SIGNATURE_SIZE: usize = 65;

/// Build the canonical message a payer signs for `authorization`.
#[must_use]
pub fn canonical_message(
    authorization: &PaymentAuthorization,
    requirements: &PaymentRequirements,
    payer: &str,
) -> String {
    format!(
        "{MESSAGE_HEADER}\nnetwork: {}\nasset: {}\nfrom: {}\nto: {}\nvalue: {}",
        requirements.network,
        requirements.asset.to_ascii_lowercase(),
        payer.to_ascii_lowercase(),
        authorization.to.to_ascii_lowercase(),
        authorization.value,
    )
}

/// The message to verify: the explicit one if present, else the canonical one.
#[must_use]
pub fn signed_message(
    authorization: &PaymentAuthorization,
    requirements: &PaymentRequirements,
    payer: &str,
) -> String {
    authorization
        .message
        .clone()
        .unwrap_or_else(|| canonical_message(authorization, requirements, payer))
}

/// Recover the address that produced `signature_hex` over `message`.
///
/// # Errors
///
/// Returns [`Error::Signature`] if the signature is not 65 hex-encoded bytes
/// or does not recover to a public key.
pub fn recover_signer(message: &str, signature_hex: &str) -> Result<Address> {
    let raw = signature_hex.trim();
    let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| Error::Signature(format!("Invalid signature hex: {e}")))?;

    if bytes.len() != SIGNATURE_SIZE {
        return Err(Error::Signature(format!(
            "Invalid signature size: expected {SIGNATURE_SIZE}, got {}",
            bytes.len()
        )));
    }

    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| Error::Signature(format!("Invalid signature format: {e}")))?;

    let v = bytes[64];
    let parity = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => {
            return Err(Error::Signature(format!("Invalid recovery id: {other}")));
        }
    };
    let recovery_id = RecoveryId::from_byte(parity)
        .ok_or_else(|| Error::Signature(format!("Invalid recovery id: {v}")))?;

    let digest = eip191_hash_message(message.as_bytes());
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
        .map_err(|e| Error::Signature(format!("Signature recovery failed: {e}")))?;

    let encoded = key.to_encoded_point(false);
    let address = Address::from_raw_public_key(&encoded.as_bytes()[1..]);
    debug!("Recovered signer {}", normalize_address(&address));
    Ok(address)
}

/// Case-insensitive address comparison on the textual form.
#[must_use]
pub fn addresses_match(expected: &str, recovered: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(recovered.trim())
}

/// Sign `message` with `key` the way a wallet would. Used by tests and tooling.
///
/// # Errors
///
/// Returns [`Error::Signature`] if signing fails.
pub fn sign_message(key: &k256::ecdsa::SigningKey, message: &str) -> Result<String> {
    let digest = eip191_hash_message(message.as_bytes());
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| Error::Signature(format!("Signing failed: {e}")))?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Address controlled by `key`.
#[must_use]
pub fn address_of(key: &k256::ecdsa::SigningKey) -> Address {
    let encoded = key.verifying_key().to_encoded_point(false);
    Address::from_raw_public_key(&encoded.as_bytes()[1..])
}
