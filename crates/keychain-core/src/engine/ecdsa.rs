//! ECDSA/secp256k1 engine rules: keccak256 digests, 65-byte r||s||v
//! signatures, and account addresses from the uncompressed key.

use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint};
use sha3::{Digest, Keccak256};

use crate::engine::EngineStrategy;
use crate::error::{Error, Result};
use crate::types::EngineKind;

/// Prefix of the personal-message signing convention.
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

pub struct EcdsaStrategy;

impl EngineStrategy for EcdsaStrategy {
    fn kind(&self) -> EngineKind {
        EngineKind::Ecdsa
    }

    /// Transactions are hashed directly; anything else goes through the
    /// personal-message envelope so arbitrary text cannot alias a
    /// transaction digest.
    fn prepare_message(&self, payload: &str, is_transaction: bool) -> Result<Vec<u8>> {
        if is_transaction {
            let raw = decode_transaction_payload(payload)?;
            Ok(Keccak256::digest(&raw).to_vec())
        } else {
            Ok(personal_message_hash(payload)?.to_vec())
        }
    }

    /// Raw backend form is r || s || recovery_id with the id in {0, 1};
    /// the external form carries v = recovery_id + 27.
    fn encode_signature(&self, raw: &[u8]) -> Result<String> {
        if raw.len() != 65 {
            return Err(Error::SigningFailed(format!(
                "expected 65 signature bytes, got {}",
                raw.len()
            )));
        }
        let recovery = raw[64];
        if recovery > 1 {
            return Err(Error::SigningFailed(format!(
                "recovery id out of range: {}",
                recovery
            )));
        }
        let mut out = raw[..64].to_vec();
        out.push(recovery + 27);
        Ok(format!("0x{}", hex::encode(out)))
    }

    /// The backend's native ECDSA export is already 0x-prefixed hex.
    fn encode_secret_key(&self, exported: &str) -> Result<String> {
        Ok(exported.to_string())
    }

    fn default_address(&self, public_key: &[u8]) -> Result<String> {
        evm_address(public_key)
    }
}

/// Personal-message hash: prefix, decimal byte length, payload bytes,
/// keccak256. A 0x-prefixed payload is hashed as raw bytes, anything
/// else as UTF-8 text.
pub fn personal_message_hash(payload: &str) -> Result<[u8; 32]> {
    let bytes = match try_decode_hex(payload)? {
        Some(raw) => raw,
        None => payload.as_bytes().to_vec(),
    };
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(bytes.len().to_string().as_bytes());
    hasher.update(&bytes);
    Ok(hasher.finalize().into())
}

/// Account address: keccak256 over the uncompressed key body, low 20
/// bytes, lowercase 0x-hex.
pub fn evm_address(public_key: &[u8]) -> Result<String> {
    let encoded = EncodedPoint::from_bytes(public_key)
        .map_err(|e| Error::InvalidParameters(format!("invalid public key: {}", e)))?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| Error::InvalidParameters("public key is not on the curve".into()))?;
    let uncompressed = affine.to_encoded_point(false);
    let digest = Keccak256::digest(&uncompressed.as_bytes()[1..]);
    Ok(format!("0x{}", hex::encode(&digest[12..])))
}

fn decode_transaction_payload(payload: &str) -> Result<Vec<u8>> {
    match try_decode_hex(payload)? {
        Some(raw) => Ok(raw),
        None => Err(Error::InvalidParameters(
            "transaction payload must be 0x-prefixed hex".into(),
        )),
    }
}

/// Some(bytes) for a well-formed 0x payload, None for plain text. A 0x
/// prefix followed by malformed hex is an error, not text.
fn try_decode_hex(payload: &str) -> Result<Option<Vec<u8>>> {
    match payload.strip_prefix("0x") {
        Some(body) => Ok(Some(hex::decode(body)?)),
        None => Ok(None),
    }
}
