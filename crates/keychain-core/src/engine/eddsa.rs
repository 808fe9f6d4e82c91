//! EdDSA/ed25519 engine rules: raw message bytes, 64-byte signatures
//! hex-encoded verbatim, base58 default addresses.

use ed25519_dalek::VerifyingKey;

use crate::engine::EngineStrategy;
use crate::error::{Error, Result};
use crate::types::EngineKind;

pub struct EdDsaStrategy;

impl EngineStrategy for EdDsaStrategy {
    fn kind(&self) -> EngineKind {
        EngineKind::EdDsa
    }

    /// Ed25519 hashes the message internally, so the payload passes
    /// through as bytes. There is no transaction digest rule for this
    /// engine; the flag is ignored.
    fn prepare_message(&self, payload: &str, _is_transaction: bool) -> Result<Vec<u8>> {
        match payload.strip_prefix("0x") {
            Some(body) => Ok(hex::decode(body)?),
            None => Ok(payload.as_bytes().to_vec()),
        }
    }

    fn encode_signature(&self, raw: &[u8]) -> Result<String> {
        if raw.len() != 64 {
            return Err(Error::SigningFailed(format!(
                "expected 64 signature bytes, got {}",
                raw.len()
            )));
        }
        Ok(format!("0x{}", hex::encode(raw)))
    }

    /// The backend exports a base58 keypair, secret followed by public;
    /// callers get the 32 secret bytes as 0x-hex.
    fn encode_secret_key(&self, exported: &str) -> Result<String> {
        let decoded = bs58::decode(exported)
            .into_vec()
            .map_err(|e| Error::Internal(format!("secret export is not base58: {}", e)))?;
        if decoded.len() < 32 {
            return Err(Error::Internal(format!(
                "secret export too short: {} bytes",
                decoded.len()
            )));
        }
        Ok(format!("0x{}", hex::encode(&decoded[..32])))
    }

    /// Chain-agnostic ed25519 keys render as base58 of the 32 key bytes.
    fn default_address(&self, public_key: &[u8]) -> Result<String> {
        let bytes: [u8; 32] = public_key.try_into().map_err(|_| {
            Error::InvalidParameters(format!(
                "ed25519 public key must be 32 bytes, got {}",
                public_key.len()
            ))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| Error::InvalidParameters(format!("invalid ed25519 public key: {}", e)))?;
        Ok(bs58::encode(bytes).into_string())
    }
}
