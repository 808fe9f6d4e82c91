//! Per-engine hashing, encoding, and address rules.

mod ecdsa;
mod eddsa;

pub use ecdsa::{evm_address, personal_message_hash, EcdsaStrategy};
pub use eddsa::EdDsaStrategy;

use crate::error::Result;
use crate::types::EngineKind;

/// Curve-specific behavior attached to an [`EngineKind`].
///
/// Every engine-conditional decision in the lifecycle goes through this
/// trait, so the rules for message hashing, signature encoding, secret
/// export, and default addresses live in exactly one place per curve.
pub trait EngineStrategy: Send + Sync {
    /// The engine this strategy implements.
    fn kind(&self) -> EngineKind;

    /// Turn a caller payload plus intent flag into the exact bytes the
    /// backend signs.
    fn prepare_message(&self, payload: &str, is_transaction: bool) -> Result<Vec<u8>>;

    /// Normalize raw backend signature bytes into the external form.
    fn encode_signature(&self, raw: &[u8]) -> Result<String>;

    /// Re-encode the backend's native secret-key export for callers.
    fn encode_secret_key(&self, exported: &str) -> Result<String>;

    /// The engine's default, chain-agnostic address for a public key.
    fn default_address(&self, public_key: &[u8]) -> Result<String>;
}

impl EngineKind {
    /// Strategy singleton for this engine.
    pub fn strategy(&self) -> &'static dyn EngineStrategy {
        match self {
            EngineKind::Ecdsa => &EcdsaStrategy,
            EngineKind::EdDsa => &EdDsaStrategy,
        }
    }
}
