//! Address resolution: public key, chain selector, engine.
//!
//! The selector set is closed. An unrecognized chain is a client error
//! rather than a silent fall-through to the default scheme, so a typo
//! can never hand out an address on the wrong network.

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::EngineKind;

/// Chains with a dedicated address scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    /// Account-model chains using keccak addresses
    Evm,
    /// TON, rendered as a v4R2 wallet address
    Ton,
}

impl Chain {
    fn parse(selector: &str) -> Result<Self> {
        match selector.to_ascii_lowercase().as_str() {
            "evm" => Ok(Chain::Evm),
            "ton" => Ok(Chain::Ton),
            other => Err(Error::InvalidParameters(format!(
                "unknown chain selector: {}",
                other
            ))),
        }
    }
}

/// Resolve the address for a public key. With no selector the engine's
/// default scheme applies; with one, the chain must match the engine
/// that produced the key.
pub fn resolve_address(
    public_key: &[u8],
    chain: Option<&str>,
    engine: EngineKind,
) -> Result<String> {
    let selector = chain.filter(|s| !s.is_empty());
    debug!(engine = %engine, chain = selector.unwrap_or("default"), "resolving address");
    match selector {
        None => engine.strategy().default_address(public_key),
        Some(selector) => match Chain::parse(selector)? {
            Chain::Evm => {
                if engine != EngineKind::Ecdsa {
                    return Err(Error::InvalidParameters(
                        "evm addresses require an ECDSA key".into(),
                    ));
                }
                engine.strategy().default_address(public_key)
            }
            Chain::Ton => {
                if engine != EngineKind::EdDsa {
                    return Err(Error::InvalidParameters(
                        "ton addresses require an EdDSA key".into(),
                    ));
                }
                ton_address(public_key)
            }
        },
    }
}

/// Bounceable mainnet v4R2 wallet address in URL-safe base64.
fn ton_address(public_key: &[u8]) -> Result<String> {
    let bytes: [u8; 32] = public_key.try_into().map_err(|_| {
        Error::InvalidParameters(format!(
            "ton wallets require a 32-byte public key, got {} bytes",
            public_key.len()
        ))
    })?;
    let address = keychain_ton::WalletV4R2::new(bytes)
        .address()
        .map_err(|e| Error::Internal(format!("ton address derivation: {}", e)))?;
    Ok(address.to_friendly(true, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    // public key for secret 1, so the expected address is well known
    const GENERATOR_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const GENERATOR_ADDRESS: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

    fn secp_key() -> Vec<u8> {
        hex::decode(GENERATOR_COMPRESSED).unwrap()
    }

    fn ed_key() -> Vec<u8> {
        ed25519_dalek::SigningKey::from_bytes(&[3u8; 32])
            .verifying_key()
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn no_selector_uses_the_engine_default() {
        let address = resolve_address(&secp_key(), None, EngineKind::Ecdsa).unwrap();
        assert_eq!(address, GENERATOR_ADDRESS);

        let address = resolve_address(&ed_key(), None, EngineKind::EdDsa).unwrap();
        assert_eq!(address, bs58::encode(ed_key()).into_string());
    }

    #[test]
    fn empty_selector_counts_as_absent() {
        let address = resolve_address(&secp_key(), Some(""), EngineKind::Ecdsa).unwrap();
        assert_eq!(address, GENERATOR_ADDRESS);
    }

    #[test]
    fn evm_selector_is_case_insensitive() {
        let address = resolve_address(&secp_key(), Some("EVM"), EngineKind::Ecdsa).unwrap();
        assert_eq!(address, GENERATOR_ADDRESS);
    }

    #[test]
    fn ton_addresses_come_from_the_wallet_state_init() {
        let key = ed_key();
        let address = resolve_address(&key, Some("ton"), EngineKind::EdDsa).unwrap();
        assert_eq!(address.len(), 48);
        assert!(address.starts_with("EQ"));

        let wallet = keychain_ton::WalletV4R2::new(key.as_slice().try_into().unwrap());
        assert_eq!(address, wallet.address().unwrap().to_friendly(true, false));
    }

    #[test]
    fn chain_and_engine_must_agree() {
        let err = resolve_address(&secp_key(), Some("ton"), EngineKind::Ecdsa).unwrap_err();
        assert!(err.is_client_error());
        let err = resolve_address(&ed_key(), Some("evm"), EngineKind::EdDsa).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn unknown_selectors_are_rejected() {
        let err = resolve_address(&secp_key(), Some("solana"), EngineKind::Ecdsa).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }
}
