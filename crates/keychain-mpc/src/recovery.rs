//! Verified reconstruction over a presented share set.
//!
//! Recovery and export both reduce to the same operation: check every
//! presented share against the ceremony commitments, then interpolate
//! the sharing polynomial. Nothing here trusts share contents; a
//! tampered fragment fails commitment verification before any secret
//! leaves this module.

use tracing::debug;

use keychain_core::{EngineKind, Error, KeyShare, Result};

use crate::curve::{ed25519, secp256k1};
use crate::share::AuxiliaryData;

fn secp_points(
    shares: &[KeyShare],
    commitments: &[Vec<u8>],
) -> Result<Vec<(u32, k256::Scalar)>> {
    shares
        .iter()
        .map(|share| {
            let scalar = secp256k1::scalar_from_bytes(&share.secret_share)?;
            secp256k1::verify_share(share.index, &scalar, commitments)?;
            Ok((share.index, scalar))
        })
        .collect()
}

fn ed_points(
    shares: &[KeyShare],
    commitments: &[Vec<u8>],
) -> Result<Vec<(u32, curve25519_dalek::scalar::Scalar)>> {
    shares
        .iter()
        .map(|share| {
            let scalar = ed25519::scalar_from_bytes(&share.secret_share)?;
            ed25519::verify_share(share.index, &scalar, commitments)?;
            Ok((share.index, scalar))
        })
        .collect()
}

/// Interpolate the sharing polynomial at `x`, verifying every presented
/// share first.
pub fn interpolate_at(shares: &[KeyShare], aux: &AuxiliaryData, x: u32) -> Result<Vec<u8>> {
    let commitments = aux.commitment_bytes()?;
    match aux.engine {
        EngineKind::Ecdsa => {
            let points = secp_points(shares, &commitments)?;
            let value = secp256k1::interpolate(&points, x)?;
            Ok(secp256k1::scalar_to_bytes(&value))
        }
        EngineKind::EdDsa => {
            let points = ed_points(shares, &commitments)?;
            let value = ed25519::interpolate(&points, x)?;
            Ok(ed25519::scalar_to_bytes(&value))
        }
    }
}

/// Reconstruct the group secret and check it against the ceremony
/// public key.
pub fn reconstruct_secret(shares: &[KeyShare], aux: &AuxiliaryData) -> Result<Vec<u8>> {
    let secret = interpolate_at(shares, aux, 0)?;
    let public = match aux.engine {
        EngineKind::Ecdsa => secp256k1::public_key(&secp256k1::scalar_from_bytes(&secret)?),
        EngineKind::EdDsa => ed25519::public_key(&ed25519::scalar_from_bytes(&secret)?),
    };
    if public != aux.public_key_bytes()? {
        return Err(Error::RecoveryFailed(
            "reconstructed secret does not match the ceremony public key".into(),
        ));
    }
    Ok(secret)
}

/// Rebuild the shares absent from the presented set.
///
/// Returns one share per missing index, carrying the same ceremony
/// blob so recovered fragments mix freely with the originals. An
/// already-complete set yields an empty vector.
pub fn recover_missing_shares(shares: &[KeyShare], aux: &AuxiliaryData) -> Result<Vec<KeyShare>> {
    let first = shares.first().ok_or(Error::MissingParameter("keys"))?;
    let presented: std::collections::HashSet<u32> = shares.iter().map(|s| s.index).collect();
    let missing: Vec<u32> = (1..=aux.n as u32)
        .filter(|i| !presented.contains(i))
        .collect();
    if missing.is_empty() {
        debug!("share set already complete, nothing to recover");
        return Ok(Vec::new());
    }

    // Verifying the set once up front also validates the interpolation
    // inputs reused for every missing index.
    reconstruct_secret(shares, aux)?;

    let public_key = aux.public_key_bytes()?;
    let mut recovered = Vec::with_capacity(missing.len());
    for index in missing {
        let secret_share = interpolate_at(shares, aux, index)?;
        recovered.push(KeyShare {
            index,
            engine: aux.engine,
            params: aux.params(),
            secret_share,
            public_key: public_key.clone(),
            aux: first.aux.clone(),
        });
    }
    debug!(count = recovered.len(), "recovered missing shares");
    Ok(recovered)
}

/// Reconstruct the group secret in the engine's native export encoding:
/// 0x-hex for ECDSA, base58 over the 64-byte keypair for EdDSA.
pub fn export_group_secret(shares: &[KeyShare], aux: &AuxiliaryData) -> Result<String> {
    let secret = reconstruct_secret(shares, aux)?;
    match aux.engine {
        EngineKind::Ecdsa => Ok(format!("0x{}", hex::encode(&secret))),
        EngineKind::EdDsa => {
            let scalar = ed25519::scalar_from_bytes(&secret)?;
            Ok(ed25519::keypair_base58(&scalar))
        }
    }
}
