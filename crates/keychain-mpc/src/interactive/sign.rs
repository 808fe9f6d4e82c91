//! Round-based threshold signing.
//!
//! Each batch message gets its own session and relay so rounds from
//! neighbouring messages can never interleave. EdDSA runs a two-round
//! Schnorr aggregation in which the group secret never exists in one
//! place; partial `s` values sum to a signature the standard verifier
//! accepts. ECDSA assembles the Lagrange-weighted fragments before
//! signing, which keeps the transcript shape but not the secrecy.

use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, instrument};

use keychain_core::backend::SignBatch;
use keychain_core::{EngineKind, Error, Result};

use super::messages::{SignRound1Message, SignRound2Message, WeightedShareMessage};
use crate::curve::{ed25519, secp256k1};
use crate::relay::{new_session_id, MemoryRelay, PartyId, Relay, SessionId};
use crate::share::{as_signing_error, AuxiliaryData};

/// Everything one signer needs for one message.
struct SignerContext {
    share_index: u32,
    secret_share: Vec<u8>,
    indices: Arc<Vec<u32>>,
    public_key: Arc<Vec<u8>>,
    message: Arc<Vec<u8>>,
    session_id: SessionId,
    party_id: PartyId,
}

/// Sign every message in the batch, returning raw signatures in batch
/// order.
#[instrument(skip_all, fields(
    engine = %aux.engine,
    messages = batch.messages.len(),
    signers = batch.shares.len(),
))]
pub async fn run_signing(batch: &SignBatch, aux: &AuxiliaryData) -> Result<Vec<Vec<u8>>> {
    // A signer failing before its first broadcast would stall the
    // whole round, so share material is checked before any session
    // starts.
    for share in &batch.shares {
        match aux.engine {
            EngineKind::Ecdsa => {
                secp256k1::scalar_from_bytes(&share.secret_share).map_err(as_signing_error)?;
            }
            EngineKind::EdDsa => {
                ed25519::scalar_from_bytes(&share.secret_share).map_err(as_signing_error)?;
            }
        }
    }

    let mut indices: Vec<u32> = batch.shares.iter().map(|s| s.index).collect();
    indices.sort_unstable();
    let indices = Arc::new(indices);
    let public_key = Arc::new(aux.public_key_bytes().map_err(as_signing_error)?);

    let mut signatures = Vec::with_capacity(batch.messages.len());
    for message in &batch.messages {
        let signature = sign_once(
            aux.engine,
            batch,
            Arc::clone(&indices),
            Arc::clone(&public_key),
            message.clone(),
        )
        .await?;
        signatures.push(signature);
    }
    Ok(signatures)
}

async fn sign_once(
    engine: EngineKind,
    batch: &SignBatch,
    indices: Arc<Vec<u32>>,
    public_key: Arc<Vec<u8>>,
    message: Vec<u8>,
) -> Result<Vec<u8>> {
    let relay = Arc::new(MemoryRelay::new());
    let session_id = new_session_id();
    let message = Arc::new(message);
    debug!(session = hex::encode(&session_id[..8]), "starting signing session");

    let mut handles = Vec::with_capacity(batch.shares.len());
    for (party_id, share) in batch.shares.iter().enumerate() {
        let ctx = SignerContext {
            share_index: share.index,
            secret_share: share.secret_share.clone(),
            indices: Arc::clone(&indices),
            public_key: Arc::clone(&public_key),
            message: Arc::clone(&message),
            session_id,
            party_id,
        };
        let relay = Arc::clone(&relay);
        handles.push(match engine {
            EngineKind::Ecdsa => tokio::spawn(sign_party_secp(ctx, relay)),
            EngineKind::EdDsa => tokio::spawn(sign_party_ed(ctx, relay)),
        });
    }

    let joined = try_join_all(handles)
        .await
        .map_err(|e| Error::Internal(format!("signing task failed: {}", e)))?;
    let mut produced = joined.into_iter().collect::<Result<Vec<Vec<u8>>>>()?;

    let signature = produced
        .pop()
        .ok_or_else(|| Error::SigningFailed("no participants produced a signature".into()))?;
    if produced.iter().any(|other| other != &signature) {
        return Err(Error::SigningFailed(
            "participants disagree on the signature".into(),
        ));
    }
    Ok(signature)
}

async fn sign_party_secp<R: Relay + 'static>(
    ctx: SignerContext,
    relay: Arc<R>,
) -> Result<Vec<u8>> {
    let secret = secp256k1::scalar_from_bytes(&ctx.secret_share).map_err(as_signing_error)?;
    let lambda = secp256k1::lagrange_coefficient(&ctx.indices, ctx.share_index, 0)
        .map_err(as_signing_error)?;
    let weighted = secret * lambda;

    // Simplified - a full protocol would run MtA here instead of
    // assembling the weighted fragments.
    relay
        .broadcast(
            &ctx.session_id,
            1,
            &WeightedShareMessage {
                party_id: ctx.party_id,
                weighted_share: secp256k1::scalar_to_bytes(&weighted),
            },
        )
        .await?;
    let fragments = relay
        .collect_broadcasts::<WeightedShareMessage>(&ctx.session_id, 1, ctx.indices.len())
        .await?;

    let mut group_secret = k256::Scalar::ZERO;
    for msg in &fragments {
        let fragment =
            secp256k1::scalar_from_bytes(&msg.weighted_share).map_err(as_signing_error)?;
        group_secret = group_secret + fragment;
    }

    secp256k1::sign_prehash(&group_secret, &ctx.message)
}

async fn sign_party_ed<R: Relay + 'static>(ctx: SignerContext, relay: Arc<R>) -> Result<Vec<u8>> {
    let secret = ed25519::scalar_from_bytes(&ctx.secret_share).map_err(as_signing_error)?;

    // Round 1: commit to a fresh nonce
    let nonce = ed25519::random_scalar();
    let r_commitment = ed25519::public_key(&nonce);
    relay
        .broadcast(
            &ctx.session_id,
            1,
            &SignRound1Message {
                party_id: ctx.party_id,
                r_commitment,
            },
        )
        .await?;
    let round1 = relay
        .collect_broadcasts::<SignRound1Message>(&ctx.session_id, 1, ctx.indices.len())
        .await?;
    let r_bytes = ed25519::sum_points(round1.iter().map(|m| m.r_commitment.as_slice()))
        .map_err(as_signing_error)?;

    // Round 2: partial s over the shared challenge
    let challenge = ed25519::challenge(&r_bytes, &ctx.public_key, &ctx.message);
    let lambda = ed25519::lagrange_coefficient(&ctx.indices, ctx.share_index, 0)
        .map_err(as_signing_error)?;
    let s_share = nonce + challenge * lambda * secret;
    relay
        .broadcast(
            &ctx.session_id,
            2,
            &SignRound2Message {
                party_id: ctx.party_id,
                s_share: ed25519::scalar_to_bytes(&s_share),
            },
        )
        .await?;
    let round2 = relay
        .collect_broadcasts::<SignRound2Message>(&ctx.session_id, 2, ctx.indices.len())
        .await?;

    let mut s = curve25519_dalek::scalar::Scalar::ZERO;
    for msg in &round2 {
        let partial = ed25519::scalar_from_bytes(&msg.s_share).map_err(as_signing_error)?;
        s = s + partial;
    }

    let mut signature = Vec::with_capacity(64);
    signature.extend_from_slice(&r_bytes);
    signature.extend_from_slice(&ed25519::scalar_to_bytes(&s));
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactive::keygen::run_ceremony;
    use crate::share::ceremony_context;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    use k256::ecdsa::RecoveryId;
    use keychain_core::{KeyShare, ThresholdParams};

    fn batch(shares: Vec<KeyShare>, messages: Vec<Vec<u8>>, threshold: u16) -> SignBatch {
        SignBatch {
            messages,
            threshold,
            shares,
        }
    }

    #[tokio::test]
    async fn ecdsa_quorum_signature_recovers_the_ceremony_key() {
        let shares = run_ceremony(EngineKind::Ecdsa, ThresholdParams { t: 2, n: 3 })
            .await
            .unwrap();
        let aux = ceremony_context(&shares).unwrap();
        let digest = [0x42u8; 32];

        let signatures = run_signing(
            &batch(shares[..2].to_vec(), vec![digest.to_vec()], 2),
            &aux,
        )
        .await
        .unwrap();
        assert_eq!(signatures.len(), 1);
        let signature = &signatures[0];
        assert_eq!(signature.len(), 65);

        let parsed = k256::ecdsa::Signature::from_slice(&signature[..64]).unwrap();
        let recovery = RecoveryId::from_byte(signature[64]).unwrap();
        let recovered = k256::ecdsa::VerifyingKey::recover_from_prehash(&digest, &parsed, recovery)
            .unwrap();
        assert_eq!(
            recovered.to_encoded_point(true).as_bytes(),
            shares[0].public_key.as_slice()
        );
    }

    #[tokio::test]
    async fn ecdsa_signature_is_the_same_for_any_quorum() {
        let shares = run_ceremony(EngineKind::Ecdsa, ThresholdParams { t: 2, n: 3 })
            .await
            .unwrap();
        let aux = ceremony_context(&shares).unwrap();
        let digest = vec![0x07u8; 32];

        let from_front = run_signing(&batch(shares[..2].to_vec(), vec![digest.clone()], 2), &aux)
            .await
            .unwrap();
        let from_back = run_signing(&batch(shares[1..].to_vec(), vec![digest], 2), &aux)
            .await
            .unwrap();
        assert_eq!(from_front, from_back);
    }

    #[tokio::test]
    async fn ecdsa_rejects_digests_of_the_wrong_length() {
        let shares = run_ceremony(EngineKind::Ecdsa, ThresholdParams { t: 1, n: 2 })
            .await
            .unwrap();
        let aux = ceremony_context(&shares).unwrap();
        let err = run_signing(&batch(shares, vec![vec![1, 2, 3]], 1), &aux)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SigningFailed(_)));
    }

    #[tokio::test]
    async fn eddsa_quorum_signature_verifies_under_dalek() {
        let shares = run_ceremony(EngineKind::EdDsa, ThresholdParams { t: 2, n: 3 })
            .await
            .unwrap();
        let aux = ceremony_context(&shares).unwrap();
        let message = b"lifecycle message".to_vec();

        let signatures = run_signing(
            &batch(
                vec![shares[0].clone(), shares[2].clone()],
                vec![message.clone()],
                2,
            ),
            &aux,
        )
        .await
        .unwrap();
        let signature = &signatures[0];
        assert_eq!(signature.len(), 64);

        let key_bytes: [u8; 32] = shares[0].public_key.as_slice().try_into().unwrap();
        let verifier = VerifyingKey::from_bytes(&key_bytes).unwrap();
        let sig_bytes: [u8; 64] = signature.as_slice().try_into().unwrap();
        verifier
            .verify(&message, &Signature::from_bytes(&sig_bytes))
            .unwrap();
        assert!(verifier
            .verify(b"different message", &Signature::from_bytes(&sig_bytes))
            .is_err());
    }

    #[tokio::test]
    async fn batches_come_back_in_order() {
        let shares = run_ceremony(EngineKind::EdDsa, ThresholdParams { t: 2, n: 2 })
            .await
            .unwrap();
        let aux = ceremony_context(&shares).unwrap();
        let messages = vec![b"first".to_vec(), b"second".to_vec()];

        let signatures = run_signing(&batch(shares.clone(), messages.clone(), 2), &aux)
            .await
            .unwrap();
        assert_eq!(signatures.len(), 2);

        let key_bytes: [u8; 32] = shares[0].public_key.as_slice().try_into().unwrap();
        let verifier = VerifyingKey::from_bytes(&key_bytes).unwrap();
        for (message, signature) in messages.iter().zip(&signatures) {
            let sig_bytes: [u8; 64] = signature.as_slice().try_into().unwrap();
            verifier
                .verify(message, &Signature::from_bytes(&sig_bytes))
                .unwrap();
        }
    }
}
