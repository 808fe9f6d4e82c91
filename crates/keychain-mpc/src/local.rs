//! Single-process simulation backend.
//!
//! Ceremonies here skip the relay entirely: one dealer polynomial is
//! sampled, evaluated, and committed in place. The shares it issues
//! are indistinguishable from interactive ones, carry the same
//! metadata blob, and mix freely with the interactive backend.

use async_trait::async_trait;
use tracing::instrument;

use keychain_core::backend::{MpcBackend, RecoverContext, SignBatch};
use keychain_core::{EngineKind, Error, KeyShare, Result, ThresholdParams};

use crate::curve::{ed25519, secp256k1};
use crate::recovery;
use crate::share::{self, assemble_shares, AuxiliaryData};

/// Backend running every ceremony in place, without a relay.
pub struct LocalBackend;

impl LocalBackend {
    fn deal(engine: EngineKind, params: ThresholdParams) -> Result<Vec<KeyShare>> {
        match engine {
            EngineKind::Ecdsa => {
                let poly = secp256k1::random_polynomial(params.t);
                let commitments = secp256k1::commitments(&poly);
                let public_key = secp256k1::public_key(&poly[0]);
                let secrets = (1..=params.n as u32)
                    .map(|i| (i, secp256k1::scalar_to_bytes(&secp256k1::evaluate(&poly, i))))
                    .collect();
                let aux = AuxiliaryData::new(engine, params, &commitments, &public_key);
                assemble_shares(engine, params, secrets, &public_key, &aux)
            }
            EngineKind::EdDsa => {
                let poly = ed25519::random_polynomial(params.t);
                let commitments = ed25519::commitments(&poly);
                let public_key = ed25519::public_key(&poly[0]);
                let secrets = (1..=params.n as u32)
                    .map(|i| (i, ed25519::scalar_to_bytes(&ed25519::evaluate(&poly, i))))
                    .collect();
                let aux = AuxiliaryData::new(engine, params, &commitments, &public_key);
                assemble_shares(engine, params, secrets, &public_key, &aux)
            }
        }
    }
}

#[async_trait]
impl MpcBackend for LocalBackend {
    #[instrument(skip_all, fields(engine = %engine, t = params.t, n = params.n))]
    async fn generate(
        &self,
        engine: EngineKind,
        params: ThresholdParams,
    ) -> Result<Vec<KeyShare>> {
        // The dealer indexes the constant term, so the parameters are
        // revalidated even though the orchestration layer checks them.
        let params = ThresholdParams::new(params.t, params.n)?;
        Self::deal(engine, params)
    }

    #[instrument(skip_all, fields(presented = shares.len()))]
    async fn recover(&self, shares: Vec<KeyShare>, ctx: RecoverContext) -> Result<Vec<KeyShare>> {
        let (aux, engine) = match ctx {
            RecoverContext::Auxiliary(blob) => {
                let aux = AuxiliaryData::from_blob(&blob)?;
                let own = share::ceremony_context(&shares)?;
                if own.ceremony != aux.ceremony {
                    return Err(Error::RecoveryFailed(
                        "aux does not match the presented shares".into(),
                    ));
                }
                let engine = aux.engine;
                (aux, engine)
            }
            RecoverContext::Engine(engine) => (share::ceremony_context(&shares)?, engine),
        };
        share::validate_quorum(&shares, &aux, engine)?;
        recovery::recover_missing_shares(&shares, &aux)
    }

    #[instrument(skip_all, fields(
        engine = %engine,
        messages = batch.messages.len(),
        signers = batch.shares.len(),
    ))]
    async fn sign(&self, engine: EngineKind, batch: SignBatch) -> Result<Vec<Vec<u8>>> {
        let aux = share::ceremony_context(&batch.shares).map_err(share::as_signing_error)?;
        share::validate_quorum(&batch.shares, &aux, engine).map_err(share::as_signing_error)?;
        if (batch.shares.len() as u16) < batch.threshold {
            return Err(Error::SigningFailed(format!(
                "{} shares presented, caller requires quorum {}",
                batch.shares.len(),
                batch.threshold
            )));
        }

        let secret =
            recovery::reconstruct_secret(&batch.shares, &aux).map_err(share::as_signing_error)?;
        match engine {
            EngineKind::Ecdsa => {
                let scalar =
                    secp256k1::scalar_from_bytes(&secret).map_err(share::as_signing_error)?;
                batch
                    .messages
                    .iter()
                    .map(|message| secp256k1::sign_prehash(&scalar, message))
                    .collect()
            }
            EngineKind::EdDsa => {
                let scalar =
                    ed25519::scalar_from_bytes(&secret).map_err(share::as_signing_error)?;
                Ok(batch
                    .messages
                    .iter()
                    .map(|message| ed25519::sign(&scalar, message))
                    .collect())
            }
        }
    }

    #[instrument(skip_all, fields(engine = %engine, presented = shares.len()))]
    async fn export_secret(&self, engine: EngineKind, shares: Vec<KeyShare>) -> Result<String> {
        let aux = share::ceremony_context(&shares)?;
        share::validate_quorum(&shares, &aux, engine)?;
        recovery::export_group_secret(&shares, &aux)
    }
}
