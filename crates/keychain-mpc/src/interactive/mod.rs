//! Interactive multi-party backend.
//!
//! Operations here run the real round-based protocols between
//! participants connected by a relay. Participants live in this
//! process, but the protocol code only ever talks to the [`Relay`]
//! trait, so the transport can move out of process without touching
//! the rounds.
//!
//! [`Relay`]: crate::relay::Relay

pub mod keygen;
pub mod messages;
pub mod sign;

use async_trait::async_trait;
use tracing::instrument;

use keychain_core::backend::{MpcBackend, RecoverContext, SignBatch};
use keychain_core::{EngineKind, Error, KeyShare, Result, ThresholdParams};

use crate::recovery;
use crate::share::{self, AuxiliaryData};

/// Backend driving round-based ceremonies between live participants.
pub struct InteractiveBackend;

#[async_trait]
impl MpcBackend for InteractiveBackend {
    #[instrument(skip_all, fields(engine = %engine, t = params.t, n = params.n))]
    async fn generate(
        &self,
        engine: EngineKind,
        params: ThresholdParams,
    ) -> Result<Vec<KeyShare>> {
        keygen::run_ceremony(engine, params).await
    }

    #[instrument(skip_all, fields(presented = shares.len()))]
    async fn recover(&self, shares: Vec<KeyShare>, ctx: RecoverContext) -> Result<Vec<KeyShare>> {
        // Interactive recovery is driven by the ceremony blob the
        // coordinator stored at generation time.
        let blob = match ctx {
            RecoverContext::Auxiliary(blob) => blob,
            RecoverContext::Engine(_) => return Err(Error::MissingParameter("aux")),
        };
        let aux = AuxiliaryData::from_blob(&blob)?;
        let own = share::ceremony_context(&shares)?;
        if own.ceremony != aux.ceremony {
            return Err(Error::RecoveryFailed(
                "aux does not match the presented shares".into(),
            ));
        }
        share::validate_quorum(&shares, &aux, aux.engine)?;
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
        sign::run_signing(&batch, &aux).await
    }

    #[instrument(skip_all, fields(engine = %engine, presented = shares.len()))]
    async fn export_secret(&self, engine: EngineKind, shares: Vec<KeyShare>) -> Result<String> {
        let aux = share::ceremony_context(&shares)?;
        share::validate_quorum(&shares, &aux, engine)?;
        recovery::export_group_secret(&shares, &aux)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_then_recover_round_trips() {
        let backend = InteractiveBackend;
        let params = ThresholdParams { t: 2, n: 3 };
        let shares = backend.generate(EngineKind::EdDsa, params).await.unwrap();
        let blob = shares[0].aux.clone();

        let recovered = backend
            .recover(
                shares[..2].to_vec(),
                RecoverContext::Auxiliary(blob.clone()),
            )
            .await
            .unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].index, 3);
        assert_eq!(recovered[0].secret_share, shares[2].secret_share);

        let complete = backend
            .recover(shares, RecoverContext::Auxiliary(blob))
            .await
            .unwrap();
        assert!(complete.is_empty());
    }

    #[tokio::test]
    async fn recovery_requires_the_ceremony_blob() {
        let backend = InteractiveBackend;
        let shares = backend
            .generate(EngineKind::Ecdsa, ThresholdParams { t: 2, n: 3 })
            .await
            .unwrap();

        let err = backend
            .recover(
                shares[..2].to_vec(),
                RecoverContext::Engine(EngineKind::Ecdsa),
            )
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "aux is required");
    }

    #[tokio::test]
    async fn recovery_rejects_a_foreign_blob() {
        let backend = InteractiveBackend;
        let params = ThresholdParams { t: 2, n: 3 };
        let shares = backend.generate(EngineKind::Ecdsa, params).await.unwrap();
        let other = backend.generate(EngineKind::Ecdsa, params).await.unwrap();

        let err = backend
            .recover(
                shares[..2].to_vec(),
                RecoverContext::Auxiliary(other[0].aux.clone()),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::RecoveryFailed(_)));
    }

    #[tokio::test]
    async fn signing_enforces_the_caller_quorum() {
        let backend = InteractiveBackend;
        let shares = backend
            .generate(EngineKind::Ecdsa, ThresholdParams { t: 1, n: 3 })
            .await
            .unwrap();

        let err = backend
            .sign(
                EngineKind::Ecdsa,
                SignBatch {
                    messages: vec![vec![0u8; 32]],
                    threshold: 3,
                    shares: shares[..2].to_vec(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SigningFailed(_)));
    }

    #[tokio::test]
    async fn mixed_ceremony_shares_cannot_sign() {
        let backend = InteractiveBackend;
        let params = ThresholdParams { t: 2, n: 3 };
        let a = backend.generate(EngineKind::Ecdsa, params).await.unwrap();
        let b = backend.generate(EngineKind::Ecdsa, params).await.unwrap();

        let err = backend
            .sign(
                EngineKind::Ecdsa,
                SignBatch {
                    messages: vec![vec![0u8; 32]],
                    threshold: 2,
                    shares: vec![a[0].clone(), b[1].clone()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SigningFailed(_)));
    }

    #[tokio::test]
    async fn export_reconstructs_the_group_secret() {
        let backend = InteractiveBackend;
        let shares = backend
            .generate(EngineKind::Ecdsa, ThresholdParams { t: 2, n: 3 })
            .await
            .unwrap();

        let exported = backend
            .export_secret(EngineKind::Ecdsa, shares[1..].to_vec())
            .await
            .unwrap();
        assert!(exported.starts_with("0x"));
        assert_eq!(exported.len(), 66);

        let err = backend
            .export_secret(EngineKind::EdDsa, shares)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RecoveryFailed(_)));
    }
}
