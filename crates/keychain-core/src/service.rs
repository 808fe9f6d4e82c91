//! Request-level surface: one entry point per operation and mode.
//!
//! This is the contract a transport binds. Fields are optional with
//! the documented defaults, presence is validated before anything else
//! (an empty string counts as absent), and the interactive/local split
//! is expressed purely as which wrapper a route calls.

use serde::{Deserialize, Serialize};

use crate::address;
use crate::backend::RecoverContext;
use crate::error::{Error, Result};
use crate::lifecycle;
use crate::types::{EngineKind, KeyShare, SessionMode, SigningRequest, ThresholdParams};
use crate::{DEFAULT_SHARES, DEFAULT_THRESHOLD};

/// Parameters for a generation ceremony.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Quorum size, defaulting to 1
    pub t: Option<u16>,
    /// Share count, defaulting to 3
    pub n: Option<u16>,
    /// Engine, defaulting to ECDSA
    pub engine: Option<EngineKind>,
}

/// Shares plus the context needed to rebuild the missing ones.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RecoverRequest {
    pub keys: Option<Vec<KeyShare>>,
    /// Ceremony metadata blob, required in interactive mode
    pub aux: Option<String>,
    /// Engine tag used by local mode, defaulting to ECDSA
    pub engine: Option<EngineKind>,
}

/// A key plus an optional chain selector.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AddressRequest {
    pub key: Option<KeyShare>,
    pub chain: Option<String>,
    pub engine: Option<EngineKind>,
}

/// A payload plus the shares that authorize signing it.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SignRequest {
    pub message: Option<String>,
    pub keys: Option<Vec<KeyShare>>,
    /// Engine, defaulting to ECDSA
    pub engine: Option<EngineKind>,
    /// Whether the payload is a serialized transaction; defaults to true
    #[serde(rename = "isTx")]
    pub is_transaction: Option<bool>,
    /// Session quorum, defaulting to 1
    pub t: Option<u16>,
}

/// Shares to collapse back into the group secret.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ExportSecretRequest {
    pub keys: Option<Vec<KeyShare>>,
    /// Engine, defaulting to ECDSA
    pub engine: Option<EngineKind>,
}

pub async fn generate(req: GenerateRequest) -> Result<Vec<KeyShare>> {
    generate_in(SessionMode::Interactive, req).await
}

pub async fn generate_local(req: GenerateRequest) -> Result<Vec<KeyShare>> {
    generate_in(SessionMode::LocalSimulation, req).await
}

async fn generate_in(mode: SessionMode, req: GenerateRequest) -> Result<Vec<KeyShare>> {
    let params = ThresholdParams::new(
        req.t.unwrap_or(DEFAULT_THRESHOLD),
        req.n.unwrap_or(DEFAULT_SHARES),
    )?;
    lifecycle::generate(mode, req.engine.unwrap_or_default(), params).await
}

pub async fn recover(req: RecoverRequest) -> Result<Vec<KeyShare>> {
    let keys = req.keys.ok_or(Error::MissingParameter("keys"))?;
    let aux = req
        .aux
        .filter(|a| !a.is_empty())
        .ok_or(Error::MissingParameter("aux"))?;
    lifecycle::recover(
        SessionMode::Interactive,
        keys,
        RecoverContext::Auxiliary(aux),
    )
    .await
}

pub async fn recover_local(req: RecoverRequest) -> Result<Vec<KeyShare>> {
    let keys = req.keys.ok_or(Error::MissingParameter("keys"))?;
    let engine = req.engine.unwrap_or_default();
    lifecycle::recover(
        SessionMode::LocalSimulation,
        keys,
        RecoverContext::Engine(engine),
    )
    .await
}

pub async fn address(req: AddressRequest) -> Result<String> {
    address_for(req)
}

pub async fn address_local(req: AddressRequest) -> Result<String> {
    address_for(req)
}

/// Address derivation is pure, so both modes share one body. The share
/// carries its engine; an explicit selector must agree with it.
fn address_for(req: AddressRequest) -> Result<String> {
    let key = req.key.ok_or(Error::MissingParameter("key"))?;
    if let Some(engine) = req.engine {
        key.ensure_engine(engine)?;
    }
    address::resolve_address(&key.public_key, req.chain.as_deref(), key.engine)
}

pub async fn sign(req: SignRequest) -> Result<String> {
    sign_in(SessionMode::Interactive, req).await
}

pub async fn sign_local(req: SignRequest) -> Result<String> {
    sign_in(SessionMode::LocalSimulation, req).await
}

async fn sign_in(mode: SessionMode, req: SignRequest) -> Result<String> {
    let payload = req
        .message
        .filter(|m| !m.is_empty())
        .ok_or(Error::MissingParameter("message"))?;
    let shares = req.keys.ok_or(Error::MissingParameter("keys"))?;
    let request = SigningRequest {
        payload,
        is_transaction: req.is_transaction.unwrap_or(true),
        engine: req.engine.unwrap_or_default(),
        shares,
        threshold: req.t.unwrap_or(DEFAULT_THRESHOLD),
    };
    lifecycle::sign(mode, request).await
}

pub async fn export_secret(req: ExportSecretRequest) -> Result<String> {
    export_in(SessionMode::Interactive, req).await
}

pub async fn export_secret_local(req: ExportSecretRequest) -> Result<String> {
    export_in(SessionMode::LocalSimulation, req).await
}

async fn export_in(mode: SessionMode, req: ExportSecretRequest) -> Result<String> {
    let keys = req.keys.ok_or(Error::MissingParameter("keys"))?;
    lifecycle::export_secret(mode, req.engine.unwrap_or_default(), keys).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{self, Backends, MpcBackend, SignBatch};
    use async_trait::async_trait;
    use std::sync::Arc;

    // public key for secret 1
    const GENERATOR_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn secp_share() -> KeyShare {
        KeyShare {
            index: 1,
            engine: EngineKind::Ecdsa,
            params: ThresholdParams::default(),
            secret_share: vec![0x01; 32],
            public_key: hex::decode(GENERATOR_COMPRESSED).unwrap(),
            aux: "blob".into(),
        }
    }

    #[tokio::test]
    async fn sign_requires_a_message() {
        let err = sign_local(SignRequest {
            keys: Some(vec![secp_share()]),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "message is required");
    }

    #[tokio::test]
    async fn empty_message_counts_as_absent() {
        let err = sign_local(SignRequest {
            message: Some(String::new()),
            keys: Some(vec![secp_share()]),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "message is required");
    }

    #[tokio::test]
    async fn sign_requires_keys() {
        let err = sign_local(SignRequest {
            message: Some("hello".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "keys is required");
    }

    #[tokio::test]
    async fn sign_rejects_engine_mismatch_before_the_backend() {
        let err = sign_local(SignRequest {
            message: Some("hello".into()),
            keys: Some(vec![secp_share()]),
            engine: Some(EngineKind::EdDsa),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn recover_requires_keys_then_aux() {
        let err = recover(RecoverRequest::default()).await.err().unwrap();
        assert_eq!(err.to_string(), "keys is required");

        let err = recover(RecoverRequest {
            keys: Some(vec![secp_share()]),
            ..Default::default()
        })
        .await
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "aux is required");

        let err = recover(RecoverRequest {
            keys: Some(vec![secp_share()]),
            aux: Some(String::new()),
            ..Default::default()
        })
        .await
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "aux is required");
    }

    #[tokio::test]
    async fn address_requires_a_key() {
        let err = address(AddressRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "key is required");
    }

    #[tokio::test]
    async fn address_resolves_without_a_backend() {
        let derived = address_local(AddressRequest {
            key: Some(secp_share()),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(derived, "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[tokio::test]
    async fn address_rejects_engine_mismatch() {
        let err = address(AddressRequest {
            key: Some(secp_share()),
            engine: Some(EngineKind::EdDsa),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn address_rejects_unknown_chains() {
        let err = address(AddressRequest {
            key: Some(secp_share()),
            chain: Some("cosmos".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn generate_rejects_inverted_thresholds() {
        let err = generate_local(GenerateRequest {
            t: Some(4),
            n: Some(3),
            engine: None,
        })
        .await
        .err()
        .unwrap();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn export_requires_keys() {
        let err = export_secret_local(ExportSecretRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "keys is required");
    }

    /// Echo backend for exercising the registry plumbing end to end.
    struct StubBackend;

    #[async_trait]
    impl MpcBackend for StubBackend {
        async fn generate(
            &self,
            engine: EngineKind,
            params: ThresholdParams,
        ) -> crate::Result<Vec<KeyShare>> {
            Ok((1..=params.n as u32)
                .map(|index| KeyShare {
                    index,
                    engine,
                    params,
                    secret_share: vec![index as u8; 32],
                    public_key: hex::decode(GENERATOR_COMPRESSED).unwrap(),
                    aux: "stub".into(),
                })
                .collect())
        }

        async fn recover(
            &self,
            _shares: Vec<KeyShare>,
            _ctx: backend::RecoverContext,
        ) -> crate::Result<Vec<KeyShare>> {
            Ok(vec![])
        }

        async fn sign(
            &self,
            engine: EngineKind,
            batch: SignBatch,
        ) -> crate::Result<Vec<Vec<u8>>> {
            let len = match engine {
                EngineKind::Ecdsa => 65,
                EngineKind::EdDsa => 64,
            };
            Ok(batch.messages.iter().map(|_| vec![0u8; len]).collect())
        }

        async fn export_secret(
            &self,
            _engine: EngineKind,
            _shares: Vec<KeyShare>,
        ) -> crate::Result<String> {
            Ok(format!("0x{}", "ab".repeat(32)))
        }
    }

    /// The registry lifecycle runs inside one test body: other tests in
    /// this module never install or remove backends, so execution order
    /// cannot break them.
    #[tokio::test]
    async fn registry_gates_every_backend_operation() {
        let before = generate_local(GenerateRequest::default()).await;
        assert!(matches!(before, Err(Error::BackendUnavailable(_))));

        backend::init_backends(Backends {
            interactive: Arc::new(StubBackend),
            local: Arc::new(StubBackend),
        });
        // second install is a no-op rather than a replacement
        backend::init_backends(Backends {
            interactive: Arc::new(StubBackend),
            local: Arc::new(StubBackend),
        });

        let shares = generate_local(GenerateRequest::default()).await.unwrap();
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].index, 1);

        let signature = sign_local(SignRequest {
            message: Some("hello".into()),
            keys: Some(shares.clone()),
            is_transaction: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
        // 65 zero bytes with v offset to 27
        assert_eq!(signature, format!("0x{}1b", "00".repeat(64)));

        let recovered = recover_local(RecoverRequest {
            keys: Some(shares),
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(recovered.is_empty());

        backend::teardown_backends();
        let after = generate_local(GenerateRequest::default()).await;
        assert!(matches!(after, Err(Error::BackendUnavailable(_))));
    }
}
