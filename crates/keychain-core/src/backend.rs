//! Cryptographic backend contract and the process-wide registry.
//!
//! Loading real backends is expensive, so a pair of them (one per
//! session mode) is installed once per process and shared by every
//! request. Operations themselves stay stateless; the registry is the
//! only global.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use lazy_static::lazy_static;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{EngineKind, KeyShare, SessionMode, ThresholdParams};

/// One batch of prepared messages for the backend to sign.
#[derive(Clone)]
pub struct SignBatch {
    /// Message bytes, one entry per requested signature
    pub messages: Vec<Vec<u8>>,
    /// Quorum the caller asserts for this session
    pub threshold: u16,
    /// Shares participating in the session
    pub shares: Vec<KeyShare>,
}

/// Context accompanying a recovery call.
#[derive(Clone)]
pub enum RecoverContext {
    /// Explicit ceremony metadata blob, as interactive callers supply
    Auxiliary(String),
    /// Engine tag only; the metadata comes from the shares themselves
    Engine(EngineKind),
}

/// Contract of the cryptographic backend.
///
/// Implementations own the secret-sharing, recovery, and threshold
/// signing math. The orchestration layer treats them as a black box
/// and performs no share arithmetic of its own.
#[async_trait]
pub trait MpcBackend: Send + Sync {
    /// Run a generation ceremony, producing `params.n` shares.
    async fn generate(&self, engine: EngineKind, params: ThresholdParams)
        -> Result<Vec<KeyShare>>;

    /// Reconstruct the ceremony shares missing from `shares`. Returns
    /// an empty vector when every share is already present.
    async fn recover(&self, shares: Vec<KeyShare>, ctx: RecoverContext) -> Result<Vec<KeyShare>>;

    /// Sign every message in the batch. Raw signature bytes come back
    /// in batch order: 65 bytes r||s||recovery for ECDSA, 64 bytes for
    /// EdDSA.
    async fn sign(&self, engine: EngineKind, batch: SignBatch) -> Result<Vec<Vec<u8>>>;

    /// Reconstruct and export the group secret in the backend's native
    /// encoding: 0x-hex for ECDSA, a base58 keypair for EdDSA.
    async fn export_secret(&self, engine: EngineKind, shares: Vec<KeyShare>) -> Result<String>;
}

/// The installed backend pair, one per session mode.
#[derive(Clone)]
pub struct Backends {
    pub interactive: Arc<dyn MpcBackend>,
    pub local: Arc<dyn MpcBackend>,
}

impl Backends {
    /// Select the backend bound to a mode.
    pub fn for_mode(&self, mode: SessionMode) -> Arc<dyn MpcBackend> {
        match mode {
            SessionMode::Interactive => Arc::clone(&self.interactive),
            SessionMode::LocalSimulation => Arc::clone(&self.local),
        }
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<Option<Arc<Backends>>> = RwLock::new(None);
}

fn registry_read() -> RwLockReadGuard<'static, Option<Arc<Backends>>> {
    REGISTRY.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn registry_write() -> RwLockWriteGuard<'static, Option<Arc<Backends>>> {
    REGISTRY.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Install the backend pair. Idempotent: the first installation wins,
/// and concurrent callers never observe a partially swapped registry.
pub fn init_backends(backends: Backends) {
    let mut guard = registry_write();
    if guard.is_some() {
        debug!("backend registry already initialized");
        return;
    }
    *guard = Some(Arc::new(backends));
    info!("cryptographic backends installed");
}

/// Fetch the installed backend pair.
pub fn backends() -> Result<Arc<Backends>> {
    registry_read().as_ref().cloned().ok_or_else(|| {
        Error::BackendUnavailable("backend registry is not initialized".into())
    })
}

/// Drop the installed backends. Requests fail with
/// [`Error::BackendUnavailable`] until [`init_backends`] runs again.
pub fn teardown_backends() {
    *registry_write() = None;
    info!("cryptographic backends removed");
}
