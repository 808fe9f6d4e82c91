//! Lifecycle orchestration: one mode-parameterized path per operation.
//!
//! Each function validates what it can locally, hands the
//! cryptographic work to the backend bound to the session mode, and
//! normalizes the result through the engine strategy. Nothing here
//! holds state between calls.

use tracing::{info, instrument, warn};

use crate::backend::{backends, RecoverContext, SignBatch};
use crate::error::{Error, Result};
use crate::types::{EngineKind, KeyShare, SessionMode, SigningRequest, ThresholdParams};

/// Run a generation ceremony, returning all `n` shares.
#[instrument(skip_all, fields(mode = %mode, engine = %engine, t = params.t, n = params.n))]
pub async fn generate(
    mode: SessionMode,
    engine: EngineKind,
    params: ThresholdParams,
) -> Result<Vec<KeyShare>> {
    let params = ThresholdParams::new(params.t, params.n)?;
    let backend = backends()?.for_mode(mode);
    let shares = backend.generate(engine, params).await?;
    info!(count = shares.len(), "generation ceremony complete");
    Ok(shares)
}

/// Reconstruct the shares missing from a presented set. Returns an
/// empty vector when the set is already complete.
#[instrument(skip_all, fields(mode = %mode, presented = shares.len()))]
pub async fn recover(
    mode: SessionMode,
    shares: Vec<KeyShare>,
    ctx: RecoverContext,
) -> Result<Vec<KeyShare>> {
    match &ctx {
        RecoverContext::Engine(engine) => {
            for share in &shares {
                share.ensure_engine(*engine)?;
            }
        }
        RecoverContext::Auxiliary(_) => {}
    }
    if mode == SessionMode::Interactive && !matches!(ctx, RecoverContext::Auxiliary(_)) {
        return Err(Error::MissingParameter("aux"));
    }
    let backend = backends()?.for_mode(mode);
    let recovered = backend.recover(shares, ctx).await?;
    info!(recovered = recovered.len(), "recovery complete");
    Ok(recovered)
}

/// Prepare, sign, and encode one payload.
#[instrument(skip_all, fields(
    mode = %mode,
    engine = %request.engine,
    is_transaction = request.is_transaction,
))]
pub async fn sign(mode: SessionMode, request: SigningRequest) -> Result<String> {
    let strategy = request.engine.strategy();
    for share in &request.shares {
        share.ensure_engine(request.engine)?;
    }
    let message = strategy.prepare_message(&request.payload, request.is_transaction)?;
    let batch = SignBatch {
        messages: vec![message],
        threshold: request.threshold,
        shares: request.shares,
    };
    let backend = backends()?.for_mode(mode);
    let raw = backend.sign(request.engine, batch).await?;
    let first = raw
        .into_iter()
        .next()
        .ok_or_else(|| Error::SigningFailed("backend returned no signatures".into()))?;
    let signature = strategy.encode_signature(&first)?;
    info!("signing complete");
    Ok(signature)
}

/// Reconstruct and export the group secret key.
///
/// This defeats the purpose of splitting the key; it exists for wallet
/// export and is logged loudly for that reason.
#[instrument(skip_all, fields(mode = %mode, engine = %engine))]
pub async fn export_secret(
    mode: SessionMode,
    engine: EngineKind,
    shares: Vec<KeyShare>,
) -> Result<String> {
    for share in &shares {
        share.ensure_engine(engine)?;
    }
    let backend = backends()?.for_mode(mode);
    let exported = backend.export_secret(engine, shares).await?;
    warn!("group secret reconstructed and exported");
    engine.strategy().encode_secret_key(&exported)
}
