//! # Keychain Core
//!
//! Orchestration layer for threshold-signature key lifecycle
//! operations: generation, recovery, signing, address derivation, and
//! secret export over ECDSA/secp256k1 and EdDSA/ed25519.
//!
//! The threshold math itself lives behind the [`backend::MpcBackend`]
//! contract. This crate decides which engine and session mode apply,
//! prepares message digests, encodes signatures, and resolves chain
//! addresses; the backend never sees a raw caller payload and the
//! orchestrator never touches share arithmetic.
//!
//! ```rust,ignore
//! use keychain_core::service::{self, AddressRequest, GenerateRequest};
//!
//! let shares = service::generate_local(GenerateRequest::default()).await?;
//! let address = service::address_local(AddressRequest {
//!     key: Some(shares[0].clone()),
//!     ..Default::default()
//! })
//! .await?;
//! ```

pub mod address;
pub mod backend;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod service;
pub mod types;

pub use error::{Error, Result};
pub use types::{EngineKind, KeyShare, SessionMode, SigningRequest, ThresholdParams};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default quorum when a request leaves `t` unset
pub const DEFAULT_THRESHOLD: u16 = 1;

/// Default share count when a request leaves `n` unset
pub const DEFAULT_SHARES: u16 = 3;
