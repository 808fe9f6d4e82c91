//! # Keychain MPC
//!
//! Threshold-signature backends for the keychain workspace.
//!
//! This crate implements both session modes behind the
//! [`MpcBackend`] contract:
//! - [`InteractiveBackend`] runs the round-based protocols between
//!   in-process participants connected by a message relay,
//! - [`LocalBackend`] deals, recovers, and signs in place.
//!
//! Shares produced by either mode carry the same ceremony metadata and
//! interoperate across all operations.
//!
//! ## Example
//!
//! ```rust,ignore
//! keychain_mpc::install();
//!
//! let shares = keychain_core::service::generate(Default::default()).await?;
//! ```
//!
//! [`MpcBackend`]: keychain_core::backend::MpcBackend

pub mod curve;
pub mod interactive;
pub mod local;
pub mod recovery;
pub mod relay;
pub mod share;

pub use interactive::InteractiveBackend;
pub use local::LocalBackend;
pub use relay::{MemoryRelay, PartyId, Relay, SessionId};
pub use share::AuxiliaryData;

use std::sync::Arc;

use keychain_core::backend::{init_backends, Backends};

/// Install both backends into the process-wide registry. Idempotent.
pub fn install() {
    init_backends(Backends {
        interactive: Arc::new(InteractiveBackend),
        local: Arc::new(LocalBackend),
    });
}

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
