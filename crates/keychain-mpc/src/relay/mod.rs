//! Message transport between ceremony participants.
//!
//! Protocol code is written against [`Relay`] and never against a
//! concrete transport. Rounds address messages by `(session, round)`,
//! optionally narrowed to one recipient, and collection blocks until
//! the expected number of messages has arrived.

use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};

use keychain_core::Result;

pub use ::async_trait::async_trait;

/// Participant identifier, 0-based within one session.
pub type PartyId = usize;

/// Session identifier shared by all participants of one ceremony.
pub type SessionId = [u8; 32];

/// Fresh random session identifier.
pub fn new_session_id() -> SessionId {
    let mut id = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut id);
    id
}

/// Round-addressed message transport.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Publish a message every participant of the session will see.
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()>;

    /// Deliver a message to a single participant.
    async fn send_direct<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()>;

    /// Wait for `count` broadcasts in the given round.
    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Result<Vec<T>>;

    /// Wait for `count` direct messages addressed to `my_id`.
    async fn collect_direct<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        my_id: PartyId,
        count: usize,
    ) -> Result<Vec<T>>;
}

pub mod memory;

pub use memory::MemoryRelay;
