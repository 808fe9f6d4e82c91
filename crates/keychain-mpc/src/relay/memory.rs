//! In-process relay backing local ceremonies.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;

use super::{async_trait, PartyId, Relay, SessionId};
use keychain_core::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One mailbox: a round's broadcasts, or a round's direct messages for
/// one recipient.
#[derive(Clone, PartialEq, Eq, Hash)]
enum Slot {
    Broadcast(SessionId, u32),
    Direct(SessionId, u32, PartyId),
}

/// Relay for participants running inside one process. Simulated
/// ceremonies and tests share this transport; the protocol code cannot
/// tell it apart from a networked relay.
pub struct MemoryRelay {
    slots: Arc<DashMap<Slot, Vec<Vec<u8>>>>,
    notify: broadcast::Sender<()>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            slots: Arc::new(DashMap::new()),
            notify,
        }
    }

    fn deposit<T: Serialize>(&self, slot: Slot, message: &T) -> Result<()> {
        let bytes =
            serde_json::to_vec(message).map_err(|e| Error::Serialization(e.to_string()))?;
        self.slots.entry(slot).or_default().push(bytes);
        // Receivers also poll, so a dropped notification only delays them.
        let _ = self.notify.send(());
        Ok(())
    }

    async fn collect<T: DeserializeOwned>(&self, slot: Slot, count: usize) -> Result<Vec<T>> {
        let mut rx = self.notify.subscribe();

        loop {
            if let Some(messages) = self.slots.get(&slot) {
                if messages.len() >= count {
                    return messages
                        .iter()
                        .take(count)
                        .map(|bytes| {
                            serde_json::from_slice(bytes)
                                .map_err(|e| Error::Serialization(e.to_string()))
                        })
                        .collect();
                }
            }

            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(POLL_INTERVAL) => continue,
            }
        }
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()> {
        self.deposit(Slot::Broadcast(*session_id, round), message)
    }

    async fn send_direct<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()> {
        self.deposit(Slot::Direct(*session_id, round, to), message)
    }

    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Result<Vec<T>> {
        self.collect(Slot::Broadcast(*session_id, round), count).await
    }

    async fn collect_direct<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        my_id: PartyId,
        count: usize,
    ) -> Result<Vec<T>> {
        self.collect(Slot::Direct(*session_id, round, my_id), count).await
    }
}
