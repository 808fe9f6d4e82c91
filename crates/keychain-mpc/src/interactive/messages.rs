//! Wire messages exchanged during interactive ceremonies.

use serde::{Deserialize, Serialize};

use crate::relay::PartyId;

/// Keygen round 1: Feldman commitments to the sender's polynomial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenRound1Message {
    /// Sender
    pub party_id: PartyId,
    /// Compressed commitment points, constant term first
    pub commitments: Vec<Vec<u8>>,
}

/// Keygen round 2: one polynomial evaluation, sent privately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenRound2Message {
    /// Sender
    pub from: PartyId,
    /// Receiver
    pub to: PartyId,
    /// Evaluation of the sender's polynomial at the receiver's index
    pub share: Vec<u8>,
}

/// Signing round 1: commitment to the sender's nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound1Message {
    /// Sender
    pub party_id: PartyId,
    /// Compressed nonce point
    pub r_commitment: Vec<u8>,
}

/// Signing round 2: the sender's partial signature scalar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound2Message {
    /// Sender
    pub party_id: PartyId,
    /// Partial `s` value
    pub s_share: Vec<u8>,
}

/// ECDSA signing: the sender's Lagrange-weighted key fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedShareMessage {
    /// Sender
    pub party_id: PartyId,
    /// Share multiplied by the sender's Lagrange coefficient at zero
    pub weighted_share: Vec<u8>,
}
