//! Round-based distributed key generation.
//!
//! Every participant deals its own polynomial; the group key is the sum
//! of the constant terms and no single party ever holds it. Rounds:
//!
//! 1. broadcast Feldman commitments,
//! 2. send each peer a private evaluation of the local polynomial,
//! 3. verify received evaluations and aggregate.

use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, info, instrument};

use keychain_core::{EngineKind, Error, KeyShare, Result, ThresholdParams};

use super::messages::{KeygenRound1Message, KeygenRound2Message};
use crate::curve::{ed25519, secp256k1};
use crate::relay::{new_session_id, MemoryRelay, PartyId, Relay, SessionId};
use crate::share::{assemble_shares, AuxiliaryData};

/// One participant's output: its aggregated fragment plus the joint
/// transcript it derived.
struct PartyKey {
    party_id: PartyId,
    secret_share: Vec<u8>,
    public_key: Vec<u8>,
    commitments: Vec<Vec<u8>>,
}

/// Run a generation ceremony between in-process participants.
pub async fn run_ceremony(engine: EngineKind, params: ThresholdParams) -> Result<Vec<KeyShare>> {
    run_ceremony_with(engine, params, Arc::new(MemoryRelay::new())).await
}

/// Run a generation ceremony over the given relay.
#[instrument(skip(relay), fields(engine = %engine, t = params.t, n = params.n))]
pub async fn run_ceremony_with<R: Relay + 'static>(
    engine: EngineKind,
    params: ThresholdParams,
    relay: Arc<R>,
) -> Result<Vec<KeyShare>> {
    info!("starting generation ceremony");

    let session_id = new_session_id();
    let n = params.n as usize;

    let mut handles = Vec::with_capacity(n);
    for party_id in 0..n {
        let relay = Arc::clone(&relay);
        handles.push(match engine {
            EngineKind::Ecdsa => {
                tokio::spawn(keygen_party_secp(params, session_id, party_id, relay))
            }
            EngineKind::EdDsa => {
                tokio::spawn(keygen_party_ed(params, session_id, party_id, relay))
            }
        });
    }

    let joined = try_join_all(handles)
        .await
        .map_err(|e| Error::Internal(format!("keygen task failed: {}", e)))?;
    let mut outputs = joined.into_iter().collect::<Result<Vec<PartyKey>>>()?;
    outputs.sort_by_key(|p| p.party_id);

    let first = outputs
        .first()
        .ok_or_else(|| Error::Internal("keygen produced no outputs".into()))?;
    for other in &outputs[1..] {
        if other.public_key != first.public_key || other.commitments != first.commitments {
            return Err(Error::Internal(
                "keygen transcripts disagree across participants".into(),
            ));
        }
    }

    let aux = AuxiliaryData::new(engine, params, &first.commitments, &first.public_key);
    let secrets = outputs
        .iter()
        .map(|p| (p.party_id as u32 + 1, p.secret_share.clone()))
        .collect();
    let shares = assemble_shares(engine, params, secrets, &first.public_key, &aux)?;

    info!(
        public_key = hex::encode(&first.public_key),
        shares = shares.len(),
        "generation ceremony completed"
    );
    Ok(shares)
}

/// Round-1 messages arrive in completion order; ordering by sender
/// makes `round1[party_id]` the message that party actually sent.
fn order_roster(round1: &mut [KeygenRound1Message]) -> Result<()> {
    round1.sort_by_key(|m| m.party_id);
    for (expected, msg) in round1.iter().enumerate() {
        if msg.party_id != expected {
            return Err(Error::Internal("keygen roster is inconsistent".into()));
        }
    }
    Ok(())
}

fn as_protocol_error(e: Error) -> Error {
    match e {
        Error::RecoveryFailed(m) => Error::Internal(m),
        other => other,
    }
}

async fn keygen_party_secp<R: Relay + 'static>(
    params: ThresholdParams,
    session_id: SessionId,
    party_id: PartyId,
    relay: Arc<R>,
) -> Result<PartyKey> {
    let n = params.n as usize;
    let my_index = party_id as u32 + 1;

    // Round 1: commit to a fresh polynomial
    debug!(party_id, "keygen round 1: commitments");
    let poly = secp256k1::random_polynomial(params.t);
    let commitments = secp256k1::commitments(&poly);

    relay
        .broadcast(&session_id, 1, &KeygenRound1Message { party_id, commitments })
        .await?;
    let mut round1 = relay
        .collect_broadcasts::<KeygenRound1Message>(&session_id, 1, n)
        .await?;
    order_roster(&mut round1)?;

    // Round 2: deal private evaluations
    debug!(party_id, "keygen round 2: private evaluations");
    for to in 0..n {
        if to == party_id {
            continue;
        }
        let share = secp256k1::evaluate(&poly, to as u32 + 1);
        relay
            .send_direct(
                &session_id,
                2,
                to,
                &KeygenRound2Message {
                    from: party_id,
                    to,
                    share: secp256k1::scalar_to_bytes(&share),
                },
            )
            .await?;
    }
    let received = relay
        .collect_direct::<KeygenRound2Message>(&session_id, 2, party_id, n - 1)
        .await?;

    // Round 3: verify and aggregate
    debug!(party_id, "keygen round 3: verification");
    let mut secret = secp256k1::evaluate(&poly, my_index);
    for msg in &received {
        let fragment = secp256k1::scalar_from_bytes(&msg.share).map_err(as_protocol_error)?;
        secp256k1::verify_share(my_index, &fragment, &round1[msg.from].commitments).map_err(
            |_| {
                Error::Internal(format!(
                    "evaluation from party {} does not match its commitments",
                    msg.from
                ))
            },
        )?;
        secret = secret + fragment;
    }

    let per_party: Vec<Vec<Vec<u8>>> = round1.iter().map(|m| m.commitments.clone()).collect();
    let joint = secp256k1::sum_commitments(&per_party).map_err(as_protocol_error)?;
    secp256k1::verify_share(my_index, &secret, &joint).map_err(|_| {
        Error::Internal("aggregated fragment does not match the joint commitments".into())
    })?;
    let public_key = joint
        .first()
        .cloned()
        .ok_or_else(|| Error::Internal("joint commitments are empty".into()))?;

    Ok(PartyKey {
        party_id,
        secret_share: secp256k1::scalar_to_bytes(&secret),
        public_key,
        commitments: joint,
    })
}

async fn keygen_party_ed<R: Relay + 'static>(
    params: ThresholdParams,
    session_id: SessionId,
    party_id: PartyId,
    relay: Arc<R>,
) -> Result<PartyKey> {
    let n = params.n as usize;
    let my_index = party_id as u32 + 1;

    debug!(party_id, "keygen round 1: commitments");
    let poly = ed25519::random_polynomial(params.t);
    let commitments = ed25519::commitments(&poly);

    relay
        .broadcast(&session_id, 1, &KeygenRound1Message { party_id, commitments })
        .await?;
    let mut round1 = relay
        .collect_broadcasts::<KeygenRound1Message>(&session_id, 1, n)
        .await?;
    order_roster(&mut round1)?;

    debug!(party_id, "keygen round 2: private evaluations");
    for to in 0..n {
        if to == party_id {
            continue;
        }
        let share = ed25519::evaluate(&poly, to as u32 + 1);
        relay
            .send_direct(
                &session_id,
                2,
                to,
                &KeygenRound2Message {
                    from: party_id,
                    to,
                    share: ed25519::scalar_to_bytes(&share),
                },
            )
            .await?;
    }
    let received = relay
        .collect_direct::<KeygenRound2Message>(&session_id, 2, party_id, n - 1)
        .await?;

    debug!(party_id, "keygen round 3: verification");
    let mut secret = ed25519::evaluate(&poly, my_index);
    for msg in &received {
        let fragment = ed25519::scalar_from_bytes(&msg.share).map_err(as_protocol_error)?;
        ed25519::verify_share(my_index, &fragment, &round1[msg.from].commitments).map_err(
            |_| {
                Error::Internal(format!(
                    "evaluation from party {} does not match its commitments",
                    msg.from
                ))
            },
        )?;
        secret = secret + fragment;
    }

    let per_party: Vec<Vec<Vec<u8>>> = round1.iter().map(|m| m.commitments.clone()).collect();
    let joint = ed25519::sum_commitments(&per_party).map_err(as_protocol_error)?;
    ed25519::verify_share(my_index, &secret, &joint).map_err(|_| {
        Error::Internal("aggregated fragment does not match the joint commitments".into())
    })?;
    let public_key = joint
        .first()
        .cloned()
        .ok_or_else(|| Error::Internal("joint commitments are empty".into()))?;

    Ok(PartyKey {
        party_id,
        secret_share: ed25519::scalar_to_bytes(&secret),
        public_key,
        commitments: joint,
    })
}
