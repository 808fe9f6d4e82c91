//! Full key-lifecycle flows through the service surface with the real
//! backends installed. Every test installs the backend pair itself;
//! installation is idempotent, so test order and parallelism do not
//! matter.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar as EdScalar;
use ed25519_dalek::{Signature as EdSignature, Verifier, VerifyingKey as EdVerifyingKey};
use k256::ecdsa::{RecoveryId, Signature as SecpSignature, VerifyingKey as SecpVerifyingKey};
use sha3::{Digest, Keccak256};

use keychain_core::service::{
    self, AddressRequest, ExportSecretRequest, GenerateRequest, RecoverRequest, SignRequest,
};
use keychain_core::{EngineKind, Error, KeyShare};

fn personal_digest(text: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(text.len().to_string().as_bytes());
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

fn decode_secp_signature(signature: &str) -> (SecpSignature, RecoveryId) {
    let raw = hex::decode(signature.strip_prefix("0x").unwrap()).unwrap();
    assert_eq!(raw.len(), 65);
    let parsed = SecpSignature::from_slice(&raw[..64]).unwrap();
    let recovery = RecoveryId::from_byte(raw[64] - 27).unwrap();
    (parsed, recovery)
}

fn assert_recovers_to(share: &KeyShare, digest: &[u8; 32], signature: &str) {
    let (parsed, recovery) = decode_secp_signature(signature);
    let recovered = SecpVerifyingKey::recover_from_prehash(digest, &parsed, recovery).unwrap();
    assert_eq!(
        recovered.to_encoded_point(true).as_bytes(),
        share.public_key.as_slice()
    );
}

fn assert_eddsa_verifies(share: &KeyShare, message: &[u8], signature: &str) {
    let raw = hex::decode(signature.strip_prefix("0x").unwrap()).unwrap();
    let sig_bytes: [u8; 64] = raw.as_slice().try_into().unwrap();
    let key_bytes: [u8; 32] = share.public_key.as_slice().try_into().unwrap();
    EdVerifyingKey::from_bytes(&key_bytes)
        .unwrap()
        .verify(message, &EdSignature::from_bytes(&sig_bytes))
        .unwrap();
}

#[tokio::test]
async fn ecdsa_local_lifecycle() {
    keychain_mpc::install();

    // default parameters: quorum 1 of 3
    let shares = service::generate_local(GenerateRequest::default())
        .await
        .unwrap();
    assert_eq!(shares.len(), 3);
    assert_eq!(shares[0].engine, EngineKind::Ecdsa);

    // every share derives the same account address
    let addresses: Vec<String> = {
        let mut out = Vec::new();
        for share in &shares {
            out.push(
                service::address_local(AddressRequest {
                    key: Some(share.clone()),
                    ..Default::default()
                })
                .await
                .unwrap(),
            );
        }
        out
    };
    assert!(addresses[0].starts_with("0x"));
    assert_eq!(addresses[0].len(), 42);
    assert!(addresses.iter().all(|a| a == &addresses[0]));

    // rebuild the share that was not presented
    let recovered = service::recover_local(RecoverRequest {
        keys: Some(shares[..2].to_vec()),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].index, 3);
    assert_eq!(recovered[0].secret_share, shares[2].secret_share);

    // sign a personal message with a minimal quorum
    let message = "hello world";
    let signature = service::sign_local(SignRequest {
        message: Some(message.into()),
        keys: Some(vec![shares[0].clone()]),
        is_transaction: Some(false),
        ..Default::default()
    })
    .await
    .unwrap();
    let digest = personal_digest(message);
    assert_recovers_to(&shares[0], &digest, &signature);

    // the exported secret regenerates the ceremony key
    let exported = service::export_secret_local(ExportSecretRequest {
        keys: Some(vec![shares[1].clone()]),
        ..Default::default()
    })
    .await
    .unwrap();
    let secret: [u8; 32] = hex::decode(exported.strip_prefix("0x").unwrap())
        .unwrap()
        .try_into()
        .unwrap();
    let signing_key = k256::ecdsa::SigningKey::from_bytes(&secret.into()).unwrap();
    assert_eq!(
        signing_key.verifying_key().to_encoded_point(true).as_bytes(),
        shares[0].public_key.as_slice()
    );
}

#[tokio::test]
async fn ecdsa_interactive_lifecycle() {
    keychain_mpc::install();

    let shares = service::generate(GenerateRequest {
        t: Some(2),
        n: Some(3),
        engine: Some(EngineKind::Ecdsa),
    })
    .await
    .unwrap();
    assert_eq!(shares.len(), 3);

    // interactive recovery needs the ceremony blob
    let recovered = service::recover(RecoverRequest {
        keys: Some(vec![shares[0].clone(), shares[2].clone()]),
        aux: Some(shares[0].aux.clone()),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].secret_share, shares[1].secret_share);

    // sign a raw transaction payload
    let payload = "0x01ec83066eed";
    let signature = service::sign(SignRequest {
        message: Some(payload.into()),
        keys: Some(shares[1..].to_vec()),
        is_transaction: Some(true),
        t: Some(2),
        ..Default::default()
    })
    .await
    .unwrap();
    let digest: [u8; 32] = Keccak256::digest(hex::decode(&payload[2..]).unwrap()).into();
    assert_recovers_to(&shares[0], &digest, &signature);

    let exported = service::export_secret(ExportSecretRequest {
        keys: Some(shares[..2].to_vec()),
        engine: Some(EngineKind::Ecdsa),
    })
    .await
    .unwrap();
    assert!(exported.starts_with("0x"));
    assert_eq!(exported.len(), 66);
}

#[tokio::test]
async fn eddsa_local_lifecycle() {
    keychain_mpc::install();

    let shares = service::generate_local(GenerateRequest {
        t: Some(2),
        n: Some(3),
        engine: Some(EngineKind::EdDsa),
    })
    .await
    .unwrap();
    assert_eq!(shares[0].public_key.len(), 32);

    // default address form is the base58 public key
    let default_address = service::address_local(AddressRequest {
        key: Some(shares[0].clone()),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(
        bs58::decode(&default_address).into_vec().unwrap(),
        shares[0].public_key
    );

    // the ton selector derives a friendly wallet address
    let ton_address = service::address_local(AddressRequest {
        key: Some(shares[1].clone()),
        chain: Some("ton".into()),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(ton_address.len(), 48);
    assert!(ton_address.starts_with("EQ"));

    let message = "hello ton";
    let signature = service::sign_local(SignRequest {
        message: Some(message.into()),
        keys: Some(shares[..2].to_vec()),
        engine: Some(EngineKind::EdDsa),
        t: Some(2),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(signature.len(), 130);
    assert_eddsa_verifies(&shares[0], message.as_bytes(), &signature);

    // exported secret times the base point gives the group key back
    let exported = service::export_secret_local(ExportSecretRequest {
        keys: Some(shares[1..].to_vec()),
        engine: Some(EngineKind::EdDsa),
    })
    .await
    .unwrap();
    let secret: [u8; 32] = hex::decode(exported.strip_prefix("0x").unwrap())
        .unwrap()
        .try_into()
        .unwrap();
    let derived = EdwardsPoint::mul_base(&EdScalar::from_bytes_mod_order(secret));
    assert_eq!(
        derived.compress().to_bytes().as_slice(),
        shares[0].public_key.as_slice()
    );
}

#[tokio::test]
async fn eddsa_interactive_lifecycle() {
    keychain_mpc::install();

    let shares = service::generate(GenerateRequest {
        t: Some(2),
        n: Some(3),
        engine: Some(EngineKind::EdDsa),
    })
    .await
    .unwrap();

    let signature = service::sign(SignRequest {
        message: Some("0xdeadbeef".into()),
        keys: Some(vec![shares[0].clone(), shares[2].clone()]),
        engine: Some(EngineKind::EdDsa),
        t: Some(2),
        ..Default::default()
    })
    .await
    .unwrap();
    // 0x payloads are signed as raw bytes
    assert_eddsa_verifies(&shares[0], &[0xDE, 0xAD, 0xBE, 0xEF], &signature);

    let err = service::recover(RecoverRequest {
        keys: Some(shares[..2].to_vec()),
        ..Default::default()
    })
    .await
    .err()
    .unwrap();
    assert_eq!(err.to_string(), "aux is required");
}

#[tokio::test]
async fn recovered_shares_are_first_class_signers() {
    keychain_mpc::install();

    let shares = service::generate_local(GenerateRequest {
        t: Some(2),
        n: Some(3),
        engine: Some(EngineKind::Ecdsa),
    })
    .await
    .unwrap();

    let recovered = service::recover_local(RecoverRequest {
        keys: Some(vec![shares[0].clone(), shares[2].clone()]),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(recovered[0].index, 2);

    let sign_with = |keys: Vec<KeyShare>| {
        service::sign_local(SignRequest {
            message: Some("0xdeadbeef".into()),
            keys: Some(keys),
            t: Some(2),
            ..Default::default()
        })
    };

    // deterministic nonces make the original and the recovered quorum
    // produce the same signature
    let original = sign_with(vec![shares[0].clone(), shares[1].clone()])
        .await
        .unwrap();
    let with_recovered = sign_with(vec![shares[0].clone(), recovered[0].clone()])
        .await
        .unwrap();
    assert_eq!(original, with_recovered);
}

#[tokio::test]
async fn quorum_and_engine_violations_are_rejected() {
    keychain_mpc::install();

    let ecdsa = service::generate_local(GenerateRequest {
        t: Some(2),
        n: Some(3),
        engine: Some(EngineKind::Ecdsa),
    })
    .await
    .unwrap();
    let eddsa = service::generate_local(GenerateRequest {
        t: Some(2),
        n: Some(3),
        engine: Some(EngineKind::EdDsa),
    })
    .await
    .unwrap();

    // one share cannot meet a quorum of two
    let err = service::sign_local(SignRequest {
        message: Some("0x00".into()),
        keys: Some(ecdsa[..1].to_vec()),
        t: Some(2),
        ..Default::default()
    })
    .await
    .unwrap_err();
    assert!(matches!(err, Error::SigningFailed(_)));

    // shares from different ceremonies cannot be combined
    let other = service::generate_local(GenerateRequest {
        t: Some(2),
        n: Some(3),
        engine: Some(EngineKind::Ecdsa),
    })
    .await
    .unwrap();
    let err = service::sign_local(SignRequest {
        message: Some("0x00".into()),
        keys: Some(vec![ecdsa[0].clone(), other[1].clone()]),
        t: Some(2),
        ..Default::default()
    })
    .await
    .unwrap_err();
    assert!(matches!(err, Error::SigningFailed(_)));

    // the engine selector defaults to ECDSA and must match the shares
    let err = service::sign_local(SignRequest {
        message: Some("hello".into()),
        keys: Some(eddsa.clone()),
        is_transaction: Some(false),
        t: Some(2),
        ..Default::default()
    })
    .await
    .unwrap_err();
    assert!(err.is_client_error());

    // chain selectors are engine-specific
    let err = service::address_local(AddressRequest {
        key: Some(ecdsa[0].clone()),
        chain: Some("ton".into()),
        ..Default::default()
    })
    .await
    .unwrap_err();
    assert!(err.is_client_error());
    let err = service::address_local(AddressRequest {
        key: Some(eddsa[0].clone()),
        chain: Some("evm".into()),
        ..Default::default()
    })
    .await
    .unwrap_err();
    assert!(err.is_client_error());
}
