//! Ceremony metadata and share-set validation.
//!
//! Every share carries an opaque `aux` blob: base64 over a JSON body
//! holding the ceremony id, engine, threshold parameters, Feldman
//! commitments, and the aggregate public key. The blob is what makes a
//! share set self-describing, and what interactive recovery consumes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keychain_core::{EngineKind, Error, KeyShare, Result, ThresholdParams};

/// Ceremony metadata embedded in every share.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuxiliaryData {
    /// Ceremony identifier
    pub ceremony: String,
    /// Engine the ceremony ran for
    pub engine: EngineKind,
    /// Quorum size
    pub t: u16,
    /// Total shares issued
    pub n: u16,
    /// Feldman commitments to the sharing polynomial, hex-encoded
    pub commitments: Vec<String>,
    /// Aggregate public key, 0x-hex
    pub public_key: String,
}

impl AuxiliaryData {
    /// Assemble metadata for a fresh ceremony.
    pub fn new(
        engine: EngineKind,
        params: ThresholdParams,
        commitments: &[Vec<u8>],
        public_key: &[u8],
    ) -> Self {
        Self {
            ceremony: Uuid::new_v4().to_string(),
            engine,
            t: params.t,
            n: params.n,
            commitments: commitments.iter().map(|c| hex::encode(c)).collect(),
            public_key: format!("0x{}", hex::encode(public_key)),
        }
    }

    /// Encode as the opaque blob callers carry around.
    pub fn to_blob(&self) -> Result<String> {
        Ok(BASE64.encode(serde_json::to_vec(self)?))
    }

    /// Decode a caller-supplied blob.
    pub fn from_blob(blob: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(blob)
            .map_err(|e| Error::RecoveryFailed(format!("invalid aux blob: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::RecoveryFailed(format!("invalid aux blob: {}", e)))
    }

    /// Raw commitment bytes.
    pub fn commitment_bytes(&self) -> Result<Vec<Vec<u8>>> {
        self.commitments
            .iter()
            .map(|c| {
                hex::decode(c)
                    .map_err(|e| Error::RecoveryFailed(format!("invalid commitment hex: {}", e)))
            })
            .collect()
    }

    /// Aggregate public key bytes.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        let stripped = self.public_key.strip_prefix("0x").unwrap_or(&self.public_key);
        hex::decode(stripped)
            .map_err(|e| Error::RecoveryFailed(format!("invalid public key hex: {}", e)))
    }

    pub fn params(&self) -> ThresholdParams {
        ThresholdParams {
            t: self.t,
            n: self.n,
        }
    }
}

/// Build the key shares for a completed ceremony.
pub fn assemble_shares(
    engine: EngineKind,
    params: ThresholdParams,
    secrets: Vec<(u32, Vec<u8>)>,
    public_key: &[u8],
    aux: &AuxiliaryData,
) -> Result<Vec<KeyShare>> {
    let blob = aux.to_blob()?;
    Ok(secrets
        .into_iter()
        .map(|(index, secret_share)| KeyShare {
            index,
            engine,
            params,
            secret_share,
            public_key: public_key.to_vec(),
            aux: blob.clone(),
        })
        .collect())
}

/// Extract one consistent ceremony context from a presented share set.
pub fn ceremony_context(shares: &[KeyShare]) -> Result<AuxiliaryData> {
    let first = shares.first().ok_or(Error::MissingParameter("keys"))?;
    for share in &shares[1..] {
        if share.aux != first.aux {
            return Err(Error::RecoveryFailed(
                "shares come from different ceremonies".into(),
            ));
        }
    }
    AuxiliaryData::from_blob(&first.aux)
}

/// Lagrange interpolation is undefined over a repeated evaluation
/// point, so duplicates are rejected before any curve math runs.
pub fn ensure_distinct_indices(shares: &[KeyShare]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for share in shares {
        if !seen.insert(share.index) {
            return Err(Error::RecoveryFailed(format!(
                "duplicate share index {}",
                share.index
            )));
        }
    }
    Ok(())
}

/// Validate a presented share set against its ceremony context.
pub fn validate_quorum(shares: &[KeyShare], aux: &AuxiliaryData, engine: EngineKind) -> Result<()> {
    if aux.engine != engine {
        return Err(Error::RecoveryFailed(format!(
            "ceremony ran for {}, not {}",
            aux.engine, engine
        )));
    }
    ensure_distinct_indices(shares)?;
    if (shares.len() as u16) < aux.t {
        return Err(Error::RecoveryFailed(format!(
            "{} shares presented, quorum is {}",
            shares.len(),
            aux.t
        )));
    }
    for share in shares {
        if share.engine != aux.engine {
            return Err(Error::RecoveryFailed(format!(
                "share {} was generated for {}, not {}",
                share.index, share.engine, aux.engine
            )));
        }
        if share.index == 0 || share.index > aux.n as u32 {
            return Err(Error::RecoveryFailed(format!(
                "share index {} outside the ceremony range 1..={}",
                share.index, aux.n
            )));
        }
    }
    Ok(())
}

/// Share-set failures read as recovery errors; signing paths reclass
/// them without losing the message.
pub(crate) fn as_signing_error(e: Error) -> Error {
    match e {
        Error::RecoveryFailed(m) => Error::SigningFailed(m),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aux() -> AuxiliaryData {
        AuxiliaryData::new(
            EngineKind::Ecdsa,
            ThresholdParams { t: 2, n: 3 },
            &[vec![0x02; 33], vec![0x03; 33]],
            &[0x02; 33],
        )
    }

    fn share(index: u32, aux_blob: &str) -> KeyShare {
        KeyShare {
            index,
            engine: EngineKind::Ecdsa,
            params: ThresholdParams { t: 2, n: 3 },
            secret_share: vec![index as u8; 32],
            public_key: vec![0x02; 33],
            aux: aux_blob.to_string(),
        }
    }

    #[test]
    fn blob_round_trips() {
        let original = aux();
        let blob = original.to_blob().unwrap();
        let parsed = AuxiliaryData::from_blob(&blob).unwrap();
        assert_eq!(parsed.ceremony, original.ceremony);
        assert_eq!(parsed.engine, EngineKind::Ecdsa);
        assert_eq!((parsed.t, parsed.n), (2, 3));
        assert_eq!(parsed.commitment_bytes().unwrap()[0], vec![0x02; 33]);
        assert_eq!(parsed.public_key_bytes().unwrap(), vec![0x02; 33]);
    }

    #[test]
    fn garbage_blobs_are_rejected() {
        assert!(AuxiliaryData::from_blob("not base64!").is_err());
        let valid_b64 = BASE64.encode(b"{\"not\": \"aux\"}");
        assert!(AuxiliaryData::from_blob(&valid_b64).is_err());
    }

    #[test]
    fn ceremony_context_requires_matching_blobs() {
        let blob_a = aux().to_blob().unwrap();
        let blob_b = aux().to_blob().unwrap();
        let err =
            ceremony_context(&[share(1, &blob_a), share(2, &blob_b)]).unwrap_err();
        assert!(matches!(err, Error::RecoveryFailed(_)));

        let ctx = ceremony_context(&[share(1, &blob_a), share(2, &blob_a)]).unwrap();
        assert_eq!(ctx.t, 2);
    }

    #[test]
    fn empty_share_sets_read_as_missing_keys() {
        let err = ceremony_context(&[]).unwrap_err();
        assert_eq!(err.to_string(), "keys is required");
    }

    #[test]
    fn quorum_validation_checks_count_engine_and_range() {
        let context = aux();
        let blob = context.to_blob().unwrap();

        let err = validate_quorum(&[share(1, &blob)], &context, EngineKind::Ecdsa).unwrap_err();
        assert!(matches!(err, Error::RecoveryFailed(_)));

        let err = validate_quorum(
            &[share(1, &blob), share(2, &blob)],
            &context,
            EngineKind::EdDsa,
        )
        .unwrap_err();
        assert!(matches!(err, Error::RecoveryFailed(_)));

        let err = validate_quorum(
            &[share(1, &blob), share(9, &blob)],
            &context,
            EngineKind::Ecdsa,
        )
        .unwrap_err();
        assert!(matches!(err, Error::RecoveryFailed(_)));

        let err = validate_quorum(
            &[share(1, &blob), share(1, &blob)],
            &context,
            EngineKind::Ecdsa,
        )
        .unwrap_err();
        assert!(matches!(err, Error::RecoveryFailed(_)));

        let mut foreign = share(2, &blob);
        foreign.engine = EngineKind::EdDsa;
        let err = validate_quorum(&[share(1, &blob), foreign], &context, EngineKind::Ecdsa)
            .unwrap_err();
        assert!(matches!(err, Error::RecoveryFailed(_)));

        validate_quorum(
            &[share(1, &blob), share(3, &blob)],
            &context,
            EngineKind::Ecdsa,
        )
        .unwrap();
    }
}
