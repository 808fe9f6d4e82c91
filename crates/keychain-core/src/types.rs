//! Core types shared across the keychain workspace

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Signature engine selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineKind {
    /// ECDSA over secp256k1
    #[default]
    Ecdsa,
    /// EdDSA over ed25519
    EdDsa,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Ecdsa => "ECDSA",
            EngineKind::EdDsa => "EDDSA",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ECDSA" => Ok(EngineKind::Ecdsa),
            "EDDSA" => Ok(EngineKind::EdDsa),
            other => Err(Error::InvalidParameters(format!(
                "unknown engine: {}",
                other
            ))),
        }
    }
}

/// How an operation executes: coordinated across real parties, or
/// simulated in-process with the same math and the same results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Multi-party protocol over a message relay
    Interactive,
    /// Single-process simulation
    LocalSimulation,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Interactive => f.write_str("interactive"),
            SessionMode::LocalSimulation => f.write_str("local"),
        }
    }
}

impl std::str::FromStr for SessionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "interactive" => Ok(SessionMode::Interactive),
            "local" | "local-simulation" => Ok(SessionMode::LocalSimulation),
            other => Err(Error::InvalidParameters(format!(
                "unknown session mode: {}",
                other
            ))),
        }
    }
}

/// Threshold parameters for one ceremony: any `t` of the `n` issued
/// shares suffice to sign or recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    /// Quorum size
    pub t: u16,
    /// Total shares issued
    pub n: u16,
}

impl ThresholdParams {
    /// Validated parameters, requiring 1 <= t <= n.
    pub fn new(t: u16, n: u16) -> Result<Self> {
        if t == 0 {
            return Err(Error::InvalidParameters(
                "threshold must be at least 1".into(),
            ));
        }
        if t > n {
            return Err(Error::InvalidParameters(format!(
                "threshold {} cannot exceed share count {}",
                t, n
            )));
        }
        Ok(Self { t, n })
    }
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            t: crate::DEFAULT_THRESHOLD,
            n: crate::DEFAULT_SHARES,
        }
    }
}

/// One holder's fragment of a split key.
///
/// The secret fragment is wiped on drop, and the struct deliberately
/// has no `Debug` impl so shares cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyShare {
    /// 1-based share index within the ceremony
    #[zeroize(skip)]
    pub index: u32,

    /// Engine the ceremony ran for
    #[zeroize(skip)]
    pub engine: EngineKind,

    /// Ceremony threshold parameters
    #[zeroize(skip)]
    pub params: ThresholdParams,

    /// This holder's secret fragment, 32 bytes
    #[serde(with = "hex_bytes")]
    pub secret_share: Vec<u8>,

    /// Aggregate public key for the whole ceremony
    #[zeroize(skip)]
    #[serde(with = "hex_prefixed")]
    pub public_key: Vec<u8>,

    /// Opaque ceremony metadata blob emitted by the backend
    #[zeroize(skip)]
    pub aux: String,
}

impl KeyShare {
    /// Check a caller-supplied engine selector against the share's own.
    pub fn ensure_engine(&self, engine: EngineKind) -> Result<()> {
        if self.engine != engine {
            return Err(Error::InvalidParameters(format!(
                "share {} was generated for {}, not {}",
                self.index, self.engine, engine
            )));
        }
        Ok(())
    }
}

/// One signing request: a single payload plus the shares authorizing it.
#[derive(Clone)]
pub struct SigningRequest {
    /// Raw payload, either 0x-hex or plain text
    pub payload: String,
    /// Whether the payload is a serialized transaction
    pub is_transaction: bool,
    /// Engine to sign with
    pub engine: EngineKind,
    /// Shares participating in the session
    pub shares: Vec<KeyShare>,
    /// Quorum the caller asserts for this session
    pub threshold: u16,
}

/// Unprefixed hex codec for secret bytes. Accepts an optional 0x prefix
/// on input.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(stripped).map_err(serde::de::Error::custom)
    }
}

/// 0x-prefixed hex codec for public bytes.
mod hex_prefixed {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(stripped).map_err(serde::de::Error::custom)
    }
}
