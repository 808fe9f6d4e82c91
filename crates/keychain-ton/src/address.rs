//! Account address rendering and parsing.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::error::{Result, TonError};

/// Friendly-form tag for bounceable addresses
const BOUNCEABLE_TAG: u8 = 0x11;

/// Friendly-form tag for non-bounceable addresses
const NON_BOUNCEABLE_TAG: u8 = 0x51;

/// Tag bit marking testnet-only addresses
const TESTNET_FLAG: u8 = 0x80;

/// A TON account address: workchain plus 256-bit account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TonAddress {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl TonAddress {
    /// Raw form, `workchain:hex`.
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// User-friendly form: tag, workchain, account id, and a CRC16
    /// checksum, as 48 characters of URL-safe base64.
    pub fn to_friendly(&self, bounceable: bool, testnet: bool) -> String {
        let mut tag = if bounceable {
            BOUNCEABLE_TAG
        } else {
            NON_BOUNCEABLE_TAG
        };
        if testnet {
            tag |= TESTNET_FLAG;
        }
        let mut bytes = Vec::with_capacity(36);
        bytes.push(tag);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        let checksum = crc16(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());
        URL_SAFE.encode(bytes)
    }

    /// Parse a friendly-form address, returning the address plus its
    /// bounceable and testnet flags.
    pub fn from_friendly(s: &str) -> Result<(Self, bool, bool)> {
        let bytes = URL_SAFE
            .decode(s)
            .map_err(|e| TonError::InvalidAddress(e.to_string()))?;
        if bytes.len() != 36 {
            return Err(TonError::InvalidAddress(format!(
                "expected 36 bytes, got {}",
                bytes.len()
            )));
        }
        let expected = crc16(&bytes[..34]);
        let actual = u16::from_be_bytes([bytes[34], bytes[35]]);
        if expected != actual {
            return Err(TonError::InvalidAddress("checksum mismatch".into()));
        }
        let tag = bytes[0];
        let testnet = tag & TESTNET_FLAG != 0;
        let bounceable = match tag & !TESTNET_FLAG {
            BOUNCEABLE_TAG => true,
            NON_BOUNCEABLE_TAG => false,
            other => {
                return Err(TonError::InvalidAddress(format!(
                    "unknown tag {:#04x}",
                    other
                )))
            }
        };
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok((
            TonAddress {
                workchain: bytes[1] as i8,
                hash,
            },
            bounceable,
            testnet,
        ))
    }
}

/// CRC16/XMODEM: polynomial 0x1021, zero initial value. The variant the
/// friendly address format uses for its checksum.
pub(crate) fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
