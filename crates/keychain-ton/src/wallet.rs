//! v4R2 wallet StateInit and address derivation.

use hex_literal::hex;

use crate::address::TonAddress;
use crate::cell::{Cell, CellBuilder};
use crate::error::Result;

/// Representation hash of the published v4R2 wallet code cell.
pub const WALLET_V4R2_CODE_HASH: [u8; 32] =
    hex!("feb5ff6820e2ff0d9483e7e0d62c817d846789fb4ae580c878866d959dabd5c0");

/// Depth of the published v4R2 wallet code cell.
pub const WALLET_V4R2_CODE_DEPTH: u16 = 5;

/// Wallet id baked into v4 wallets on the base workchain.
pub const DEFAULT_WALLET_ID: u32 = 698_983_191;

/// The base workchain.
pub const BASE_WORKCHAIN: i8 = 0;

/// A v4R2 wallet contract bound to an ed25519 public key. The address
/// is fully determined by the initial code and data, so deriving it
/// needs no network access.
#[derive(Debug, Clone)]
pub struct WalletV4R2 {
    public_key: [u8; 32],
    workchain: i8,
    wallet_id: u32,
    code: Cell,
}

impl WalletV4R2 {
    /// Wallet on the base workchain with the published v4R2 code.
    pub fn new(public_key: [u8; 32]) -> Self {
        Self::with_workchain(public_key, BASE_WORKCHAIN)
    }

    /// Wallet on an explicit workchain. The conventional wallet id is
    /// offset by the workchain number.
    pub fn with_workchain(public_key: [u8; 32], workchain: i8) -> Self {
        let wallet_id = (DEFAULT_WALLET_ID as i64 + workchain as i64) as u32;
        Self {
            public_key,
            workchain,
            wallet_id,
            code: Cell::exterior(WALLET_V4R2_CODE_HASH, WALLET_V4R2_CODE_DEPTH),
        }
    }

    /// Replace the code cell, for callers that carry the full contract
    /// BOC or deploy a variant.
    pub fn with_code(mut self, code: Cell) -> Self {
        self.code = code;
        self
    }

    /// Initial data: seqno 0, wallet id, public key, empty plugin dict.
    fn data_cell(&self) -> Result<Cell> {
        Ok(CellBuilder::new()
            .store_u32(0)?
            .store_u32(self.wallet_id)?
            .store_bytes(&self.public_key)?
            .store_bit(false)?
            .build())
    }

    /// StateInit: no split_depth, not special, code and data present,
    /// no libraries.
    fn state_init(&self) -> Result<Cell> {
        Ok(CellBuilder::new()
            .store_bit(false)?
            .store_bit(false)?
            .store_bit(true)?
            .store_bit(true)?
            .store_bit(false)?
            .store_ref(self.code.clone())?
            .store_ref(self.data_cell()?)?
            .build())
    }

    /// Contract address: the StateInit representation hash on this
    /// wallet's workchain.
    pub fn address(&self) -> Result<TonAddress> {
        Ok(TonAddress {
            workchain: self.workchain,
            hash: self.state_init()?.repr_hash(),
        })
    }
}
