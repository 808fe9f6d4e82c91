//! # Keychain TON
//!
//! Minimal TON primitives for wallet-address derivation: cell
//! representation hashing, bag-of-cells parsing, and the v4R2 wallet
//! StateInit. There is no network access and no transaction building,
//! just enough of the cell model to turn an ed25519 public key into
//! the account address that key controls.
//!
//! ```rust
//! use keychain_ton::WalletV4R2;
//!
//! # fn main() -> keychain_ton::Result<()> {
//! let address = WalletV4R2::new([0x17; 32]).address()?;
//! let friendly = address.to_friendly(true, false);
//! assert_eq!(friendly.len(), 48);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod boc;
pub mod cell;
pub mod error;
pub mod wallet;

pub use address::TonAddress;
pub use cell::{Cell, CellBuilder};
pub use error::{Result, TonError};
pub use wallet::{WalletV4R2, BASE_WORKCHAIN, DEFAULT_WALLET_ID};
