//! Error types for cell and address handling

use thiserror::Error;

/// Result type alias for TON operations
pub type Result<T> = std::result::Result<T, TonError>;

/// Errors raised while building cells or decoding serialized forms
#[derive(Debug, Error)]
pub enum TonError {
    /// Cell data would exceed the 1023-bit limit
    #[error("cell overflow: {0} bits")]
    CellOverflow(usize),

    /// Cell reference limit exceeded
    #[error("a cell holds at most 4 references")]
    TooManyRefs,

    /// Malformed bag-of-cells payload
    #[error("invalid bag of cells: {0}")]
    InvalidBoc(String),

    /// Malformed address string
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
