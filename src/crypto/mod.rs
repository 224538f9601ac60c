//! Security accelerator.
//!
//! The AES engine, its key store and its DMA are driven through [`AesEngine`]. Only one
//! operation runs at a time; the engine tracks which one in its [`AesOp`] tag.

pub mod aes_engine;

pub use aes_engine::ecb::{Direction, EcbTransfer};
pub use aes_engine::keys::{AesKey, AesKeySize, KeyArea};
pub use aes_engine::AesEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CryptoError {
    /// Another operation holds the engine.
    Busy,
    /// The key area selected for an operation holds no valid key.
    KeystoreRead,
    /// A key could not be written to the key store.
    KeystoreWrite,
    /// The engine's DMA hit a bus error.
    DmaBus,
    /// Wide keys take two areas and must start at an even one.
    InvalidKeyArea,
}

impl CryptoError {
    /// Numeric code of the error, as reported by the TI security drivers.
    pub const fn code(self) -> u8 {
        match self {
            CryptoError::KeystoreRead => 1,
            CryptoError::KeystoreWrite => 2,
            CryptoError::DmaBus => 3,
            CryptoError::InvalidKeyArea => 6,
            CryptoError::Busy => 0x08,
        }
    }
}

/// The operation that currently owns the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AesOp {
    None,
    KeyLoad,
    Ecb,
    Ccm,
    Sha256,
    Rng,
}

impl Default for AesOp {
    fn default() -> Self {
        AesOp::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(CryptoError::KeystoreRead.code(), 1);
        assert_eq!(CryptoError::KeystoreWrite.code(), 2);
        assert_eq!(CryptoError::DmaBus.code(), 3);
        assert_eq!(CryptoError::InvalidKeyArea.code(), 6);
        assert_eq!(CryptoError::Busy.code(), 8);
    }
}
