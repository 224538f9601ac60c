use core::convert::TryFrom;

use crate::crypto::CryptoError;

/// One of the eight 128-bit slots of the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyArea(u8);

impl KeyArea {
    pub const COUNT: u8 = 8;

    pub const fn new(area: u8) -> Option<Self> {
        if area < Self::COUNT {
            Some(Self(area))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for KeyArea {
    type Error = CryptoError;

    fn try_from(area: u8) -> Result<Self, Self::Error> {
        Self::new(area).ok_or(CryptoError::InvalidKeyArea)
    }
}

/// Key store size setting. Changing it erases every stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AesKeySize {
    Key128 = 0b01,
    Key192 = 0b10,
    Key256 = 0b11,
}

impl AesKeySize {
    /// Number of 128-bit key areas one key occupies.
    pub const fn areas(self) -> u8 {
        match self {
            AesKeySize::Key128 => 1,
            AesKeySize::Key192 | AesKeySize::Key256 => 2,
        }
    }

    pub(crate) const fn bits(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesKey {
    Key128([u8; 16]),
    Key192([u8; 24]),
    Key256([u8; 32]),
}

impl AesKey {
    pub const fn size(&self) -> AesKeySize {
        match self {
            AesKey::Key128(_) => AesKeySize::Key128,
            AesKey::Key192(_) => AesKeySize::Key192,
            AesKey::Key256(_) => AesKeySize::Key256,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AesKey::Key128(k) => &k[..],
            AesKey::Key192(k) => &k[..],
            AesKey::Key256(k) => &k[..],
        }
    }
}

/// A key copied to word-aligned memory, the way the key store DMA reads it.
///
/// 192-bit keys are padded to fill both areas.
#[repr(C, align(4))]
pub(crate) struct KeyBuffer {
    bytes: [u8; 32],
    len: usize,
}

impl KeyBuffer {
    pub fn new(key: &AesKey) -> Self {
        let mut bytes = [0; 32];
        let key_bytes = key.as_bytes();
        bytes[..key_bytes.len()].copy_from_slice(key_bytes);
        Self {
            bytes,
            len: 16 * key.size().areas() as usize,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}
