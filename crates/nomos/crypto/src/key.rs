use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

/// 256-bit symmetric key. Wiped from memory on drop.
///
/// Keys are minted and persisted by the key vault only.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn try_from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let array: [u8; KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_does_not_leak_material() {
        let key = SymmetricKey::from_bytes([0xAB; KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "SymmetricKey(<redacted>)");
    }

    #[test]
    fn slice_length_is_checked() {
        assert!(SymmetricKey::try_from_slice(&[1u8; KEY_SIZE]).is_ok());
        assert_eq!(
            SymmetricKey::try_from_slice(&[1u8; 16]).unwrap_err(),
            CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: 16
            }
        );
    }
}
