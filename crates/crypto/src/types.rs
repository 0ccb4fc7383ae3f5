//! Schluessel-Container fuer den Medienkanal

use voicelink_protocol::crypto::SCHLUESSEL_LAENGE;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// 256-Bit Sitzungsschluessel (wird beim Drop genullt)
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SCHLUESSEL_LAENGE]);

impl SecretKey {
    /// Uebernimmt einen Schluessel aus der SessionDescription
    ///
    /// # Fehler
    /// - `UngueltigeSchluesselLaenge` wenn nicht genau 32 Bytes
    /// - `NullSchluessel` wenn alle Bytes 0 sind
    pub fn aus_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; SCHLUESSEL_LAENGE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::UngueltigeSchluesselLaenge {
                    erwartet: SCHLUESSEL_LAENGE,
                    erhalten: bytes.len(),
                })?;
        if arr.iter().all(|&b| b == 0) {
            return Err(CryptoError::NullSchluessel);
        }
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SCHLUESSEL_LAENGE] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey([REDACTED] {} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schluessel_laenge_wird_geprueft() {
        assert!(matches!(
            SecretKey::aus_slice(&[1u8; 16]),
            Err(CryptoError::UngueltigeSchluesselLaenge { erwartet: 32, erhalten: 16 })
        ));
        assert!(SecretKey::aus_slice(&[1u8; 32]).is_ok());
    }

    #[test]
    fn null_schluessel_abgelehnt() {
        assert!(matches!(
            SecretKey::aus_slice(&[0u8; 32]),
            Err(CryptoError::NullSchluessel)
        ));
    }

    #[test]
    fn debug_verbirgt_inhalt() {
        let k = SecretKey::aus_slice(&[0x42; 32]).unwrap();
        let s = format!("{k:?}");
        assert_eq!(s, "SecretKey([REDACTED] 32 bytes)");
    }

    #[test]
    fn zeroize_nullt_schluessel() {
        fn nullt_beim_drop<T: ZeroizeOnDrop>(_: &T) {}

        let mut k = SecretKey::aus_slice(&[0x42; 32]).unwrap();
        nullt_beim_drop(&k);
        k.zeroize();
        assert_eq!(k.as_bytes(), &[0u8; SCHLUESSEL_LAENGE]);
    }
}
