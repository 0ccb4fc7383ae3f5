//! AEAD-Backends
//!
//! Die `EncryptionService` kennt nur die Traits `AeadBackend` und
//! `PacketCipher`. Das Standard-Backend nutzt die RustCrypto-Crates
//! `aes-gcm` und `chacha20poly1305`; Tests und Plattformen mit eigener
//! Krypto-Bibliothek koennen ein anderes Backend einsetzen.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use voicelink_protocol::EncryptionMode;

use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretKey;

/// Instanz einer AEAD-Primitive mit gebundenem Schluessel
pub trait PacketCipher: Send + Sync {
    /// Verschluesselt `klartext`; Ergebnis ist Ciphertext + 16-Byte-Tag
    fn seal(&self, nonce: &[u8], aad: &[u8], klartext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Prueft den Tag und entschluesselt
    fn open(&self, nonce: &[u8], aad: &[u8], chiffrat: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// Liefert `PacketCipher` fuer unterstuetzte Modi
pub trait AeadBackend: Send + Sync {
    /// Name fuer Logs
    fn name(&self) -> &'static str;

    /// Kann das Backend diesen Modus bedienen?
    fn supports(&self, modus: EncryptionMode) -> bool;

    /// Bindet einen Schluessel an die Primitive des Modus
    fn cipher(&self, modus: EncryptionMode, schluessel: &SecretKey)
        -> CryptoResult<Box<dyn PacketCipher>>;
}

// ---------------------------------------------------------------------------
// RustCrypto
// ---------------------------------------------------------------------------

/// Standard-Backend auf Basis der RustCrypto-Crates
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoBackend;

impl AeadBackend for RustCryptoBackend {
    fn name(&self) -> &'static str {
        "rustcrypto"
    }

    fn supports(&self, _modus: EncryptionMode) -> bool {
        true
    }

    fn cipher(
        &self,
        modus: EncryptionMode,
        schluessel: &SecretKey,
    ) -> CryptoResult<Box<dyn PacketCipher>> {
        let key = schluessel.as_bytes();
        Ok(match modus {
            EncryptionMode::AeadAes256GcmRtpsize => {
                Box::new(AesGcmCipher(Aes256Gcm::new_from_slice(key).map_err(laengen_fehler)?))
            }
            EncryptionMode::AeadXChaCha20Poly1305Rtpsize => Box::new(XChaChaCipher(
                XChaCha20Poly1305::new_from_slice(key).map_err(laengen_fehler)?,
            )),
        })
    }
}

fn laengen_fehler<E>(_: E) -> CryptoError {
    CryptoError::UngueltigeSchluesselLaenge {
        erwartet: 32,
        erhalten: 32,
    }
}

fn nonce_pruefen(nonce: &[u8], modus: EncryptionMode) -> CryptoResult<()> {
    if nonce.len() != modus.nonce_laenge() {
        return Err(CryptoError::UngueltigeNonce {
            erwartet: modus.nonce_laenge(),
            erhalten: nonce.len(),
        });
    }
    Ok(())
}

struct AesGcmCipher(Aes256Gcm);

impl PacketCipher for AesGcmCipher {
    fn seal(&self, nonce: &[u8], aad: &[u8], klartext: &[u8]) -> CryptoResult<Vec<u8>> {
        let modus = EncryptionMode::AeadAes256GcmRtpsize;
        nonce_pruefen(nonce, modus)?;
        self.0
            .encrypt(AesNonce::from_slice(nonce), Payload { msg: klartext, aad })
            .map_err(|_| CryptoError::Verschluesselung { modus })
    }

    fn open(&self, nonce: &[u8], aad: &[u8], chiffrat: &[u8]) -> CryptoResult<Vec<u8>> {
        let modus = EncryptionMode::AeadAes256GcmRtpsize;
        nonce_pruefen(nonce, modus)?;
        self.0
            .decrypt(AesNonce::from_slice(nonce), Payload { msg: chiffrat, aad })
            .map_err(|_| CryptoError::Entschluesselung { modus })
    }
}

struct XChaChaCipher(XChaCha20Poly1305);

impl PacketCipher for XChaChaCipher {
    fn seal(&self, nonce: &[u8], aad: &[u8], klartext: &[u8]) -> CryptoResult<Vec<u8>> {
        let modus = EncryptionMode::AeadXChaCha20Poly1305Rtpsize;
        nonce_pruefen(nonce, modus)?;
        self.0
            .encrypt(
                XNonce::from_slice(nonce),
                chacha20poly1305::aead::Payload { msg: klartext, aad },
            )
            .map_err(|_| CryptoError::Verschluesselung { modus })
    }

    fn open(&self, nonce: &[u8], aad: &[u8], chiffrat: &[u8]) -> CryptoResult<Vec<u8>> {
        let modus = EncryptionMode::AeadXChaCha20Poly1305Rtpsize;
        nonce_pruefen(nonce, modus)?;
        self.0
            .decrypt(
                XNonce::from_slice(nonce),
                chacha20poly1305::aead::Payload { msg: chiffrat, aad },
            )
            .map_err(|_| CryptoError::Entschluesselung { modus })
    }
}
