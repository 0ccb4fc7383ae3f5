//! Encryption Service – Paket-Verschluesselung fuer den Medienkanal
//!
//! Haelt den ausgehandelten Modus und den Sitzungsschluessel und
//! verschluesselt jedes ausgehende Paket mit einer frischen Nonce.
//!
//! ## Format
//! ```text
//! [ciphertext] [auth_tag(16)] [nonce_zaehler(4, big-endian)]
//! ```
//!
//! ## Nonce-Aufbau
//! ```text
//! AES-256-GCM (12):        [0 x 8]  [zaehler(4, big-endian)]
//! XChaCha20-Poly1305 (24): [0 x 20] [zaehler(4, big-endian)]
//! ```
//!
//! Der Zaehler beginnt nach jeder Initialisierung bei 0 und wird pro Paket
//! um 1 erhoeht (wraps bei 32 Bit). Eine Nonce wird nie wiederverwendet,
//! solange weniger als 2^32 Pakete pro Schluessel gesendet werden.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use voicelink_protocol::crypto::{NONCE_ZAEHLER_LAENGE, TAG_LAENGE};
use voicelink_protocol::EncryptionMode;

use crate::backend::{AeadBackend, PacketCipher, RustCryptoBackend};
use crate::error::{CryptoError, CryptoResult, DecryptError};
use crate::types::SecretKey;

/// Aktiver Verschluesselungskontext
struct Kontext {
    modus: EncryptionMode,
    cipher: Box<dyn PacketCipher>,
}

/// Ver- und Entschluesselung der Audio-Pakete einer Sitzung
pub struct EncryptionService {
    backend: Arc<dyn AeadBackend>,
    kontext: RwLock<Option<Kontext>>,
    nonce_zaehler: AtomicU32,
}

impl EncryptionService {
    /// Erstellt einen uninitialisierten Service mit dem gegebenen Backend
    pub fn neu(backend: Arc<dyn AeadBackend>) -> Self {
        Self {
            backend,
            kontext: RwLock::new(None),
            nonce_zaehler: AtomicU32::new(0),
        }
    }

    /// Service mit dem RustCrypto-Backend
    pub fn standard() -> Self {
        Self::neu(Arc::new(RustCryptoBackend))
    }

    /// Das verwendete Backend
    pub fn backend(&self) -> &dyn AeadBackend {
        self.backend.as_ref()
    }

    /// Setzt Modus und Schluessel aus der SessionDescription
    ///
    /// Ersetzt einen vorhandenen Kontext und setzt den Nonce-Zaehler zurueck.
    pub fn initialize(&self, modus: EncryptionMode, schluessel: &[u8]) -> CryptoResult<()> {
        if !self.backend.supports(modus) {
            return Err(CryptoError::NichtUnterstuetzterModus(modus.to_string()));
        }
        let schluessel = SecretKey::aus_slice(schluessel)?;
        let cipher = self.backend.cipher(modus, &schluessel)?;

        let mut kontext = self.kontext.write();
        *kontext = Some(Kontext { modus, cipher });
        self.nonce_zaehler.store(0, Ordering::SeqCst);

        tracing::debug!(modus = %modus, backend = self.backend.name(), "Verschluesselung initialisiert");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.kontext.read().is_some()
    }

    /// Ausgehandelter Modus (falls initialisiert)
    pub fn mode(&self) -> Option<EncryptionMode> {
        self.kontext.read().as_ref().map(|k| k.modus)
    }

    /// Verschluesselt eine Nutzlast; `header` ist das AAD
    ///
    /// Rueckgabe ohne Header: `ciphertext || tag || nonce_zaehler`.
    pub fn encrypt(&self, header: &[u8], nutzlast: &[u8]) -> CryptoResult<Vec<u8>> {
        let guard = self.kontext.read();
        let kontext = guard.as_ref().ok_or(CryptoError::NichtInitialisiert)?;

        let zaehler = self.nonce_zaehler.fetch_add(1, Ordering::SeqCst);
        let nonce = nonce_bauen(kontext.modus, zaehler);

        let mut versiegelt = kontext.cipher.seal(&nonce, header, nutzlast)?;
        versiegelt.extend_from_slice(&zaehler.to_be_bytes());
        Ok(versiegelt)
    }

    /// Entschluesselt `ciphertext || tag || nonce_zaehler`; `aad` ist der
    /// unverschluesselte Paketkopf
    pub fn decrypt(&self, aad: &[u8], versiegelt: &[u8]) -> Result<Vec<u8>, DecryptError> {
        let guard = self.kontext.read();
        let kontext = guard.as_ref().ok_or(DecryptError::NichtInitialisiert)?;

        if versiegelt.len() < TAG_LAENGE + NONCE_ZAEHLER_LAENGE {
            return Err(DecryptError::ZuKurz {
                laenge: versiegelt.len(),
            });
        }
        let (chiffrat, zaehler) = versiegelt.split_at(versiegelt.len() - NONCE_ZAEHLER_LAENGE);
        let zaehler = u32::from_be_bytes([zaehler[0], zaehler[1], zaehler[2], zaehler[3]]);
        let nonce = nonce_bauen(kontext.modus, zaehler);

        kontext
            .cipher
            .open(&nonce, aad, chiffrat)
            .map_err(|_| DecryptError::AuthentifizierungFehlgeschlagen)
    }

    /// Verwirft Schluessel und Modus
    pub fn clear(&self) {
        if self.kontext.write().take().is_some() {
            tracing::debug!("Schluesselmaterial verworfen");
        }
        self.nonce_zaehler.store(0, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("backend", &self.backend.name())
            .field("modus", &self.mode())
            .finish()
    }
}

fn nonce_bauen(modus: EncryptionMode, zaehler: u32) -> Vec<u8> {
    let laenge = modus.nonce_laenge();
    let mut nonce = vec![0u8; laenge];
    nonce[laenge - NONCE_ZAEHLER_LAENGE..].copy_from_slice(&zaehler.to_be_bytes());
    nonce
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
