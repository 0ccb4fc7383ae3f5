//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;
use voicelink_protocol::EncryptionMode;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Verschluesselungsmodus nicht unterstuetzt: {0}")]
    NichtUnterstuetzterModus(String),

    #[error("Kein kompatibler Verschluesselungsmodus (angeboten: {angeboten:?})")]
    KeinKompatiblerModus { angeboten: Vec<String> },

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Schluessel besteht nur aus Nullbytes")]
    NullSchluessel,

    #[error("Ungueltige Nonce-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeNonce { erwartet: usize, erhalten: usize },

    #[error("Verschluesselung fehlgeschlagen ({modus})")]
    Verschluesselung { modus: EncryptionMode },

    #[error("Entschluesselung fehlgeschlagen ({modus})")]
    Entschluesselung { modus: EncryptionMode },

    #[error("Verschluesselung nicht initialisiert")]
    NichtInitialisiert,
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Fehler beim Entschluesseln eines eingehenden Pakets
///
/// Alle Varianten sind nicht fatal: das Paket wird verworfen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecryptError {
    #[error("Verschluesselung nicht initialisiert")]
    NichtInitialisiert,

    #[error("Paket zu kurz: {laenge} Bytes")]
    ZuKurz { laenge: usize },

    #[error("Authentifizierung fehlgeschlagen")]
    AuthentifizierungFehlgeschlagen,
}
