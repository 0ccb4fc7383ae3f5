//! Fehlertypen fuer den Medienkanal

use thiserror::Error;
use voicelink_crypto::CryptoError;

/// Fehler im Media Transport
#[derive(Debug, Error)]
pub enum MediaError {
    /// Socket konnte nicht gebunden werden
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Keine gueltige Discovery-Antwort innerhalb des Zeitlimits
    #[error("IP-Discovery: keine Antwort nach {ms} ms")]
    DiscoveryTimeout { ms: u64 },

    /// Waehrend des Aufbaus getrennt
    #[error("Medienaufbau abgebrochen")]
    Abgebrochen,

    /// Keine aktive Mediensitzung
    #[error("Medienkanal nicht verbunden")]
    NichtVerbunden,

    /// Verschluesselung fehlt oder schlug fehl
    #[error("Kryptofehler: {0}")]
    Krypto(#[from] CryptoError),

    /// Datagramm konnte nicht gesendet werden (nicht fatal)
    #[error("Senden fehlgeschlagen: {0}")]
    Senden(#[source] std::io::Error),
}

/// Result-Typ fuer den Medienkanal
pub type MediaResult<T> = Result<T, MediaError>;
