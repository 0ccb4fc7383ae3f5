//! Fehlertypen fuer den Steuerkanal und die Verbindungs-State-Machine

use thiserror::Error;
use voicelink_core::VoicelinkError;
use voicelink_crypto::CryptoError;
use voicelink_protocol::ProtocolError;
use voicelink_voice::MediaError;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Steuerkanal konnte nicht geoeffnet werden
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    /// Zeitlimit ueberschritten (Verbindungsaufbau, Hello)
    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    /// Steuerkanal wurde vom Server geschlossen
    #[error("Steuerkanal geschlossen (Code {code}): {grund}")]
    Geschlossen { code: u16, grund: String },

    /// Frame nicht dekodierbar
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    /// Nachricht im falschen Zustand
    #[error("Unerwartete Nachricht: {0}")]
    UnerwarteteNachricht(String),

    /// Ready oder SessionDescription mit unbrauchbaren Werten
    #[error("Ungueltige Nutzdaten: {0}")]
    UngueltigeNutzdaten(String),

    /// Verschluesselung (u.a. kein kompatibler Modus)
    #[error("Kryptofehler: {0}")]
    Krypto(#[from] CryptoError),

    /// Medienkanal (Discovery, Senden)
    #[error("Medienfehler: {0}")]
    Medien(#[from] MediaError),

    /// Ungueltige Sitzung oder Konfiguration
    #[error(transparent)]
    Sitzung(#[from] VoicelinkError),

    /// Aktion erfordert eine bereite Verbindung
    #[error("Verbindung nicht bereit")]
    NichtBereit,

    /// Steuerkanal-Queue geschlossen
    #[error("Senden fehlgeschlagen: Steuerkanal geschlossen")]
    KanalGeschlossen,

    /// Sitzung beendet (Close-Code 4014 oder lokales Trennen)
    #[error("Getrennt: {0}")]
    Getrennt(String),

    /// Alle Reconnect-Versuche verbraucht
    #[error("Verbindung endgueltig fehlgeschlagen nach {versuche} Versuchen")]
    VersucheErschoepft { versuche: u32 },
}

impl GatewayError {
    /// Fehler, nach denen kein weiterer Versuch sinnvoll ist
    pub fn ist_terminal(&self) -> bool {
        matches!(
            self,
            Self::Krypto(CryptoError::KeinKompatiblerModus { .. })
                | Self::Getrennt(_)
                | Self::VersucheErschoepft { .. }
                | Self::Sitzung(_)
        )
    }
}

/// Result-Typ fuer den Signaling-Service
pub type GatewayResult<T> = Result<T, GatewayError>;
