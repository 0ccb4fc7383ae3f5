//! Fehlertypen fuer Voicelink
//!
//! Zentraler Fehler-Enum fuer Zustaende, die mehrere Crates betreffen.
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Voicelink
pub type Result<T> = std::result::Result<T, VoicelinkError>;

/// Crate-uebergreifende Fehler
#[derive(Debug, Error)]
pub enum VoicelinkError {
    // --- Sitzung ---
    #[error("Ungueltige Sitzung: {0}")]
    UngueltigeSitzung(String),

    #[error("Ungueltige ID: {0}")]
    UngueltigeId(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl VoicelinkError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Sitzungsfehler
    pub fn sitzung(msg: impl Into<String>) -> Self {
        Self::UngueltigeSitzung(msg.into())
    }
}
