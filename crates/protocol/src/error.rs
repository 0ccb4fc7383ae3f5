//! Fehlertypen fuer das Protokoll-Crate

use thiserror::Error;

/// Fehler beim Kodieren oder Dekodieren von Protokollnachrichten
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ungueltige Nutzdaten fuer {op:?}: {grund}")]
    UngueltigeNutzdaten { op: crate::gateway::OpCode, grund: String },

    #[error("Ungueltiges Paket: {0}")]
    UngueltigesPaket(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
