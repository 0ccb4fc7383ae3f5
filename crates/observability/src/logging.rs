//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Datei (`[logging]`) oder Umgebungsvariable:
//! - `VL_LOG_LEVEL`: Filter-Direktive (z.B. `info` oder
//!   `voicelink_signaling=debug,info`), Standard: info
//! - `VL_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Umgebungsvariablen haben Vorrang vor der Datei.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

pub const ENV_LEVEL: &str = "VL_LOG_LEVEL";
pub const ENV_FORMAT: &str = "VL_LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Ungueltiger Log-Filter '{filter}': {grund}")]
    UngueltigerFilter { filter: String, grund: String },

    #[error("Ungueltiges Log-Format '{0}' (erlaubt: text, json)")]
    UngueltigesFormat(String),

    #[error("Logging bereits initialisiert: {0}")]
    BereitsInitialisiert(String),
}

/// Ausgabeformat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(LoggingError::UngueltigesFormat(andere.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// `[logging]`-Abschnitt der Konfiguration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Uebernimmt `VL_LOG_LEVEL` und `VL_LOG_FORMAT`, falls gesetzt
    pub fn mit_umgebung(mut self) -> Result<Self, LoggingError> {
        if let Ok(level) = std::env::var(ENV_LEVEL) {
            self.level = level;
        }
        if let Ok(format) = std::env::var(ENV_FORMAT) {
            self.format = format.parse()?;
        }
        Ok(self)
    }

    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        EnvFilter::try_new(&self.level).map_err(|e| LoggingError::UngueltigerFilter {
            filter: self.level.clone(),
            grund: e.to_string(),
        })
    }
}

/// Initialisiert den globalen Subscriber
///
/// Ein zweiter Aufruf liefert `BereitsInitialisiert` statt zu paniken.
pub fn logging_initialisieren(config: &LoggingConfig) -> Result<(), LoggingError> {
    let config = config.clone().mit_umgebung()?;
    let filter = config.filter()?;

    let ergebnis = match config.format {
        LogFormat::Json => tfmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => tfmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| LoggingError::BereitsInitialisiert(e.to_string()))?;

    tracing::debug!(level = %config.level, format = %config.format, "Logging initialisiert");
    Ok(())
}
