//! # voicelink-observability
//!
//! Structured Logging fuer VoiceLink-Clients via tracing-subscriber.
//! Text fuer die Konsole, JSON fuer Log-Sammler.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat, LoggingConfig, LoggingError};
