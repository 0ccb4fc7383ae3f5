//! voicelink-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! Voicelink-Crates gemeinsam genutzt werden: Snowflake-IDs, die
//! Sitzungs-Zugangsdaten und der zentrale Fehlertyp.

pub mod error;
pub mod session;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, VoicelinkError};
pub use session::Session;
pub use types::{ChannelId, ServerId, UserId};
