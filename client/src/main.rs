//! VoiceLink Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Client.

use anyhow::Result;
use voicelink_client::{config::ClientConfig, Client};
use voicelink_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var("VOICELINK_CONFIG").unwrap_or_else(|_| "voicelink.toml".into());

    // Standardwerte falls Datei fehlt
    let config = ClientConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "VoiceLink Client wird initialisiert"
    );

    Client::neu(config).starten().await
}
