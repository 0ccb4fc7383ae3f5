//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Bis auf `[session]` haben
//! alle Abschnitte Standardwerte.

use serde::{Deserialize, Serialize};
use voicelink_core::Session;
use voicelink_observability::LoggingConfig;
use voicelink_signaling::VoiceConfig;

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Zugangsdaten vom Haupt-Gateway
    pub session: Option<Session>,
    /// Steuerkanal, Heartbeat, Reconnect und Medienkanal (`[voice.media]`)
    pub voice: VoiceConfig,
    pub logging: LoggingConfig,
    pub client: ClientEinstellungen,
}

/// Verhalten des Kommandozeilen-Clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientEinstellungen {
    /// Abstand der Stille-Frames in Millisekunden
    pub frame_intervall_ms: u64,
    /// Laufzeit in Sekunden; ohne Wert bis Ctrl-C
    pub dauer_s: Option<u64>,
    /// Stille-Frames senden (sonst nur zuhoeren)
    pub senden: bool,
}

impl Default for ClientEinstellungen {
    fn default() -> Self {
        Self {
            frame_intervall_ms: 20,
            dauer_s: None,
            senden: true,
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(inhalt)?;
        config.voice.validieren()?;
        if config.client.frame_intervall_ms == 0 {
            anyhow::bail!("frame_intervall_ms muss groesser 0 sein");
        }
        Ok(config)
    }
}
