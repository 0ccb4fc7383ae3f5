//! Konfiguration einer Voice-Verbindung
//!
//! Alle Felder haben Standardwerte; eine TOML-Sektion `[voice]` muss nur
//! die abweichenden Werte enthalten.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use voicelink_core::{Result, VoicelinkError};
use voicelink_protocol::EncryptionMode;
use voicelink_voice::MediaConfig;

/// Einstellungen fuer Steuerkanal, Heartbeat und Reconnect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Protokollversion im Gateway-URL (`?v=`)
    pub gateway_version: u8,
    /// Zeitlimit fuer Verbindungsaufbau inklusive Hello
    pub connect_timeout_ms: u64,
    /// Maximale Anzahl Reconnect-Versuche
    pub max_reconnect_versuche: u32,
    /// Wartezeiten zwischen den Versuchen (letzter Wert wiederholt sich)
    pub backoff_ms: Vec<u64>,
    /// Verpasste Heartbeats bis zum Reconnect
    pub heartbeat_fehlschlaege: u32,
    /// Anteil des Intervalls als Zufallsverzoegerung vor dem ersten Beat
    pub heartbeat_jitter: f64,
    /// Mindestabstand identischer Speaking-Ankuendigungen
    pub speaking_drossel_ms: u64,
    /// Bevorzugter Modus, falls vom Server angeboten
    pub bevorzugter_modus: Option<EncryptionMode>,
    /// Medienkanal
    pub media: MediaConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            gateway_version: 8,
            connect_timeout_ms: 10_000,
            max_reconnect_versuche: 5,
            backoff_ms: vec![1_000, 2_000, 4_000, 8_000, 16_000],
            heartbeat_fehlschlaege: 3,
            heartbeat_jitter: 0.1,
            speaking_drossel_ms: 500,
            bevorzugter_modus: None,
            media: MediaConfig::default(),
        }
    }
}

impl VoiceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn speaking_drossel(&self) -> Duration {
        Duration::from_millis(self.speaking_drossel_ms)
    }

    /// Prueft die Werte auf Plausibilitaet
    pub fn validieren(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            return Err(VoicelinkError::Konfiguration(
                "connect_timeout_ms muss groesser 0 sein".into(),
            ));
        }
        if self.heartbeat_fehlschlaege == 0 {
            return Err(VoicelinkError::Konfiguration(
                "heartbeat_fehlschlaege muss mindestens 1 sein".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.heartbeat_jitter) {
            return Err(VoicelinkError::Konfiguration(format!(
                "heartbeat_jitter ausserhalb [0, 1]: {}",
                self.heartbeat_jitter
            )));
        }
        if self.media.samples_pro_frame == 0 {
            return Err(VoicelinkError::Konfiguration(
                "samples_pro_frame muss groesser 0 sein".into(),
            ));
        }
        Ok(())
    }
}
