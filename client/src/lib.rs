//! voicelink-client – Bibliotheks-Root
//!
//! Verbindet sich mit einem Voice-Gateway, sendet Opus-Stille im
//! Frame-Takt und protokolliert alle Verbindungsereignisse.

pub mod config;

use anyhow::{Context, Result};
use config::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use voicelink_signaling::{
    EventReceiver, GatewayError, VoiceConnection, VoiceEvent, WebSocketConnector,
};

/// Ein Opus-Frame mit 20 ms Stille
pub const OPUS_STILLE: [u8; 3] = [0xF8, 0xFF, 0xFE];

/// Haelt Konfiguration und Verbindung zusammen
pub struct Client {
    pub config: ClientConfig,
}

impl Client {
    pub fn neu(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Verbindet, sendet bis Laufzeitende oder Ctrl-C und trennt sauber
    pub async fn starten(self) -> Result<()> {
        let session = self
            .config
            .session
            .clone()
            .context("Keine Sitzung konfiguriert (Abschnitt [session] fehlt)")?;

        let (verbindung, events) =
            VoiceConnection::neu(self.config.voice.clone(), Arc::new(WebSocketConnector));
        let verbindung = Arc::new(verbindung);
        let protokoll = tokio::spawn(ereignisse_protokollieren(events));

        let info = verbindung.connect(session, false).await?;
        tracing::info!(
            ssrc = info.ssrc,
            modus = %info.modus,
            externe_adresse = %info.externe_adresse,
            "Verbunden"
        );

        let senden = senden_bis_ende(&verbindung, &self.config);
        let ergebnis = match self.config.client.dauer_s {
            Some(s) => {
                tokio::select! {
                    r = senden => r,
                    _ = tokio::time::sleep(Duration::from_secs(s)) => Ok(()),
                    _ = tokio::signal::ctrl_c() => Ok(()),
                }
            }
            None => {
                tokio::select! {
                    r = senden => r,
                    _ = tokio::signal::ctrl_c() => Ok(()),
                }
            }
        };

        verbindung.disconnect("Client beendet").await;
        drop(verbindung);
        let _ = protokoll.await;

        tracing::info!("Client beendet");
        ergebnis
    }
}

/// Sendet Stille im Frame-Takt, bis die Verbindung endgueltig weg ist
async fn senden_bis_ende(verbindung: &VoiceConnection, config: &ClientConfig) -> Result<()> {
    let mut zustand = verbindung.zustand_abonnieren();
    let mut takt =
        tokio::time::interval(Duration::from_millis(config.client.frame_intervall_ms));
    takt.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = takt.tick() => {
                if !config.client.senden {
                    continue;
                }
                match verbindung.send_audio(&OPUS_STILLE).await {
                    Ok(()) => {}
                    // Waehrend Reconnect: Frame verwerfen
                    Err(GatewayError::NichtBereit) => {}
                    Err(e) => tracing::warn!(fehler = %e, "Frame nicht gesendet"),
                }
            }
            geaendert = zustand.changed() => {
                if geaendert.is_err() {
                    return Ok(());
                }
                let aktuell = *zustand.borrow_and_update();
                if aktuell.ist_terminal() {
                    anyhow::bail!("Verbindung beendet: {aktuell:?}");
                }
            }
        }
    }
}

/// Schreibt jedes Ereignis ins Log, bis der Kanal schliesst
pub async fn ereignisse_protokollieren(mut events: EventReceiver) {
    while let Some(ereignis) = events.recv().await {
        match ereignis {
            VoiceEvent::Connecting { resume } => tracing::debug!(resume, "Verbinde"),
            VoiceEvent::Ready(info) => tracing::info!(ssrc = info.ssrc, "Bereit"),
            VoiceEvent::Resumed => tracing::info!("Sitzung fortgesetzt"),
            VoiceEvent::Reconnecting {
                versuch,
                verzoegerung,
                code,
            } => tracing::warn!(
                versuch,
                verzoegerung_ms = verzoegerung.as_millis() as u64,
                code = ?code,
                "Reconnect"
            ),
            VoiceEvent::Disconnected { grund, code } => {
                tracing::info!(grund = %grund, code = ?code, "Getrennt")
            }
            VoiceEvent::Error(e) => tracing::warn!(fehler = %e, "Gateway-Fehler"),
            VoiceEvent::Failed { grund } => tracing::error!(grund = %grund, "Fehlgeschlagen"),
            VoiceEvent::AudioReceived {
                ssrc,
                user_id,
                sequence,
                payload,
                ..
            } => tracing::trace!(
                ssrc,
                user_id = ?user_id,
                sequence,
                bytes = payload.len(),
                "Audio empfangen"
            ),
            VoiceEvent::RemoteSpeaking {
                user_id,
                ssrc,
                flags,
            } => tracing::debug!(user_id = %user_id, ssrc, flags = ?flags, "Teilnehmer spricht"),
            VoiceEvent::ClientConnected { user_ids } => {
                tracing::info!(anzahl = user_ids.len(), "Teilnehmer beigetreten")
            }
            VoiceEvent::ClientDisconnected { user_id } => {
                tracing::info!(user_id = %user_id, "Teilnehmer gegangen")
            }
        }
    }
}
