//! Heartbeat des Steuerkanals (Op 3 / Op 6)
//!
//! Nach Hello sendet der Client im vom Server vorgegebenen Intervall einen
//! Heartbeat. Der erste Beat wird um einen zufaelligen Anteil des
//! Intervalls verzoegert, damit viele Clients nicht im Gleichtakt senden.
//!
//! ## Ablauf pro Takt
//! - letzter Beat unbestaetigt: Fehlschlag zaehlen, nichts senden
//! - Schwelle erreicht: genau ein `HeartbeatSignal::Reconnect`, Takt endet
//! - sonst: Nonce erhoehen, Sendezeitpunkt merken, Op 3 senden
//!
//! Die Latenz ist die Differenz zwischen Bestaetigung und letztem Beat.
//! `seq_ack` wird unabhaengig davon aus jeder eingehenden Nachricht mit
//! `seq` fortgeschrieben und ueberlebt den Neuaufbau des Kanals (Resume).

use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use voicelink_protocol::gateway::{ClientCommand, HeartbeatPayload};

use crate::config::VoiceConfig;
use crate::transport::OutboundFrame;

// ---------------------------------------------------------------------------
// Konfiguration und Signale
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartbeatConfig {
    /// Protokollversion (ab 8 mit `seq_ack`)
    pub version: u8,
    /// Verpasste Beats bis zum Reconnect
    pub fehlschlaege_max: u32,
    /// Maximaler Anteil des Intervalls vor dem ersten Beat
    pub jitter: f64,
}

impl From<&VoiceConfig> for HeartbeatConfig {
    fn from(c: &VoiceConfig) -> Self {
        Self {
            version: c.gateway_version,
            fehlschlaege_max: c.heartbeat_fehlschlaege.max(1),
            jitter: c.heartbeat_jitter,
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::from(&VoiceConfig::default())
    }
}

/// Meldung an die State Machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatSignal {
    /// Zu viele unbestaetigte Beats; Verbindung gilt als abgebrochen
    Reconnect { verpasst: u32 },
}

/// Ergebnis eines einzelnen Takts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatOutcome {
    Gesendet { nonce: u64 },
    Verpasst { verpasst: u32 },
    Reconnect,
    Gestoppt,
    KanalGeschlossen,
}

/// Zuletzt bestaetigte Sequenznummer (-1 = keine)
#[derive(Debug, Clone)]
pub struct SeqAck(Arc<AtomicI64>);

impl Default for SeqAck {
    fn default() -> Self {
        Self(Arc::new(AtomicI64::new(-1)))
    }
}

impl SeqAck {
    pub fn get(&self) -> Option<i64> {
        let wert = self.0.load(Ordering::Acquire);
        (wert >= 0).then_some(wert)
    }

    pub fn set(&self, seq: i64) {
        if seq >= 0 {
            self.0.store(seq, Ordering::Release);
        }
    }

    pub fn reset(&self) {
        self.0.store(-1, Ordering::Release);
    }
}

/// Unveraenderlicher Stand des Heartbeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSnapshot {
    pub intervall: Option<Duration>,
    pub letzter_beat: Option<Instant>,
    pub letzte_bestaetigung: Option<Instant>,
    pub letzte_nonce: Option<u64>,
    pub verpasst: u32,
    pub seq_ack: Option<i64>,
    pub latenz: Option<Duration>,
    pub laeuft: bool,
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct HeartbeatState {
    intervall: Option<Duration>,
    nonce: u64,
    letzte_nonce: Option<u64>,
    gesendet: Option<Instant>,
    bestaetigt: Option<Instant>,
    /// Letzter Beat wartet noch auf Op 6
    offen: bool,
    verpasst: u32,
    latenz: Option<Duration>,
    gestoppt: bool,
    signalisiert: bool,
}

struct HeartbeatInner {
    config: HeartbeatConfig,
    ausgang: mpsc::UnboundedSender<OutboundFrame>,
    signal: mpsc::UnboundedSender<HeartbeatSignal>,
    seq_ack: SeqAck,
    zustand: Mutex<HeartbeatState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for HeartbeatInner {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Heartbeat eines Steuerkanals
#[derive(Clone)]
pub struct Heartbeat {
    inner: Arc<HeartbeatInner>,
}

impl Heartbeat {
    pub fn neu(
        config: HeartbeatConfig,
        ausgang: mpsc::UnboundedSender<OutboundFrame>,
        signal: mpsc::UnboundedSender<HeartbeatSignal>,
    ) -> Self {
        Self::mit_seq_ack(config, ausgang, signal, SeqAck::default())
    }

    /// Wie `neu`, aber mit einem geteilten `seq_ack` (bleibt ueber
    /// Reconnects erhalten)
    pub fn mit_seq_ack(
        config: HeartbeatConfig,
        ausgang: mpsc::UnboundedSender<OutboundFrame>,
        signal: mpsc::UnboundedSender<HeartbeatSignal>,
        seq_ack: SeqAck,
    ) -> Self {
        let nonce_start = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Self {
            inner: Arc::new(HeartbeatInner {
                config,
                ausgang,
                signal,
                seq_ack,
                zustand: Mutex::new(HeartbeatState {
                    intervall: None,
                    nonce: nonce_start,
                    letzte_nonce: None,
                    gesendet: None,
                    bestaetigt: None,
                    offen: false,
                    verpasst: 0,
                    latenz: None,
                    gestoppt: false,
                    signalisiert: false,
                }),
                task: Mutex::new(None),
            }),
        }
    }

    /// Startet den Takt; ein laufender Takt wird ersetzt
    pub fn start(&self, intervall_ms: u64) {
        let intervall = Duration::from_millis(intervall_ms.max(1));
        {
            let mut s = self.inner.zustand.lock();
            s.intervall = Some(intervall);
            s.offen = false;
            s.verpasst = 0;
            s.gestoppt = false;
            s.signalisiert = false;
        }

        let jitter = if self.inner.config.jitter > 0.0 {
            let anteil = rand::rng().random_range(0.0..self.inner.config.jitter);
            intervall.mul_f64(anteil)
        } else {
            Duration::ZERO
        };
        tracing::debug!(
            intervall_ms = intervall.as_millis() as u64,
            jitter_ms = jitter.as_millis() as u64,
            "Heartbeat gestartet"
        );

        let schwach = Arc::downgrade(&self.inner);
        let task = tokio::spawn(takt(schwach, intervall, jitter));
        if let Some(alt) = self.inner.task.lock().replace(task) {
            alt.abort();
        }
    }

    /// Ein Takt; wird vom Timer-Task aufgerufen
    pub fn beat(&self) -> BeatOutcome {
        let mut s = self.inner.zustand.lock();
        if s.gestoppt {
            return BeatOutcome::Gestoppt;
        }

        if s.offen {
            s.verpasst += 1;
            let verpasst = s.verpasst;
            if verpasst < self.inner.config.fehlschlaege_max {
                tracing::warn!(verpasst, "Heartbeat nicht bestaetigt");
                return BeatOutcome::Verpasst { verpasst };
            }

            s.gestoppt = true;
            if !s.signalisiert {
                s.signalisiert = true;
                drop(s);
                tracing::warn!(verpasst, "Heartbeat-Timeout, Reconnect angefordert");
                let _ = self.inner.signal.send(HeartbeatSignal::Reconnect { verpasst });
            }
            return BeatOutcome::Reconnect;
        }

        s.nonce = s.nonce.wrapping_add(1);
        let nonce = s.nonce;
        let payload =
            HeartbeatPayload::fuer_version(self.inner.config.version, nonce, self.inner.seq_ack.get());
        let text = match ClientCommand::Heartbeat(payload).als_text() {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(fehler = %e, "Heartbeat nicht serialisierbar");
                s.gestoppt = true;
                return BeatOutcome::Gestoppt;
            }
        };

        if self.inner.ausgang.send(OutboundFrame::Text(text)).is_err() {
            s.gestoppt = true;
            return BeatOutcome::KanalGeschlossen;
        }
        s.gesendet = Some(Instant::now());
        s.letzte_nonce = Some(nonce);
        s.offen = true;
        tracing::trace!(nonce, "Heartbeat gesendet");
        BeatOutcome::Gesendet { nonce }
    }

    /// Verarbeitet Op 6; gibt die gemessene Latenz zurueck
    ///
    /// Bestaetigungen fuer eine veraltete Nonce werden ignoriert.
    pub fn acknowledge(&self, nonce: u64, sequenz: Option<i64>) -> Option<Duration> {
        if let Some(seq) = sequenz {
            self.sequence_acknowledged(seq);
        }

        let mut s = self.inner.zustand.lock();
        if !s.offen || s.letzte_nonce != Some(nonce) {
            tracing::debug!(nonce, erwartet = ?s.letzte_nonce, "Veraltete Heartbeat-Bestaetigung");
            return None;
        }

        let jetzt = Instant::now();
        let latenz = s
            .gesendet
            .map(|g| jetzt.saturating_duration_since(g))
            .unwrap_or_default();
        s.offen = false;
        s.verpasst = 0;
        s.bestaetigt = Some(jetzt);
        s.latenz = Some(latenz);
        tracing::trace!(nonce, latenz_ms = latenz.as_millis() as u64, "Heartbeat bestaetigt");
        Some(latenz)
    }

    pub fn sequence_acknowledged(&self, seq: i64) {
        self.inner.seq_ack.set(seq);
    }

    /// Beendet den Takt (idempotent)
    pub fn stop(&self) {
        self.inner.zustand.lock().gestoppt = true;
        if let Some(task) = self.inner.task.lock().take() {
            task.abort();
            tracing::debug!("Heartbeat gestoppt");
        }
    }

    pub fn latency(&self) -> Option<Duration> {
        self.inner.zustand.lock().latenz
    }

    pub fn missed(&self) -> u32 {
        self.inner.zustand.lock().verpasst
    }

    pub fn seq_ack(&self) -> Option<i64> {
        self.inner.seq_ack.get()
    }

    pub fn snapshot(&self) -> HeartbeatSnapshot {
        let s = self.inner.zustand.lock();
        HeartbeatSnapshot {
            intervall: s.intervall,
            letzter_beat: s.gesendet,
            letzte_bestaetigung: s.bestaetigt,
            letzte_nonce: s.letzte_nonce,
            verpasst: s.verpasst,
            seq_ack: self.inner.seq_ack.get(),
            latenz: s.latenz,
            laeuft: !s.gestoppt && s.intervall.is_some(),
        }
    }
}

impl std::fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeat")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Timer-Task; haelt den Heartbeat nur schwach
async fn takt(schwach: Weak<HeartbeatInner>, intervall: Duration, jitter: Duration) {
    tokio::time::sleep(jitter).await;
    let mut ticker = tokio::time::interval(intervall);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = schwach.upgrade() else {
            break;
        };
        match (Heartbeat { inner }).beat() {
            BeatOutcome::Gesendet { .. } | BeatOutcome::Verpasst { .. } => {}
            BeatOutcome::Reconnect | BeatOutcome::Gestoppt | BeatOutcome::KanalGeschlossen => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
