//! Voice-Verbindung – State Machine des Steuerkanals
//!
//! `VoiceConnection` ist das Handle fuer den Aufrufer. Die eigentliche
//! Arbeit macht ein Treiber-Task pro Verbindung; er ist der einzige, der
//! den `SignalingState` schreibt, solange er laeuft.
//!
//! ## Ablauf eines Versuchs
//! ```text
//! Connecting -> AwaitingHello --Hello--> Identifying -> AwaitingReady
//!     --Ready--> NegotiatingProtocol --Discovery--> SelectProtocol
//!     --SessionDescription--> Ready
//! AwaitingHello --Hello (Resume moeglich)--> Resuming --Resumed--> Ready
//! ```
//!
//! ## Nach einem Abbruch
//! - Close-Code 4014: Sitzung beendet (Disconnected)
//! - nicht fortsetzbare Codes: neuer Versuch mit Identify
//! - alle anderen Codes und Heartbeat-Timeout (1006): Resume
//! - Wartezeit laut Backoff; nach `max_reconnect_versuche`: Failed
//!
//! Solange der erste `connect` noch wartet, fuehrt jeder Abbruch direkt zu
//! Failed und wird dem Aufrufer zurueckgegeben.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use voicelink_core::Session;
use voicelink_crypto::{AeadBackend, RustCryptoBackend};
use voicelink_protocol::gateway::{ClientCommand, Identify, Resume};
use voicelink_protocol::{
    CloseAction, GatewayEvent, GatewayFrame, OpCode, SpeakingFlags, HEARTBEAT_TIMEOUT_CODE,
};
use voicelink_voice::{MediaEvent, MediaStats, MediaTransport, RemoteSpeakers, SpeakingTracker};
use zeroize::Zeroizing;

use crate::config::VoiceConfig;
use crate::dispatcher::{Ablauf, Schritt};
use crate::error::{GatewayError, GatewayResult};
use crate::event::{EventReceiver, EventSender, ReadyInfo, SignalingState, VoiceEvent};
use crate::heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatSnapshot, SeqAck};
use crate::reconnect::Backoff;
use crate::transport::{ChannelConnector, InboundFrame, OutboundFrame};

/// Close-Code beim lokalen Trennen (Sitzung endet)
const CLOSE_NORMAL: u16 = 1000;
/// Close-Code beim Neuaufbau (Sitzung bleibt fortsetzbar)
const CLOSE_NEUAUFBAU: u16 = 4000;

// ---------------------------------------------------------------------------
// Geteilter Zustand
// ---------------------------------------------------------------------------

/// Laufzeitdaten, die zwischen Handle und Treiber geteilt werden
#[derive(Default)]
struct Laufzeit {
    session: Option<Session>,
    ausgang: Option<mpsc::UnboundedSender<OutboundFrame>>,
    heartbeat: Option<Heartbeat>,
    ready: Option<ReadyInfo>,
    treiber: Option<JoinHandle<()>>,
    weiterleitung: Option<JoinHandle<()>>,
}

pub(crate) struct Shared {
    pub(crate) config: VoiceConfig,
    connector: Arc<dyn ChannelConnector>,
    pub(crate) media: Arc<MediaTransport>,
    pub(crate) speaking: SpeakingTracker,
    pub(crate) remote: RemoteSpeakers,
    seq_ack: SeqAck,
    zustand: watch::Sender<SignalingState>,
    events: EventSender,
    laufzeit: Mutex<Laufzeit>,
    medien_rx: Mutex<Option<mpsc::UnboundedReceiver<MediaEvent>>>,
}

impl Shared {
    pub(crate) fn zustand(&self) -> SignalingState {
        *self.zustand.borrow()
    }

    pub(crate) fn zustand_setzen(&self, neu: SignalingState) {
        let alt = self.zustand.send_replace(neu);
        if alt != neu {
            tracing::debug!(von = ?alt, nach = ?neu, "Zustandswechsel");
        }
    }

    pub(crate) fn ereignis(&self, ereignis: VoiceEvent) {
        // Kein Empfaenger mehr: Aufrufer interessiert sich nicht fuer Ereignisse
        let _ = self.events.send(ereignis);
    }

    fn text_senden(&self, text: String) -> GatewayResult<()> {
        let laufzeit = self.laufzeit.lock();
        let ausgang = laufzeit.ausgang.as_ref().ok_or(GatewayError::NichtBereit)?;
        ausgang
            .send(OutboundFrame::Text(text))
            .map_err(|_| GatewayError::KanalGeschlossen)
    }

    /// Beendet Heartbeat und Steuerkanal des aktuellen Versuchs
    fn kanal_abbauen(&self, code: u16, grund: &str) {
        let mut laufzeit = self.laufzeit.lock();
        if let Some(hb) = laufzeit.heartbeat.as_ref() {
            hb.stop();
        }
        if let Some(ausgang) = laufzeit.ausgang.take() {
            let _ = ausgang.send(OutboundFrame::Close {
                code,
                grund: grund.to_string(),
            });
        }
    }

    /// Verwirft Mediensitzung, Schluessel und Teilnehmerliste
    fn medien_verwerfen(&self) {
        self.media.disconnect();
        self.speaking.reset();
        self.remote.leeren();
        self.seq_ack.reset();
        self.laufzeit.lock().ready = None;
    }
}

// ---------------------------------------------------------------------------
// VoiceConnection
// ---------------------------------------------------------------------------

/// Handle einer Voice-Verbindung
pub struct VoiceConnection {
    inner: Arc<Shared>,
}

impl VoiceConnection {
    /// Erstellt eine nicht verbundene Verbindung mit dem RustCrypto-Backend
    pub fn neu(config: VoiceConfig, connector: Arc<dyn ChannelConnector>) -> (Self, EventReceiver) {
        Self::mit_backend(config, connector, Arc::new(RustCryptoBackend))
    }

    /// Wie `neu`, mit eigenem AEAD-Backend
    pub fn mit_backend(
        config: VoiceConfig,
        connector: Arc<dyn ChannelConnector>,
        backend: Arc<dyn AeadBackend>,
    ) -> (Self, EventReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (medien_tx, medien_rx) = mpsc::unbounded_channel();
        let (zustand, _) = watch::channel(SignalingState::Disconnected);

        let inner = Arc::new(Shared {
            media: Arc::new(MediaTransport::neu(config.media.clone(), backend, medien_tx)),
            speaking: SpeakingTracker::neu(config.speaking_drossel()),
            remote: RemoteSpeakers::neu(),
            seq_ack: SeqAck::default(),
            config,
            connector,
            zustand,
            events: events_tx,
            laufzeit: Mutex::new(Laufzeit::default()),
            medien_rx: Mutex::new(Some(medien_rx)),
        });
        (Self { inner }, events_rx)
    }

    /// Baut die Verbindung auf und wartet bis Ready
    ///
    /// Mit `resume = true` wird eine bestehende Sitzung fortgesetzt, sofern
    /// das moeglich ist; sonst folgt eine frische Identify-Sequenz.
    /// Ein bereits laufender Treiber wird vorher beendet.
    pub async fn connect(&self, session: Session, resume: bool) -> GatewayResult<ReadyInfo> {
        self.inner.config.validieren()?;
        session.validieren()?;

        self.treiber_beenden(CLOSE_NEUAUFBAU, "Neuaufbau").await;
        self.weiterleitung_starten();

        let resume = {
            let mut laufzeit = self.inner.laufzeit.lock();
            let gleiche_sitzung = laufzeit
                .session
                .as_ref()
                .is_some_and(|alt| alt.session_id == session.session_id);
            laufzeit.session = Some(session.clone());
            resume && gleiche_sitzung
        };
        tracing::info!(
            server_id = %session.server_id,
            endpoint = session.endpoint_host(),
            resume,
            "Verbinde Voice-Gateway"
        );

        let (ergebnis_tx, ergebnis_rx) = oneshot::channel();
        let treiber = Treiber {
            backoff: Backoff::from(&self.inner.config),
            shared: Arc::clone(&self.inner),
            session,
            ergebnis: Some(ergebnis_tx),
        };
        let handle = tokio::spawn(treiber.laufen(resume));
        self.inner.laufzeit.lock().treiber = Some(handle);

        match ergebnis_rx.await {
            Ok(ergebnis) => ergebnis,
            Err(_) => Err(GatewayError::Getrennt("Verbindungsaufbau abgebrochen".into())),
        }
    }

    /// Trennt die Verbindung (idempotent)
    ///
    /// Beendet Treiber, Heartbeat, Discovery und Empfangs-Task und verwirft
    /// das Schluesselmaterial, bevor die Methode zurueckkehrt.
    pub async fn disconnect(&self, grund: &str) {
        self.treiber_beenden(CLOSE_NORMAL, grund).await;
        self.inner.medien_verwerfen();
        self.inner.laufzeit.lock().session = None;

        if self.inner.zustand() != SignalingState::Disconnected {
            self.inner.zustand_setzen(SignalingState::Disconnected);
            tracing::info!(grund, "Voice-Verbindung getrennt");
            self.inner.ereignis(VoiceEvent::Disconnected {
                grund: grund.to_string(),
                code: None,
            });
        }
    }

    /// Sendet ein beliebiges Frame ueber den Steuerkanal (nur im Zustand Ready)
    pub fn send<T: Serialize>(&self, op: OpCode, nutzdaten: &T) -> GatewayResult<()> {
        if self.state() != SignalingState::Ready {
            return Err(GatewayError::NichtBereit);
        }
        let text = GatewayFrame::neu(op, nutzdaten)?.als_text()?;
        self.inner.text_senden(text)
    }

    /// Sendet einen Opus-Frame; kuendigt vorher Speaking an, falls noetig
    pub async fn send_audio(&self, frame: &[u8]) -> GatewayResult<()> {
        if self.state() != SignalingState::Ready || !self.inner.media.crypto().is_initialized() {
            return Err(GatewayError::NichtBereit);
        }
        let ssrc = self.inner.media.ssrc().ok_or(GatewayError::NichtBereit)?;

        if let Some(payload) = self
            .inner
            .speaking
            .ensure_speaking_before_transmission(ssrc, SpeakingFlags::MICROPHONE)
        {
            let ergebnis = ClientCommand::Speaking(payload)
                .als_text()
                .map_err(GatewayError::from)
                .and_then(|text| self.inner.text_senden(text));
            if let Err(e) = ergebnis {
                // Ankuendigung nicht raus: beim naechsten Frame erneut versuchen
                self.inner.speaking.reset();
                return Err(e);
            }
        }

        self.inner.media.send(frame).await?;
        Ok(())
    }

    /// Explizite Speaking-Ankuendigung
    ///
    /// Gibt `true` zurueck, wenn eine Ankuendigung gesendet wurde, `false`
    /// wenn sie gedrosselt wurde.
    pub fn set_speaking(&self, flags: SpeakingFlags, delay: u32, force: bool) -> GatewayResult<bool> {
        if self.state() != SignalingState::Ready {
            return Err(GatewayError::NichtBereit);
        }
        let ssrc = self.inner.media.ssrc().ok_or(GatewayError::NichtBereit)?;
        match self.inner.speaking.set_speaking(flags, ssrc, delay, force) {
            Some(payload) => {
                self.inner
                    .text_senden(ClientCommand::Speaking(payload).als_text()?)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn state(&self) -> SignalingState {
        self.inner.zustand()
    }

    /// Abonniert Zustandswechsel
    pub fn zustand_abonnieren(&self) -> watch::Receiver<SignalingState> {
        self.inner.zustand.subscribe()
    }

    /// Zuletzt gemessene Heartbeat-Latenz
    pub fn latency(&self) -> Option<Duration> {
        self.inner
            .laufzeit
            .lock()
            .heartbeat
            .as_ref()
            .and_then(Heartbeat::latency)
    }

    pub fn heartbeat(&self) -> Option<HeartbeatSnapshot> {
        self.inner
            .laufzeit
            .lock()
            .heartbeat
            .as_ref()
            .map(Heartbeat::snapshot)
    }

    pub fn media_stats(&self) -> MediaStats {
        self.inner.media.stats()
    }

    /// Parameter der aktuellen Mediensitzung
    pub fn ready_info(&self) -> Option<ReadyInfo> {
        self.inner.laufzeit.lock().ready.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.laufzeit.lock().session.clone()
    }

    pub fn remote_speakers(&self) -> RemoteSpeakers {
        self.inner.remote.clone()
    }

    /// Lokale Adresse des UDP-Sockets, solange eine Mediensitzung besteht
    pub fn lokale_medien_adresse(&self) -> Option<std::net::SocketAddr> {
        self.inner.media.lokale_adresse()
    }

    /// Bricht einen laufenden Treiber ab und wartet auf sein Ende
    async fn treiber_beenden(&self, code: u16, grund: &str) {
        let handle = self.inner.laufzeit.lock().treiber.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            tracing::debug!("Treiber beendet");
        }
        self.inner.kanal_abbauen(code, grund);
    }

    /// Leitet empfangenes Audio als `VoiceEvent::AudioReceived` weiter
    fn weiterleitung_starten(&self) {
        let Some(mut rx) = self.inner.medien_rx.lock().take() else {
            return;
        };
        let events = self.inner.events.clone();
        let remote = self.inner.remote.clone();
        let handle = tokio::spawn(async move {
            while let Some(ereignis) = rx.recv().await {
                let MediaEvent::AudioPacket {
                    ssrc,
                    sequence,
                    timestamp,
                    payload,
                } = ereignis;
                let ereignis = VoiceEvent::AudioReceived {
                    ssrc,
                    user_id: remote.user_fuer_ssrc(ssrc),
                    sequence,
                    timestamp,
                    payload,
                };
                if events.send(ereignis).is_err() {
                    break;
                }
            }
        });
        self.inner.laufzeit.lock().weiterleitung = Some(handle);
    }
}

impl Drop for VoiceConnection {
    fn drop(&mut self) {
        let mut laufzeit = self.inner.laufzeit.lock();
        if let Some(handle) = laufzeit.treiber.take() {
            handle.abort();
        }
        if let Some(handle) = laufzeit.weiterleitung.take() {
            handle.abort();
        }
        drop(laufzeit);
        self.inner.kanal_abbauen(CLOSE_NORMAL, "Verbindung verworfen");
        self.inner.media.disconnect();
    }
}

impl std::fmt::Debug for VoiceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceConnection")
            .field("zustand", &self.state())
            .field("session", &self.session())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Treiber
// ---------------------------------------------------------------------------

/// Wie ein einzelner Versuch endete
enum VersuchsEnde {
    Geschlossen { code: u16, grund: String },
    HeartbeatTimeout,
    Fehler(GatewayError),
}

struct Treiber {
    shared: Arc<Shared>,
    session: Session,
    backoff: Backoff,
    /// Wartender `connect`-Aufruf
    ergebnis: Option<oneshot::Sender<GatewayResult<ReadyInfo>>>,
}

impl Treiber {
    async fn laufen(mut self, mut resume: bool) {
        loop {
            let ende = self.versuch(resume).await;
            self.shared.kanal_abbauen(CLOSE_NEUAUFBAU, "Neuaufbau");

            let (fehler, code) = match ende {
                VersuchsEnde::Geschlossen { code, grund } => {
                    tracing::info!(code, grund = %grund, "Steuerkanal geschlossen");
                    match CloseAction::fuer_code(code) {
                        CloseAction::Getrennt => {
                            self.getrennt(code, grund);
                            return;
                        }
                        CloseAction::Identify => resume = false,
                        CloseAction::Resume => resume = true,
                    }
                    (GatewayError::Geschlossen { code, grund }, Some(code))
                }
                VersuchsEnde::HeartbeatTimeout => {
                    resume = true;
                    let fehler = GatewayError::Geschlossen {
                        code: HEARTBEAT_TIMEOUT_CODE,
                        grund: "Heartbeat-Timeout".into(),
                    };
                    (fehler, Some(HEARTBEAT_TIMEOUT_CODE))
                }
                VersuchsEnde::Fehler(e) => {
                    tracing::warn!(fehler = %e, "Verbindungsversuch fehlgeschlagen");
                    if e.ist_terminal() {
                        self.scheitern(e);
                        return;
                    }
                    (e, None)
                }
            };

            if self.ergebnis.is_some() {
                self.scheitern(fehler);
                return;
            }

            let Some(verzoegerung) = self.backoff.naechster() else {
                let versuche = self.backoff.versuch();
                self.scheitern(GatewayError::VersucheErschoepft { versuche });
                return;
            };
            let versuch = self.backoff.versuch();
            self.shared.zustand_setzen(SignalingState::Reconnecting);
            tracing::info!(
                versuch,
                verzoegerung_ms = verzoegerung.as_millis() as u64,
                resume,
                "Reconnect geplant"
            );
            self.shared.ereignis(VoiceEvent::Reconnecting {
                versuch,
                verzoegerung,
                code,
            });
            tokio::time::sleep(verzoegerung).await;
        }
    }

    /// Ein vollstaendiger Verbindungsversuch bis zum Ende des Kanals
    async fn versuch(&mut self, resume: bool) -> VersuchsEnde {
        let config = &self.shared.config;
        self.shared.zustand_setzen(SignalingState::Connecting);
        self.shared.ereignis(VoiceEvent::Connecting { resume });

        let url = self.session.gateway_url(config.gateway_version);
        let frist = tokio::time::Instant::now() + config.connect_timeout();

        let mut kanal = match tokio::time::timeout_at(frist, self.shared.connector.open(&url)).await {
            Ok(Ok(kanal)) => kanal,
            Ok(Err(e)) => return VersuchsEnde::Fehler(e),
            Err(_) => {
                return VersuchsEnde::Fehler(GatewayError::Zeitlimit(
                    "Verbindungsaufbau".into(),
                ))
            }
        };
        self.shared.laufzeit.lock().ausgang = Some(kanal.ausgang.clone());
        self.shared.zustand_setzen(SignalingState::AwaitingHello);

        let hello_warten = hello_abwarten(&mut kanal.eingang, &self.shared.seq_ack);
        let intervall_ms = match tokio::time::timeout_at(frist, hello_warten).await {
            Ok(Ok(intervall_ms)) => intervall_ms,
            Ok(Err(ende)) => return ende,
            Err(_) => return VersuchsEnde::Fehler(GatewayError::Zeitlimit("Hello".into())),
        };

        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let heartbeat = Heartbeat::mit_seq_ack(
            HeartbeatConfig::from(config),
            kanal.ausgang.clone(),
            signal_tx,
            self.shared.seq_ack.clone(),
        );
        heartbeat.start(intervall_ms);
        self.shared.laufzeit.lock().heartbeat = Some(heartbeat.clone());

        let (discovery_tx, mut discovery_rx) = mpsc::channel(1);
        let mut ablauf = Ablauf::neu(
            Arc::clone(&self.shared),
            heartbeat,
            kanal.ausgang.clone(),
            discovery_tx,
        );

        if let Err(e) = self.anmelden(&ablauf, resume) {
            return VersuchsEnde::Fehler(e);
        }

        loop {
            tokio::select! {
                frame = kanal.eingang.recv() => match frame {
                    Some(InboundFrame::Text(text)) => {
                        // Kann den Sitzungsschluessel enthalten
                        let text = Zeroizing::new(text);
                        match ablauf.verarbeiten(&text) {
                            Ok(Schritt::Weiter) => {}
                            Ok(Schritt::Bereit(info)) => self.bereit(info),
                            Ok(Schritt::Fortgesetzt) => self.fortgesetzt(),
                            Err(e) => return VersuchsEnde::Fehler(e),
                        }
                    }
                    Some(InboundFrame::Closed { code, grund }) => {
                        return VersuchsEnde::Geschlossen { code, grund };
                    }
                    None => {
                        return VersuchsEnde::Geschlossen {
                            code: HEARTBEAT_TIMEOUT_CODE,
                            grund: "Steuerkanal beendet".into(),
                        };
                    }
                },
                Some(ergebnis) = discovery_rx.recv() => {
                    if let Err(e) = ablauf.discovery_abgeschlossen(ergebnis) {
                        return VersuchsEnde::Fehler(e);
                    }
                }
                Some(_) = signal_rx.recv() => {
                    return VersuchsEnde::HeartbeatTimeout;
                }
            }
        }
    }

    /// Identify (Op 0) oder Resume (Op 7)
    fn anmelden(&self, ablauf: &Ablauf, resume: bool) -> GatewayResult<()> {
        let seq_ack = self.shared.seq_ack.get();
        let fortsetzbar = resume
            && self.session.ist_fortsetzbar()
            && self.shared.media.ist_verbunden()
            && self.shared.laufzeit.lock().ready.is_some();

        if let (true, Some(seq_ack)) = (fortsetzbar, seq_ack) {
            self.shared.zustand_setzen(SignalingState::Resuming);
            tracing::debug!(seq_ack, "Sende Resume");
            return ablauf.senden(ClientCommand::Resume(Resume {
                server_id: self.session.server_id,
                session_id: self.session.session_id.clone(),
                token: self.session.token.clone(),
                seq_ack,
            }));
        }

        if resume {
            tracing::info!("Resume nicht moeglich, neue Sitzung");
        }
        self.shared.medien_verwerfen();
        self.shared.zustand_setzen(SignalingState::Identifying);
        ablauf.senden(ClientCommand::Identify(Identify {
            server_id: self.session.server_id,
            user_id: self.session.user_id,
            session_id: self.session.session_id.clone(),
            token: self.session.token.clone(),
        }))?;
        self.shared.zustand_setzen(SignalingState::AwaitingReady);
        Ok(())
    }

    fn bereit(&mut self, info: ReadyInfo) {
        self.backoff.zuruecksetzen();
        self.shared.laufzeit.lock().ready = Some(info.clone());
        self.shared.zustand_setzen(SignalingState::Ready);
        tracing::info!(
            ssrc = info.ssrc,
            modus = %info.modus,
            externe_adresse = %info.externe_adresse,
            "Voice-Verbindung bereit"
        );
        self.shared.ereignis(VoiceEvent::Ready(info.clone()));
        if let Some(tx) = self.ergebnis.take() {
            let _ = tx.send(Ok(info));
        }
    }

    fn fortgesetzt(&mut self) {
        self.backoff.zuruecksetzen();
        self.shared.zustand_setzen(SignalingState::Ready);
        tracing::info!("Sitzung fortgesetzt");
        self.shared.ereignis(VoiceEvent::Resumed);

        if let Some(tx) = self.ergebnis.take() {
            let info = self.shared.laufzeit.lock().ready.clone();
            let _ = tx.send(info.ok_or_else(|| {
                GatewayError::UnerwarteteNachricht("Resumed ohne Mediensitzung".into())
            }));
        }
    }

    /// Terminal: Failed
    fn scheitern(&mut self, fehler: GatewayError) {
        self.shared.medien_verwerfen();
        self.shared.zustand_setzen(SignalingState::Failed);
        tracing::error!(fehler = %fehler, "Voice-Verbindung fehlgeschlagen");
        self.shared.ereignis(VoiceEvent::Failed {
            grund: fehler.to_string(),
        });
        if let Some(tx) = self.ergebnis.take() {
            let _ = tx.send(Err(fehler));
        }
    }

    /// Terminal: vom Server getrennt (4014)
    fn getrennt(&mut self, code: u16, grund: String) {
        self.shared.medien_verwerfen();
        self.shared.zustand_setzen(SignalingState::Disconnected);
        self.shared.ereignis(VoiceEvent::Disconnected {
            grund: grund.clone(),
            code: Some(code),
        });
        if let Some(tx) = self.ergebnis.take() {
            let _ = tx.send(Err(GatewayError::Getrennt(grund)));
        }
    }
}

/// Wartet auf das erste Frame; es muss Hello sein
async fn hello_abwarten(
    eingang: &mut mpsc::UnboundedReceiver<InboundFrame>,
    seq_ack: &SeqAck,
) -> Result<u64, VersuchsEnde> {
    match eingang.recv().await {
        Some(InboundFrame::Text(text)) => {
            let frame = GatewayFrame::aus_text(&text)
                .map_err(|e| VersuchsEnde::Fehler(e.into()))?;
            if let Some(seq) = frame.seq {
                seq_ack.set(seq);
            }
            match GatewayEvent::aus_frame(&frame) {
                Ok(GatewayEvent::Hello(hello)) => {
                    tracing::debug!(intervall = hello.heartbeat_interval, "Hello empfangen");
                    hello.intervall_ms().map_err(|e| {
                        VersuchsEnde::Fehler(GatewayError::UngueltigeNutzdaten(e.to_string()))
                    })
                }
                Ok(_) => Err(VersuchsEnde::Fehler(GatewayError::UnerwarteteNachricht(
                    format!("Op {} vor Hello", frame.op),
                ))),
                Err(e) => Err(VersuchsEnde::Fehler(e.into())),
            }
        }
        Some(InboundFrame::Closed { code, grund }) => Err(VersuchsEnde::Geschlossen { code, grund }),
        None => Err(VersuchsEnde::Geschlossen {
            code: HEARTBEAT_TIMEOUT_CODE,
            grund: "Steuerkanal vor Hello beendet".into(),
        }),
    }
}
