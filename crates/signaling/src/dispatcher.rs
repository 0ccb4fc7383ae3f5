//! Dispatcher – ordnet jedem eingehenden Opcode genau einen Handler zu
//!
//! Ein `Ablauf` lebt fuer einen einzelnen Verbindungsversuch. Er haelt die
//! Zwischenergebnisse der Aushandlung (Ready, Discovery) und meldet dem
//! Treiber nur die Schritte, die den Zustand aendern.
//!
//! ## Fehler
//! - Ready/SessionDescription ungueltig, kein kompatibler Modus, Discovery
//!   gescheitert: beenden den Versuch (`Err`)
//! - alles andere: `VoiceEvent::Error`, der Versuch laeuft weiter

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voicelink_crypto::{select_mode, CryptoError};
use voicelink_protocol::gateway::{
    ClientCommand, ClientConnect, ClientDisconnect, Ready, RemoteSpeaking, SelectProtocol,
    SessionDescription,
};
use voicelink_protocol::{DiscoveredAddress, EncryptionMode, GatewayEvent, GatewayFrame, OpCode};
use voicelink_voice::MediaResult;

use crate::connection::Shared;
use crate::error::{GatewayError, GatewayResult};
use crate::event::{ReadyInfo, SignalingState, VoiceEvent};
use crate::heartbeat::Heartbeat;
use crate::transport::OutboundFrame;

/// Was der Treiber nach einem Frame tun muss
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Schritt {
    Weiter,
    /// SessionDescription verarbeitet, Medien bereit
    Bereit(ReadyInfo),
    /// Op 9 empfangen
    Fortgesetzt,
}

/// Ergebnis der im Hintergrund laufenden IP-Discovery
pub(crate) type DiscoveryErgebnis = MediaResult<DiscoveredAddress>;

#[derive(Debug, Clone, Copy)]
struct Verhandlung {
    ssrc: u32,
    remote: SocketAddr,
    modus: EncryptionMode,
}

/// Handler-Kontext eines Verbindungsversuchs
pub(crate) struct Ablauf {
    shared: Arc<Shared>,
    heartbeat: Heartbeat,
    ausgang: mpsc::UnboundedSender<OutboundFrame>,
    discovery_tx: mpsc::Sender<DiscoveryErgebnis>,
    discovery: Option<JoinHandle<()>>,
    verhandlung: Option<Verhandlung>,
    externe_adresse: Option<DiscoveredAddress>,
}

impl Ablauf {
    pub(crate) fn neu(
        shared: Arc<Shared>,
        heartbeat: Heartbeat,
        ausgang: mpsc::UnboundedSender<OutboundFrame>,
        discovery_tx: mpsc::Sender<DiscoveryErgebnis>,
    ) -> Self {
        Self {
            shared,
            heartbeat,
            ausgang,
            discovery_tx,
            discovery: None,
            verhandlung: None,
            externe_adresse: None,
        }
    }

    /// Sendet ein Kommando ueber die Steuerkanal-Queue
    pub(crate) fn senden(&self, kommando: ClientCommand) -> GatewayResult<()> {
        let text = kommando.als_text()?;
        tracing::trace!(op = ?kommando.opcode(), "Sende Kommando");
        self.ausgang
            .send(OutboundFrame::Text(text))
            .map_err(|_| GatewayError::KanalGeschlossen)
    }

    /// Verarbeitet ein eingehendes Text-Frame
    pub(crate) fn verarbeiten(&mut self, text: &str) -> GatewayResult<Schritt> {
        let mut frame = match GatewayFrame::aus_text(text) {
            Ok(f) => f,
            Err(e) => {
                self.fehler_melden(e.into());
                return Ok(Schritt::Weiter);
            }
        };
        if let Some(seq) = frame.seq {
            self.heartbeat.sequence_acknowledged(seq);
        }

        let ereignis = GatewayEvent::aus_frame(&frame);
        if frame.opcode() == Some(OpCode::SessionDescription) {
            frame.schluessel_verwerfen();
        }
        let ereignis = match ereignis {
            Ok(e) => e,
            Err(e) => {
                // Ohne gueltiges Ready oder Schluessel kommt der Versuch nicht weiter
                if matches!(
                    frame.opcode(),
                    Some(OpCode::Ready | OpCode::SessionDescription)
                ) {
                    return Err(e.into());
                }
                self.fehler_melden(e.into());
                return Ok(Schritt::Weiter);
            }
        };

        match ereignis {
            GatewayEvent::Hello(h) => {
                tracing::debug!(intervall = h.heartbeat_interval, "Zusaetzliches Hello ignoriert");
                Ok(Schritt::Weiter)
            }
            GatewayEvent::Ready(ready) => {
                self.ready(ready)?;
                Ok(Schritt::Weiter)
            }
            GatewayEvent::SessionDescription(sd) => self.session_description(sd).map(Schritt::Bereit),
            GatewayEvent::Speaking(s) => {
                self.remote_speaking(s);
                Ok(Schritt::Weiter)
            }
            GatewayEvent::HeartbeatAck(ack) => {
                self.heartbeat.acknowledge(ack.nonce, frame.seq);
                Ok(Schritt::Weiter)
            }
            GatewayEvent::Resumed => {
                if self.shared.zustand() != SignalingState::Resuming {
                    self.fehler_melden(GatewayError::UnerwarteteNachricht(
                        "Resumed ohne Resume".into(),
                    ));
                    return Ok(Schritt::Weiter);
                }
                Ok(Schritt::Fortgesetzt)
            }
            GatewayEvent::ClientConnect(c) => {
                self.client_connect(c);
                Ok(Schritt::Weiter)
            }
            GatewayEvent::ClientDisconnect(c) => {
                self.client_disconnect(c);
                Ok(Schritt::Weiter)
            }
            GatewayEvent::Unbekannt { op } => {
                tracing::trace!(op, "Unbekannter Opcode ignoriert");
                Ok(Schritt::Weiter)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Handler
    // -----------------------------------------------------------------------

    /// Op 2: Parameter pruefen, Modus waehlen, Discovery starten
    fn ready(&mut self, ready: Ready) -> GatewayResult<()> {
        if ready.ssrc == 0 {
            return Err(GatewayError::UngueltigeNutzdaten("Ready ohne SSRC".into()));
        }
        if ready.port == 0 {
            return Err(GatewayError::UngueltigeNutzdaten("Ready ohne Port".into()));
        }
        let ip: IpAddr = ready.ip.parse().map_err(|_| {
            GatewayError::UngueltigeNutzdaten(format!("Ready mit ungueltiger IP '{}'", ready.ip))
        })?;
        if ready.modes.is_empty() {
            return Err(GatewayError::UngueltigeNutzdaten("Ready ohne Modi".into()));
        }

        let modus = select_mode(
            &ready.modes,
            self.shared.config.bevorzugter_modus,
            self.shared.media.crypto().backend(),
        )?;
        let remote = SocketAddr::new(ip, ready.port);
        tracing::info!(ssrc = ready.ssrc, remote = %remote, modus = %modus, "Ready empfangen");

        self.shared.zustand_setzen(SignalingState::NegotiatingProtocol);
        self.verhandlung = Some(Verhandlung {
            ssrc: ready.ssrc,
            remote,
            modus,
        });
        self.externe_adresse = None;

        // Discovery darf die Dispatch-Schleife nicht blockieren
        let media = Arc::clone(&self.shared.media);
        let tx = self.discovery_tx.clone();
        let ssrc = ready.ssrc;
        let task = tokio::spawn(async move {
            let ergebnis = media.connect(remote, ssrc).await;
            let _ = tx.send(ergebnis).await;
        });
        if let Some(alt) = self.discovery.replace(task) {
            alt.abort();
        }
        Ok(())
    }

    /// Discovery fertig: SelectProtocol (Op 1) senden
    pub(crate) fn discovery_abgeschlossen(&mut self, ergebnis: DiscoveryErgebnis) -> GatewayResult<()> {
        self.discovery = None;
        let adresse = ergebnis?;
        let verhandlung = self.verhandlung.ok_or_else(|| {
            GatewayError::UnerwarteteNachricht("Discovery ohne Ready".into())
        })?;

        self.senden(ClientCommand::SelectProtocol(SelectProtocol::udp(
            adresse.ip.clone(),
            adresse.port,
            verhandlung.modus.name(),
        )))?;
        tracing::debug!(adresse = %adresse, modus = %verhandlung.modus, "SelectProtocol gesendet");
        self.externe_adresse = Some(adresse);
        Ok(())
    }

    /// Op 4: Schluessel uebernehmen
    fn session_description(&mut self, sd: SessionDescription) -> GatewayResult<ReadyInfo> {
        let (Some(verhandlung), Some(externe_adresse)) =
            (self.verhandlung, self.externe_adresse.clone())
        else {
            return Err(GatewayError::UnerwarteteNachricht(
                "SessionDescription vor SelectProtocol".into(),
            ));
        };

        let modus: EncryptionMode = sd
            .mode
            .parse()
            .map_err(|_| CryptoError::NichtUnterstuetzterModus(sd.mode.clone()))?;
        if modus != verhandlung.modus {
            tracing::warn!(
                gewaehlt = %verhandlung.modus,
                server = %modus,
                "Server bestaetigt anderen Modus"
            );
        }
        self.shared.media.set_encryption(modus, &sd.secret_key)?;

        Ok(ReadyInfo {
            ssrc: verhandlung.ssrc,
            remote: verhandlung.remote,
            externe_adresse,
            modus,
        })
    }

    /// Op 5 eines anderen Teilnehmers
    fn remote_speaking(&self, s: RemoteSpeaking) {
        let Some(user_id) = s.user_id else {
            tracing::trace!(ssrc = s.ssrc, "Speaking ohne user_id ignoriert");
            return;
        };
        self.shared
            .remote
            .speaking_aktualisieren(user_id, s.ssrc, s.speaking);
        self.shared.ereignis(VoiceEvent::RemoteSpeaking {
            user_id,
            ssrc: s.ssrc,
            flags: s.speaking,
        });
    }

    fn client_connect(&self, c: ClientConnect) {
        for user_id in &c.user_ids {
            self.shared.remote.verbunden(*user_id);
        }
        self.shared.ereignis(VoiceEvent::ClientConnected {
            user_ids: c.user_ids,
        });
    }

    fn client_disconnect(&self, c: ClientDisconnect) {
        self.shared.remote.entfernen(&c.user_id);
        self.shared.ereignis(VoiceEvent::ClientDisconnected { user_id: c.user_id });
    }

    fn fehler_melden(&self, fehler: GatewayError) {
        tracing::warn!(fehler = %fehler, "Nachricht nicht verarbeitet");
        self.shared.ereignis(VoiceEvent::Error(Arc::new(fehler)));
    }
}

impl Drop for Ablauf {
    fn drop(&mut self) {
        if let Some(task) = self.discovery.take() {
            task.abort();
        }
    }
}
