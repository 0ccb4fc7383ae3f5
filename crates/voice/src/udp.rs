//! Media Transport – UDP-Socket, IP-Discovery und RTP-Pakete
//!
//! Bindet einen UDP-Socket, ermittelt per IP-Discovery die externe Adresse,
//! verschluesselt ausgehende Opus-Frames und reicht entschluesselte
//! eingehende Pakete als `MediaEvent` weiter.
//!
//! ## Architektur
//!
//! ```text
//! send(opus)
//!     |
//!     v
//! RtpZaehler::naechster()     <- Sequenz/Zeitstempel unter Lock
//!     |
//!     v
//! EncryptionService::encrypt  <- Header als AAD
//!     |
//!     v
//! UdpSocket::send_to(remote)
//!
//! UdpSocket::recv_from  (Empfangs-Task)
//!     |
//!     v
//! Absender == remote? Version 2? kein RTCP?
//!     |
//!     v
//! EncryptionService::decrypt  <- Fehler: still verwerfen
//!     |
//!     v
//! MediaEvent::AudioPacket --> mpsc
//! ```
//!
//! Eine `MediaSession` wird bei jedem `connect` neu erzeugt und nie
//! in-place umgebaut; ein Resume behaelt die bestehende Sitzung.
//! Jedes `disconnect` erhoeht die Generation; ein `connect`, dessen
//! Generation inzwischen veraltet ist, installiert keine Sitzung mehr.

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use voicelink_crypto::{AeadBackend, EncryptionService};
use voicelink_protocol::discovery::{self, DiscoveredAddress};
use voicelink_protocol::rtp::{self, RtpHeader, HEADER_GROESSE};
use voicelink_protocol::EncryptionMode;

use crate::error::{MediaError, MediaResult};
use crate::telemetry::{MediaStats, MediaTelemetrie};

/// Maximale UDP-Paketgroesse (MTU-Puffer)
const UDP_BUFFER_SIZE: usize = 1500;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration des Medienkanals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Lokale Bind-Adresse (Port 0 = OS waehlt)
    pub bind_adresse: SocketAddr,
    /// Zeitlimit fuer die IP-Discovery in Millisekunden
    pub discovery_timeout_ms: u64,
    /// Zeitstempel-Schritt pro Frame (48 kHz * 20 ms = 960)
    pub samples_pro_frame: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            bind_adresse: SocketAddr::from(([0, 0, 0, 0], 0)),
            discovery_timeout_ms: 2000,
            samples_pro_frame: 960,
        }
    }
}

impl MediaConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Ereignisse aus der Empfangs-Loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Entschluesseltes Audio-Paket eines Teilnehmers
    AudioPacket {
        ssrc: u32,
        sequence: u16,
        timestamp: u32,
        payload: Bytes,
    },
}

// ---------------------------------------------------------------------------
// RTP-Zaehler
// ---------------------------------------------------------------------------

/// Sequenz und Zeitstempel einer Mediensitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct RtpZaehler {
    pub(crate) sequence: u16,
    pub(crate) timestamp: u32,
}

impl RtpZaehler {
    /// Liefert den Header fuer das naechste Paket und rueckt weiter
    pub(crate) fn naechster(&mut self, ssrc: u32, samples: u32) -> RtpHeader {
        let header = RtpHeader::new(self.sequence, self.timestamp, ssrc);
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(samples);
        header
    }
}

// ---------------------------------------------------------------------------
// MediaSession
// ---------------------------------------------------------------------------

/// Aktive Sitzung: Socket, Gegenstelle, SSRC und Zaehler
struct MediaSession {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    ssrc: u32,
    extern_adresse: DiscoveredAddress,
    zaehler: RtpZaehler,
    shutdown_tx: Option<oneshot::Sender<()>>,
    empfangs_task: JoinHandle<()>,
}

impl MediaSession {
    fn beenden(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.empfangs_task.abort();
    }
}

// ---------------------------------------------------------------------------
// MediaTransport
// ---------------------------------------------------------------------------

/// UDP-Medienkanal einer Voice-Verbindung
pub struct MediaTransport {
    config: MediaConfig,
    crypto: Arc<EncryptionService>,
    sitzung: Mutex<Option<MediaSession>>,
    /// Wird nur unter dem `sitzung`-Lock veraendert
    generation: AtomicU64,
    events: mpsc::UnboundedSender<MediaEvent>,
    telemetrie: Arc<MediaTelemetrie>,
}

impl MediaTransport {
    /// Erstellt einen nicht verbundenen Transport
    pub fn neu(
        config: MediaConfig,
        backend: Arc<dyn AeadBackend>,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Self {
        Self {
            config,
            crypto: Arc::new(EncryptionService::neu(backend)),
            sitzung: Mutex::new(None),
            generation: AtomicU64::new(0),
            events,
            telemetrie: Arc::new(MediaTelemetrie::default()),
        }
    }

    /// Bindet den Socket, fuehrt die IP-Discovery aus und startet die
    /// Empfangs-Loop
    ///
    /// Eine bestehende Sitzung wird vorher beendet. Trennt ein anderer
    /// Aufrufer waehrend der Discovery, endet `connect` mit `Abgebrochen`.
    pub async fn connect(&self, remote: SocketAddr, ssrc: u32) -> MediaResult<DiscoveredAddress> {
        self.disconnect();
        let generation = self.generation.load(Ordering::SeqCst);

        let socket = UdpSocket::bind(self.config.bind_adresse).await?;
        tracing::debug!(
            lokal = %socket.local_addr()?,
            remote = %remote,
            ssrc,
            "UDP-Socket gebunden"
        );

        let extern_adresse = self.discovery(&socket, remote, ssrc).await?;
        tracing::info!(externe_adresse = %extern_adresse, ssrc, "IP-Discovery abgeschlossen");

        let mut guard = self.sitzung.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(ssrc, "Mediensitzung waehrend Discovery getrennt");
            return Err(MediaError::Abgebrochen);
        }

        let socket = Arc::new(socket);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let empfangs_task = tokio::spawn(empfangs_loop(
            Arc::clone(&socket),
            remote,
            Arc::clone(&self.crypto),
            self.events.clone(),
            Arc::clone(&self.telemetrie),
            shutdown_rx,
        ));

        let alt = guard.replace(MediaSession {
            socket,
            remote,
            ssrc,
            extern_adresse: extern_adresse.clone(),
            zaehler: RtpZaehler::default(),
            shutdown_tx: Some(shutdown_tx),
            empfangs_task,
        });
        drop(guard);
        if let Some(alt) = alt {
            alt.beenden();
        }

        Ok(extern_adresse)
    }

    /// Sendet die Discovery-Anfrage und wartet auf eine gueltige Antwort
    ///
    /// Datagramme anderer Absender und ungueltige Antworten werden
    /// ignoriert, bis das Zeitlimit ablaeuft.
    async fn discovery(
        &self,
        socket: &UdpSocket,
        remote: SocketAddr,
        ssrc: u32,
    ) -> MediaResult<DiscoveredAddress> {
        socket
            .send_to(&discovery::anfrage_kodieren(ssrc), remote)
            .await?;

        let warten = async {
            let mut buf = [0u8; UDP_BUFFER_SIZE];
            loop {
                let (len, absender) = socket.recv_from(&mut buf).await?;
                if absender != remote {
                    self.telemetrie.fremdes_datagramm();
                    tracing::debug!(absender = %absender, "Discovery: fremder Absender ignoriert");
                    continue;
                }
                match discovery::antwort_dekodieren(&buf[..len]) {
                    Ok(adresse) => return Ok::<_, MediaError>(adresse),
                    Err(e) => {
                        tracing::debug!(fehler = %e, bytes = len, "Discovery: ungueltige Antwort ignoriert");
                    }
                }
            }
        };

        match tokio::time::timeout(self.config.discovery_timeout(), warten).await {
            Ok(ergebnis) => ergebnis,
            Err(_) => Err(MediaError::DiscoveryTimeout {
                ms: self.config.discovery_timeout_ms,
            }),
        }
    }

    /// Initialisiert die Verschluesselung aus der SessionDescription
    pub fn set_encryption(&self, modus: EncryptionMode, schluessel: &[u8]) -> MediaResult<()> {
        self.crypto.initialize(modus, schluessel)?;
        Ok(())
    }

    /// Verschluesselt und sendet einen Opus-Frame
    ///
    /// Sequenz und Zeitstempel ruecken bei jedem Aufruf weiter, auch wenn
    /// Verschluesselung oder Senden fehlschlagen.
    pub async fn send(&self, opus: &[u8]) -> MediaResult<()> {
        let (socket, remote, header) = {
            let mut guard = self.sitzung.lock();
            let sitzung = guard.as_mut().ok_or(MediaError::NichtVerbunden)?;
            let header = sitzung
                .zaehler
                .naechster(sitzung.ssrc, self.config.samples_pro_frame);
            (Arc::clone(&sitzung.socket), sitzung.remote, header)
        };

        let header = header.encode();
        let versiegelt = match self.crypto.encrypt(&header, opus) {
            Ok(v) => v,
            Err(e) => {
                self.telemetrie.sende_fehler();
                return Err(e.into());
            }
        };

        let mut paket = BytesMut::with_capacity(HEADER_GROESSE + versiegelt.len());
        paket.put_slice(&header);
        paket.put_slice(&versiegelt);

        match socket.send_to(&paket, remote).await {
            Ok(n) => {
                self.telemetrie.gesendet(n);
                Ok(())
            }
            Err(e) => {
                self.telemetrie.sende_fehler();
                tracing::warn!(fehler = %e, ziel = %remote, "UDP-Sendefehler");
                Err(MediaError::Senden(e))
            }
        }
    }

    /// Schliesst den Socket, beendet die Empfangs-Loop und verwirft den
    /// Schluessel. Ohne aktive Sitzung ein No-op.
    pub fn disconnect(&self) {
        let sitzung = {
            let mut guard = self.sitzung.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            guard.take()
        };
        if let Some(sitzung) = sitzung {
            tracing::debug!(ssrc = sitzung.ssrc, "Mediensitzung beendet");
            sitzung.beenden();
        }
        self.crypto.clear();
    }

    pub fn ist_verbunden(&self) -> bool {
        self.sitzung.lock().is_some()
    }

    /// SSRC der aktiven Sitzung
    pub fn ssrc(&self) -> Option<u32> {
        self.sitzung.lock().as_ref().map(|s| s.ssrc)
    }

    /// Per Discovery ermittelte externe Adresse
    pub fn externe_adresse(&self) -> Option<DiscoveredAddress> {
        self.sitzung.lock().as_ref().map(|s| s.extern_adresse.clone())
    }

    /// Lokale Adresse des Sockets
    pub fn lokale_adresse(&self) -> Option<SocketAddr> {
        self.sitzung
            .lock()
            .as_ref()
            .and_then(|s| s.socket.local_addr().ok())
    }

    pub fn crypto(&self) -> &EncryptionService {
        &self.crypto
    }

    pub fn stats(&self) -> MediaStats {
        self.telemetrie.snapshot()
    }
}

impl Drop for MediaTransport {
    fn drop(&mut self) {
        if let Some(sitzung) = self.sitzung.get_mut().take() {
            sitzung.beenden();
        }
    }
}

// ---------------------------------------------------------------------------
// Empfangs-Loop
// ---------------------------------------------------------------------------

/// Empfaengt Pakete bis zum Shutdown-Signal
async fn empfangs_loop(
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    crypto: Arc<EncryptionService>,
    events: mpsc::UnboundedSender<MediaEvent>,
    telemetrie: Arc<MediaTelemetrie>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut buf = [0u8; UDP_BUFFER_SIZE];

    tracing::debug!(remote = %remote, "Medien-Empfangs-Loop gestartet");

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, absender)) => {
                        if absender != remote {
                            telemetrie.fremdes_datagramm();
                            continue;
                        }
                        if let Some(event) = paket_verarbeiten(&buf[..len], &crypto, &telemetrie) {
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(fehler = %e, "UDP-Empfangsfehler");
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                }
            }

            _ = &mut shutdown_rx => break,
        }
    }

    tracing::debug!(remote = %remote, "Medien-Empfangs-Loop beendet");
}

/// Prueft und entschluesselt ein eingehendes Paket
///
/// Alle Fehler fuehren zum stillen Verwerfen des Pakets.
fn paket_verarbeiten(
    daten: &[u8],
    crypto: &EncryptionService,
    telemetrie: &MediaTelemetrie,
) -> Option<MediaEvent> {
    let header = match RtpHeader::decode(daten) {
        Ok(h) => h,
        Err(e) => {
            tracing::trace!(fehler = %e, bytes = daten.len(), "Kein RTP-Paket");
            return None;
        }
    };
    if rtp::ist_rtcp(daten) {
        return None;
    }

    let aad_laenge = rtp::aad_laenge(daten)?;
    let (aad, versiegelt) = daten.split_at(aad_laenge);

    let klartext = match crypto.decrypt(aad, versiegelt) {
        Ok(k) => k,
        Err(e) => {
            telemetrie.entschluesselungs_fehler();
            tracing::trace!(fehler = %e, ssrc = header.ssrc, "Paket verworfen");
            return None;
        }
    };

    let extension = rtp::extension_koerper_laenge(aad);
    if extension > klartext.len() {
        telemetrie.entschluesselungs_fehler();
        return None;
    }
    let mut payload = Bytes::from(klartext);
    let payload = payload.split_off(extension);

    telemetrie.empfangen();
    Some(MediaEvent::AudioPacket {
        ssrc: header.ssrc,
        sequence: header.sequence,
        timestamp: header.timestamp,
        payload,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use voicelink_crypto::RustCryptoBackend;

    const SCHLUESSEL: [u8; 32] = [0x5A; 32];

    fn localhost(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn config() -> MediaConfig {
        MediaConfig {
            bind_adresse: localhost(0),
            discovery_timeout_ms: 300,
            samples_pro_frame: 960,
        }
    }

    fn transport() -> (MediaTransport, mpsc::UnboundedReceiver<MediaEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MediaTransport::neu(config(), Arc::new(RustCryptoBackend), tx),
            rx,
        )
    }

    /// Medienserver, der genau eine Discovery-Anfrage beantwortet
    async fn fake_server() -> (Arc<UdpSocket>, JoinHandle<SocketAddr>) {
        let server = Arc::new(UdpSocket::bind(localhost(0)).await.unwrap());
        let s = Arc::clone(&server);
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 128];
            let (len, client) = s.recv_from(&mut buf).await.unwrap();
            assert_eq!(len, discovery::PAKET_GROESSE);
            let ssrc = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
            let antwort = discovery::antwort_kodieren(
                ssrc,
                &DiscoveredAddress {
                    ip: "198.51.100.4".into(),
                    port: 40000,
                },
            );
            s.send_to(&antwort, client).await.unwrap();
            client
        });
        (server, task)
    }

    #[tokio::test]
    async fn disconnect_waehrend_discovery_verhindert_sitzung() {
        let server = Arc::new(UdpSocket::bind(localhost(0)).await.unwrap());
        let (angefragt_tx, angefragt_rx) = oneshot::channel();
        let (antworten_tx, antworten_rx) = oneshot::channel::<()>();
        let s = Arc::clone(&server);
        let antwort_task = tokio::spawn(async move {
            let mut buf = [0u8; 128];
            let (_, client) = s.recv_from(&mut buf).await.unwrap();
            let _ = angefragt_tx.send(());
            let _ = antworten_rx.await;
            let antwort = discovery::antwort_kodieren(
                9,
                &DiscoveredAddress {
                    ip: "198.51.100.4".into(),
                    port: 40000,
                },
            );
            s.send_to(&antwort, client).await.unwrap();
        });

        let (t, _rx) = transport();
        let t = Arc::new(t);
        let verbinder = Arc::clone(&t);
        let remote = server.local_addr().unwrap();
        let aufbau = tokio::spawn(async move { verbinder.connect(remote, 9).await });

        angefragt_rx.await.unwrap();
        t.disconnect();
        antworten_tx.send(()).unwrap();

        assert!(matches!(
            aufbau.await.unwrap(),
            Err(MediaError::Abgebrochen)
        ));
        assert!(!t.ist_verbunden());
        assert_eq!(t.ssrc(), None);
        antwort_task.await.unwrap();
    }

    #[test]
    fn zaehler_wrap() {
        let mut z = RtpZaehler {
            sequence: u16::MAX,
            timestamp: u32::MAX - 100,
        };
        let h = z.naechster(1, 960);
        assert_eq!(h.sequence, u16::MAX);
        assert_eq!(z.sequence, 0);
        assert_eq!(z.timestamp, 859);
    }

    #[test]
    fn zaehler_progression() {
        let mut z = RtpZaehler::default();
        for i in 0..5u32 {
            let h = z.naechster(9, 960);
            assert_eq!(h.sequence as u32, i);
            assert_eq!(h.timestamp, i * 960);
            assert_eq!(h.ssrc, 9);
        }
    }

    #[tokio::test]
    async fn discovery_und_senden() {
        let (server, task) = fake_server().await;
        let (t, _rx) = transport();

        let extern_adresse = t.connect(server.local_addr().unwrap(), 0xABCD).await.unwrap();
        assert_eq!(extern_adresse.ip, "198.51.100.4");
        assert_eq!(extern_adresse.port, 40000);
        let client = task.await.unwrap();
        assert_eq!(t.lokale_adresse(), Some(client));

        t.set_encryption(EncryptionMode::AeadAes256GcmRtpsize, &SCHLUESSEL)
            .unwrap();
        t.send(&[0xF8, 0xFF, 0xFE]).await.unwrap();
        t.send(&[0xF8, 0xFF, 0xFE]).await.unwrap();

        let pruef = EncryptionService::standard();
        pruef
            .initialize(EncryptionMode::AeadAes256GcmRtpsize, &SCHLUESSEL)
            .unwrap();

        let mut buf = [0u8; 256];
        for erwartet in 0..2u16 {
            let (len, _) = server.recv_from(&mut buf).await.unwrap();
            let h = RtpHeader::decode(&buf[..len]).unwrap();
            assert_eq!(h.ssrc, 0xABCD);
            assert_eq!(h.sequence, erwartet);
            assert_eq!(h.timestamp, erwartet as u32 * 960);
            assert_eq!(len, 12 + 3 + 16 + 4);
            let klartext = pruef.decrypt(&buf[..12], &buf[12..len]).unwrap();
            assert_eq!(klartext, vec![0xF8, 0xFF, 0xFE]);
        }
        assert_eq!(t.stats().pakete_gesendet, 2);
    }

    #[tokio::test]
    async fn discovery_timeout_bei_ungueltiger_antwort() {
        let server = UdpSocket::bind(localhost(0)).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 128];
            let (_, client) = server.recv_from(&mut buf).await.unwrap();
            // falscher Typ, falsche Laenge
            server.send_to(&[0x00, 0x01, 0x00], client).await.unwrap();
            server.send_to(&discovery::anfrage_kodieren(1), client).await.unwrap();
        });

        let (t, _rx) = transport();
        let err = t.connect(server_addr, 1).await.unwrap_err();
        assert!(matches!(err, MediaError::DiscoveryTimeout { ms: 300 }));
        assert!(!t.ist_verbunden());
    }

    #[tokio::test]
    async fn senden_ohne_verschluesselung_rueckt_zaehler_weiter() {
        let (server, task) = fake_server().await;
        let (t, _rx) = transport();
        t.connect(server.local_addr().unwrap(), 5).await.unwrap();
        task.await.unwrap();

        assert!(matches!(
            t.send(b"x").await,
            Err(MediaError::Krypto(_))
        ));
        t.set_encryption(EncryptionMode::AeadXChaCha20Poly1305Rtpsize, &SCHLUESSEL)
            .unwrap();
        t.send(b"x").await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = server.recv_from(&mut buf).await.unwrap();
        let h = RtpHeader::decode(&buf[..len]).unwrap();
        assert_eq!(h.sequence, 1);
        assert_eq!(h.timestamp, 960);
        assert_eq!(t.stats().sende_fehler, 1);
    }

    #[tokio::test]
    async fn empfang_entschluesselt_und_filtert() {
        let (server, task) = fake_server().await;
        let (t, mut rx) = transport();
        t.connect(server.local_addr().unwrap(), 5).await.unwrap();
        let client = task.await.unwrap();
        t.set_encryption(EncryptionMode::AeadAes256GcmRtpsize, &SCHLUESSEL)
            .unwrap();

        let sender = EncryptionService::standard();
        sender
            .initialize(EncryptionMode::AeadAes256GcmRtpsize, &SCHLUESSEL)
            .unwrap();

        // fremder Absender
        let fremd = UdpSocket::bind(localhost(0)).await.unwrap();
        let header = RtpHeader::new(1, 960, 77).encode();
        let mut paket = header.to_vec();
        paket.extend(sender.encrypt(&header, b"fremd").unwrap());
        fremd.send_to(&paket, client).await.unwrap();

        // manipuliertes Paket
        let mut kaputt = paket.clone();
        let letzte = kaputt.len() - 5;
        kaputt[letzte] ^= 0xFF;
        server.send_to(&kaputt, client).await.unwrap();

        // zu kurz
        server.send_to(&[0x80, 0x78, 0, 1], client).await.unwrap();

        // gueltig
        let header = RtpHeader::new(2, 1920, 77).encode();
        let mut paket = header.to_vec();
        paket.extend(sender.encrypt(&header, b"opus").unwrap());
        server.send_to(&paket, client).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            MediaEvent::AudioPacket {
                ssrc: 77,
                sequence: 2,
                timestamp: 1920,
                payload: Bytes::from_static(b"opus"),
            }
        );
        let stats = t.stats();
        assert_eq!(stats.pakete_empfangen, 1);
        assert_eq!(stats.entschluesselungs_fehler, 1);
        assert!(stats.fremde_datagramme >= 1);
    }

    #[tokio::test]
    async fn extension_koerper_wird_entfernt() {
        let (server, task) = fake_server().await;
        let (t, mut rx) = transport();
        t.connect(server.local_addr().unwrap(), 5).await.unwrap();
        let client = task.await.unwrap();
        t.set_encryption(EncryptionMode::AeadXChaCha20Poly1305Rtpsize, &SCHLUESSEL)
            .unwrap();

        let sender = EncryptionService::standard();
        sender
            .initialize(EncryptionMode::AeadXChaCha20Poly1305Rtpsize, &SCHLUESSEL)
            .unwrap();

        let mut aad = RtpHeader::new(3, 0, 88).encode().to_vec();
        aad[0] |= 0x10;
        aad.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01]);
        let mut klartext = vec![0x10, 0x20, 0x30, 0x40];
        klartext.extend_from_slice(b"audio");

        let mut paket = aad.clone();
        paket.extend(sender.encrypt(&aad, &klartext).unwrap());
        server.send_to(&paket, client).await.unwrap();

        let MediaEvent::AudioPacket { payload, ssrc, .. } =
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(ssrc, 88);
        assert_eq!(&payload[..], b"audio");
    }

    #[tokio::test]
    async fn disconnect_ist_idempotent() {
        let (t, _rx) = transport();
        t.disconnect();
        assert!(matches!(t.send(b"x").await, Err(MediaError::NichtVerbunden)));

        let (server, task) = fake_server().await;
        t.connect(server.local_addr().unwrap(), 5).await.unwrap();
        task.await.unwrap();
        t.set_encryption(EncryptionMode::AeadAes256GcmRtpsize, &SCHLUESSEL)
            .unwrap();

        t.disconnect();
        t.disconnect();
        assert!(!t.ist_verbunden());
        assert!(!t.crypto().is_initialized());
        assert_eq!(t.ssrc(), None);
    }
}
