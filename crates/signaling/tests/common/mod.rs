//! Testhilfen: In-Memory-Steuerkanal und UDP-Medienserver

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use voicelink_core::{ServerId, Session, UserId};
use voicelink_protocol::discovery::{self, PAKET_GROESSE};
use voicelink_protocol::DiscoveredAddress;
use voicelink_signaling::{
    ChannelConnector, ControlChannel, GatewayError, GatewayResult, InboundFrame, OutboundFrame,
    VoiceConfig,
};
use voicelink_voice::MediaConfig;

pub const SCHLUESSEL: [u8; 32] = [7; 32];
pub const SSRC: u32 = 42;
pub const XCHACHA: &str = "aead_xchacha20_poly1305_rtpsize";
pub const AES: &str = "aead_aes256_gcm_rtpsize";

const WARTEN: Duration = Duration::from_secs(3);

pub fn logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("voicelink=debug")
        .try_init();
}

pub fn localhost(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

pub fn session() -> Session {
    Session::neu(
        ServerId(1),
        None,
        UserId(2),
        "sitzung-1",
        "geheim",
        "voice.example.test:80",
    )
}

/// Schnelle Zeitlimits, kurzer Backoff
pub fn config() -> VoiceConfig {
    VoiceConfig {
        connect_timeout_ms: 1_000,
        backoff_ms: vec![10],
        max_reconnect_versuche: 3,
        heartbeat_jitter: 0.0,
        media: MediaConfig {
            bind_adresse: localhost(0),
            discovery_timeout_ms: 500,
            samples_pro_frame: 960,
        },
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Steuerkanal
// ---------------------------------------------------------------------------

/// Server-Ende eines geoeffneten In-Memory-Kanals
pub struct ServerSeite {
    pub url: String,
    tx: mpsc::UnboundedSender<InboundFrame>,
    rx: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl ServerSeite {
    pub fn senden(&self, op: u8, d: Value) {
        self.senden_mit_seq(op, d, None);
    }

    pub fn senden_mit_seq(&self, op: u8, d: Value, seq: Option<i64>) {
        let mut frame = json!({ "op": op, "d": d });
        if let Some(seq) = seq {
            frame["seq"] = json!(seq);
        }
        self.tx.send(InboundFrame::Text(frame.to_string())).unwrap();
    }

    pub fn hello(&self, intervall_ms: u64) {
        self.senden(8, json!({ "heartbeat_interval": intervall_ms }));
    }

    pub fn schliessen(&self, code: u16) {
        let _ = self.tx.send(InboundFrame::Closed {
            code,
            grund: format!("Test {code}"),
        });
    }

    /// Naechstes Frame vom Client, Heartbeats werden uebersprungen
    pub async fn naechstes_frame(&mut self) -> OutboundFrame {
        loop {
            let frame = tokio::time::timeout(WARTEN, self.rx.recv())
                .await
                .expect("Zeitlimit beim Warten auf Client-Frame")
                .expect("Client-Kanal geschlossen");
            if let OutboundFrame::Text(text) = &frame {
                let v: Value = serde_json::from_str(text).unwrap();
                if v["op"] == 3 {
                    continue;
                }
            }
            return frame;
        }
    }

    /// Naechstes Text-Frame als JSON
    pub async fn naechstes(&mut self) -> Value {
        match self.naechstes_frame().await {
            OutboundFrame::Text(text) => serde_json::from_str(&text).unwrap(),
            andere => panic!("Text-Frame erwartet, erhalten: {andere:?}"),
        }
    }

    /// Naechstes Frame mit Opcode 3 (Heartbeat)
    pub async fn naechster_heartbeat(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(WARTEN, self.rx.recv())
                .await
                .expect("Zeitlimit beim Warten auf Heartbeat")
                .expect("Client-Kanal geschlossen");
            if let OutboundFrame::Text(text) = frame {
                let v: Value = serde_json::from_str(&text).unwrap();
                if v["op"] == 3 {
                    return v;
                }
            }
        }
    }

    /// Alle bereits anstehenden Nicht-Heartbeat-Frames
    pub fn anstehende(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            if let OutboundFrame::Text(text) = &frame {
                let v: Value = serde_json::from_str(text).unwrap();
                if v["op"] == 3 {
                    continue;
                }
            }
            frames.push(frame);
        }
        frames
    }
}

/// Connector, dessen Kanaele der Test steuert
#[derive(Clone)]
pub struct MockConnector {
    kanaele: mpsc::UnboundedSender<ServerSeite>,
    fehlschlagen: Arc<AtomicBool>,
}

impl MockConnector {
    pub fn neu() -> (Self, mpsc::UnboundedReceiver<ServerSeite>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                kanaele: tx,
                fehlschlagen: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// Alle weiteren `open`-Aufrufe schlagen fehl
    pub fn ab_jetzt_fehlschlagen(&self) {
        self.fehlschlagen.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn open(&self, url: &str) -> GatewayResult<ControlChannel> {
        if self.fehlschlagen.load(Ordering::SeqCst) {
            return Err(GatewayError::Verbindung("Verbindung abgelehnt".into()));
        }
        let (kanal, (tx, rx)) = ControlChannel::paar();
        self.kanaele
            .send(ServerSeite {
                url: url.to_string(),
                tx,
                rx,
            })
            .map_err(|_| GatewayError::Verbindung("Test beendet".into()))?;
        Ok(kanal)
    }
}

pub async fn naechster_kanal(rx: &mut mpsc::UnboundedReceiver<ServerSeite>) -> ServerSeite {
    tokio::time::timeout(WARTEN, rx.recv())
        .await
        .expect("Zeitlimit beim Warten auf Verbindungsaufbau")
        .expect("Connector beendet")
}

// ---------------------------------------------------------------------------
// Medienserver
// ---------------------------------------------------------------------------

/// Beantwortet Discovery-Anfragen und sammelt alle anderen Datagramme
pub struct FakeMedien {
    pub adresse: SocketAddr,
    pub socket: Arc<UdpSocket>,
    pub pakete: mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>,
    pub discovery_anfragen: mpsc::UnboundedReceiver<u32>,
}

pub const EXTERNE_IP: &str = "203.0.113.7";
pub const EXTERNER_PORT: u16 = 50_000;

impl FakeMedien {
    pub async fn starten() -> Self {
        let socket = Arc::new(UdpSocket::bind(localhost(0)).await.unwrap());
        let adresse = socket.local_addr().unwrap();
        let (pakete_tx, pakete) = mpsc::unbounded_channel();
        let (anfragen_tx, discovery_anfragen) = mpsc::unbounded_channel();

        let s = Arc::clone(&socket);
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            while let Ok((len, absender)) = s.recv_from(&mut buf).await {
                let daten = &buf[..len];
                if len == PAKET_GROESSE && daten[0..2] == [0x00, 0x01] {
                    let ssrc = u32::from_be_bytes([daten[4], daten[5], daten[6], daten[7]]);
                    let _ = anfragen_tx.send(ssrc);
                    let antwort = discovery::antwort_kodieren(
                        ssrc,
                        &DiscoveredAddress {
                            ip: EXTERNE_IP.into(),
                            port: EXTERNER_PORT,
                        },
                    );
                    let _ = s.send_to(&antwort, absender).await;
                } else if pakete_tx.send((daten.to_vec(), absender)).is_err() {
                    break;
                }
            }
        });

        Self {
            adresse,
            socket,
            pakete,
            discovery_anfragen,
        }
    }

    pub async fn naechstes_paket(&mut self) -> (Vec<u8>, SocketAddr) {
        tokio::time::timeout(WARTEN, self.pakete.recv())
            .await
            .expect("Zeitlimit beim Warten auf RTP-Paket")
            .expect("Medienserver beendet")
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

pub fn ready_payload(port: u16, modes: &[&str]) -> Value {
    json!({
        "ssrc": SSRC,
        "ip": "127.0.0.1",
        "port": port,
        "modes": modes,
    })
}

/// Fuehrt Hello -> Identify -> Ready -> SelectProtocol -> SessionDescription
/// durch; die SessionDescription traegt `seq`
pub async fn handshake(server: &mut ServerSeite, medien: &FakeMedien, seq: i64) {
    server.hello(30_000);

    let identify = server.naechstes().await;
    assert_eq!(identify["op"], 0, "Identify erwartet: {identify}");

    server.senden(2, ready_payload(medien.adresse.port(), &[AES, XCHACHA]));

    let select = server.naechstes().await;
    assert_eq!(select["op"], 1, "SelectProtocol erwartet: {select}");

    server.senden_mit_seq(
        4,
        json!({ "mode": XCHACHA, "secret_key": SCHLUESSEL.to_vec() }),
        Some(seq),
    );
}
