//! Steuerkanal-Transport
//!
//! Die State Machine spricht nicht direkt mit einem WebSocket, sondern mit
//! einem `ControlChannel`: eine FIFO-Queue fuer ausgehende Frames und eine
//! fuer eingehende. Ein `ChannelConnector` oeffnet den Kanal; Tests setzen
//! einen In-Memory-Connector ein.
//!
//! ## Tasks (WebSocketConnector)
//! ```text
//! ausgang (mpsc) --> Schreib-Task --> WebSocket
//! WebSocket --> Lese-Task --> eingang (mpsc)
//! ```
//! Der Lese-Task meldet jedes Ende des Streams als `InboundFrame::Closed`;
//! ohne Close-Frame gilt Code 1006.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Once;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use voicelink_protocol::HEARTBEAT_TIMEOUT_CODE;

use crate::error::{GatewayError, GatewayResult};

/// Frame an den Server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    /// Schliesst den Kanal; danach werden keine Frames mehr gesendet
    Close { code: u16, grund: String },
}

/// Frame vom Server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// Letztes Frame eines Kanals
    Closed { code: u16, grund: String },
}

/// Geoeffneter Steuerkanal
#[derive(Debug)]
pub struct ControlChannel {
    pub ausgang: mpsc::UnboundedSender<OutboundFrame>,
    pub eingang: mpsc::UnboundedReceiver<InboundFrame>,
}

impl ControlChannel {
    /// Erzeugt beide Enden eines Kanals im Speicher
    ///
    /// Rueckgabe: (Client-Seite, Gegenstelle). Die Gegenstelle empfaengt
    /// die ausgehenden Frames und sendet eingehende.
    pub fn paar() -> (
        Self,
        (
            mpsc::UnboundedSender<InboundFrame>,
            mpsc::UnboundedReceiver<OutboundFrame>,
        ),
    ) {
        let (aus_tx, aus_rx) = mpsc::unbounded_channel();
        let (ein_tx, ein_rx) = mpsc::unbounded_channel();
        (
            Self {
                ausgang: aus_tx,
                eingang: ein_rx,
            },
            (ein_tx, aus_rx),
        )
    }
}

/// Oeffnet Steuerkanaele
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn open(&self, url: &str) -> GatewayResult<ControlChannel>;
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

static KRYPTO_PROVIDER: Once = Once::new();

/// Steuerkanal ueber WebSocket (wss://)
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn open(&self, url: &str) -> GatewayResult<ControlChannel> {
        KRYPTO_PROVIDER.call_once(|| {
            // Schlaegt fehl, wenn die Anwendung bereits einen Provider gesetzt hat
            let _ = rustls::crypto::ring::default_provider().install_default();
        });

        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| GatewayError::Verbindung(e.to_string()))?;
        let (mut schreiben, mut lesen) = stream.split();
        tracing::debug!(url, "Steuerkanal geoeffnet");

        let (aus_tx, mut aus_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (ein_tx, ein_rx) = mpsc::unbounded_channel::<InboundFrame>();

        tokio::spawn(async move {
            while let Some(frame) = aus_rx.recv().await {
                let (nachricht, ende) = match frame {
                    OutboundFrame::Text(text) => (Message::Text(text.into()), false),
                    OutboundFrame::Close { code, grund } => (
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: grund.into(),
                        })),
                        true,
                    ),
                };
                if let Err(e) = schreiben.send(nachricht).await {
                    tracing::debug!(fehler = %e, "Schreiben auf Steuerkanal fehlgeschlagen");
                    break;
                }
                if ende {
                    break;
                }
            }
            let _ = schreiben.close().await;
        });

        tokio::spawn(async move {
            let ende = loop {
                match lesen.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if ein_tx.send(InboundFrame::Text(text.to_string())).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(cf) => InboundFrame::Closed {
                                code: u16::from(cf.code),
                                grund: cf.reason.to_string(),
                            },
                            None => InboundFrame::Closed {
                                code: 1005,
                                grund: String::new(),
                            },
                        };
                    }
                    // Ping/Pong beantwortet tungstenite selbst, Binaerframes gibt es nicht
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        break InboundFrame::Closed {
                            code: HEARTBEAT_TIMEOUT_CODE,
                            grund: e.to_string(),
                        };
                    }
                    None => {
                        break InboundFrame::Closed {
                            code: HEARTBEAT_TIMEOUT_CODE,
                            grund: "Stream beendet".into(),
                        };
                    }
                }
            };
            let _ = ein_tx.send(ende);
        });

        Ok(ControlChannel {
            ausgang: aus_tx,
            eingang: ein_rx,
        })
    }
}
