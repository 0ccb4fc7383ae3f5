//! voicelink-signaling – Steuerkanal und Verbindungs-State-Machine
//!
//! Dieser Crate implementiert die Client-Seite des Voice-Gateways: er
//! oeffnet den Steuerkanal, haelt ihn per Heartbeat am Leben, handelt
//! Medienparameter und Verschluesselung aus und baut die Verbindung nach
//! Abbruechen wieder auf.
//!
//! ## Architektur
//!
//! ```text
//! VoiceConnection (Handle)
//!     |
//!     v
//! Treiber-Task (ein Versuch nach dem anderen, Backoff)
//!     |  State Machine: Connecting -> AwaitingHello -> Identifying/Resuming
//!     |                 -> AwaitingReady -> NegotiatingProtocol -> Ready
//!     |
//!     +-- ChannelConnector  (WebSocket oder In-Memory)
//!     +-- Heartbeat         (Timer-Task, Op 3/6)
//!     +-- Ablauf            (Dispatcher: Op -> Handler)
//!     +-- MediaTransport    (UDP, Discovery, RTP, AEAD)
//! ```

pub mod config;
pub mod connection;
mod dispatcher;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod reconnect;
pub mod transport;

// Bequeme Re-Exporte
pub use config::VoiceConfig;
pub use connection::VoiceConnection;
pub use error::{GatewayError, GatewayResult};
pub use event::{EventReceiver, ReadyInfo, SignalingState, VoiceEvent};
pub use heartbeat::{BeatOutcome, Heartbeat, HeartbeatConfig, HeartbeatSignal, HeartbeatSnapshot};
pub use reconnect::Backoff;
pub use transport::{ChannelConnector, ControlChannel, InboundFrame, OutboundFrame, WebSocketConnector};
