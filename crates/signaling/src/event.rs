//! Zustaende und Ereignisse einer Voice-Verbindung

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use voicelink_core::UserId;
use voicelink_protocol::{DiscoveredAddress, EncryptionMode, SpeakingFlags};

use crate::error::GatewayError;

/// Zustand der Signaling-State-Machine
///
/// ```text
/// Disconnected -> Connecting -> AwaitingHello -> Identifying -> AwaitingReady
///     -> NegotiatingProtocol -> Ready
/// AwaitingHello -> Resuming -> Ready
/// (jeder Zustand) -> Reconnecting -> Connecting | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalingState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    AwaitingReady,
    NegotiatingProtocol,
    Ready,
    Reconnecting,
    Failed,
}

impl SignalingState {
    /// Verbindungsaufbau laeuft (weder bereit noch beendet)
    pub fn ist_aufbau(&self) -> bool {
        !matches!(self, Self::Ready | Self::Disconnected | Self::Failed)
    }

    /// Kein Treiber laeuft mehr; nur ein neues `connect` fuehrt weiter
    pub fn ist_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

/// Ergebnis eines erfolgreichen Verbindungsaufbaus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyInfo {
    pub ssrc: u32,
    /// Medienserver aus Ready (Op 2)
    pub remote: SocketAddr,
    /// Eigene Adresse laut IP-Discovery
    pub externe_adresse: DiscoveredAddress,
    pub modus: EncryptionMode,
}

/// Ereignisse fuer den Aufrufer
///
/// Ein Zustandswechsel wird immer vor dem zugehoerigen Ereignis sichtbar.
#[derive(Debug, Clone)]
pub enum VoiceEvent {
    Connecting {
        resume: bool,
    },
    Ready(ReadyInfo),
    Resumed,
    Reconnecting {
        versuch: u32,
        verzoegerung: Duration,
        /// Close-Code, falls der Server den Kanal geschlossen hat
        code: Option<u16>,
    },
    Disconnected {
        grund: String,
        code: Option<u16>,
    },
    /// Nicht fataler Fehler eines Handlers
    Error(Arc<GatewayError>),
    /// Verbindung endgueltig verloren
    Failed {
        grund: String,
    },
    AudioReceived {
        ssrc: u32,
        user_id: Option<UserId>,
        sequence: u16,
        timestamp: u32,
        payload: Bytes,
    },
    RemoteSpeaking {
        user_id: UserId,
        ssrc: u32,
        flags: SpeakingFlags,
    },
    ClientConnected {
        user_ids: Vec<UserId>,
    },
    ClientDisconnected {
        user_id: UserId,
    },
}

pub type EventSender = mpsc::UnboundedSender<VoiceEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<VoiceEvent>;
