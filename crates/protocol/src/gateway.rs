//! Steuerkanal-Protokoll (Voice-Gateway)
//!
//! Alle Nachrichten sind JSON-Frames der Form `{"op": u8, "d": ..., "seq"?: i64}`.
//! Ausgehende Nachrichten werden als `ClientCommand` gebaut, eingehende
//! Frames werden in ein `GatewayEvent` dekodiert.
//!
//! ## Opcodes
//!
//! ```text
//!  0 Identify            C->S
//!  1 SelectProtocol      C->S
//!  2 Ready               S->C
//!  3 Heartbeat           C->S
//!  4 SessionDescription  S->C
//!  5 Speaking            C<->S
//!  6 HeartbeatAck        S->C
//!  7 Resume              C->S
//!  8 Hello               S->C
//!  9 Resumed             S->C
//! 11 ClientConnect       S->C
//! 13 ClientDisconnect    S->C
//! ```

use serde::de::{self, Visitor};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use voicelink_core::types::{ServerId, UserId};

use crate::crypto::SchluesselBytes;
use crate::error::{ProtocolError, ProtocolResult};

/// Protokollversion ab der Heartbeats ein `seq_ack` tragen
pub const SEQ_ACK_VERSION: u8 = 8;

// ---------------------------------------------------------------------------
// OpCode
// ---------------------------------------------------------------------------

/// Opcode eines Gateway-Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Identify = 0,
    SelectProtocol = 1,
    Ready = 2,
    Heartbeat = 3,
    SessionDescription = 4,
    Speaking = 5,
    HeartbeatAck = 6,
    Resume = 7,
    Hello = 8,
    Resumed = 9,
    ClientConnect = 11,
    ClientDisconnect = 13,
}

impl OpCode {
    /// Konvertiert ein Byte in einen `OpCode`
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Identify,
            1 => Self::SelectProtocol,
            2 => Self::Ready,
            3 => Self::Heartbeat,
            4 => Self::SessionDescription,
            5 => Self::Speaking,
            6 => Self::HeartbeatAck,
            7 => Self::Resume,
            8 => Self::Hello,
            9 => Self::Resumed,
            11 => Self::ClientConnect,
            13 => Self::ClientDisconnect,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// GatewayFrame
// ---------------------------------------------------------------------------

/// Rohes JSON-Frame des Steuerkanals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
}

impl GatewayFrame {
    /// Baut ein Frame aus Opcode und serialisierbaren Nutzdaten
    pub fn neu<T: Serialize>(op: OpCode, d: &T) -> ProtocolResult<Self> {
        Ok(Self {
            op: op as u8,
            d: serde_json::to_value(d)?,
            seq: None,
        })
    }

    /// Dekodiert ein Text-Frame
    pub fn aus_text(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialisiert das Frame
    pub fn als_text(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Bekannter Opcode oder `None`
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }

    /// Ueberschreibt `secret_key` in den Nutzdaten mit Nullen und verwirft `d`
    pub fn schluessel_verwerfen(&mut self) {
        if let Some(Value::Array(bytes)) = self.d.get_mut("secret_key") {
            for b in bytes.iter_mut() {
                *b = Value::from(0u8);
            }
        }
        self.d = Value::Null;
    }

    // Ohne Kopie von `d`, damit keine ungenullten Schluesselreste entstehen
    fn nutzdaten<T: DeserializeOwned>(&self, op: OpCode) -> ProtocolResult<T> {
        T::deserialize(&self.d).map_err(|e| ProtocolError::UngueltigeNutzdaten {
            op,
            grund: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// SpeakingFlags
// ---------------------------------------------------------------------------

/// Bitset der Speaking-Ankuendigung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpeakingFlags(u8);

impl SpeakingFlags {
    /// Spricht nicht
    pub const NONE: SpeakingFlags = SpeakingFlags(0);
    /// Normales Mikrofon-Audio
    pub const MICROPHONE: SpeakingFlags = SpeakingFlags(1 << 0);
    /// Audio aus einem Stream (ohne Sprach-Indikator)
    pub const SOUNDSHARE: SpeakingFlags = SpeakingFlags(1 << 1);
    /// Priority Speaker (senkt andere ab)
    pub const PRIORITY: SpeakingFlags = SpeakingFlags(1 << 2);

    /// Erstellt Flags aus Rohbits; unbekannte Bits werden verworfen
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, andere: SpeakingFlags) -> bool {
        self.0 & andere.0 == andere.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for SpeakingFlags {
    type Output = SpeakingFlags;

    fn bitor(self, rhs: SpeakingFlags) -> SpeakingFlags {
        SpeakingFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for SpeakingFlags {
    fn bitor_assign(&mut self, rhs: SpeakingFlags) {
        self.0 |= rhs.0;
    }
}

impl Serialize for SpeakingFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for SpeakingFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlagsVisitor;

        impl<'de> Visitor<'de> for FlagsVisitor {
            type Value = SpeakingFlags;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("Speaking-Flags als Zahl oder bool")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<SpeakingFlags, E> {
                Ok(SpeakingFlags::from_bits_truncate((v & 0xFF) as u8))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<SpeakingFlags, E> {
                u64::try_from(v)
                    .map_err(|_| E::custom("negative Speaking-Flags"))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<SpeakingFlags, E> {
                Ok(if v {
                    SpeakingFlags::MICROPHONE
                } else {
                    SpeakingFlags::NONE
                })
            }
        }

        deserializer.deserialize_any(FlagsVisitor)
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Op 0: Neue Sitzung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identify {
    pub server_id: ServerId,
    pub user_id: UserId,
    pub session_id: String,
    pub token: String,
}

/// Op 7: Bestehende Sitzung fortsetzen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub server_id: ServerId,
    pub session_id: String,
    pub token: String,
    pub seq_ack: i64,
}

/// Op 1: Transport und Verschluesselung waehlen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectProtocol {
    pub protocol: String,
    pub data: SelectProtocolData,
}

/// Adresse und Modus in `SelectProtocol`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectProtocolData {
    pub address: String,
    pub port: u16,
    pub mode: String,
}

impl SelectProtocol {
    /// UDP-Auswahl mit entdeckter Adresse
    pub fn udp(address: impl Into<String>, port: u16, mode: impl Into<String>) -> Self {
        Self {
            protocol: "udp".into(),
            data: SelectProtocolData {
                address: address.into(),
                port,
                mode: mode.into(),
            },
        }
    }
}

/// Op 3: Heartbeat
///
/// Ab Version 8 als Objekt mit `seq_ack`, davor nur die Nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPayload {
    V8 { nonce: u64, seq_ack: Option<i64> },
    Legacy(u64),
}

impl HeartbeatPayload {
    /// Waehlt das Format passend zur Protokollversion
    pub fn fuer_version(version: u8, nonce: u64, seq_ack: Option<i64>) -> Self {
        if version >= SEQ_ACK_VERSION {
            Self::V8 { nonce, seq_ack }
        } else {
            Self::Legacy(nonce)
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Self::V8 { nonce, .. } | Self::Legacy(nonce) => *nonce,
        }
    }
}

impl Serialize for HeartbeatPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct V8 {
            t: u64,
            #[serde(skip_serializing_if = "Option::is_none")]
            seq_ack: Option<i64>,
        }

        match *self {
            Self::V8 { nonce, seq_ack } => V8 { t: nonce, seq_ack }.serialize(serializer),
            Self::Legacy(nonce) => serializer.serialize_u64(nonce),
        }
    }
}

/// Op 5: Speaking-Ankuendigung des Clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakingPayload {
    pub speaking: SpeakingFlags,
    pub delay: u32,
    pub ssrc: u32,
}

/// Alle Nachrichten, die der Client sendet
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Identify(Identify),
    Resume(Resume),
    SelectProtocol(SelectProtocol),
    Heartbeat(HeartbeatPayload),
    Speaking(SpeakingPayload),
}

impl ClientCommand {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Identify(_) => OpCode::Identify,
            Self::Resume(_) => OpCode::Resume,
            Self::SelectProtocol(_) => OpCode::SelectProtocol,
            Self::Heartbeat(_) => OpCode::Heartbeat,
            Self::Speaking(_) => OpCode::Speaking,
        }
    }

    /// Baut das Frame fuer den Steuerkanal
    pub fn in_frame(&self) -> ProtocolResult<GatewayFrame> {
        let op = self.opcode();
        match self {
            Self::Identify(p) => GatewayFrame::neu(op, p),
            Self::Resume(p) => GatewayFrame::neu(op, p),
            Self::SelectProtocol(p) => GatewayFrame::neu(op, p),
            Self::Heartbeat(p) => GatewayFrame::neu(op, p),
            Self::Speaking(p) => GatewayFrame::neu(op, p),
        }
    }

    /// Serialisiert direkt in ein Text-Frame
    pub fn als_text(&self) -> ProtocolResult<String> {
        self.in_frame()?.als_text()
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Op 8: Heartbeat-Intervall
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hello {
    /// Intervall in Millisekunden (kann gebrochen sein)
    pub heartbeat_interval: f64,
}

impl Hello {
    /// Intervall auf ganze Millisekunden gerundet, mindestens 1
    ///
    /// Null, negative und nicht endliche Werte sind ein ungueltiges Hello.
    pub fn intervall_ms(&self) -> ProtocolResult<u64> {
        let wert = self.heartbeat_interval;
        if !wert.is_finite() || wert <= 0.0 {
            return Err(ProtocolError::UngueltigeNutzdaten {
                op: OpCode::Hello,
                grund: format!("heartbeat_interval {wert} ungueltig"),
            });
        }
        Ok((wert.round() as u64).max(1))
    }
}

/// Op 2: Medienparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    pub ssrc: u32,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub modes: Vec<String>,
}

/// Op 4: Ausgehandelter Modus und Schluessel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub mode: String,
    pub secret_key: SchluesselBytes,
}

/// Op 5: Speaking eines anderen Teilnehmers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSpeaking {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub ssrc: u32,
    pub speaking: SpeakingFlags,
}

/// Op 6: Bestaetigung eines Heartbeats
///
/// Version 8 liefert `{"t": nonce}`, aeltere Versionen die nackte Nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatAck {
    pub nonce: u64,
}

impl<'de> Deserialize<'de> for HeartbeatAck {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Roh {
            Objekt { t: u64 },
            Zahl(u64),
        }

        let nonce = match Roh::deserialize(deserializer)? {
            Roh::Objekt { t } | Roh::Zahl(t) => t,
        };
        Ok(Self { nonce })
    }
}

/// Op 11: Neue Teilnehmer im Kanal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConnect {
    pub user_ids: Vec<UserId>,
}

/// Op 13: Teilnehmer hat den Kanal verlassen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDisconnect {
    pub user_id: UserId,
}

/// Dekodiertes eingehendes Gateway-Ereignis
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Hello(Hello),
    Ready(Ready),
    SessionDescription(SessionDescription),
    Speaking(RemoteSpeaking),
    HeartbeatAck(HeartbeatAck),
    Resumed,
    ClientConnect(ClientConnect),
    ClientDisconnect(ClientDisconnect),
    /// Opcode ohne Handler (wird ignoriert)
    Unbekannt { op: u8 },
}

impl GatewayEvent {
    /// Dekodiert die Nutzdaten eines Frames anhand des Opcodes
    pub fn aus_frame(frame: &GatewayFrame) -> ProtocolResult<Self> {
        let Some(op) = frame.opcode() else {
            return Ok(Self::Unbekannt { op: frame.op });
        };
        Ok(match op {
            OpCode::Hello => Self::Hello(frame.nutzdaten(op)?),
            OpCode::Ready => Self::Ready(frame.nutzdaten(op)?),
            OpCode::SessionDescription => Self::SessionDescription(frame.nutzdaten(op)?),
            OpCode::Speaking => Self::Speaking(frame.nutzdaten(op)?),
            OpCode::HeartbeatAck => Self::HeartbeatAck(frame.nutzdaten(op)?),
            OpCode::Resumed => Self::Resumed,
            OpCode::ClientConnect => Self::ClientConnect(frame.nutzdaten(op)?),
            OpCode::ClientDisconnect => Self::ClientDisconnect(frame.nutzdaten(op)?),
            OpCode::Identify
            | OpCode::SelectProtocol
            | OpCode::Heartbeat
            | OpCode::Resume => Self::Unbekannt { op: frame.op },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn opcode_from_u8() {
        assert_eq!(OpCode::from_u8(8), Some(OpCode::Hello));
        assert_eq!(OpCode::from_u8(13), Some(OpCode::ClientDisconnect));
        assert_eq!(OpCode::from_u8(10), None);
        assert_eq!(OpCode::from_u8(12), None);
    }

    #[test]
    fn identify_frame() {
        let cmd = ClientCommand::Identify(Identify {
            server_id: ServerId(41771983423143937),
            user_id: UserId(104694319306248192),
            session_id: "my_session_id".into(),
            token: "my_token".into(),
        });
        let v: Value = serde_json::from_str(&cmd.als_text().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({
                "op": 0,
                "d": {
                    "server_id": "41771983423143937",
                    "user_id": "104694319306248192",
                    "session_id": "my_session_id",
                    "token": "my_token"
                }
            })
        );
    }

    #[test]
    fn heartbeat_v8_und_legacy() {
        let v8 = ClientCommand::Heartbeat(HeartbeatPayload::fuer_version(8, 1501184119561, Some(10)));
        assert_eq!(
            v8.in_frame().unwrap().d,
            json!({"t": 1501184119561u64, "seq_ack": 10})
        );

        let ohne_seq = HeartbeatPayload::fuer_version(8, 5, None);
        assert_eq!(serde_json::to_value(ohne_seq).unwrap(), json!({"t": 5}));

        let alt = HeartbeatPayload::fuer_version(4, 5, Some(3));
        assert_eq!(serde_json::to_value(alt).unwrap(), json!(5));
    }

    #[test]
    fn select_protocol_frame() {
        let cmd = ClientCommand::SelectProtocol(SelectProtocol::udp(
            "127.0.0.1",
            1337,
            "aead_aes256_gcm_rtpsize",
        ));
        let frame = cmd.in_frame().unwrap();
        assert_eq!(frame.op, 1);
        assert_eq!(
            frame.d,
            json!({"protocol": "udp", "data": {"address": "127.0.0.1", "port": 1337, "mode": "aead_aes256_gcm_rtpsize"}})
        );
    }

    #[test]
    fn hello_dekodieren() {
        let frame = GatewayFrame::aus_text(r#"{"op":8,"d":{"heartbeat_interval":41250.5}}"#).unwrap();
        match GatewayEvent::aus_frame(&frame).unwrap() {
            GatewayEvent::Hello(h) => assert_eq!(h.intervall_ms().unwrap(), 41251),
            e => panic!("unerwartet: {e:?}"),
        }
    }

    #[test]
    fn hello_ohne_gueltiges_intervall() {
        for wert in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let hello = Hello {
                heartbeat_interval: wert,
            };
            assert!(matches!(
                hello.intervall_ms(),
                Err(ProtocolError::UngueltigeNutzdaten { op: OpCode::Hello, .. })
            ));
        }
        let kurz = Hello {
            heartbeat_interval: 0.3,
        };
        assert_eq!(kurz.intervall_ms().unwrap(), 1);
    }

    #[test]
    fn ready_mit_seq() {
        let frame = GatewayFrame::aus_text(
            r#"{"op":2,"seq":4,"d":{"ssrc":1,"ip":"127.0.0.1","port":1234,"modes":["aead_xchacha20_poly1305_rtpsize"],"heartbeat_interval":1}}"#,
        )
        .unwrap();
        assert_eq!(frame.seq, Some(4));
        match GatewayEvent::aus_frame(&frame).unwrap() {
            GatewayEvent::Ready(r) => {
                assert_eq!(r.ssrc, 1);
                assert_eq!(r.port, 1234);
                assert_eq!(r.modes.len(), 1);
            }
            e => panic!("unerwartet: {e:?}"),
        }
    }

    #[test]
    fn ready_ungueltig() {
        let frame = GatewayFrame::aus_text(r#"{"op":2,"d":{"ssrc":"x"}}"#).unwrap();
        assert!(matches!(
            GatewayEvent::aus_frame(&frame),
            Err(ProtocolError::UngueltigeNutzdaten { op: OpCode::Ready, .. })
        ));
    }

    #[test]
    fn heartbeat_ack_beide_formate() {
        let neu = GatewayFrame::aus_text(r#"{"op":6,"d":{"t":99}}"#).unwrap();
        let alt = GatewayFrame::aus_text(r#"{"op":6,"d":99}"#).unwrap();
        for frame in [neu, alt] {
            assert_eq!(
                GatewayEvent::aus_frame(&frame).unwrap(),
                GatewayEvent::HeartbeatAck(HeartbeatAck { nonce: 99 })
            );
        }
    }

    #[test]
    fn remote_speaking_bool_und_zahl() {
        let a: RemoteSpeaking =
            serde_json::from_value(json!({"user_id": "7", "ssrc": 2, "speaking": 5})).unwrap();
        assert!(a.speaking.contains(SpeakingFlags::PRIORITY));
        assert!(a.speaking.contains(SpeakingFlags::MICROPHONE));

        let b: RemoteSpeaking =
            serde_json::from_value(json!({"ssrc": 2, "speaking": false})).unwrap();
        assert!(b.speaking.is_empty());
        assert_eq!(b.user_id, None);
    }

    #[test]
    fn unbekannter_opcode_wird_ignoriert() {
        let frame = GatewayFrame::aus_text(r#"{"op":18,"d":{"any":"thing"}}"#).unwrap();
        assert_eq!(
            GatewayEvent::aus_frame(&frame).unwrap(),
            GatewayEvent::Unbekannt { op: 18 }
        );
    }

    #[test]
    fn speaking_flags_kombinieren() {
        let flags = SpeakingFlags::MICROPHONE | SpeakingFlags::PRIORITY;
        assert_eq!(flags.bits(), 5);
        assert!(!flags.contains(SpeakingFlags::SOUNDSHARE));
        assert_eq!(SpeakingFlags::from_bits_truncate(0xFF).bits(), 7);
    }

    #[test]
    fn session_description_debug_verbirgt_schluessel() {
        let sd = SessionDescription {
            mode: "aead_aes256_gcm_rtpsize".into(),
            secret_key: vec![0xAB; 32].into(),
        };
        let s = format!("{sd:?}");
        assert!(s.contains("REDACTED"));
        assert!(!s.contains("171"));
    }

    #[test]
    fn schluessel_im_frame_wird_verworfen() {
        let mut frame = GatewayFrame::aus_text(
            r#"{"op":4,"d":{"mode":"aead_aes256_gcm_rtpsize","secret_key":[171,171,171]}}"#,
        )
        .unwrap();
        match GatewayEvent::aus_frame(&frame).unwrap() {
            GatewayEvent::SessionDescription(sd) => assert_eq!(&*sd.secret_key, &[0xAB; 3]),
            e => panic!("unerwartet: {e:?}"),
        }
        frame.schluessel_verwerfen();
        assert_eq!(frame.d, Value::Null);
        assert!(!frame.als_text().unwrap().contains("171"));
    }
}
