//! voicelink-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichten und Paketformate, die zwischen
//! Client und Voice-Server ausgetauscht werden:
//!
//! - `gateway`: JSON-Opcodes des Steuerkanals
//! - `rtp`: 12-Byte RTP-Header der Audio-Pakete
//! - `discovery`: 74-Byte IP-Discovery-Pakete
//! - `close`: Klassifikation der Close-Codes
//! - `crypto`: Namen der AEAD-Verschluesselungsmodi

pub mod close;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod rtp;

pub use close::{CloseAction, HEARTBEAT_TIMEOUT_CODE};
pub use crypto::{EncryptionMode, SchluesselBytes};
pub use discovery::DiscoveredAddress;
pub use error::{ProtocolError, ProtocolResult};
pub use gateway::{GatewayEvent, GatewayFrame, OpCode, SpeakingFlags};
pub use rtp::RtpHeader;
