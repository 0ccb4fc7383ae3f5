//! voicelink-voice – Medienkanal des Voice-Clients
//!
//! Sendet und empfaengt verschluesselte RTP-Audio-Pakete ueber UDP.
//!
//! ## Module
//! - [`udp`] – Media Transport: IP-Discovery, Senden, Empfangs-Loop
//! - [`speaking`] – Speaking-Ankuendigungen mit Drosselung
//! - [`state`] – Zuordnung SSRC <-> Benutzer fuer entfernte Teilnehmer
//! - [`telemetry`] – Paketzaehler des Medienkanals
//! - [`error`] – Fehlertypen

pub mod error;
pub mod speaking;
pub mod state;
pub mod telemetry;
pub mod udp;

pub use error::{MediaError, MediaResult};
pub use speaking::SpeakingTracker;
pub use state::RemoteSpeakers;
pub use telemetry::MediaStats;
pub use udp::{MediaConfig, MediaEvent, MediaTransport};
