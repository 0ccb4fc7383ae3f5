//! # voicelink-crypto
//!
//! Verschluesselung der Audio-Pakete im Medienkanal.
//!
//! ## Module
//! - `backend` - AEAD-Backend-Trait und RustCrypto-Implementierung
//! - `service` - Schluesselverwaltung, Nonce-Zaehler, Paket-Ver-/Entschluesselung
//! - `auswahl` - Deterministische Modus-Auswahl aus dem Server-Angebot
//! - `types` - Schluessel-Container (wird beim Drop genullt)
//! - `error` - Fehlertypen

pub mod auswahl;
pub mod backend;
pub mod error;
pub mod service;
pub mod types;

// Bequeme Re-Exports
pub use auswahl::select_mode;
pub use backend::{AeadBackend, PacketCipher, RustCryptoBackend};
pub use error::{CryptoError, CryptoResult, DecryptError};
pub use service::EncryptionService;
pub use types::SecretKey;
