//! AEAD-Verschluesselungsmodi des Medienkanals
//!
//! Der Server bietet im Ready-Payload eine Liste von Modus-Namen an.
//! Unterstuetzt werden nur die beiden "rtpsize"-AEAD-Modi; alle anderen
//! Namen (z.B. Legacy-`xsalsa20_*`) werden beim Parsen verworfen.
//!
//! ## Paketformat (beide Modi)
//!
//! ```text
//! [RTP-Header (AAD)] [Ciphertext + Tag(16)] [Nonce-Zaehler(4, big-endian)]
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use zeroize::Zeroizing;

/// Laenge des geheimen Schluessels (beide Modi)
pub const SCHLUESSEL_LAENGE: usize = 32;

/// Laenge des AEAD-Auth-Tags (beide Modi)
pub const TAG_LAENGE: usize = 16;

/// Laenge des an das Paket angehaengten Nonce-Zaehlers
pub const NONCE_ZAEHLER_LAENGE: usize = 4;

// ---------------------------------------------------------------------------
// SchluesselBytes
// ---------------------------------------------------------------------------

/// Rohe Schluesselbytes aus der SessionDescription, beim Drop genullt
///
/// Laenge und Inhalt prueft erst der Encryption Service.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SchluesselBytes(Zeroizing<Vec<u8>>);

impl SchluesselBytes {
    pub fn neu(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }
}

impl From<Vec<u8>> for SchluesselBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::neu(bytes)
    }
}

impl Deref for SchluesselBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Debug for SchluesselBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED] {} bytes", self.0.len())
    }
}

impl Serialize for SchluesselBytes {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for SchluesselBytes {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Vec::<u8>::deserialize(d).map(Self::neu)
    }
}

// ---------------------------------------------------------------------------
// EncryptionMode
// ---------------------------------------------------------------------------

/// Ausgehandelter Verschluesselungsmodus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionMode {
    /// AES-256-GCM, 96-Bit-Nonce
    AeadAes256GcmRtpsize,
    /// XChaCha20-Poly1305, 192-Bit-Nonce
    AeadXChaCha20Poly1305Rtpsize,
}

impl EncryptionMode {
    /// Alle unterstuetzten Modi
    pub const ALLE: [EncryptionMode; 2] = [
        EncryptionMode::AeadXChaCha20Poly1305Rtpsize,
        EncryptionMode::AeadAes256GcmRtpsize,
    ];

    /// Kanonischer Name auf dem Draht
    pub fn name(&self) -> &'static str {
        match self {
            Self::AeadAes256GcmRtpsize => "aead_aes256_gcm_rtpsize",
            Self::AeadXChaCha20Poly1305Rtpsize => "aead_xchacha20_poly1305_rtpsize",
        }
    }

    /// Nonce-Laenge der AEAD-Primitive in Bytes
    pub fn nonce_laenge(&self) -> usize {
        match self {
            Self::AeadAes256GcmRtpsize => 12,
            Self::AeadXChaCha20Poly1305Rtpsize => 24,
        }
    }

    /// Filtert eine Server-Angebotsliste auf bekannte Modi (Reihenfolge bleibt)
    pub fn aus_angebot<S: AsRef<str>>(angebot: &[S]) -> Vec<EncryptionMode> {
        let mut modi = Vec::new();
        for name in angebot {
            if let Ok(modus) = name.as_ref().parse::<EncryptionMode>() {
                if !modi.contains(&modus) {
                    modi.push(modus);
                }
            }
        }
        modi
    }
}

impl std::fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EncryptionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aead_aes256_gcm_rtpsize" | "aes256_gcm_rtpsize" => Ok(Self::AeadAes256GcmRtpsize),
            "aead_xchacha20_poly1305_rtpsize" => Ok(Self::AeadXChaCha20Poly1305Rtpsize),
            other => Err(format!("Unbekannter Verschluesselungsmodus: '{}'", other)),
        }
    }
}

impl Serialize for EncryptionMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for EncryptionMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
