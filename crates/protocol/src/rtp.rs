//! RTP-Paketformat (UDP)
//!
//! Jedes Audio-Paket beginnt mit einem festen 12-Byte RTP-Header, der
//! unverschluesselt bleibt und als AAD in die AEAD-Verschluesselung eingeht.
//!
//! ## Header (12 Bytes, big-endian)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   Version/Flags (0x80 = Version 2, kein Padding/Extension/CSRC)
//!  1       1   Payload-Typ (0x78 = Opus)
//!  2       2   Sequenznummer
//!  4       4   Zeitstempel (48 kHz-Ticks)
//!  8       4   SSRC
//! ```
//!
//! Eingehende Pakete koennen zusaetzlich CSRCs und eine Header-Extension
//! tragen. Die 4 Byte Extension-Praeambel gehoeren zum AAD, der
//! Extension-Koerper liegt verschluesselt am Anfang des Klartexts.

use std::io;

/// Header-Groesse in Bytes
pub const HEADER_GROESSE: usize = 12;

/// Erstes Header-Byte ausgehender Pakete (Version 2)
pub const VERSION_BYTE: u8 = 0x80;

/// Payload-Typ fuer Opus
pub const PAYLOAD_TYP_OPUS: u8 = 0x78;

/// RTP-Versionsnummer in den oberen zwei Bits
pub const RTP_VERSION: u8 = 2;

const EXTENSION_BIT: u8 = 0x10;
const CSRC_MASKE: u8 = 0x0F;
const EXTENSION_PRAEAMBEL: usize = 4;

// ---------------------------------------------------------------------------
// RtpHeader
// ---------------------------------------------------------------------------

/// Fester 12-Byte Header eines ausgehenden Audio-Pakets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Sequenznummer (wraps bei 16 Bit)
    pub sequence: u16,
    /// Zeitstempel (wraps bei 32 Bit)
    pub timestamp: u32,
    /// Synchronisation Source des Senders
    pub ssrc: u32,
}

impl RtpHeader {
    /// Erstellt einen neuen Header
    pub fn new(sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            sequence,
            timestamp,
            ssrc,
        }
    }

    /// Serialisiert den Header in ein 12-Byte-Array (big-endian)
    pub fn encode(&self) -> [u8; HEADER_GROESSE] {
        let mut buf = [0u8; HEADER_GROESSE];
        buf[0] = VERSION_BYTE;
        buf[1] = PAYLOAD_TYP_OPUS;
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        buf
    }

    /// Liest Sequenz, Zeitstempel und SSRC aus einem Paket
    ///
    /// # Fehler
    /// - `InvalidData` wenn das Slice kuerzer als 12 Bytes ist
    /// - `InvalidData` wenn die RTP-Version nicht 2 ist
    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < HEADER_GROESSE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Header zu kurz: {} Bytes (erwartet {})",
                    buf.len(),
                    HEADER_GROESSE
                ),
            ));
        }

        let version = buf[0] >> 6;
        if version != RTP_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Ungueltige RTP-Version: {} (erwartet {})", version, RTP_VERSION),
            ));
        }

        Ok(Self {
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

// ---------------------------------------------------------------------------
// Eingehende Pakete
// ---------------------------------------------------------------------------

/// Payload-Typ ohne Marker-Bit
pub fn payload_typ(buf: &[u8]) -> Option<u8> {
    buf.get(1).map(|b| b & 0x7F)
}

/// RTCP-Pakete (Payload-Typ 72–76 nach Maskierung) tragen kein Audio
pub fn ist_rtcp(buf: &[u8]) -> bool {
    matches!(payload_typ(buf), Some(72..=76))
}

/// Laenge des unverschluesselten, authentifizierten Teils eines Pakets
///
/// 12 Bytes Header + 4 Bytes je CSRC + 4 Bytes Extension-Praeambel.
/// `None` wenn das Paket kuerzer ist als der angekuendigte Header.
pub fn aad_laenge(buf: &[u8]) -> Option<usize> {
    let erstes = *buf.first()?;
    let mut laenge = HEADER_GROESSE + 4 * usize::from(erstes & CSRC_MASKE);
    if erstes & EXTENSION_BIT != 0 {
        laenge += EXTENSION_PRAEAMBEL;
    }
    (buf.len() >= laenge).then_some(laenge)
}

/// Laenge des verschluesselten Extension-Koerpers in Bytes
///
/// Liest die Wortanzahl aus den letzten 2 Bytes der Praeambel. 0 wenn das
/// Paket keine Extension traegt.
pub fn extension_koerper_laenge(aad: &[u8]) -> usize {
    match aad.first() {
        Some(b) if b & EXTENSION_BIT != 0 && aad.len() >= HEADER_GROESSE + EXTENSION_PRAEAMBEL => {
            let n = aad.len();
            usize::from(u16::from_be_bytes([aad[n - 2], aad[n - 1]])) * 4
        }
        _ => 0,
    }
}
