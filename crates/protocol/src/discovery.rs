//! IP-Discovery (UDP)
//!
//! Vor der Protokollauswahl ermittelt der Client seine oeffentliche
//! Adresse, indem er ein 74-Byte-Paket an den Medienserver schickt.
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       2   Typ (0x0001 Anfrage, 0x0002 Antwort)
//!  2       2   Laenge (70)
//!  4       4   SSRC
//!  8      64   Adresse (NUL-terminiert, nur in der Antwort)
//! 72       2   Port (nur in der Antwort)
//! ```

use serde::{Deserialize, Serialize};
use std::io;

/// Gesamtgroesse eines Discovery-Pakets
pub const PAKET_GROESSE: usize = 74;

/// Wert des Laengenfelds (Paket ohne Typ und Laenge)
pub const LAENGE_FELD: u16 = 70;

/// Typ einer Anfrage
pub const TYP_ANFRAGE: u16 = 0x0001;

/// Typ einer Antwort
pub const TYP_ANTWORT: u16 = 0x0002;

const ADRESSE_START: usize = 8;
const ADRESSE_ENDE: usize = 72;

/// Vom Server gemeldete externe Adresse des Clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredAddress {
    pub ip: String,
    pub port: u16,
}

impl std::fmt::Display for DiscoveredAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Baut die Discovery-Anfrage fuer eine SSRC
pub fn anfrage_kodieren(ssrc: u32) -> [u8; PAKET_GROESSE] {
    let mut buf = [0u8; PAKET_GROESSE];
    buf[0..2].copy_from_slice(&TYP_ANFRAGE.to_be_bytes());
    buf[2..4].copy_from_slice(&LAENGE_FELD.to_be_bytes());
    buf[4..8].copy_from_slice(&ssrc.to_be_bytes());
    buf
}

/// Liest eine Discovery-Antwort
///
/// # Fehler
/// - `InvalidData` bei falscher Laenge oder falschem Typ
/// - `InvalidData` wenn die Adresse leer oder kein UTF-8 ist
pub fn antwort_dekodieren(buf: &[u8]) -> io::Result<DiscoveredAddress> {
    if buf.len() < PAKET_GROESSE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Discovery-Antwort zu kurz: {} Bytes", buf.len()),
        ));
    }

    let typ = u16::from_be_bytes([buf[0], buf[1]]);
    if typ != TYP_ANTWORT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Unerwarteter Discovery-Typ: {:#06x}", typ),
        ));
    }

    let adresse = &buf[ADRESSE_START..ADRESSE_ENDE];
    let ende = adresse.iter().position(|&b| b == 0).unwrap_or(adresse.len());
    let ip = std::str::from_utf8(&adresse[..ende])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        .to_string();
    if ip.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Discovery-Antwort ohne Adresse",
        ));
    }

    let port = u16::from_be_bytes([buf[ADRESSE_ENDE], buf[ADRESSE_ENDE + 1]]);
    Ok(DiscoveredAddress { ip, port })
}

/// Baut eine Discovery-Antwort (Gegenstelle in Tests und Loopback-Servern)
pub fn antwort_kodieren(ssrc: u32, adresse: &DiscoveredAddress) -> [u8; PAKET_GROESSE] {
    let mut buf = [0u8; PAKET_GROESSE];
    buf[0..2].copy_from_slice(&TYP_ANTWORT.to_be_bytes());
    buf[2..4].copy_from_slice(&LAENGE_FELD.to_be_bytes());
    buf[4..8].copy_from_slice(&ssrc.to_be_bytes());
    let ip = adresse.ip.as_bytes();
    let n = ip.len().min(ADRESSE_ENDE - ADRESSE_START - 1);
    buf[ADRESSE_START..ADRESSE_START + n].copy_from_slice(&ip[..n]);
    buf[ADRESSE_ENDE..].copy_from_slice(&adresse.port.to_be_bytes());
    buf
}
