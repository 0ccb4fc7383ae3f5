//! Paketzaehler des Medienkanals
//!
//! Die Zaehler werden vom Sendepfad und von der Empfangs-Loop lock-frei
//! erhoeht. `snapshot()` liefert einen unveraenderlichen Stand fuer
//! Aufrufer und Logs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unveraenderlicher Stand der Paketzaehler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaStats {
    /// Erfolgreich gesendete Pakete
    pub pakete_gesendet: u64,
    /// Gesendete Bytes (inkl. Header, Tag und Nonce)
    pub bytes_gesendet: u64,
    /// Fehlgeschlagene Sendeversuche (Socket oder Verschluesselung)
    pub sende_fehler: u64,
    /// Entschluesselte und weitergereichte Pakete
    pub pakete_empfangen: u64,
    /// Pakete mit ungueltigem Tag oder falschem Format
    pub entschluesselungs_fehler: u64,
    /// Datagramme von anderen Absendern als dem Medienserver
    pub fremde_datagramme: u64,
}

impl MediaStats {
    /// Gibt eine lesbare Zusammenfassung zurueck
    pub fn zusammenfassung(&self) -> String {
        format!(
            "Gesendet={} ({} B) Sendefehler={} Empfangen={} Entschluesselungsfehler={} Fremd={}",
            self.pakete_gesendet,
            self.bytes_gesendet,
            self.sende_fehler,
            self.pakete_empfangen,
            self.entschluesselungs_fehler,
            self.fremde_datagramme,
        )
    }
}

/// Lock-freie Zaehler (geteilt zwischen Sendepfad und Empfangs-Task)
#[derive(Debug, Default)]
pub(crate) struct MediaTelemetrie {
    pakete_gesendet: AtomicU64,
    bytes_gesendet: AtomicU64,
    sende_fehler: AtomicU64,
    pakete_empfangen: AtomicU64,
    entschluesselungs_fehler: AtomicU64,
    fremde_datagramme: AtomicU64,
}

impl MediaTelemetrie {
    pub(crate) fn gesendet(&self, bytes: usize) {
        self.pakete_gesendet.fetch_add(1, Ordering::Relaxed);
        self.bytes_gesendet.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn sende_fehler(&self) {
        self.sende_fehler.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn empfangen(&self) {
        self.pakete_empfangen.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn entschluesselungs_fehler(&self) {
        self.entschluesselungs_fehler.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fremdes_datagramm(&self) {
        self.fremde_datagramme.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MediaStats {
        MediaStats {
            pakete_gesendet: self.pakete_gesendet.load(Ordering::Relaxed),
            bytes_gesendet: self.bytes_gesendet.load(Ordering::Relaxed),
            sende_fehler: self.sende_fehler.load(Ordering::Relaxed),
            pakete_empfangen: self.pakete_empfangen.load(Ordering::Relaxed),
            entschluesselungs_fehler: self.entschluesselungs_fehler.load(Ordering::Relaxed),
            fremde_datagramme: self.fremde_datagramme.load(Ordering::Relaxed),
        }
    }
}
