//! Klassifikation der Close-Codes des Steuerkanals
//!
//! Nach einem unerwarteten Schliessen entscheidet der Close-Code, ob die
//! Sitzung fortgesetzt (Resume), neu aufgebaut (Identify) oder beendet wird.

/// Close-Code fuer einen abnormalen Abbruch; wird auch fuer einen
/// Heartbeat-Timeout verwendet.
pub const HEARTBEAT_TIMEOUT_CODE: u16 = 1006;

/// Aus dem Sprachkanal entfernt (Kick, Kanal geloescht)
pub const GETRENNT_CODE: u16 = 4014;

/// Codes, nach denen ein Resume sinnlos ist
pub const NICHT_FORTSETZBAR: [u16; 11] = [
    4001, // Unbekannter Opcode
    4002, // Payload nicht dekodierbar
    4003, // Nicht authentifiziert
    4004, // Authentifizierung fehlgeschlagen
    4005, // Bereits authentifiziert
    4006, // Sitzung ungueltig
    4009, // Sitzung abgelaufen
    4011, // Server nicht gefunden
    4012, // Unbekanntes Protokoll
    4016, // Unbekannter Verschluesselungsmodus
    4020, // Ungueltige Anfrage
];

/// Reaktion auf ein Schliessen des Steuerkanals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Resume mit bestehender Sitzung versuchen
    Resume,
    /// Frische Identify-Sequenz
    Identify,
    /// Sitzung endet endgueltig
    Getrennt,
}

impl CloseAction {
    /// Bestimmt die Reaktion auf einen Close-Code
    pub fn fuer_code(code: u16) -> Self {
        if code == GETRENNT_CODE {
            Self::Getrennt
        } else if NICHT_FORTSETZBAR.contains(&code) {
            Self::Identify
        } else {
            Self::Resume
        }
    }
}
