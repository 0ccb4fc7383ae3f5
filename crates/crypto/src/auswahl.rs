//! Deterministische Auswahl des Verschluesselungsmodus
//!
//! Reihenfolge: bevorzugter Modus (falls angeboten) -> XChaCha20-Poly1305
//! -> AES-256-GCM -> Fehler. Ein unverschluesselter Fallback existiert nicht.

use voicelink_protocol::EncryptionMode;

use crate::backend::AeadBackend;
use crate::error::{CryptoError, CryptoResult};

/// Waehlt den Modus aus dem Server-Angebot
pub fn select_mode<S: AsRef<str>>(
    angeboten: &[S],
    bevorzugt: Option<EncryptionMode>,
    backend: &dyn AeadBackend,
) -> CryptoResult<EncryptionMode> {
    let bekannt = EncryptionMode::aus_angebot(angeboten);
    let verfuegbar = |m: EncryptionMode| bekannt.contains(&m) && backend.supports(m);

    let kandidaten = bevorzugt.into_iter().chain([
        EncryptionMode::AeadXChaCha20Poly1305Rtpsize,
        EncryptionMode::AeadAes256GcmRtpsize,
    ]);
    for modus in kandidaten {
        if verfuegbar(modus) {
            tracing::debug!(modus = %modus, backend = backend.name(), "Verschluesselungsmodus gewaehlt");
            return Ok(modus);
        }
    }

    Err(CryptoError::KeinKompatiblerModus {
        angeboten: angeboten.iter().map(|s| s.as_ref().to_string()).collect(),
    })
}
