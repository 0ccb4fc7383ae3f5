//! Speaking-Ankuendigungen (Op 5)
//!
//! Vor dem ersten Audio-Paket einer SSRC muss der Client ankuendigen,
//! dass er spricht. Der Tracker merkt sich die letzte Ankuendigung und
//! entscheidet, ob eine neue gesendet werden muss:
//!
//! - identische Ankuendigung innerhalb der Drosselzeit: unterdrueckt
//!   (ausser `force`)
//! - jede Aenderung an Flags, SSRC oder Delay: sofort gesendet
//! - `ensure_speaking_before_transmission`: sendet nur, wenn fuer die
//!   SSRC noch keine Ankuendigung existiert; explizit gesetzte Flags und
//!   Delay bleiben erhalten
//!
//! Der Tracker sendet selbst nichts; er liefert den Payload, den der
//! Aufrufer in die Steuerkanal-Queue legt.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use voicelink_protocol::gateway::SpeakingPayload;
use voicelink_protocol::SpeakingFlags;

#[derive(Debug, Clone, Copy)]
struct Ankuendigung {
    payload: SpeakingPayload,
    zeitpunkt: Instant,
}

/// Merkt sich die letzte Speaking-Ankuendigung der Sitzung
#[derive(Debug)]
pub struct SpeakingTracker {
    drossel: Duration,
    letzte: Mutex<Option<Ankuendigung>>,
}

impl SpeakingTracker {
    pub fn neu(drossel: Duration) -> Self {
        Self {
            drossel,
            letzte: Mutex::new(None),
        }
    }

    /// Explizite Ankuendigung
    ///
    /// Gibt den zu sendenden Payload zurueck oder `None`, wenn die
    /// Ankuendigung gedrosselt wurde.
    pub fn set_speaking(
        &self,
        flags: SpeakingFlags,
        ssrc: u32,
        delay: u32,
        force: bool,
    ) -> Option<SpeakingPayload> {
        let payload = SpeakingPayload {
            speaking: flags,
            delay,
            ssrc,
        };
        let jetzt = Instant::now();
        let mut letzte = self.letzte.lock();

        if let Some(alt) = letzte.as_ref() {
            let identisch = alt.payload == payload;
            if identisch && !force && jetzt.duration_since(alt.zeitpunkt) < self.drossel {
                tracing::trace!(ssrc, flags = flags.bits(), "Speaking gedrosselt");
                return None;
            }
        }

        *letzte = Some(Ankuendigung {
            payload,
            zeitpunkt: jetzt,
        });
        tracing::debug!(ssrc, flags = flags.bits(), delay, "Speaking angekuendigt");
        Some(payload)
    }

    /// Stellt sicher, dass vor dem Senden von Audio angekuendigt wurde
    ///
    /// Liefert nur dann einen Payload (`flags`, `ssrc`, Delay 0), wenn
    /// fuer diese SSRC noch nichts angekuendigt wurde. Eine vorherige
    /// Ankuendigung per `set_speaking` wird nicht ueberschrieben.
    pub fn ensure_speaking_before_transmission(
        &self,
        ssrc: u32,
        flags: SpeakingFlags,
    ) -> Option<SpeakingPayload> {
        let gewuenscht = SpeakingPayload {
            speaking: flags,
            delay: 0,
            ssrc,
        };
        let mut letzte = self.letzte.lock();
        if letzte.as_ref().is_some_and(|a| a.payload.ssrc == ssrc) {
            return None;
        }
        *letzte = Some(Ankuendigung {
            payload: gewuenscht,
            zeitpunkt: Instant::now(),
        });
        tracing::debug!(ssrc, flags = flags.bits(), "Speaking vor Uebertragung angekuendigt");
        Some(gewuenscht)
    }

    /// Letzte gesendete Ankuendigung
    pub fn letzte(&self) -> Option<SpeakingPayload> {
        self.letzte.lock().as_ref().map(|a| a.payload)
    }

    /// Vergisst die letzte Ankuendigung (neue Mediensitzung)
    pub fn reset(&self) {
        *self.letzte.lock() = None;
    }
}
