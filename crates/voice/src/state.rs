//! Entfernte Teilnehmer – SSRC <-> Benutzer
//!
//! Der Server meldet per Speaking (Op 5) welche SSRC zu welchem Benutzer
//! gehoert, per ClientConnect/ClientDisconnect (Op 11/13) wer den Kanal
//! betritt oder verlaesst. Diese Zuordnung ist rein informativ und wird
//! nie mit den Zaehlern der eigenen Mediensitzung vermischt.
//!
//! Thread-safe durch DashMap (lock-free concurrent HashMap).

use dashmap::DashMap;
use std::sync::Arc;
use voicelink_core::types::UserId;
use voicelink_protocol::SpeakingFlags;

/// Zustand eines entfernten Teilnehmers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteTeilnehmer {
    pub user_id: UserId,
    /// Erst nach dem ersten Speaking-Event bekannt
    pub ssrc: Option<u32>,
    pub flags: SpeakingFlags,
}

/// Zuordnung aller entfernten Teilnehmer der aktuellen Sitzung
#[derive(Clone, Default)]
pub struct RemoteSpeakers {
    inner: Arc<RemoteSpeakersInner>,
}

#[derive(Default)]
struct RemoteSpeakersInner {
    teilnehmer: DashMap<UserId, RemoteTeilnehmer>,
    /// SSRC -> UserId fuer schnellen Lookup aus UDP-Paketen
    ssrc_index: DashMap<u32, UserId>,
}

impl RemoteSpeakers {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Teilnehmer ist dem Kanal beigetreten (SSRC noch unbekannt)
    pub fn verbunden(&self, user_id: UserId) {
        self.inner
            .teilnehmer
            .entry(user_id)
            .or_insert(RemoteTeilnehmer {
                user_id,
                ssrc: None,
                flags: SpeakingFlags::NONE,
            });
        tracing::debug!(user_id = %user_id, "Teilnehmer verbunden");
    }

    /// Speaking-Event: aktualisiert Flags und SSRC-Zuordnung
    pub fn speaking_aktualisieren(&self, user_id: UserId, ssrc: u32, flags: SpeakingFlags) {
        let alte_ssrc = self
            .inner
            .teilnehmer
            .insert(
                user_id,
                RemoteTeilnehmer {
                    user_id,
                    ssrc: Some(ssrc),
                    flags,
                },
            )
            .and_then(|alt| alt.ssrc);

        if let Some(alt) = alte_ssrc.filter(|&alt| alt != ssrc) {
            self.inner.ssrc_index.remove(&alt);
        }
        self.inner.ssrc_index.insert(ssrc, user_id);
    }

    /// Entfernt einen Teilnehmer; gibt seine SSRC zurueck (falls bekannt)
    pub fn entfernen(&self, user_id: &UserId) -> Option<u32> {
        let (_, t) = self.inner.teilnehmer.remove(user_id)?;
        if let Some(ssrc) = t.ssrc {
            self.inner
                .ssrc_index
                .remove_if(&ssrc, |_, besitzer| besitzer == user_id);
        }
        tracing::debug!(user_id = %user_id, "Teilnehmer entfernt");
        t.ssrc
    }

    /// Sucht UserId anhand der SSRC (Hot Path)
    pub fn user_fuer_ssrc(&self, ssrc: u32) -> Option<UserId> {
        self.inner.ssrc_index.get(&ssrc).map(|r| *r)
    }

    pub fn teilnehmer(&self, user_id: &UserId) -> Option<RemoteTeilnehmer> {
        self.inner.teilnehmer.get(user_id).map(|r| *r)
    }

    /// Alle Teilnehmer, die gerade sprechen
    pub fn sprechende(&self) -> Vec<UserId> {
        self.inner
            .teilnehmer
            .iter()
            .filter(|e| !e.flags.is_empty())
            .map(|e| e.user_id)
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.inner.teilnehmer.len()
    }

    /// Verwirft alle Zuordnungen (neue Sitzung)
    pub fn leeren(&self) {
        self.inner.teilnehmer.clear();
        self.inner.ssrc_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaking_setzt_ssrc_zuordnung() {
        let r = RemoteSpeakers::neu();
        r.verbunden(UserId(1));
        assert_eq!(r.teilnehmer(&UserId(1)).unwrap().ssrc, None);

        r.speaking_aktualisieren(UserId(1), 100, SpeakingFlags::MICROPHONE);
        assert_eq!(r.user_fuer_ssrc(100), Some(UserId(1)));
        assert_eq!(r.sprechende(), vec![UserId(1)]);
    }

    #[test]
    fn neue_ssrc_ersetzt_alte() {
        let r = RemoteSpeakers::neu();
        r.speaking_aktualisieren(UserId(1), 100, SpeakingFlags::MICROPHONE);
        r.speaking_aktualisieren(UserId(1), 200, SpeakingFlags::NONE);
        assert_eq!(r.user_fuer_ssrc(100), None);
        assert_eq!(r.user_fuer_ssrc(200), Some(UserId(1)));
        assert!(r.sprechende().is_empty());
    }

    #[test]
    fn entfernen_bereinigt_index() {
        let r = RemoteSpeakers::neu();
        r.speaking_aktualisieren(UserId(1), 100, SpeakingFlags::MICROPHONE);
        assert_eq!(r.entfernen(&UserId(1)), Some(100));
        assert_eq!(r.user_fuer_ssrc(100), None);
        assert_eq!(r.anzahl(), 0);
        assert_eq!(r.entfernen(&UserId(1)), None);
    }

    #[test]
    fn wiederverwendete_ssrc_bleibt_beim_neuen_besitzer() {
        let r = RemoteSpeakers::neu();
        r.speaking_aktualisieren(UserId(1), 100, SpeakingFlags::MICROPHONE);
        r.speaking_aktualisieren(UserId(2), 100, SpeakingFlags::MICROPHONE);
        r.entfernen(&UserId(1));
        assert_eq!(r.user_fuer_ssrc(100), Some(UserId(2)));
    }

    #[test]
    fn leeren() {
        let r = RemoteSpeakers::neu();
        r.verbunden(UserId(1));
        r.speaking_aktualisieren(UserId(2), 5, SpeakingFlags::SOUNDSHARE);
        r.leeren();
        assert_eq!(r.anzahl(), 0);
        assert_eq!(r.user_fuer_ssrc(5), None);
    }
}
