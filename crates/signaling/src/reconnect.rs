//! Reconnect-Backoff
//!
//! Versuch `n` wartet `plan[min(n - 1, len - 1)]` Millisekunden. Nach
//! `max_versuche` Versuchen ist Schluss; Ready oder Resumed setzen den
//! Zaehler zurueck.

use std::time::Duration;

use crate::config::VoiceConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    plan: Vec<u64>,
    max_versuche: u32,
    versuch: u32,
}

impl Backoff {
    pub fn neu(plan: Vec<u64>, max_versuche: u32) -> Self {
        Self {
            plan,
            max_versuche,
            versuch: 0,
        }
    }

    /// Naechste Wartezeit oder `None`, wenn alle Versuche verbraucht sind
    pub fn naechster(&mut self) -> Option<Duration> {
        if self.versuch >= self.max_versuche {
            return None;
        }
        self.versuch += 1;
        let index = (self.versuch as usize - 1).min(self.plan.len().saturating_sub(1));
        let ms = self.plan.get(index).copied().unwrap_or(0);
        Some(Duration::from_millis(ms))
    }

    /// Anzahl der bisher begonnenen Versuche
    pub fn versuch(&self) -> u32 {
        self.versuch
    }

    pub fn zuruecksetzen(&mut self) {
        self.versuch = 0;
    }
}

impl From<&VoiceConfig> for Backoff {
    fn from(c: &VoiceConfig) -> Self {
        Self::neu(c.backoff_ms.clone(), c.max_reconnect_versuche)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Option<Duration> {
        Some(Duration::from_millis(v))
    }

    #[test]
    fn standard_plan() {
        let mut b = Backoff::from(&VoiceConfig::default());
        assert_eq!(b.naechster(), ms(1_000));
        assert_eq!(b.naechster(), ms(2_000));
        assert_eq!(b.naechster(), ms(4_000));
        assert_eq!(b.naechster(), ms(8_000));
        assert_eq!(b.naechster(), ms(16_000));
        assert_eq!(b.naechster(), None);
        assert_eq!(b.versuch(), 5);
    }

    #[test]
    fn letzter_wert_wiederholt_sich() {
        let mut b = Backoff::neu(vec![10, 20], 4);
        assert_eq!(b.naechster(), ms(10));
        assert_eq!(b.naechster(), ms(20));
        assert_eq!(b.naechster(), ms(20));
        assert_eq!(b.naechster(), ms(20));
        assert_eq!(b.naechster(), None);
    }

    #[test]
    fn zuruecksetzen() {
        let mut b = Backoff::neu(vec![10, 20], 2);
        b.naechster();
        b.naechster();
        assert_eq!(b.naechster(), None);
        b.zuruecksetzen();
        assert_eq!(b.naechster(), ms(10));
    }

    #[test]
    fn leerer_plan() {
        let mut b = Backoff::neu(Vec::new(), 1);
        assert_eq!(b.naechster(), Some(Duration::ZERO));
        assert_eq!(b.naechster(), None);
    }
}
