//! Sitzungs-Zugangsdaten fuer eine Voice-Verbindung
//!
//! Eine `Session` wird beim `connect` uebergeben und ist danach
//! unveraenderlich. Aendern sich Endpoint oder Token (z.B. nach einem
//! Server-Wechsel), wird eine neue Instanz erzeugt.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, VoicelinkError};
use crate::types::{ChannelId, ServerId, UserId};

/// Zugangsdaten und Ziel einer Voice-Sitzung
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub server_id: ServerId,
    /// Sprachkanal (fehlt bei reinen Gateway-Tests)
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
    pub session_id: String,
    pub token: String,
    /// Voice-Endpoint wie vom Haupt-Gateway geliefert (mit oder ohne Schema)
    pub endpoint: String,
}

impl Session {
    /// Erstellt eine neue Sitzung
    pub fn neu(
        server_id: ServerId,
        channel_id: Option<ChannelId>,
        user_id: UserId,
        session_id: impl Into<String>,
        token: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            server_id,
            channel_id,
            user_id,
            session_id: session_id.into(),
            token: token.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Kopie mit neuem Endpoint
    pub fn mit_endpoint(&self, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..self.clone()
        }
    }

    /// Kopie mit neuem Token
    pub fn mit_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..self.clone()
        }
    }

    /// Prueft dass alle Pflichtfelder gesetzt sind
    pub fn validieren(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(VoicelinkError::sitzung("session_id fehlt"));
        }
        if self.token.trim().is_empty() {
            return Err(VoicelinkError::sitzung("token fehlt"));
        }
        if self.endpoint_host().is_empty() {
            return Err(VoicelinkError::sitzung("endpoint fehlt"));
        }
        Ok(())
    }

    /// Sitzungs-ID und Token vorhanden, Resume grundsaetzlich moeglich
    pub fn ist_fortsetzbar(&self) -> bool {
        !self.session_id.is_empty() && !self.token.is_empty()
    }

    /// Host-Teil des Endpoints ohne Schema, Pfad und Standard-Port 80
    pub fn endpoint_host(&self) -> &str {
        let ohne_schema = self
            .endpoint
            .trim()
            .trim_start_matches("wss://")
            .trim_start_matches("ws://");
        let host = ohne_schema
            .split(['/', '?'])
            .next()
            .unwrap_or_default();
        host.strip_suffix(":80").unwrap_or(host)
    }

    /// URL fuer den Steuerkanal inklusive Protokollversion
    pub fn gateway_url(&self, version: u8) -> String {
        format!("wss://{}/?v={}", self.endpoint_host(), version)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("server_id", &self.server_id)
            .field("channel_id", &self.channel_id)
            .field("user_id", &self.user_id)
            .field("session_id", &self.session_id)
            .field("token", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sitzung(endpoint: &str) -> Session {
        Session::neu(ServerId(1), Some(ChannelId(2)), UserId(3), "sess", "tok", endpoint)
    }

    #[test]
    fn gateway_url_normalisiert() {
        assert_eq!(
            sitzung("eu-west123.example.gg:80").gateway_url(8),
            "wss://eu-west123.example.gg/?v=8"
        );
        assert_eq!(
            sitzung("wss://voice.example.gg/").gateway_url(4),
            "wss://voice.example.gg/?v=4"
        );
        assert_eq!(
            sitzung("127.0.0.1:4433").gateway_url(8),
            "wss://127.0.0.1:4433/?v=8"
        );
    }

    #[test]
    fn validieren_erkennt_leere_felder() {
        assert!(sitzung("voice.example.gg").validieren().is_ok());
        assert!(sitzung("").validieren().is_err());
        assert!(sitzung("x").mit_token("").validieren().is_err());
    }

    #[test]
    fn mit_endpoint_erzeugt_neue_instanz() {
        let alt = sitzung("a.example.gg");
        let neu = alt.mit_endpoint("b.example.gg");
        assert_eq!(alt.endpoint, "a.example.gg");
        assert_eq!(neu.endpoint, "b.example.gg");
        assert_eq!(neu.session_id, alt.session_id);
    }

    #[test]
    fn debug_verbirgt_token() {
        let s = format!("{:?}", sitzung("x").mit_token("geheim"));
        assert!(!s.contains("geheim"));
        assert!(s.contains("REDACTED"));
    }
}
