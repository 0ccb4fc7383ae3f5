//! Gemeinsame Identifikationstypen fuer Voicelink
//!
//! Alle IDs sind 64-Bit-Snowflakes im Newtype-Pattern, damit Server-,
//! Kanal- und Benutzer-IDs zur Compilezeit nicht verwechselt werden.
//! Auf dem Draht werden Snowflakes als Dezimal-Strings uebertragen;
//! beim Lesen werden auch nackte Zahlen akzeptiert.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::VoicelinkError;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident, $praefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// Gibt den inneren Snowflake-Wert zurueck
            pub fn inner(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(wert: u64) -> Self {
                Self(wert)
            }
        }

        impl FromStr for $name {
            type Err = VoicelinkError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| VoicelinkError::UngueltigeId(format!("{}: {s:?}", $praefix)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(SnowflakeVisitor).map(Self)
            }
        }
    };
}

snowflake_id!(
    /// Snowflake eines Benutzers
    UserId,
    "user"
);
snowflake_id!(
    /// Snowflake eines Sprachkanals
    ChannelId,
    "channel"
);
snowflake_id!(
    /// Snowflake eines Servers (Guild)
    ServerId,
    "server"
);

/// Liest einen Snowflake aus String oder Zahl
struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("einen Snowflake als String oder Zahl")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negativer Snowflake: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        v.parse::<u64>()
            .map_err(|_| E::custom(format!("ungueltiger Snowflake: {v:?}")))
    }
}
