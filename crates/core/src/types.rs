//! Gemeinsame Typen fuer Parlando
//!
//! Session-ID, Gespraechsphase und Turn (ein Redebeitrag).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session-ID eines Gespraechs
///
/// Die ID wird von aussen vergeben (UI-Schicht) und unveraendert in
/// ausgehenden Steuer-Nachrichten mitgeschickt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Uebernimmt eine vorhandene ID
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Erstellt eine neue zufaellige ID
    pub fn zufaellig() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Phase des Gespraechs (genau eine ist aktiv)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Kein Gespraech – Start- und Endzustand jeder Session
    Idle,
    /// Mikrofon aktiv, Benutzer spricht
    Listening,
    /// Benutzer-Turn abgeschlossen, Pipeline arbeitet
    Processing,
    /// Agent-Audio wird gepuffert und abgespielt
    Speaking,
    /// Ende angefordert, warte auf Bestaetigung
    Ending,
}

impl Phase {
    /// Gibt true zurueck wenn das Mikrofon in dieser Phase senden darf
    pub fn aufnahme_erlaubt(self) -> bool {
        self == Phase::Listening
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Listening => "listening",
            Phase::Processing => "processing",
            Phase::Speaking => "speaking",
            Phase::Ending => "ending",
        };
        f.write_str(name)
    }
}

/// Sprecher eines Turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sprecher {
    User,
    Agent,
}

/// Ein abgeschlossener Redebeitrag
///
/// Unveraenderlich nach dem Anhaengen an die History.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub sprecher: Sprecher,
    pub text: String,
    pub zeitpunkt: DateTime<Utc>,
}

impl Turn {
    /// Erstellt einen Turn mit aktuellem Zeitstempel
    pub fn neu(sprecher: Sprecher, text: impl Into<String>) -> Self {
        Self {
            sprecher,
            text: text.into(),
            zeitpunkt: Utc::now(),
        }
    }
}
