//! Steuer-Protokoll (JSON ueber den Duplex-Kanal)
//!
//! Definiert alle Nachrichten zwischen Client und Sprach-Pipeline.
//!
//! ## Design
//! - Jede Nachricht ist ein JSON-Objekt mit `type`-Feld
//! - Tagged Enums fuer typsichere Nachrichtentypen (`#[serde(tag = "type")]`)
//! - Zusatzfelder der Gegenstelle (`message`, `timestamp`, ...) werden ignoriert
//! - Unbekannte Typen landen in [`ServerNachricht::Unbekannt`]

use parlando_core::types::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Ausgehend (Client -> Pipeline)
// ---------------------------------------------------------------------------

/// Steuernachricht vom Client an die Pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientNachricht {
    /// API-Schluessel fuer STT/LLM/TTS, einmal nach Verbindungsaufbau
    UserCredentials {
        keys: BTreeMap<String, String>,
        session_id: SessionId,
    },
    /// Getippte Benutzernachricht statt Sprache
    ChatMessage { text: String, session_id: SessionId },
    /// Benutzer beendet das Gespraech
    EndConversation { session_id: SessionId },
    /// Keepalive
    Ping,
}

impl ClientNachricht {
    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Wert des `type`-Felds (fuer Logging)
    pub fn typ(&self) -> &'static str {
        match self {
            Self::UserCredentials { .. } => "user_credentials",
            Self::ChatMessage { .. } => "chat_message",
            Self::EndConversation { .. } => "end_conversation",
            Self::Ping => "ping",
        }
    }
}

// ---------------------------------------------------------------------------
// Eingehend (Pipeline -> Client)
// ---------------------------------------------------------------------------

/// Nachricht der Pipeline an den Client (geschlossene Menge)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNachricht {
    /// Kanal steht
    Connection {
        #[serde(default)]
        status: Option<String>,
    },
    /// STT-Session auf der Gegenseite geoeffnet
    SessionOpened {
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Teil-Transkript waehrend der Benutzer spricht
    Transcript {
        #[serde(default)]
        text: String,
        #[serde(default)]
        is_final: bool,
    },
    /// Benutzer hat aufgehoert zu sprechen
    TurnComplete { final_transcript: String },
    /// Antwort wird erzeugt
    ChatStarted {
        #[serde(default)]
        user_message: String,
    },
    /// Ein Stueck synthetisierte Sprache (base64, PCM16 LE)
    AudioChunk {
        #[serde(default)]
        chunk_index: u32,
        audio_data: String,
    },
    /// Vollstaendiger Antworttext des Sprachmodells
    LlmResponseComplete {
        #[serde(default)]
        llm_response: String,
    },
    /// Verarbeitung der Anfrage abgeschlossen
    ChatComplete,
    /// Keine weiteren Audio-Chunks fuer diese Antwort
    AudioComplete {
        #[serde(default)]
        total_chunks: u32,
    },
    /// Gegenseite bestaetigt das Gespraechsende
    ConversationEnded,
    /// Fehler der Pipeline
    Error {
        #[serde(default)]
        message: String,
    },
    /// Antwort auf Ping
    Pong,
    /// Unbekannter `type` (Vorwaertskompatibilitaet)
    #[serde(other)]
    Unbekannt,
}

impl ServerNachricht {
    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Wert des `type`-Felds (fuer Logging)
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::SessionOpened { .. } => "session_opened",
            Self::Transcript { .. } => "transcript",
            Self::TurnComplete { .. } => "turn_complete",
            Self::ChatStarted { .. } => "chat_started",
            Self::AudioChunk { .. } => "audio_chunk",
            Self::LlmResponseComplete { .. } => "llm_response_complete",
            Self::ChatComplete => "chat_complete",
            Self::AudioComplete { .. } => "audio_complete",
            Self::ConversationEnded => "conversation_ended",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
            Self::Unbekannt => "unbekannt",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
