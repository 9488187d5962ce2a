//! Wire-Format des Duplex-Kanals
//!
//! Der Kanal transportiert zwei Frame-Arten:
//!
//! ```text
//! Text-Frame   -> JSON-Objekt mit "type"-Feld  (Steuerung, beide Richtungen)
//! Binaer-Frame -> PCM16 LE Mono                (nur Client -> Pipeline)
//! ```
//!
//! Dieses Modul klassifiziert eingehende Frames und beschreibt ausgehende.

use bytes::Bytes;
use thiserror::Error;

use crate::control::{ClientNachricht, ServerNachricht};

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler beim Klassifizieren eines eingehenden Frames
#[derive(Debug, Error)]
pub enum WireFehler {
    #[error("Kein gueltiges JSON: {0}")]
    KeinJson(#[source] serde_json::Error),

    #[error("JSON-Nachricht ohne 'type'-Feld")]
    OhneTyp,

    #[error("Nachricht '{typ}' fehlerhaft: {quelle}")]
    Fehlerhaft {
        typ: String,
        #[source]
        quelle: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Eingehend
// ---------------------------------------------------------------------------

/// Klassifizierter eingehender Frame
#[derive(Debug, Clone, PartialEq)]
pub enum Eingehend {
    /// Bekannte Steuernachricht
    Nachricht(ServerNachricht),
    /// JSON mit unbekanntem `type` (wird geloggt und ignoriert)
    UnbekannterTyp(String),
}

/// Klassifiziert einen eingehenden Text-Frame
pub fn text_klassifizieren(text: &str) -> Result<Eingehend, WireFehler> {
    let wert: serde_json::Value = serde_json::from_str(text).map_err(WireFehler::KeinJson)?;

    let typ = wert
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_owned)
        .ok_or(WireFehler::OhneTyp)?;

    match serde_json::from_value::<ServerNachricht>(wert) {
        Ok(ServerNachricht::Unbekannt) => Ok(Eingehend::UnbekannterTyp(typ)),
        Ok(nachricht) => Ok(Eingehend::Nachricht(nachricht)),
        Err(quelle) => Err(WireFehler::Fehlerhaft { typ, quelle }),
    }
}

// ---------------------------------------------------------------------------
// Ausgehend
// ---------------------------------------------------------------------------

/// Ausgehender Frame, wie ihn der Transport auf den Draht legt
#[derive(Debug, Clone, PartialEq)]
pub enum Ausgehend {
    /// JSON-Steuernachricht (Text-Frame)
    Steuerung(ClientNachricht),
    /// PCM16-Frame vom Mikrofon (Binaer-Frame)
    Audio(Bytes),
}

impl Ausgehend {
    /// Groesse der Nutzlast in Bytes (fuer Logging)
    pub fn laenge(&self) -> usize {
        match self {
            Self::Steuerung(n) => n.to_json().map(|j| j.len()).unwrap_or(0),
            Self::Audio(b) => b.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bekannte_nachricht() {
        let e = text_klassifizieren(r#"{"type":"audio_complete","total_chunks":4}"#).unwrap();
        assert_eq!(
            e,
            Eingehend::Nachricht(ServerNachricht::AudioComplete { total_chunks: 4 })
        );
    }

    #[test]
    fn unbekannter_typ_behaelt_namen() {
        let e = text_klassifizieren(r#"{"type":"recording_stopped"}"#).unwrap();
        assert_eq!(e, Eingehend::UnbekannterTyp("recording_stopped".into()));
    }

    #[test]
    fn kaputtes_json() {
        assert!(matches!(
            text_klassifizieren("{nicht json"),
            Err(WireFehler::KeinJson(_))
        ));
    }

    #[test]
    fn json_ohne_typ() {
        assert!(matches!(
            text_klassifizieren(r#"{"text":"hallo"}"#),
            Err(WireFehler::OhneTyp)
        ));
    }

    #[test]
    fn fehlerhafte_bekannte_nachricht() {
        match text_klassifizieren(r#"{"type":"turn_complete"}"#) {
            Err(WireFehler::Fehlerhaft { typ, .. }) => assert_eq!(typ, "turn_complete"),
            andere => panic!("Erwartet Fehlerhaft, erhalten {andere:?}"),
        }
    }

    #[test]
    fn ausgehend_laenge() {
        let audio = Ausgehend::Audio(Bytes::from_static(&[0, 1, 2, 3]));
        assert_eq!(audio.laenge(), 4);
        let ping = Ausgehend::Steuerung(ClientNachricht::Ping);
        assert_eq!(ping.laenge(), r#"{"type":"ping"}"#.len());
    }
}
