//! Fehlertypen fuer den Audio-Kern

use thiserror::Error;

/// Alle moeglichen Fehler im Audio-Kern
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Payload ist kein gueltiges Base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload zu kurz fuer WAV-Header: {laenge} Bytes (Header: {header} Bytes)")]
    HeaderZuKurz { laenge: usize, header: usize },

    #[error("PCM16-Payload mit ungerader Laenge: {0} Bytes")]
    UngeradeLaenge(usize),

    #[error("Leere Audio-Payload")]
    LeerePayload,

    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
