//! parlando-audio – Audio-Kern des Sprach-Clients
//!
//! - PCM16-Kodierung und WAV-Header-Behandlung
//! - Capture-Encoder: Mikrofon-Samples -> PCM16-Frames fester Groesse
//! - Jitter Buffer und Wiedergabe-Scheduler fuer `audio_chunk`-Payloads
//! - Optional (Feature `geraete`): Mikrofon und Lautsprecher via cpal

pub mod capture;
#[cfg(feature = "geraete")]
pub mod device;
pub mod error;
pub mod pcm;
pub mod playback;

// Bequeme Re-Exporte der wichtigsten Typen
pub use capture::{CaptureConfig, CaptureEncoder};
#[cfg(feature = "geraete")]
pub use device::{ausgabegeraet_laden, eingabegeraet_laden, LautsprecherAusgabe, MikrofonStream};
pub use error::{AudioError, AudioResult};
pub use pcm::{pcm16_dekodieren, pcm16_kodieren, WAV_HEADER_BYTES};
pub use playback::{
    AudioAusgabe, GeplanterChunk, PlaybackChunk, PlaybackScheduler, WiedergabeConfig,
    WiedergabeStatistik,
};
