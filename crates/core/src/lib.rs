//! parlando-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Audio-, Protokoll-
//! und Gespraechs-Crate gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{ParlandoError, Result};
pub use event::{GespraechsSink, StummerSink};
pub use types::{Phase, SessionId, Sprecher, Turn};
