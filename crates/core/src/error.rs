//! Fehlertypen fuer Parlando
//!
//! Zentraler Fehler-Enum fuer alles, was die UI-Schicht zu sehen bekommt.
//! Keiner dieser Fehler ist fatal: jeder fuehrt hoechstens zurueck nach Idle.

use thiserror::Error;

/// Globaler Result-Alias fuer Parlando
pub type Result<T> = std::result::Result<T, ParlandoError>;

/// Alle Fehler, die an den Aufrufer gemeldet werden
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParlandoError {
    // --- Verbindung ---
    #[error("Verbindung verloren: {0}")]
    VerbindungVerloren(String),

    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    // --- Audio ---
    #[error("Mikrofon-Zugriff verweigert: {0}")]
    MikrofonVerweigert(String),

    // --- Gegenstelle ---
    #[error("Fehler der Sprach-Pipeline: {0}")]
    Pipeline(String),

    // --- Bedienung ---
    #[error("Aktion in Phase {phase} nicht erlaubt: {aktion}")]
    UngueltigeAktion { phase: String, aktion: String },
}
