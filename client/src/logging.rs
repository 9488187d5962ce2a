//! Logging des Terminal-Clients
//!
//! stdout gehoert der Gespraechsanzeige, alle Logs gehen nach stderr.
//! `PARLANDO_LOG_LEVEL` und `PARLANDO_LOG_FORMAT` ueberschreiben die Werte
//! aus `[logging]`, z.B. `PARLANDO_LOG_LEVEL=parlando_audio=trace`.

use tracing_subscriber::{fmt, EnvFilter};

const ENV_LEVEL: &str = "PARLANDO_LOG_LEVEL";
const ENV_FORMAT: &str = "PARLANDO_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Unbekannte Werte fallen auf Text zurueck
    pub fn aus_name(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Format aus Umgebung oder Konfiguration
fn format_waehlen(konfiguriert: &str, umgebung: Option<&str>) -> LogFormat {
    LogFormat::aus_name(umgebung.unwrap_or(konfiguriert))
}

/// Installiert den globalen Subscriber (einmal pro Prozess)
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(ENV_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let umgebung = std::env::var(ENV_FORMAT).ok();

    match format_waehlen(format, umgebung.as_deref()) {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO"));
    }

    #[test]
    fn umgebung_schlaegt_konfiguration() {
        assert_eq!(format_waehlen("text", Some("json")), LogFormat::Json);
        assert_eq!(format_waehlen("json", None), LogFormat::Json);
        assert_eq!(format_waehlen("json", Some("text")), LogFormat::Text);
    }

    #[test]
    fn unbekanntes_format_ist_text() {
        assert!(!log_format_gueltig("xml"));
        assert_eq!(LogFormat::aus_name("xml"), LogFormat::Text);
    }
}
