//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, nur URL und Schluessel muessen in der Regel
//! gesetzt werden.

use parlando_audio::{CaptureConfig, WiedergabeConfig};
use parlando_conversation::{GespraechConfig, ZeitgeberConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Verbindung zur Sprach-Pipeline
    pub verbindung: VerbindungEinstellungen,
    /// Mikrofon-Capture
    pub capture: CaptureConfig,
    /// Jitter Buffer und Wiedergabe
    pub wiedergabe: WiedergabeConfig,
    /// Zeitgeber der Zustandsmaschine
    pub zeitgeber: ZeitgeberConfig,
    /// Audio-Geraete
    pub geraete: GeraeteEinstellungen,
    /// Logging
    pub logging: LoggingEinstellungen,
}

/// Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungEinstellungen {
    /// WebSocket-URL der Pipeline
    pub url: String,
    /// API-Schluessel pro Dienst (werden mit `user_credentials` gesendet)
    pub schluessel: BTreeMap<String, String>,
}

impl Default for VerbindungEinstellungen {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".into(),
            schluessel: BTreeMap::new(),
        }
    }
}

/// Geraeteauswahl (None = Systemstandard)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeraeteEinstellungen {
    pub eingabe: Option<String>,
    pub ausgabe: Option<String>,
    /// Abfrageintervall fuer den Mikrofon-Puffer
    pub mikrofon_takt_ms: Option<u64>,
}

impl GeraeteEinstellungen {
    pub fn mikrofon_takt(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.mikrofon_takt_ms.unwrap_or(20).max(1))
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level (trace, debug, info, warn, error)
    pub level: String,
    /// Ausgabeformat (text, json)
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    ///
    /// Fehlt die Datei, werden Standardwerte verwendet.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    pub fn aus_toml(inhalt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(inhalt)
    }

    /// Konfiguration fuer die Gespraechs-Session
    pub fn gespraech(&self) -> GespraechConfig {
        GespraechConfig {
            capture: self.capture.clone(),
            wiedergabe: self.wiedergabe.clone(),
            zeitgeber: self.zeitgeber.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let config = ClientConfig::default();
        assert_eq!(config.capture.sample_rate, 16000);
        assert_eq!(config.wiedergabe.sample_rate, 44100);
        assert_eq!(config.zeitgeber.haenger_schutz_s, 15);
        assert_eq!(config.logging.level, "info");
        assert!(config.verbindung.schluessel.is_empty());
    }

    #[test]
    fn toml_mit_schluesseln() {
        let config = ClientConfig::aus_toml(
            r#"
            [verbindung]
            url = "wss://sprache.example.org/ws"

            [verbindung.schluessel]
            assemblyai = "aai-123"
            gemini = "gm-456"

            [wiedergabe]
            schwelle = 4

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.verbindung.url, "wss://sprache.example.org/ws");
        assert_eq!(config.verbindung.schluessel.len(), 2);
        assert_eq!(config.verbindung.schluessel["gemini"], "gm-456");
        assert_eq!(config.gespraech().wiedergabe.schwelle, 4);
        assert_eq!(config.gespraech().wiedergabe.batch_groesse, 5);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let config = ClientConfig::laden("/nicht/vorhanden/parlando.toml").unwrap();
        assert_eq!(config.verbindung.url, "ws://127.0.0.1:8000/ws");
    }

    #[test]
    fn mikrofon_takt_standard() {
        let g = GeraeteEinstellungen::default();
        assert_eq!(g.mikrofon_takt(), std::time::Duration::from_millis(20));
    }
}
