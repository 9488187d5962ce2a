//! Konfiguration einer Gespraechs-Session

use parlando_audio::{CaptureConfig, WiedergabeConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Zeitgeber der Zustandsmaschine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeitgeberConfig {
    /// Speaking ohne Abschlusssignal wird nach dieser Zeit beendet
    pub haenger_schutz_s: u64,
    /// Wartezeit auf `conversation_ended` nach `end_conversation`
    pub ende_timeout_ms: u64,
    /// Keepalive-Intervall (0 = aus)
    pub ping_intervall_s: u64,
}

impl Default for ZeitgeberConfig {
    fn default() -> Self {
        Self {
            haenger_schutz_s: 15,
            ende_timeout_ms: 3000,
            ping_intervall_s: 20,
        }
    }
}

impl ZeitgeberConfig {
    pub fn haenger_schutz(&self) -> Duration {
        Duration::from_secs(self.haenger_schutz_s)
    }

    pub fn ende_timeout(&self) -> Duration {
        Duration::from_millis(self.ende_timeout_ms)
    }

    pub fn ping_intervall(&self) -> Option<Duration> {
        (self.ping_intervall_s > 0).then(|| Duration::from_secs(self.ping_intervall_s))
    }
}

/// Gesamtkonfiguration fuer [`crate::Gespraech`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GespraechConfig {
    pub capture: CaptureConfig,
    pub wiedergabe: WiedergabeConfig,
    pub zeitgeber: ZeitgeberConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let z = ZeitgeberConfig::default();
        assert_eq!(z.haenger_schutz(), Duration::from_secs(15));
        assert_eq!(z.ende_timeout(), Duration::from_millis(3000));
        assert_eq!(z.ping_intervall(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn ping_abschaltbar() {
        let z = ZeitgeberConfig {
            ping_intervall_s: 0,
            ..Default::default()
        };
        assert_eq!(z.ping_intervall(), None);
    }

    #[test]
    fn teilweise_toml() {
        let config: GespraechConfig = toml::from_str(
            r#"
            [zeitgeber]
            haenger_schutz_s = 5

            [wiedergabe]
            schwelle = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.zeitgeber.haenger_schutz_s, 5);
        assert_eq!(config.zeitgeber.ende_timeout_ms, 3000);
        assert_eq!(config.wiedergabe.schwelle, 2);
        assert_eq!(config.capture.block_groesse, 4096);
    }
}
