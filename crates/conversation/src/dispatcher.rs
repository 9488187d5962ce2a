//! Message-Dispatcher
//!
//! Nimmt die rohen Ereignisse des Transports entgegen, klassifiziert
//! Text-Frames ueber `parlando_protocol::wire` und leitet bekannte
//! Nachrichten in Ankunftsreihenfolge an das [`Gespraech`] weiter.
//!
//! - Unbekannter `type` -> `warn!`, ignoriert
//! - Kaputtes JSON      -> `warn!`, ignoriert (kein Transportfehler)
//! - Binaer-Frame       -> `debug!`, ignoriert
//! - Kanal zu / Fehler  -> `Gespraech::kanal_geschlossen`

use bytes::Bytes;
use parlando_audio::AudioAusgabe;
use parlando_core::event::GespraechsSink;
use parlando_protocol::{text_klassifizieren, Eingehend};
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::state::Gespraech;

/// Rohes Ereignis des Transports
#[derive(Debug, Clone, PartialEq)]
pub enum Rahmen {
    Text(String),
    Binaer(Bytes),
    /// Gegenseite hat den Kanal geschlossen (optional mit Grund)
    Geschlossen(Option<String>),
    /// Transportfehler
    Fehler(String),
}

/// Zaehler fuer Diagnose
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherStatistik {
    pub nachrichten: u64,
    pub unbekannt: u64,
    pub fehlerhaft: u64,
    pub binaer: u64,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    statistik: DispatcherStatistik,
}

impl Dispatcher {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn statistik(&self) -> &DispatcherStatistik {
        &self.statistik
    }

    /// Verteilt ein Transport-Ereignis an die Session
    pub fn verteilen<S, A>(&mut self, gespraech: &mut Gespraech<S, A>, rahmen: Rahmen, jetzt: Instant)
    where
        S: GespraechsSink,
        A: AudioAusgabe,
    {
        match rahmen {
            Rahmen::Text(text) => match text_klassifizieren(&text) {
                Ok(Eingehend::Nachricht(nachricht)) => {
                    self.statistik.nachrichten += 1;
                    trace!(typ = nachricht.typ(), "Nachricht empfangen");
                    gespraech.nachricht(nachricht, jetzt);
                }
                Ok(Eingehend::UnbekannterTyp(typ)) => {
                    self.statistik.unbekannt += 1;
                    warn!(%typ, "Unbekannter Nachrichtentyp ignoriert");
                }
                Err(e) => {
                    self.statistik.fehlerhaft += 1;
                    warn!(fehler = %e, "Fehlerhafte Nachricht ignoriert");
                }
            },
            Rahmen::Binaer(bytes) => self.binaer(bytes.len()),
            Rahmen::Geschlossen(grund) => {
                let grund = grund.unwrap_or_else(|| "Kanal geschlossen".to_owned());
                debug!(%grund, "Kanal geschlossen");
                gespraech.kanal_geschlossen(&grund);
            }
            Rahmen::Fehler(fehler) => {
                warn!(%fehler, "Transportfehler");
                gespraech.kanal_geschlossen(&fehler);
            }
        }
    }

    fn binaer(&mut self, laenge: usize) {
        self.statistik.binaer += 1;
        debug!(bytes = laenge, "Binaer-Frame ignoriert");
    }
}
