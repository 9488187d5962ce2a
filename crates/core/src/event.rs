//! Sink-Trait fuer die UI-Schicht
//!
//! Der Gespraechs-Kern ruft die UI nie direkt auf, sondern meldet
//! Status, Live-Transkript und neue Turns ueber diesen Trait. Die
//! Implementierung (Terminal, GUI, Test-Recorder) wird injiziert.

use crate::error::ParlandoError;
use crate::types::{Phase, Turn};

/// Empfaenger aller Ereignisse des Gespraechs-Kerns
pub trait GespraechsSink {
    /// Neuer Status-Text fuer die Anzeige
    fn status_aktualisieren(&mut self, text: &str);

    /// Laufendes (noch nicht finales) Transkript des Benutzers
    fn live_transkript(&mut self, text: &str);

    /// Ein Turn wurde an die History angehaengt
    fn turn_anhaengen(&mut self, turn: &Turn);

    /// Phasenwechsel
    fn phase_geaendert(&mut self, _alt: Phase, _neu: Phase) {}

    /// Fehler, der dem Benutzer angezeigt werden soll
    fn fehler_melden(&mut self, _fehler: &ParlandoError) {}
}

/// Sink der alles verwirft (fuer Tests und Headless-Betrieb)
#[derive(Debug, Default, Clone, Copy)]
pub struct StummerSink;

impl GespraechsSink for StummerSink {
    fn status_aktualisieren(&mut self, _text: &str) {}
    fn live_transkript(&mut self, _text: &str) {}
    fn turn_anhaengen(&mut self, _turn: &Turn) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sprecher;

    #[derive(Default)]
    struct Zaehler {
        status: usize,
        phasen: Vec<(Phase, Phase)>,
    }

    impl GespraechsSink for Zaehler {
        fn status_aktualisieren(&mut self, _text: &str) {
            self.status += 1;
        }
        fn live_transkript(&mut self, _text: &str) {}
        fn turn_anhaengen(&mut self, _turn: &Turn) {}
        fn phase_geaendert(&mut self, alt: Phase, neu: Phase) {
            self.phasen.push((alt, neu));
        }
    }

    #[test]
    fn default_methoden_sind_optional() {
        let mut sink = StummerSink;
        sink.phase_geaendert(Phase::Idle, Phase::Listening);
        sink.fehler_melden(&ParlandoError::Pipeline("x".into()));
        sink.turn_anhaengen(&Turn::neu(Sprecher::User, "hallo"));
    }

    #[test]
    fn sink_als_trait_objekt() {
        let mut zaehler = Zaehler::default();
        {
            let sink: &mut dyn GespraechsSink = &mut zaehler;
            sink.status_aktualisieren("Verbunden");
            sink.phase_geaendert(Phase::Idle, Phase::Listening);
        }
        assert_eq!(zaehler.status, 1);
        assert_eq!(zaehler.phasen, vec![(Phase::Idle, Phase::Listening)]);
    }
}
