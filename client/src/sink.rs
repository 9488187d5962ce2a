//! Terminal-Anzeige des Gespraechs

use parlando_core::error::ParlandoError;
use parlando_core::event::GespraechsSink;
use parlando_core::types::{Phase, Sprecher, Turn};
use std::io::Write;

/// Schreibt Status, Live-Transkript und Turns zeilenweise in einen Writer
pub struct TerminalSink<W: Write> {
    ausgabe: W,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::neu(std::io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn neu(ausgabe: W) -> Self {
        Self { ausgabe }
    }

    pub fn into_inner(self) -> W {
        self.ausgabe
    }

    fn zeile(&mut self, text: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.ausgabe, "{text}") {
            tracing::debug!(fehler = %e, "Anzeige nicht beschreibbar");
        }
    }
}

impl<W: Write> GespraechsSink for TerminalSink<W> {
    fn status_aktualisieren(&mut self, text: &str) {
        self.zeile(format_args!("[status] {text}"));
    }

    fn live_transkript(&mut self, text: &str) {
        self.zeile(format_args!("  ... {text}"));
    }

    fn turn_anhaengen(&mut self, turn: &Turn) {
        let wer = match turn.sprecher {
            Sprecher::User => "Du",
            Sprecher::Agent => "Agent",
        };
        self.zeile(format_args!(
            "{} {wer}: {}",
            turn.zeitpunkt.format("%H:%M:%S"),
            turn.text
        ));
    }

    fn phase_geaendert(&mut self, _alt: Phase, neu: Phase) {
        tracing::debug!(%neu, "Anzeige: neue Phase");
    }

    fn fehler_melden(&mut self, fehler: &ParlandoError) {
        self.zeile(format_args!("[fehler] {fehler}"));
    }
}
