//! Transport-Schnittstelle des Gespraechs-Kerns
//!
//! Der Kern sieht den Duplex-Kanal nur ueber diesen Trait. Senden ist
//! synchron und blockiert nie: die Implementierung reiht die Nachricht ein
//! (z.B. in eine mpsc-Queue zu einem Writer-Task) und meldet nur, ob der
//! Kanal die Nachricht noch annehmen konnte.

use bytes::Bytes;
use parlando_protocol::ClientNachricht;
use thiserror::Error;

/// Fehler beim Senden ueber den Kanal
#[derive(Debug, Error)]
pub enum KanalFehler {
    #[error("Kanal ist geschlossen")]
    Geschlossen,
}

/// Offener Duplex-Kanal zur Sprach-Pipeline
pub trait Kanal {
    /// Sendet eine JSON-Steuernachricht (Text-Frame)
    fn steuerung_senden(&mut self, nachricht: &ClientNachricht) -> Result<(), KanalFehler>;

    /// Sendet einen PCM16-Frame (Binaer-Frame)
    fn frame_senden(&mut self, frame: Bytes) -> Result<(), KanalFehler>;

    /// true solange der Kanal Nachrichten annimmt
    fn ist_offen(&self) -> bool;

    /// Schliesst den Kanal; weitere Sendeversuche scheitern
    fn schliessen(&mut self);
}
