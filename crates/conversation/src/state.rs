//! Turn-Taking-Zustandsmaschine
//!
//! Ein [`Gespraech`] besitzt alles, was zu einer Session gehoert: Phase,
//! Kanal, Verlauf, Capture-Encoder und Wiedergabe-Scheduler. Es wird nur
//! ueber `&mut self` aus einem einzigen Ereignis-Loop veraendert.
//!
//! ## Phasen
//! ```text
//! Idle --starten--> Listening --turn_complete--> Processing
//!                     ^  ^                          |  |
//!                     |  +- llm_response_complete --+  |
//!                     |     / Haenger             audio_chunk
//!                     |                                v
//!                     +------ Drain / Haenger ----- Speaking
//!
//! * --beenden--> Ending --conversation_ended / Timeout--> Idle
//! * --Kanal zu--> Idle (+ Fehler)
//! ```
//!
//! ## Zeitgeber
//! Zeit wird immer von aussen uebergeben (`jetzt`). Faellige Fristen
//! werden in [`Gespraech::tick`] ausgeloest; [`Gespraech::naechste_frist`]
//! sagt dem Treiber, wann er das naechste Mal aufrufen muss.

use parlando_audio::{AudioAusgabe, CaptureEncoder, PlaybackScheduler};
use parlando_core::error::{ParlandoError, Result};
use parlando_core::event::GespraechsSink;
use parlando_core::types::{Phase, SessionId, Sprecher};
use parlando_protocol::{ClientNachricht, ServerNachricht};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::GespraechConfig;
use crate::history::Verlauf;
use crate::kanal::{Kanal, KanalFehler};

// ---------------------------------------------------------------------------
// Fristen
// ---------------------------------------------------------------------------

/// Offene Zeitgeber der Session
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Fristen {
    /// Haenger-Schutz fuer Processing/Speaking ohne Abschlusssignal
    haenger: Option<Instant>,
    /// Ende des Drains nach `audio_complete`
    drain: Option<Instant>,
    /// Timeout fuer die Ende-Bestaetigung
    ende: Option<Instant>,
    /// Naechster Keepalive
    ping: Option<Instant>,
}

impl Fristen {
    fn frueheste(&self) -> Option<Instant> {
        [self.haenger, self.drain, self.ende, self.ping]
            .into_iter()
            .flatten()
            .min()
    }
}

fn faellig(frist: Option<Instant>, jetzt: Instant) -> bool {
    matches!(frist, Some(f) if f <= jetzt)
}

// ---------------------------------------------------------------------------
// Gespraech
// ---------------------------------------------------------------------------

/// Eine Gespraechs-Session mit injiziertem Sink und Audio-Ausgabe
pub struct Gespraech<S, A> {
    config: GespraechConfig,
    sink: S,
    ausgabe: A,
    kanal: Option<Box<dyn Kanal>>,
    session_id: Option<SessionId>,
    phase: Phase,
    aktiv: bool,
    verlauf: Verlauf,
    scheduler: PlaybackScheduler,
    encoder: CaptureEncoder,
    fristen: Fristen,
    /// `audio_complete` fuer die laufende Speaking-Phase erhalten
    audio_abgeschlossen: bool,
    gemeldete_chunks: u32,
    /// Zuletzt uebergebene Zeit
    zuletzt: Option<Instant>,
}

impl<S: GespraechsSink, A: AudioAusgabe> Gespraech<S, A> {
    pub fn neu(config: GespraechConfig, sink: S, ausgabe: A) -> Self {
        let scheduler = PlaybackScheduler::neu(config.wiedergabe.clone());
        let encoder = CaptureEncoder::neu(&config.capture);
        Self {
            config,
            sink,
            ausgabe,
            kanal: None,
            session_id: None,
            phase: Phase::Idle,
            aktiv: false,
            verlauf: Verlauf::neu(),
            scheduler,
            encoder,
            fristen: Fristen::default(),
            audio_abgeschlossen: false,
            gemeldete_chunks: 0,
            zuletzt: None,
        }
    }

    // --- Zugriff ------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ist_aktiv(&self) -> bool {
        self.aktiv
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn verlauf(&self) -> &Verlauf {
        &self.verlauf
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn ausgabe(&self) -> &A {
        &self.ausgabe
    }

    pub fn ausgabe_mut(&mut self) -> &mut A {
        &mut self.ausgabe
    }

    pub fn config(&self) -> &GespraechConfig {
        &self.config
    }

    /// true wenn Mikrofon-Frames gerade gesendet werden
    pub fn aufnahme_aktiv(&self) -> bool {
        self.phase.aufnahme_erlaubt() && self.kanal.as_ref().is_some_and(|k| k.ist_offen())
    }

    // --- Benutzeraktionen -----------------------------------------------------

    /// Startet eine neue Session ueber einen bereits geoeffneten Kanal
    ///
    /// Sendet die Schluessel und gibt die Aufnahme frei.
    pub fn starten(
        &mut self,
        kanal: Box<dyn Kanal>,
        session_id: SessionId,
        schluessel: BTreeMap<String, String>,
        jetzt: Instant,
    ) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(self.ungueltig("starten"));
        }
        self.zuletzt = Some(jetzt);
        self.verlauf.leeren();
        self.scheduler.zuruecksetzen();
        self.encoder.zuruecksetzen();
        self.kanal = Some(kanal);
        self.session_id = Some(session_id.clone());
        self.aktiv = true;

        info!(session = %session_id, schluessel = schluessel.len(), "Session startet");
        let anmeldung = ClientNachricht::UserCredentials {
            keys: schluessel,
            session_id,
        };
        if let Err(e) = self.steuerung_senden(&anmeldung) {
            let fehler = ParlandoError::Verbindung(e.to_string());
            self.abbauen(Some(fehler.clone()), "Verbindung fehlgeschlagen");
            return Err(fehler);
        }

        self.fristen.ping = self.config.zeitgeber.ping_intervall().map(|i| jetzt + i);
        self.phase_setzen(Phase::Listening);
        self.sink.status_aktualisieren("Hoert zu");
        Ok(())
    }

    /// Benutzer beendet das Gespraech
    pub fn beenden(&mut self, jetzt: Instant) -> Result<()> {
        self.zuletzt = Some(jetzt);
        match self.phase {
            Phase::Idle => return Err(self.ungueltig("beenden")),
            Phase::Ending => return Ok(()),
            _ => {}
        }

        self.encoder.zuruecksetzen();
        self.fristen = Fristen::default();
        self.audio_abgeschlossen = false;
        // Laufende Antwort sofort abbrechen, nicht erst nach der Bestaetigung
        self.scheduler.stoppen(&mut self.ausgabe);
        self.phase_setzen(Phase::Ending);
        self.sink.status_aktualisieren("Gespraech wird beendet");

        let Some(session_id) = self.session_id.clone() else {
            self.abbauen(None, "Gespraech beendet");
            return Ok(());
        };
        if let Err(e) = self.steuerung_senden(&ClientNachricht::EndConversation { session_id }) {
            debug!(fehler = %e, "end_conversation nicht zustellbar, Abbau ohne Bestaetigung");
            self.abbauen(None, "Gespraech beendet");
            return Ok(());
        }

        self.fristen.ende = Some(jetzt + self.config.zeitgeber.ende_timeout());
        Ok(())
    }

    /// Getippte Nachricht statt Sprache (nur in Listening)
    pub fn chat_nachricht_senden(&mut self, text: &str, jetzt: Instant) -> Result<()> {
        self.zuletzt = Some(jetzt);
        let text = text.trim();
        if self.phase != Phase::Listening || text.is_empty() {
            return Err(self.ungueltig("chat_message"));
        }
        let Some(session_id) = self.session_id.clone() else {
            return Err(self.ungueltig("chat_message"));
        };

        let nachricht = ClientNachricht::ChatMessage {
            text: text.to_owned(),
            session_id,
        };
        if let Err(e) = self.steuerung_senden(&nachricht) {
            let grund = e.to_string();
            self.kanal_geschlossen(&grund);
            return Err(ParlandoError::VerbindungVerloren(grund));
        }

        self.user_turn_abschliessen(text, jetzt);
        Ok(())
    }

    /// Neue Mikrofon-Samples (Capture-Rate, Mono)
    ///
    /// Ausserhalb von Listening oder bei geschlossenem Kanal werden die
    /// Samples verworfen.
    pub fn mikrofon_samples(&mut self, samples: &[f32]) {
        let aktiv = self.aufnahme_aktiv();
        let frames = self.encoder.verarbeiten(samples, aktiv);
        for frame in frames {
            let ergebnis = match self.kanal.as_mut() {
                Some(kanal) => kanal.frame_senden(frame),
                None => Err(KanalFehler::Geschlossen),
            };
            if let Err(e) = ergebnis {
                self.kanal_geschlossen(&e.to_string());
                return;
            }
        }
    }

    /// Mikrofon-Zugriff verweigert oder Geraet nicht verfuegbar
    pub fn mikrofon_verweigert(&mut self, grund: &str) {
        let fehler = ParlandoError::MikrofonVerweigert(grund.to_owned());
        if self.aktiv {
            self.abbauen(Some(fehler), "Mikrofon nicht verfuegbar");
        } else {
            warn!(grund, "Mikrofon nicht verfuegbar");
            self.sink.fehler_melden(&fehler);
        }
    }

    // --- Transport ----------------------------------------------------------

    /// Kanal wurde geschlossen oder hat einen Fehler gemeldet
    ///
    /// Einziger Wiederherstellungspfad: zurueck nach Idle. Der Fehler wird
    /// nur gemeldet, solange die Session aktiv ist, also hoechstens einmal.
    pub fn kanal_geschlossen(&mut self, grund: &str) {
        if !self.aktiv {
            debug!(grund, "Kanal zu, keine aktive Session");
            return;
        }
        if self.phase == Phase::Ending {
            info!(grund, "Kanal waehrend Ending geschlossen");
            self.abbauen(None, "Gespraech beendet");
            return;
        }
        self.abbauen(
            Some(ParlandoError::VerbindungVerloren(grund.to_owned())),
            "Verbindung verloren",
        );
    }

    /// Verarbeitet eine eingehende Steuernachricht
    pub fn nachricht(&mut self, nachricht: ServerNachricht, jetzt: Instant) {
        self.zuletzt = Some(jetzt);
        if self.phase == Phase::Idle {
            debug!(typ = nachricht.typ(), "Nachricht ohne aktive Session ignoriert");
            return;
        }

        match nachricht {
            ServerNachricht::Connection { status } => {
                debug!(status = ?status, "Kanal bestaetigt");
                self.sink.status_aktualisieren("Verbunden");
            }
            ServerNachricht::SessionOpened { session_id } => {
                debug!(stt_session = ?session_id, "Sprach-Session geoeffnet");
                self.sink.status_aktualisieren("Sprach-Session geoeffnet");
            }
            ServerNachricht::Transcript { text, .. } if self.phase == Phase::Listening => {
                self.sink.live_transkript(&text);
            }
            ServerNachricht::TurnComplete { final_transcript }
                if self.phase == Phase::Listening =>
            {
                self.user_turn_abschliessen(&final_transcript, jetzt);
            }
            ServerNachricht::ChatStarted { .. } if self.phase == Phase::Processing => {
                self.scheduler.zuruecksetzen();
                self.sink.status_aktualisieren("Antwort wird erzeugt");
            }
            ServerNachricht::AudioChunk {
                chunk_index,
                audio_data,
            } if matches!(self.phase, Phase::Processing | Phase::Speaking) => {
                if self.phase == Phase::Processing {
                    self.speaking_betreten(jetzt);
                }
                let geplant = self
                    .scheduler
                    .payload_annehmen(chunk_index, &audio_data, &mut self.ausgabe);
                if let Some(letzter) = geplant.last() {
                    trace!(
                        anzahl = geplant.len(),
                        ende = letzter.ende(),
                        "Chunks eingeplant"
                    );
                }
            }
            ServerNachricht::LlmResponseComplete { llm_response } => {
                let text = llm_response.trim();
                if !text.is_empty() {
                    let turn = self.verlauf.anhaengen(Sprecher::Agent, text);
                    self.sink.turn_anhaengen(turn);
                }
                // Kommt erst nach dem letzten Audio-Chunk: in Processing gab es keins
                if self.phase == Phase::Processing {
                    info!("Antwort ohne Audio abgeschlossen");
                    self.listening_fortsetzen();
                }
            }
            ServerNachricht::ChatComplete => {
                if self.phase == Phase::Processing {
                    info!("Antwort ohne Audio abgeschlossen");
                    self.listening_fortsetzen();
                } else {
                    debug!(phase = %self.phase, "chat_complete");
                }
            }
            ServerNachricht::AudioComplete { total_chunks } => match self.phase {
                Phase::Speaking => self.audio_abschliessen(total_chunks),
                Phase::Processing => {
                    info!("audio_complete ohne Chunks");
                    self.listening_fortsetzen();
                }
                phase => debug!(%phase, "audio_complete ignoriert"),
            },
            ServerNachricht::ConversationEnded => {
                info!(phase = %self.phase, "Gegenseite hat das Gespraech beendet");
                self.abbauen(None, "Gespraech beendet");
            }
            ServerNachricht::Error { message } => {
                warn!(fehler = %message, "Fehler der Sprach-Pipeline");
                self.sink.fehler_melden(&ParlandoError::Pipeline(message));
            }
            ServerNachricht::Pong => trace!("Pong"),
            ServerNachricht::Unbekannt => debug!("Unbekannte Nachricht ignoriert"),
            andere => {
                debug!(typ = andere.typ(), phase = %self.phase, "Nachricht in dieser Phase ignoriert");
            }
        }

        self.drain_pruefen(jetzt);
    }

    // --- Zeitgeber ------------------------------------------------------------

    /// Loest alle faelligen Fristen aus und plant wartende Chunks ein
    pub fn tick(&mut self, jetzt: Instant) {
        self.zuletzt = Some(jetzt);

        if self.phase == Phase::Speaking && self.scheduler.hat_ausstehende() {
            self.scheduler.verarbeiten(&mut self.ausgabe);
        }
        self.drain_pruefen(jetzt);

        if faellig(self.fristen.drain, jetzt) {
            info!(
                statistik = ?self.scheduler.statistik(),
                "Wiedergabe abgeschlossen"
            );
            self.listening_fortsetzen();
        }

        if faellig(self.fristen.haenger, jetzt) {
            warn!(
                phase = %self.phase,
                queue = self.scheduler.queue_laenge(),
                "Kein Abschlusssignal, Haenger-Schutz erzwingt Listening"
            );
            self.listening_fortsetzen();
        }

        if faellig(self.fristen.ende, jetzt) {
            warn!("Keine Bestaetigung fuer end_conversation, Abbau nach Timeout");
            self.abbauen(None, "Gespraech beendet (Zeitueberschreitung)");
        }

        if faellig(self.fristen.ping, jetzt) {
            self.fristen.ping = self.config.zeitgeber.ping_intervall().map(|i| jetzt + i);
            if let Err(e) = self.steuerung_senden(&ClientNachricht::Ping) {
                self.kanal_geschlossen(&e.to_string());
            }
        }
    }

    /// Zeitpunkt, zu dem [`Self::tick`] spaetestens aufgerufen werden muss
    ///
    /// Warten noch Chunks auf das Einplanen, ist das "sofort".
    pub fn naechste_frist(&self) -> Option<Instant> {
        if self.phase == Phase::Speaking && self.scheduler.hat_ausstehende() {
            if let Some(zuletzt) = self.zuletzt {
                return Some(zuletzt);
            }
        }
        self.fristen.frueheste()
    }

    // --- Intern -------------------------------------------------------------

    fn steuerung_senden(&mut self, nachricht: &ClientNachricht) -> std::result::Result<(), KanalFehler> {
        match self.kanal.as_mut() {
            Some(kanal) if kanal.ist_offen() => {
                trace!(typ = nachricht.typ(), "Steuernachricht senden");
                kanal.steuerung_senden(nachricht)
            }
            _ => Err(KanalFehler::Geschlossen),
        }
    }

    fn user_turn_abschliessen(&mut self, text: &str, jetzt: Instant) {
        self.encoder.zuruecksetzen();
        self.fristen.haenger = Some(jetzt + self.config.zeitgeber.haenger_schutz());
        self.phase_setzen(Phase::Processing);
        let text = text.trim();
        if !text.is_empty() {
            let turn = self.verlauf.anhaengen(Sprecher::User, text);
            self.sink.turn_anhaengen(turn);
        }
        self.sink.status_aktualisieren("Verarbeite");
    }

    fn speaking_betreten(&mut self, jetzt: Instant) {
        self.scheduler.zuruecksetzen();
        self.audio_abgeschlossen = false;
        self.gemeldete_chunks = 0;
        self.fristen.drain = None;
        self.fristen.haenger = Some(jetzt + self.config.zeitgeber.haenger_schutz());
        self.phase_setzen(Phase::Speaking);
        self.sink.status_aktualisieren("Spricht");
    }

    fn audio_abschliessen(&mut self, gemeldete_chunks: u32) {
        debug!(
            gemeldet = gemeldete_chunks,
            empfangen = self.scheduler.statistik().empfangen,
            "Alle Audio-Chunks empfangen"
        );
        self.audio_abgeschlossen = true;
        self.gemeldete_chunks = gemeldete_chunks;
        self.fristen.haenger = None;
        self.scheduler.dekodierung_abgeschlossen(&mut self.ausgabe);
    }

    /// Startet die Drain-Frist, sobald nach `audio_complete` alles eingeplant ist
    fn drain_pruefen(&mut self, jetzt: Instant) {
        if self.phase == Phase::Speaking
            && self.audio_abgeschlossen
            && self.fristen.drain.is_none()
            && self.scheduler.ist_entleert()
        {
            let verzoegerung = self.scheduler.drain_verzoegerung(self.gemeldete_chunks);
            debug!(ms = verzoegerung.as_millis() as u64, "Drain gestartet");
            self.fristen.drain = Some(jetzt + verzoegerung);
        }
    }

    /// Zurueck nach Listening fuer den naechsten Benutzer-Turn
    ///
    /// Bereits eingeplantes Audio spielt zu Ende, die Queue wird verworfen.
    fn listening_fortsetzen(&mut self) {
        self.fristen.haenger = None;
        self.fristen.drain = None;
        self.audio_abgeschlossen = false;
        self.scheduler.zuruecksetzen();
        self.encoder.zuruecksetzen();
        self.phase_setzen(Phase::Listening);
        self.sink.status_aktualisieren("Hoert zu");
    }

    /// Abbau der Session: Kanal zu, Fristen weg, Ausgabe gestoppt
    fn abbauen(&mut self, fehler: Option<ParlandoError>, status: &str) {
        self.aktiv = false;
        self.fristen = Fristen::default();
        self.audio_abgeschlossen = false;
        self.gemeldete_chunks = 0;
        if self.phase == Phase::Ending {
            // Ausgabe wurde schon beim Beenden gestoppt
            self.scheduler.zuruecksetzen();
        } else {
            self.scheduler.stoppen(&mut self.ausgabe);
        }
        self.encoder.zuruecksetzen();
        if let Some(mut kanal) = self.kanal.take() {
            kanal.schliessen();
        }
        self.verlauf.leeren();
        if let Some(id) = self.session_id.take() {
            info!(session = %id, "Session abgebaut");
        }

        self.phase_setzen(Phase::Idle);
        self.sink.status_aktualisieren(status);
        if let Some(fehler) = fehler {
            warn!(%fehler, "Session mit Fehler beendet");
            self.sink.fehler_melden(&fehler);
        }
    }

    fn phase_setzen(&mut self, neu: Phase) {
        let alt = self.phase;
        if alt == neu {
            return;
        }
        self.phase = neu;
        info!(%alt, %neu, "Phasenwechsel");
        self.sink.phase_geaendert(alt, neu);
    }

    fn ungueltig(&self, aktion: &str) -> ParlandoError {
        ParlandoError::UngueltigeAktion {
            phase: self.phase.to_string(),
            aktion: aktion.to_owned(),
        }
    }
}
