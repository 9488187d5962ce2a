//! Ereignis-Loop einer Gespraechs-Session
//!
//! Ein einziger Task ruft die Session auf, immer ein Ereignis nach dem
//! anderen:
//! - eingehende Rahmen vom Lese-Task
//! - Benutzerbefehle (Ende, getippte Nachricht)
//! - Mikrofon-Samples im festen Takt
//! - die naechste Frist der Session
//!
//! Nach jedem Ereignis folgt `tick`, damit faellige Fristen und wartende
//! Chunks sofort abgearbeitet werden. Der Loop endet, sobald die Session
//! wieder Idle ist.

use parlando_audio::AudioAusgabe;
use parlando_conversation::{Dispatcher, Gespraech, Rahmen};
use parlando_core::event::GespraechsSink;
use parlando_core::types::Phase;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Aktion des Benutzers
#[derive(Debug, Clone, PartialEq)]
pub enum Befehl {
    /// Gespraech beenden
    Beenden,
    /// Getippte Nachricht
    Chat(String),
}

/// Quelle fuer Mikrofon-Samples
pub trait SampleQuelle {
    /// Haengt alle seit dem letzten Aufruf aufgenommenen Samples an
    fn samples_lesen(&mut self, ziel: &mut Vec<f32>) -> usize;
}

#[cfg(feature = "geraete")]
impl SampleQuelle for parlando_audio::MikrofonStream {
    fn samples_lesen(&mut self, ziel: &mut Vec<f32>) -> usize {
        parlando_audio::MikrofonStream::samples_lesen(self, ziel)
    }
}

/// Quelle ohne Mikrofon (nur getippte Nachrichten)
#[derive(Debug, Default)]
pub struct KeineQuelle;

impl SampleQuelle for KeineQuelle {
    fn samples_lesen(&mut self, _ziel: &mut Vec<f32>) -> usize {
        0
    }
}

/// Kanaele und Quellen, die der Treiber abfragt
pub struct Eingaenge<'a, Q> {
    pub rahmen: &'a mut mpsc::UnboundedReceiver<Rahmen>,
    pub befehle: &'a mut mpsc::UnboundedReceiver<Befehl>,
    pub mikrofon: &'a mut Q,
    pub mikrofon_takt: Duration,
}

/// Treibt die Session, bis sie wieder Idle ist
pub async fn ausfuehren<S, A, Q>(
    gespraech: &mut Gespraech<S, A>,
    dispatcher: &mut Dispatcher,
    eingaenge: Eingaenge<'_, Q>,
) where
    S: GespraechsSink,
    A: AudioAusgabe,
    Q: SampleQuelle,
{
    let Eingaenge {
        rahmen,
        befehle,
        mikrofon,
        mikrofon_takt,
    } = eingaenge;

    let mut takt = tokio::time::interval(mikrofon_takt);
    takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut samples = Vec::new();
    let mut befehle_offen = true;
    let mut rahmen_offen = true;

    while gespraech.phase() != Phase::Idle {
        let frist = gespraech.naechste_frist();

        tokio::select! {
            r = rahmen.recv(), if rahmen_offen => match r {
                Some(r) => dispatcher.verteilen(gespraech, r, Instant::now()),
                None => {
                    rahmen_offen = false;
                    gespraech.kanal_geschlossen("Lese-Task beendet");
                }
            },
            b = befehle.recv(), if befehle_offen => match b {
                Some(Befehl::Chat(text)) => {
                    if let Err(e) = gespraech.chat_nachricht_senden(&text, Instant::now()) {
                        warn!(fehler = %e, "Nachricht nicht gesendet");
                    }
                }
                Some(Befehl::Beenden) => beenden_anfordern(gespraech),
                None => {
                    befehle_offen = false;
                    beenden_anfordern(gespraech);
                }
            },
            _ = takt.tick() => {
                samples.clear();
                if mikrofon.samples_lesen(&mut samples) > 0 {
                    gespraech.mikrofon_samples(&samples);
                }
            }
            _ = schlafen_bis(frist) => {}
        }

        gespraech.tick(Instant::now());
    }

    info!(statistik = ?dispatcher.statistik(), "Session beendet");
}

fn beenden_anfordern<S: GespraechsSink, A: AudioAusgabe>(gespraech: &mut Gespraech<S, A>) {
    info!("Benutzer beendet das Gespraech");
    if let Err(e) = gespraech.beenden(Instant::now()) {
        debug!(fehler = %e, "Beenden ignoriert");
    }
}

async fn schlafen_bis(frist: Option<Instant>) {
    match frist {
        Some(f) => tokio::time::sleep_until(tokio::time::Instant::from_std(f)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parlando_conversation::{GespraechConfig, Kanal, KanalFehler};
    use parlando_core::event::StummerSink;
    use parlando_core::types::SessionId;
    use parlando_protocol::ClientNachricht;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    struct StilleAusgabe;

    impl AudioAusgabe for StilleAusgabe {
        fn jetzt(&self) -> f64 {
            0.0
        }
        fn einplanen(&mut self, _samples: Arc<[f32]>, _sample_rate: u32, _start: f64) {}
        fn stoppen(&mut self) {}
    }

    #[derive(Clone, Default)]
    struct GeteilterKanal {
        gesendet: Arc<Mutex<Vec<String>>>,
        frames: Arc<Mutex<usize>>,
    }

    impl Kanal for GeteilterKanal {
        fn steuerung_senden(&mut self, nachricht: &ClientNachricht) -> Result<(), KanalFehler> {
            self.gesendet.lock().unwrap().push(nachricht.typ().to_owned());
            Ok(())
        }
        fn frame_senden(&mut self, _frame: Bytes) -> Result<(), KanalFehler> {
            *self.frames.lock().unwrap() += 1;
            Ok(())
        }
        fn ist_offen(&self) -> bool {
            true
        }
        fn schliessen(&mut self) {}
    }

    struct VolleQuelle;

    impl SampleQuelle for VolleQuelle {
        fn samples_lesen(&mut self, ziel: &mut Vec<f32>) -> usize {
            ziel.extend(std::iter::repeat(0.0).take(4096));
            4096
        }
    }

    fn gestartet(kanal: GeteilterKanal) -> Gespraech<StummerSink, StilleAusgabe> {
        let mut g = Gespraech::neu(GespraechConfig::default(), StummerSink, StilleAusgabe);
        g.starten(
            Box::new(kanal),
            SessionId::neu("t"),
            BTreeMap::new(),
            Instant::now(),
        )
        .unwrap();
        g
    }

    #[tokio::test]
    async fn ende_mit_bestaetigung() {
        let kanal = GeteilterKanal::default();
        let mut g = gestartet(kanal.clone());
        let mut d = Dispatcher::neu();
        let (rahmen_tx, mut rahmen_rx) = mpsc::unbounded_channel();
        let (befehl_tx, mut befehl_rx) = mpsc::unbounded_channel();

        // Bestaetigung erst nach dem Ende-Befehl
        tokio::spawn(async move {
            befehl_tx.send(Befehl::Beenden).unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            rahmen_tx
                .send(Rahmen::Text(r#"{"type":"conversation_ended"}"#.into()))
                .unwrap();
        });

        ausfuehren(
            &mut g,
            &mut d,
            Eingaenge {
                rahmen: &mut rahmen_rx,
                befehle: &mut befehl_rx,
                mikrofon: &mut KeineQuelle,
                mikrofon_takt: Duration::from_millis(5),
            },
        )
        .await;

        assert_eq!(g.phase(), Phase::Idle);
        let gesendet = kanal.gesendet.lock().unwrap().clone();
        assert_eq!(gesendet, ["user_credentials", "end_conversation"]);
    }

    #[tokio::test]
    async fn kanal_ende_beendet_loop() {
        let kanal = GeteilterKanal::default();
        let mut g = gestartet(kanal.clone());
        let mut d = Dispatcher::neu();
        let (rahmen_tx, mut rahmen_rx) = mpsc::unbounded_channel();
        let (_befehl_tx, mut befehl_rx) = mpsc::unbounded_channel();

        rahmen_tx.send(Rahmen::Geschlossen(None)).unwrap();

        ausfuehren(
            &mut g,
            &mut d,
            Eingaenge {
                rahmen: &mut rahmen_rx,
                befehle: &mut befehl_rx,
                mikrofon: &mut VolleQuelle,
                mikrofon_takt: Duration::from_millis(5),
            },
        )
        .await;

        assert_eq!(g.phase(), Phase::Idle);
        assert!(!g.ist_aktiv());
    }
}
