//! Jitter Buffer und Wiedergabe-Scheduler
//!
//! Nimmt die `audio_chunk`-Payloads einer Antwort entgegen, dekodiert sie
//! und plant sie lueckenlos auf der Zeitleiste der Audio-Ausgabe ein.
//!
//! ## Ablauf pro Speaking-Phase
//! ```text
//! zuruecksetzen()            -> puffern = true, playhead = 0, Header offen
//! payload_annehmen() x N     -> Base64 -> (Header ab) -> PCM16 -> Queue
//!   Queue >= Schwelle        -> puffern = false (genau einmal)
//!   verarbeiten()            -> max. batch_groesse Chunks ab playhead
//! dekodierung_abgeschlossen() -> Rest einplanen, Drain-Verzoegerung
//! ```
//!
//! ## Invarianten
//! - Chunks werden in Ankunftsreihenfolge eingeplant (FIFO, nie umsortiert)
//! - Intervalle `[start, start + dauer)` ueberlappen nie, Starts steigen monoton
//! - `playhead` faellt innerhalb einer Phase nie zurueck
//! - Nichts wird in der Vergangenheit eingeplant: bei Underrun springt
//!   `playhead` auf `jetzt + epsilon`

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::AudioResult;
use crate::pcm::{base64_dekodieren, header_entfernen, pcm16_dekodieren, WAV_HEADER_BYTES};

// ---------------------------------------------------------------------------
// Ausgabe-Schnittstelle
// ---------------------------------------------------------------------------

/// Audio-Ausgabe mit eigener Uhr, auf der Chunks zeitgenau eingeplant werden
///
/// Entspricht dem Ausgabegeraet: `jetzt()` ist die Position der Wiedergabe
/// in Sekunden, `einplanen()` legt Samples ab einem Zeitpunkt auf die
/// Zeitleiste.
pub trait AudioAusgabe {
    /// Aktuelle Zeit der Ausgabe-Uhr in Sekunden
    fn jetzt(&self) -> f64;

    /// Plant Samples ab `start` (Sekunden) zur Wiedergabe ein
    fn einplanen(&mut self, samples: Arc<[f32]>, sample_rate: u32, start: f64);

    /// Verwirft alle eingeplanten, noch nicht gespielten Samples
    fn stoppen(&mut self);
}

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration fuer Jitter Buffer und Scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiedergabeConfig {
    /// Abtastrate der empfangenen PCM-Daten in Hz
    pub sample_rate: u32,
    /// Mindestanzahl Chunks in der Queue vor dem ersten Einplanen
    pub schwelle: usize,
    /// Maximal eingeplante Chunks pro Aufruf
    pub batch_groesse: usize,
    /// Groesse des Containerheaders vor dem ersten Chunk einer Phase
    pub header_bytes: usize,
    /// Sicherheitsabstand nach einem Underrun in Sekunden
    pub epsilon_s: f64,
    /// Geschaetzte Spieldauer pro Chunk fuer die Drain-Verzoegerung
    pub drain_pro_chunk_ms: u64,
    /// Untergrenze der Drain-Verzoegerung
    pub drain_min_ms: u64,
    /// Obergrenze der Drain-Verzoegerung
    pub drain_max_ms: u64,
}

impl Default for WiedergabeConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            schwelle: 3,
            batch_groesse: 5,
            header_bytes: WAV_HEADER_BYTES,
            epsilon_s: 0.01,
            drain_pro_chunk_ms: 400,
            drain_min_ms: 1000,
            drain_max_ms: 8000,
        }
    }
}

impl WiedergabeConfig {
    /// Wartezeit nach dem letzten Chunk bis die Wiedergabe als beendet gilt
    ///
    /// Naeherung: es gibt kein Signal "Ausgabepuffer leer", daher wird die
    /// Restdauer aus der Chunk-Anzahl geschaetzt und begrenzt.
    pub fn drain_verzoegerung(&self, chunks: u32) -> Duration {
        let geschaetzt = self.drain_pro_chunk_ms.saturating_mul(chunks as u64);
        let ms = geschaetzt.clamp(self.drain_min_ms, self.drain_max_ms.max(self.drain_min_ms));
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// Chunks und Statistik
// ---------------------------------------------------------------------------

/// Dekodierter Chunk in der Queue
#[derive(Debug, Clone)]
pub struct PlaybackChunk {
    /// Index laut Gegenseite (nur fuer Logging)
    pub index: u32,
    pub samples: Arc<[f32]>,
}

/// Ein auf der Zeitleiste eingeplanter Chunk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeplanterChunk {
    pub index: u32,
    pub start: f64,
    pub dauer: f64,
}

impl GeplanterChunk {
    pub fn ende(&self) -> f64 {
        self.start + self.dauer
    }
}

/// Statistiken einer Speaking-Phase (Snapshot)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WiedergabeStatistik {
    /// Angenommene und dekodierte Chunks
    pub empfangen: u32,
    /// Wegen Dekodierfehler verworfene Chunks
    pub verworfen: u32,
    /// Eingeplante Chunks
    pub eingeplant: u32,
    /// Anzahl Underruns (playhead lag in der Vergangenheit)
    pub unterlaeufe: u32,
}

// ---------------------------------------------------------------------------
// PlaybackScheduler
// ---------------------------------------------------------------------------

/// Jitter Buffer mit Scheduler fuer lueckenlose Wiedergabe
///
/// Gehoert genau einer Session; alle Aufrufe erfolgen aus demselben
/// Ereignis-Loop, daher ohne Synchronisation.
pub struct PlaybackScheduler {
    config: WiedergabeConfig,
    queue: VecDeque<PlaybackChunk>,
    /// Naechste freie Startzeit auf der Ausgabe-Zeitleiste
    playhead: f64,
    puffern: bool,
    header_offen: bool,
    dekodierung_fertig: bool,
    statistik: WiedergabeStatistik,
}

impl PlaybackScheduler {
    /// Erstellt einen neuen Scheduler mit gegebener Konfiguration
    pub fn neu(config: WiedergabeConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            playhead: 0.0,
            puffern: true,
            header_offen: true,
            dekodierung_fertig: false,
            statistik: WiedergabeStatistik::default(),
        }
    }

    /// Setzt alles fuer eine neue Speaking-Phase zurueck
    pub fn zuruecksetzen(&mut self) {
        self.queue.clear();
        self.playhead = 0.0;
        self.puffern = true;
        self.header_offen = true;
        self.dekodierung_fertig = false;
        self.statistik = WiedergabeStatistik::default();
    }

    /// Abbruch: Ausgabe stoppen und Zustand verwerfen
    pub fn stoppen(&mut self, ausgabe: &mut dyn AudioAusgabe) {
        ausgabe.stoppen();
        self.zuruecksetzen();
    }

    /// Nimmt eine Base64-Payload an, dekodiert sie und reiht sie ein
    ///
    /// Dekodierfehler werden geloggt, der Chunk wird verworfen und der
    /// Stream laeuft weiter. Gibt die dabei eingeplanten Chunks zurueck.
    pub fn payload_annehmen(
        &mut self,
        index: u32,
        payload: &str,
        ausgabe: &mut dyn AudioAusgabe,
    ) -> Vec<GeplanterChunk> {
        // Der Header steckt nur im ersten Chunk, auch wenn dieser kaputt ist
        let mit_header = std::mem::replace(&mut self.header_offen, false);

        match self.dekodieren(payload, mit_header) {
            Ok(samples) => {
                trace!(index, samples = samples.len(), "Chunk dekodiert");
                self.statistik.empfangen += 1;
                self.queue.push_back(PlaybackChunk {
                    index,
                    samples: samples.into(),
                });
            }
            Err(e) => {
                self.statistik.verworfen += 1;
                warn!(index, fehler = %e, "Audio-Chunk verworfen");
            }
        }

        self.verarbeiten(ausgabe)
    }

    /// Plant bis zu `batch_groesse` Chunks ein, sofern nicht mehr gepuffert wird
    pub fn verarbeiten(&mut self, ausgabe: &mut dyn AudioAusgabe) -> Vec<GeplanterChunk> {
        if self.puffern {
            if self.queue.len() < self.config.schwelle && !self.dekodierung_fertig {
                return Vec::new();
            }
            if self.queue.is_empty() {
                return Vec::new();
            }
            // Uebergang Puffern -> Spielen, genau einmal pro Phase
            self.puffern = false;
            self.playhead = ausgabe.jetzt() + self.config.epsilon_s;
            debug!(
                queue = self.queue.len(),
                start = self.playhead,
                "Jitter Buffer gefuellt, Wiedergabe startet"
            );
        }

        let anzahl = self.queue.len().min(self.config.batch_groesse.max(1));
        let mut geplant = Vec::with_capacity(anzahl);
        for chunk in self.queue.drain(..anzahl) {
            let jetzt = ausgabe.jetzt();
            if jetzt > self.playhead {
                self.statistik.unterlaeufe += 1;
                debug!(
                    index = chunk.index,
                    rueckstand = jetzt - self.playhead,
                    "Underrun, playhead springt nach vorne"
                );
                self.playhead = jetzt + self.config.epsilon_s;
            }

            let dauer = chunk.samples.len() as f64 / self.config.sample_rate as f64;
            let start = self.playhead;
            ausgabe.einplanen(chunk.samples, self.config.sample_rate, start);
            self.playhead += dauer;
            self.statistik.eingeplant += 1;

            geplant.push(GeplanterChunk {
                index: chunk.index,
                start,
                dauer,
            });
        }
        geplant
    }

    /// Die Gegenseite liefert keine weiteren Chunks
    ///
    /// Beendet ein eventuell noch laufendes Puffern (auch unter der
    /// Schwelle) und plant den naechsten Batch ein.
    pub fn dekodierung_abgeschlossen(
        &mut self,
        ausgabe: &mut dyn AudioAusgabe,
    ) -> Vec<GeplanterChunk> {
        self.dekodierung_fertig = true;
        self.verarbeiten(ausgabe)
    }

    /// Wartezeit bis zum Ende der Wiedergabe, abgeleitet aus der Chunk-Anzahl
    pub fn drain_verzoegerung(&self, gemeldete_chunks: u32) -> Duration {
        let chunks = gemeldete_chunks.max(self.statistik.empfangen);
        self.config.drain_verzoegerung(chunks)
    }

    /// true wenn eingeplant werden kann, aber noch Chunks warten
    pub fn hat_ausstehende(&self) -> bool {
        !self.queue.is_empty() && (!self.puffern || self.dekodierung_fertig)
    }

    /// true wenn die Gegenseite fertig ist und die Queue leer ist
    pub fn ist_entleert(&self) -> bool {
        self.dekodierung_fertig && self.queue.is_empty()
    }

    pub fn puffert(&self) -> bool {
        self.puffern
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn queue_laenge(&self) -> usize {
        self.queue.len()
    }

    pub fn statistik(&self) -> &WiedergabeStatistik {
        &self.statistik
    }

    pub fn config(&self) -> &WiedergabeConfig {
        &self.config
    }

    fn dekodieren(&self, payload: &str, mit_header: bool) -> AudioResult<Vec<f32>> {
        let bytes = base64_dekodieren(payload)?;
        let pcm = if mit_header {
            header_entfernen(&bytes, self.config.header_bytes)?
        } else {
            &bytes[..]
        };
        pcm16_dekodieren(pcm)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::pcm16_kodieren;
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine;

    /// Ausgabe mit stellbarer Uhr, die alle Einplanungen aufzeichnet
    #[derive(Default)]
    struct TestAusgabe {
        uhr: f64,
        geplant: Vec<(f64, usize)>,
        gestoppt: usize,
    }

    impl AudioAusgabe for TestAusgabe {
        fn jetzt(&self) -> f64 {
            self.uhr
        }
        fn einplanen(&mut self, samples: Arc<[f32]>, _rate: u32, start: f64) {
            self.geplant.push((start, samples.len()));
        }
        fn stoppen(&mut self) {
            self.gestoppt += 1;
            self.geplant.clear();
        }
    }

    fn payload(samples: usize, header: bool) -> String {
        let mut bytes = Vec::new();
        if header {
            bytes.extend_from_slice(b"RIFF");
            bytes.resize(WAV_HEADER_BYTES, 0);
        }
        bytes.extend_from_slice(&pcm16_kodieren(&vec![0.25; samples]));
        BASE64_STANDARD.encode(bytes)
    }

    fn scheduler(rate: u32) -> PlaybackScheduler {
        PlaybackScheduler::neu(WiedergabeConfig {
            sample_rate: rate,
            ..Default::default()
        })
    }

    fn keine_ueberlappung(geplant: &[GeplanterChunk]) {
        for paar in geplant.windows(2) {
            assert!(paar[1].start >= paar[0].start, "Start nicht monoton");
            assert!(
                paar[1].start >= paar[0].ende() - 1e-12,
                "Ueberlappung: {:?} / {:?}",
                paar[0],
                paar[1]
            );
        }
    }

    #[test]
    fn drei_chunks_lueckenlos_ab_gleicher_basis() {
        let mut s = scheduler(1000);
        let mut aus = TestAusgabe {
            uhr: 2.0,
            ..Default::default()
        };

        assert!(s.payload_annehmen(1, &payload(100, true), &mut aus).is_empty());
        assert!(s.payload_annehmen(2, &payload(100, false), &mut aus).is_empty());
        let geplant = s.payload_annehmen(3, &payload(100, false), &mut aus);

        assert_eq!(geplant.len(), 3);
        let basis = 2.0 + s.config().epsilon_s;
        for (i, g) in geplant.iter().enumerate() {
            assert_eq!(g.index, i as u32 + 1, "Ankunftsreihenfolge verletzt");
            assert!((g.dauer - 0.1).abs() < 1e-12);
            assert!((g.start - (basis + 0.1 * i as f64)).abs() < 1e-9);
        }
        keine_ueberlappung(&geplant);
        assert_eq!(aus.geplant.len(), 3);
        assert!(aus.geplant.iter().all(|&(_, n)| n == 100));
    }

    #[test]
    fn puffert_bis_schwelle() {
        let mut s = scheduler(1000);
        let mut aus = TestAusgabe::default();
        s.payload_annehmen(1, &payload(10, true), &mut aus);
        s.payload_annehmen(2, &payload(10, false), &mut aus);
        assert!(s.puffert());
        assert!(aus.geplant.is_empty(), "Wiedergabe vor Erreichen der Schwelle");
        s.payload_annehmen(3, &payload(10, false), &mut aus);
        assert!(!s.puffert());
        assert_eq!(aus.geplant.len(), 3);
    }

    #[test]
    fn batch_begrenzt_auf_fuenf() {
        let mut s = PlaybackScheduler::neu(WiedergabeConfig {
            sample_rate: 1000,
            schwelle: 8,
            ..Default::default()
        });
        let mut aus = TestAusgabe::default();
        s.payload_annehmen(0, &payload(10, true), &mut aus);
        for i in 1..8 {
            s.payload_annehmen(i, &payload(10, false), &mut aus);
        }
        assert_eq!(aus.geplant.len(), 5);
        assert!(s.hat_ausstehende());
        let rest = s.verarbeiten(&mut aus);
        assert_eq!(rest.len(), 3);
        assert!(!s.hat_ausstehende());
    }

    #[test]
    fn underrun_springt_nach_vorne() {
        let mut s = scheduler(1000);
        let mut aus = TestAusgabe::default();
        for i in 0..3 {
            s.payload_annehmen(i, &payload(100, i == 0), &mut aus);
        }
        let vorher = s.playhead();
        assert!((vorher - (0.01 + 0.3)).abs() < 1e-9);

        // Netz stockt, Ausgabe laeuft weiter
        aus.uhr = 5.0;
        let geplant = s.payload_annehmen(3, &payload(100, false), &mut aus);
        assert_eq!(geplant.len(), 1);
        assert!(geplant[0].start > 5.0, "In der Vergangenheit eingeplant");
        assert!(geplant[0].start >= vorher);
        assert_eq!(s.statistik().unterlaeufe, 1);
    }

    #[test]
    fn kaputter_chunk_wird_verworfen() {
        let mut s = scheduler(1000);
        let mut aus = TestAusgabe::default();
        s.payload_annehmen(1, &payload(10, true), &mut aus);
        s.payload_annehmen(2, "%%kein base64%%", &mut aus);
        s.payload_annehmen(3, &payload(10, false), &mut aus);
        assert_eq!(s.statistik().verworfen, 1);
        assert_eq!(s.queue_laenge(), 2);
        s.payload_annehmen(4, &payload(10, false), &mut aus);
        assert_eq!(aus.geplant.len(), 3);
    }

    #[test]
    fn header_nur_beim_ersten_chunk() {
        let mut s = scheduler(1000);
        let mut aus = TestAusgabe::default();
        s.payload_annehmen(1, &payload(50, true), &mut aus);
        s.payload_annehmen(2, &payload(50, false), &mut aus);
        s.payload_annehmen(3, &payload(50, false), &mut aus);
        assert!(aus.geplant.iter().all(|&(_, n)| n == 50));

        // Neue Phase: wieder genau ein Header
        s.zuruecksetzen();
        s.payload_annehmen(1, &payload(20, true), &mut aus);
        assert_eq!(s.queue_laenge(), 1);
        assert_eq!(s.statistik().verworfen, 0);
    }

    #[test]
    fn abschluss_unter_schwelle_spielt_rest() {
        let mut s = scheduler(1000);
        let mut aus = TestAusgabe::default();
        s.payload_annehmen(1, &payload(10, true), &mut aus);
        assert!(aus.geplant.is_empty());
        let geplant = s.dekodierung_abgeschlossen(&mut aus);
        assert_eq!(geplant.len(), 1);
        assert!(s.ist_entleert());
    }

    #[test]
    fn drain_verzoegerung_begrenzt() {
        let config = WiedergabeConfig::default();
        assert_eq!(config.drain_verzoegerung(0), Duration::from_millis(1000));
        assert_eq!(config.drain_verzoegerung(4), Duration::from_millis(1600));
        assert_eq!(config.drain_verzoegerung(1000), Duration::from_millis(8000));
    }

    #[test]
    fn stoppen_verwirft_alles() {
        let mut s = scheduler(1000);
        let mut aus = TestAusgabe::default();
        for i in 0..4 {
            s.payload_annehmen(i, &payload(10, i == 0), &mut aus);
        }
        s.stoppen(&mut aus);
        assert_eq!(aus.gestoppt, 1);
        assert!(aus.geplant.is_empty());
        assert_eq!(s.playhead(), 0.0);
        assert!(s.puffert());
        assert_eq!(s.queue_laenge(), 0);
    }

    #[test]
    fn zufaellige_ankunft_bleibt_ueberlappungsfrei() {
        let mut s = scheduler(8000);
        let mut aus = TestAusgabe::default();
        let mut alle = Vec::new();
        // Deterministischer Pseudo-Zufall fuer Uhrsprung und Chunk-Groesse
        let mut x: u32 = 12345;
        for i in 0..60u32 {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12345);
            aus.uhr += (x % 300) as f64 / 1000.0;
            let groesse = 50 + (x % 900) as usize;
            alle.extend(s.payload_annehmen(i, &payload(groesse, i == 0), &mut aus));
        }
        alle.extend(s.dekodierung_abgeschlossen(&mut aus));
        while s.hat_ausstehende() {
            alle.extend(s.verarbeiten(&mut aus));
        }
        assert_eq!(alle.len(), 60);
        keine_ueberlappung(&alle);
        let indizes: Vec<u32> = alle.iter().map(|g| g.index).collect();
        assert_eq!(indizes, (0..60).collect::<Vec<_>>());
    }

    #[test]
    fn config_aus_toml_teilweise() {
        let config: WiedergabeConfig = toml::from_str("schwelle = 5\nsample_rate = 24000").unwrap();
        assert_eq!(config.schwelle, 5);
        assert_eq!(config.sample_rate, 24000);
        assert_eq!(config.batch_groesse, 5);
    }
}
