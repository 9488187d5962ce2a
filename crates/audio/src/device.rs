//! Audio-Geraete via cpal (Feature `geraete`)
//!
//! - [`MikrofonStream`]: cpal InputStream -> lock-free Ring-Buffer
//! - [`LautsprecherAusgabe`]: cpal OutputStream, der eine Zeitleiste
//!   eingeplanter Chunks abspielt und als Uhr fuer den Scheduler dient
//!
//! Die Streams sind `!Send` und muessen im Thread bleiben, der sie oeffnet.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{AudioError, AudioResult};
use crate::playback::AudioAusgabe;

// ---------------------------------------------------------------------------
// Geraeteauswahl
// ---------------------------------------------------------------------------

/// Laedt ein Eingabegeraet anhand des Namens (None = Standard)
pub fn eingabegeraet_laden(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| AudioError::GeraetNichtGefunden("Standard-Eingabegeraet".into())),
        Some(n) => host
            .input_devices()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?
            .find(|d| d.name().map(|dn| dn.contains(n)).unwrap_or(false))
            .ok_or_else(|| AudioError::GeraetNichtGefunden(n.to_string())),
    }
}

/// Laedt ein Ausgabegeraet anhand des Namens (None = Standard)
pub fn ausgabegeraet_laden(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::GeraetNichtGefunden("Standard-Ausgabegeraet".into())),
        Some(n) => host
            .output_devices()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?
            .find(|d| d.name().map(|dn| dn.contains(n)).unwrap_or(false))
            .ok_or_else(|| AudioError::GeraetNichtGefunden(n.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Mikrofon
// ---------------------------------------------------------------------------

/// Offener Mikrofon-Stream mit Ring-Buffer
///
/// Wird der Stream gedroppt, stoppt die Aufnahme.
pub struct MikrofonStream {
    _stream: Stream,
    consumer: HeapCons<f32>,
    sample_rate: u32,
}

impl MikrofonStream {
    /// Oeffnet das Mikrofon (Mono) mit `puffer_samples` Ring-Buffer-Kapazitaet
    ///
    /// Scheitert, wenn das Geraet fehlt oder der Zugriff verweigert wird.
    pub fn oeffnen(device: &Device, sample_rate: u32, puffer_samples: usize) -> AudioResult<Self> {
        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let rb = HeapRb::<f32>::new(puffer_samples.max(1));
        let (mut producer, consumer) = rb.split();
        let err_fn = |err| error!("Capture-Fehler: {}", err);

        let sample_format = device
            .supported_input_configs()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?
            .find(|c| {
                c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate
            })
            .map(|c| c.sample_format())
            .unwrap_or(SampleFormat::F32);

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _| {
                    let written = producer.push_slice(data);
                    if written < data.len() {
                        warn!("Capture Ring-Buffer voll, {} Samples verworfen", data.len() - written);
                    }
                },
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _| {
                    let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    if producer.push_slice(&floats) < floats.len() {
                        warn!("Capture Ring-Buffer voll");
                    }
                },
                err_fn,
                None,
            ),
            andere => {
                return Err(AudioError::StreamFehler(format!(
                    "Nicht unterstuetztes Sample-Format: {andere:?}"
                )))
            }
        }
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
        debug!("Mikrofon geoeffnet: {}Hz mono", sample_rate);

        Ok(Self {
            _stream: stream,
            consumer,
            sample_rate,
        })
    }

    /// Holt alle bisher aufgenommenen Samples aus dem Ring-Buffer
    pub fn samples_lesen(&mut self, ziel: &mut Vec<f32>) -> usize {
        let mut block = [0.0f32; 1024];
        let mut gesamt = 0;
        loop {
            let n = self.consumer.pop_slice(&mut block);
            if n == 0 {
                break;
            }
            ziel.extend_from_slice(&block[..n]);
            gesamt += n;
        }
        gesamt
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// ---------------------------------------------------------------------------
// Lautsprecher
// ---------------------------------------------------------------------------

struct Eintrag {
    /// Start in Geraete-Samples
    start: u64,
    samples: Arc<[f32]>,
}

#[derive(Default)]
struct Zeitleiste {
    /// Bereits an das Geraet ausgegebene Frames
    position: u64,
    eintraege: Vec<Eintrag>,
}

impl Eintrag {
    /// Rechnet Startzeit und Samples auf die Geraete-Rate um
    fn neu(samples: Arc<[f32]>, sample_rate: u32, start: f64, geraete_rate: u32) -> Self {
        let samples = if sample_rate == geraete_rate {
            samples
        } else {
            linear_umrechnen(&samples, sample_rate, geraete_rate).into()
        };
        let start = (start * geraete_rate as f64).round() as u64;
        Self { start, samples }
    }
}

impl Zeitleiste {
    fn rendern(&mut self, data: &mut [f32], kanaele: usize) {
        data.fill(0.0);
        let frames = data.len() / kanaele;
        let anfang = self.position;
        let ende = anfang + frames as u64;

        for e in &self.eintraege {
            let e_ende = e.start + e.samples.len() as u64;
            let von = e.start.max(anfang);
            let bis = e_ende.min(ende);
            for t in von..bis {
                let wert = e.samples[(t - e.start) as usize];
                let frame = (t - anfang) as usize * kanaele;
                for k in 0..kanaele {
                    data[frame + k] += wert;
                }
            }
        }

        self.position = ende;
        self.eintraege
            .retain(|e| e.start + e.samples.len() as u64 > ende);
    }
}

/// Lautsprecher-Ausgabe mit Sample-genauer Uhr
pub struct LautsprecherAusgabe {
    _stream: Stream,
    zeitleiste: Arc<Mutex<Zeitleiste>>,
    sample_rate: u32,
}

impl LautsprecherAusgabe {
    /// Oeffnet das Ausgabegeraet mit seiner Standard-Konfiguration
    ///
    /// Audio mit anderer Abtastrate wird beim Einplanen umgerechnet.
    pub fn oeffnen(device: &Device) -> AudioResult<Self> {
        let standard = device
            .default_output_config()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
        let kanaele = standard.channels().max(1);
        let sample_rate = standard.sample_rate().0;
        let stream_config = StreamConfig {
            channels: kanaele,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let zeitleiste = Arc::new(Mutex::new(Zeitleiste::default()));
        let callback_zeitleiste = Arc::clone(&zeitleiste);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    callback_zeitleiste.lock().rendern(data, kanaele as usize);
                },
                |err| error!("Playback-Fehler: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
        debug!("Lautsprecher geoeffnet: {}Hz {}ch", sample_rate, kanaele);

        Ok(Self {
            _stream: stream,
            zeitleiste,
            sample_rate,
        })
    }

    /// Abtastrate des Geraets in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioAusgabe for LautsprecherAusgabe {
    fn jetzt(&self) -> f64 {
        self.zeitleiste.lock().position as f64 / self.sample_rate as f64
    }

    fn einplanen(&mut self, samples: Arc<[f32]>, sample_rate: u32, start: f64) {
        let eintrag = Eintrag::neu(samples, sample_rate, start, self.sample_rate);
        self.zeitleiste.lock().eintraege.push(eintrag);
    }

    fn stoppen(&mut self) {
        self.zeitleiste.lock().eintraege.clear();
    }
}

/// Einfache lineare Abtastratenwandlung
fn linear_umrechnen(samples: &[f32], von: u32, nach: u32) -> Vec<f32> {
    if samples.is_empty() || von == 0 {
        return Vec::new();
    }
    let faktor = von as f64 / nach as f64;
    let laenge = (samples.len() as f64 / faktor).round() as usize;
    (0..laenge)
        .map(|i| {
            let pos = i as f64 * faktor;
            let idx = pos.floor() as usize;
            let anteil = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * anteil
        })
        .collect()
}
