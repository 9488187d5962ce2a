//! Capture-Encoder
//!
//! Sammelt Mikrofon-Samples zu Bloecken fester Groesse und kodiert jeden
//! vollen Block als PCM16-Frame. Solange die Aufnahme nicht freigegeben ist
//! (Kanal zu oder Phase != Listening), werden Samples verworfen statt
//! gepuffert: nichts wird spaeter nachgesendet.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::pcm::pcm16_kodieren;

/// Konfiguration fuer den Audio-Capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Abtastrate in Hz (von der STT-Gegenseite erwartet)
    pub sample_rate: u32,
    /// Samples pro gesendetem Frame
    pub block_groesse: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            block_groesse: 4096,
        }
    }
}

/// Blockweiser PCM16-Encoder fuer Mikrofon-Samples
#[derive(Debug)]
pub struct CaptureEncoder {
    block_groesse: usize,
    puffer: Vec<f32>,
    gesendet: u64,
    verworfen: u64,
}

impl CaptureEncoder {
    pub fn neu(config: &CaptureConfig) -> Self {
        let block_groesse = config.block_groesse.max(1);
        Self {
            block_groesse,
            puffer: Vec::with_capacity(block_groesse),
            gesendet: 0,
            verworfen: 0,
        }
    }

    /// Nimmt Samples entgegen und gibt alle fertigen Frames zurueck
    ///
    /// Bei `aktiv == false` wird alles verworfen, auch ein angefangener Block.
    pub fn verarbeiten(&mut self, samples: &[f32], aktiv: bool) -> Vec<Bytes> {
        if !aktiv {
            self.verwerfen(samples.len());
            return Vec::new();
        }

        let mut frames = Vec::new();
        let mut rest = samples;
        while !rest.is_empty() {
            let fehlend = self.block_groesse - self.puffer.len();
            let n = fehlend.min(rest.len());
            self.puffer.extend_from_slice(&rest[..n]);
            rest = &rest[n..];

            if self.puffer.len() == self.block_groesse {
                frames.push(pcm16_kodieren(&self.puffer));
                self.puffer.clear();
                self.gesendet += 1;
            }
        }
        frames
    }

    /// Verwirft den angefangenen Block (z.B. beim Phasenwechsel)
    pub fn zuruecksetzen(&mut self) {
        let n = self.puffer.len();
        self.verwerfen(n);
    }

    /// Anzahl bisher erzeugter Frames
    pub fn frames_gesendet(&self) -> u64 {
        self.gesendet
    }

    /// Anzahl verworfener Samples
    pub fn samples_verworfen(&self) -> u64 {
        self.verworfen
    }

    fn verwerfen(&mut self, neue: usize) {
        let n = self.puffer.len() + neue;
        if n > 0 {
            tracing::trace!(samples = n, "Aufnahme inaktiv, Samples verworfen");
        }
        self.verworfen += n as u64;
        self.puffer.clear();
    }
}
