//! PCM16-Kodierung
//!
//! Lineares 16-Bit-PCM, Little Endian, Mono. Mehr Codec gibt es nicht:
//! die Pipeline liefert WAV-PCM, das Mikrofon sendet rohes PCM.
//!
//! Skalierung: Kodieren mit `x * 32768`, symmetrisch auf ±32767 begrenzt,
//! Dekodieren mit `s / 32768`. Ein Hin-und-Zurueck weicht damit um hoechstens
//! einen Quantisierungsschritt (1/32768) ab.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{AudioError, AudioResult};

/// Groesse des WAV-Containerheaders vor dem ersten Chunk einer Antwort
pub const WAV_HEADER_BYTES: usize = 44;

/// Skalierungsfaktor zwischen f32 und i16
const SKALA: f32 = 32768.0;

/// Wandelt ein f32-Sample in i16 (symmetrisch begrenzt)
#[inline]
pub fn f32_zu_i16(sample: f32) -> i16 {
    (sample * SKALA).round().clamp(-32767.0, 32767.0) as i16
}

/// Wandelt ein i16-Sample in f32 im Bereich [-1, 1)
#[inline]
pub fn i16_zu_f32(sample: i16) -> f32 {
    sample as f32 / SKALA
}

/// Kodiert f32-Samples als PCM16 LE
pub fn pcm16_kodieren(samples: &[f32]) -> Bytes {
    let mut puffer = BytesMut::with_capacity(samples.len() * 2);
    for &s in samples {
        puffer.put_i16_le(f32_zu_i16(s));
    }
    puffer.freeze()
}

/// Dekodiert PCM16 LE in normalisierte f32-Samples
pub fn pcm16_dekodieren(bytes: &[u8]) -> AudioResult<Vec<f32>> {
    if bytes.is_empty() {
        return Err(AudioError::LeerePayload);
    }
    if bytes.len() % 2 != 0 {
        return Err(AudioError::UngeradeLaenge(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|paar| i16_zu_f32(i16::from_le_bytes([paar[0], paar[1]])))
        .collect())
}

/// Dekodiert eine Base64-Payload aus einer `audio_chunk`-Nachricht
pub fn base64_dekodieren(payload: &str) -> AudioResult<Vec<u8>> {
    Ok(BASE64_STANDARD.decode(payload.trim())?)
}

/// Schneidet den Containerheader vom Payload-Anfang ab
pub fn header_entfernen(bytes: &[u8], header: usize) -> AudioResult<&[u8]> {
    if bytes.len() < header {
        return Err(AudioError::HeaderZuKurz {
            laenge: bytes.len(),
            header,
        });
    }
    if header == WAV_HEADER_BYTES && !bytes.starts_with(b"RIFF") {
        tracing::debug!("Erster Chunk ohne RIFF-Kennung, Header wird trotzdem entfernt");
    }
    Ok(&bytes[header..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grenzwerte_symmetrisch() {
        assert_eq!(f32_zu_i16(1.0), 32767);
        assert_eq!(f32_zu_i16(-1.0), -32767);
        assert_eq!(f32_zu_i16(5.0), 32767);
        assert_eq!(f32_zu_i16(-5.0), -32767);
        assert_eq!(f32_zu_i16(0.0), 0);
    }

    #[test]
    fn dekodieren_bereich() {
        assert_eq!(i16_zu_f32(i16::MIN), -1.0);
        assert!(i16_zu_f32(i16::MAX) < 1.0);
    }

    #[test]
    fn hin_und_zurueck_innerhalb_eines_schritts() {
        let original: Vec<f32> = (0..512)
            .map(|i| ((i as f32) * 0.05).sin() * 0.9)
            .chain([1.0, -1.0, 0.5, -0.25, 0.0])
            .collect();
        let bytes = pcm16_kodieren(&original);
        assert_eq!(bytes.len(), original.len() * 2);
        let zurueck = pcm16_dekodieren(&bytes).unwrap();
        for (a, b) in original.iter().zip(zurueck.iter()) {
            assert!(
                (a - b).abs() <= 1.0 / 32768.0,
                "Abweichung zu gross: {a} -> {b}"
            );
        }
    }

    #[test]
    fn little_endian_reihenfolge() {
        let bytes = pcm16_kodieren(&[i16_zu_f32(0x0102)]);
        assert_eq!(&bytes[..], &[0x02, 0x01]);
    }

    #[test]
    fn ungerade_und_leere_payload() {
        assert!(matches!(
            pcm16_dekodieren(&[1, 2, 3]),
            Err(AudioError::UngeradeLaenge(3))
        ));
        assert!(matches!(pcm16_dekodieren(&[]), Err(AudioError::LeerePayload)));
    }

    #[test]
    fn header_wird_abgeschnitten() {
        let mut payload = b"RIFF".to_vec();
        payload.resize(WAV_HEADER_BYTES, 0);
        payload.extend_from_slice(&[0x10, 0x00]);
        let rest = header_entfernen(&payload, WAV_HEADER_BYTES).unwrap();
        assert_eq!(rest, &[0x10, 0x00]);
        assert!(header_entfernen(&payload[..10], WAV_HEADER_BYTES).is_err());
    }

    #[test]
    fn base64_fehler() {
        assert!(base64_dekodieren("AAEC").is_ok());
        assert!(matches!(
            base64_dekodieren("%%%"),
            Err(AudioError::Base64(_))
        ));
    }
}
