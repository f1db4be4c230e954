//! Audio-Frames
//!
//! Ein Frame ist ein Block fester Laenge N aus vorzeichenbehafteten 32-Bit-Samples.
//! N ergibt sich aus Abtastrate und Frame-Dauer (`FrameSpec`). Die Laenge eines
//! `AudioFrame` ist nach dem Erzeugen unveraenderlich.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::error::{AudioError, AudioResult};

/// Bytes pro serialisiertem Sample (i32, big-endian)
pub const BYTES_PRO_SAMPLE: usize = 4;

// ---------------------------------------------------------------------------
// FrameSpec
// ---------------------------------------------------------------------------

/// Abtastrate und Frame-Dauer einer Verbindung (Mono)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Dauer eines Frames
    pub frame_dauer: Duration,
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            frame_dauer: Duration::from_millis(60),
        }
    }
}

impl FrameSpec {
    pub fn new(sample_rate: u32, frame_dauer: Duration) -> AudioResult<Self> {
        let spec = Self {
            sample_rate,
            frame_dauer,
        };
        if spec.samples_pro_frame() == 0 {
            return Err(AudioError::Konfiguration(format!(
                "Frame-Dauer {:?} bei {} Hz ergibt keine Samples",
                frame_dauer, sample_rate
            )));
        }
        Ok(spec)
    }

    /// Anzahl Samples N pro Frame
    pub fn samples_pro_frame(&self) -> usize {
        (self.sample_rate as u128 * self.frame_dauer.as_micros() / 1_000_000) as usize
    }

    /// Groesse eines serialisierten Frames in Bytes (vor Kompression)
    pub fn bytes_pro_frame(&self) -> usize {
        self.samples_pro_frame() * BYTES_PRO_SAMPLE
    }
}

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// Frame mit fester Laenge
///
/// Gehoert immer genau einer Pipeline-Stufe; die Uebergabe erfolgt per Move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame(Box<[i32]>);

impl AudioFrame {
    /// Neuer, mit Stille gefuellter Frame
    pub fn stille(laenge: usize) -> Self {
        Self(vec![0; laenge].into_boxed_slice())
    }
}

impl Deref for AudioFrame {
    type Target = [i32];

    fn deref(&self) -> &[i32] {
        &self.0
    }
}

impl DerefMut for AudioFrame {
    fn deref_mut(&mut self) -> &mut [i32] {
        &mut self.0
    }
}

impl From<Vec<i32>> for AudioFrame {
    fn from(samples: Vec<i32>) -> Self {
        Self(samples.into_boxed_slice())
    }
}

// ---------------------------------------------------------------------------
// Serialisierung
// ---------------------------------------------------------------------------

/// Haengt die Samples big-endian an `ausgabe` an
pub fn samples_serialisieren(samples: &[i32], ausgabe: &mut Vec<u8>) {
    ausgabe.reserve(samples.len() * BYTES_PRO_SAMPLE);
    for s in samples {
        ausgabe.extend_from_slice(&s.to_be_bytes());
    }
}

/// Liest big-endian Samples in `ziel`; die Byte-Anzahl muss exakt passen
pub fn samples_deserialisieren(daten: &[u8], ziel: &mut [i32]) -> AudioResult<()> {
    if daten.len() != ziel.len() * BYTES_PRO_SAMPLE {
        return Err(AudioError::FrameLaenge {
            erwartet: ziel.len(),
            erhalten: daten.len() / BYTES_PRO_SAMPLE,
        });
    }
    for (sample, chunk) in ziel.iter_mut().zip(daten.chunks_exact(BYTES_PRO_SAMPLE)) {
        *sample = i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}

/// i32-Sample auf -1.0..1.0 normalisieren
pub fn sample_zu_f32(s: i32) -> f32 {
    s as f32 / i32::MAX as f32
}

/// Normalisiertes f32-Sample auf den i32-Bereich skalieren
pub fn sample_von_f32(s: f32) -> i32 {
    (s.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_spec_ergibt_480_samples() {
        let spec = FrameSpec::default();
        assert_eq!(spec.samples_pro_frame(), 480);
        assert_eq!(spec.bytes_pro_frame(), 1920);
    }

    #[test]
    fn spec_ohne_samples_abgelehnt() {
        assert!(FrameSpec::new(8000, Duration::ZERO).is_err());
        assert!(FrameSpec::new(48000, Duration::from_millis(20)).is_ok());
    }

    #[test]
    fn frame_ist_stille() {
        let frame = AudioFrame::stille(16);
        assert_eq!(frame.len(), 16);
        assert!(frame.iter().all(|&s| s == 0));
    }

    #[test]
    fn serialisierung_big_endian() {
        let mut bytes = Vec::new();
        samples_serialisieren(&[1, -1], &mut bytes);
        assert_eq!(bytes, vec![0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff]);

        let mut ziel = [0i32; 2];
        samples_deserialisieren(&bytes, &mut ziel).unwrap();
        assert_eq!(ziel, [1, -1]);
    }

    #[test]
    fn deserialisierung_falsche_laenge() {
        let mut ziel = [0i32; 4];
        let err = samples_deserialisieren(&[0u8; 12], &mut ziel).unwrap_err();
        assert!(matches!(
            err,
            AudioError::FrameLaenge {
                erwartet: 4,
                erhalten: 3
            }
        ));
    }

    #[test]
    fn f32_konvertierung_begrenzt() {
        assert_eq!(sample_von_f32(2.0), i32::MAX);
        assert_eq!(sample_von_f32(0.0), 0);
        assert!((sample_zu_f32(i32::MAX) - 1.0).abs() < 1e-6);
    }
}
