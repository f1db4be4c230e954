//! Frame-Codecs
//!
//! Ein Codec wandelt einen Frame fester Laenge in Nutzdaten-Bytes und zurueck.
//! Die Session kennt nur den Trait, sodass sich der verlustfreie DEFLATE-Codec
//! und der verlustbehaftete Opus-Codec gegeneinander tauschen lassen.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AudioError, AudioResult};
use crate::frame::{samples_deserialisieren, samples_serialisieren, FrameSpec, BYTES_PRO_SAMPLE};

/// Kodiert und dekodiert Frames der Laenge N
pub trait FrameCodec: Send {
    fn name(&self) -> &'static str;

    /// Kodiert genau N Samples zu Nutzdaten
    fn encode(&mut self, frame: &[i32]) -> AudioResult<Vec<u8>>;

    /// Dekodiert Nutzdaten in `frame`; liefert der Codec nicht genau N Samples, ist das ein Fehler
    fn decode(&mut self, daten: &[u8], frame: &mut [i32]) -> AudioResult<()>;
}

/// Auswahl des Codecs in der Konfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Deflate,
    Opus,
}

impl CodecKind {
    /// Erstellt eine Codec-Instanz fuer die gegebene Frame-Spezifikation
    pub fn erstellen(self, spec: FrameSpec) -> AudioResult<Box<dyn FrameCodec>> {
        match self {
            Self::Deflate => Ok(Box::new(DeflateCodec::new(spec))),
            #[cfg(feature = "opus")]
            Self::Opus => Ok(Box::new(OpusCodec::new(spec)?)),
            #[cfg(not(feature = "opus"))]
            Self::Opus => Err(AudioError::Konfiguration(
                "Opus-Codec nicht verfuegbar (Feature 'opus' nicht aktiviert)".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// DEFLATE
// ---------------------------------------------------------------------------

/// Verlustfreier Codec: big-endian i32 Samples + DEFLATE
pub struct DeflateCodec {
    samples: usize,
    puffer: Vec<u8>,
}

impl DeflateCodec {
    pub fn new(spec: FrameSpec) -> Self {
        let samples = spec.samples_pro_frame();
        Self {
            samples,
            puffer: Vec::with_capacity(samples * BYTES_PRO_SAMPLE),
        }
    }

    fn laenge_pruefen(&self, laenge: usize) -> AudioResult<()> {
        if laenge != self.samples {
            return Err(AudioError::FrameLaenge {
                erwartet: self.samples,
                erhalten: laenge,
            });
        }
        Ok(())
    }
}

impl FrameCodec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn encode(&mut self, frame: &[i32]) -> AudioResult<Vec<u8>> {
        self.laenge_pruefen(frame.len())?;

        self.puffer.clear();
        samples_serialisieren(frame, &mut self.puffer);

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.puffer)?;
        Ok(encoder.finish()?)
    }

    fn decode(&mut self, daten: &[u8], frame: &mut [i32]) -> AudioResult<()> {
        self.laenge_pruefen(frame.len())?;

        // Ein Byte mehr als erlaubt lesen, um ueberlange Frames zu erkennen
        let grenze = (self.samples * BYTES_PRO_SAMPLE + 1) as u64;
        self.puffer.clear();
        DeflateDecoder::new(daten)
            .take(grenze)
            .read_to_end(&mut self.puffer)
            .map_err(|e| AudioError::CodecFehler(format!("DEFLATE: {e}")))?;

        samples_deserialisieren(&self.puffer, frame)
    }
}

// ---------------------------------------------------------------------------
// Opus
// ---------------------------------------------------------------------------

#[cfg(feature = "opus")]
pub use opus::OpusCodec;

#[cfg(feature = "opus")]
mod opus {
    use audiopus::{
        coder::{Decoder, Encoder},
        Application, Channels, SampleRate,
    };
    use tracing::debug;

    use super::FrameCodec;
    use crate::error::{AudioError, AudioResult};
    use crate::frame::{sample_von_f32, sample_zu_f32, FrameSpec};

    /// Maximale Groesse eines Opus-Pakets
    const MAX_PAKET: usize = 4000;

    /// Verlustbehafteter Sprach-Codec (Opus, VoIP, Mono)
    pub struct OpusCodec {
        encoder: Encoder,
        decoder: Decoder,
        samples: usize,
        pcm: Vec<f32>,
    }

    impl OpusCodec {
        pub fn new(spec: FrameSpec) -> AudioResult<Self> {
            let rate = match spec.sample_rate {
                8000 => SampleRate::Hz8000,
                12000 => SampleRate::Hz12000,
                16000 => SampleRate::Hz16000,
                24000 => SampleRate::Hz24000,
                48000 => SampleRate::Hz48000,
                andere => {
                    return Err(AudioError::Konfiguration(format!(
                        "Opus unterstuetzt {andere} Hz nicht"
                    )))
                }
            };

            let encoder = Encoder::new(rate, Channels::Mono, Application::Voip)
                .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
            let decoder = Decoder::new(rate, Channels::Mono)
                .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

            let samples = spec.samples_pro_frame();
            debug!(sample_rate = spec.sample_rate, samples, "OpusCodec erstellt");

            Ok(Self {
                encoder,
                decoder,
                samples,
                pcm: vec![0.0; samples],
            })
        }
    }

    impl FrameCodec for OpusCodec {
        fn name(&self) -> &'static str {
            "opus"
        }

        fn encode(&mut self, frame: &[i32]) -> AudioResult<Vec<u8>> {
            if frame.len() != self.samples {
                return Err(AudioError::FrameLaenge {
                    erwartet: self.samples,
                    erhalten: frame.len(),
                });
            }
            for (ziel, &s) in self.pcm.iter_mut().zip(frame) {
                *ziel = sample_zu_f32(s);
            }

            let mut ausgabe = vec![0u8; MAX_PAKET];
            let geschrieben = self
                .encoder
                .encode_float(&self.pcm[..], &mut ausgabe)
                .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
            ausgabe.truncate(geschrieben);
            Ok(ausgabe)
        }

        fn decode(&mut self, daten: &[u8], frame: &mut [i32]) -> AudioResult<()> {
            if frame.len() != self.samples {
                return Err(AudioError::FrameLaenge {
                    erwartet: self.samples,
                    erhalten: frame.len(),
                });
            }
            let dekodiert = self
                .decoder
                .decode_float(Some(daten), &mut self.pcm, false)
                .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
            if dekodiert != self.samples {
                return Err(AudioError::FrameLaenge {
                    erwartet: self.samples,
                    erhalten: dekodiert,
                });
            }
            for (ziel, &s) in frame.iter_mut().zip(&self.pcm) {
                *ziel = sample_von_f32(s);
            }
            Ok(())
        }
    }
}

/// Protokolliert den gewaehlten Codec (einmal pro Session)
pub fn codec_protokollieren(codec: &dyn FrameCodec, spec: &FrameSpec) {
    debug!(
        codec = codec.name(),
        sample_rate = spec.sample_rate,
        samples = spec.samples_pro_frame(),
        "Frame-Codec aktiv"
    );
}
