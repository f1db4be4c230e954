//! Mikrofon-Capture via cpal
//!
//! Oeffnet einen cpal InputStream und schreibt Samples in einen
//! lock-free Ring-Buffer. Der Leser blockiert auf einem Weckruf des
//! Callbacks, bis ein vollstaendiger Frame vorliegt.

use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use tracing::{debug, error, warn};

use crate::device::FrameSource;
use crate::error::{AudioError, AudioResult};
use crate::frame::{sample_von_f32, FrameSpec};

/// Konfiguration fuer den Audio-Capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Ring-Buffer Kapazitaet in Samples
    pub buffer_size: usize,
}

impl CaptureConfig {
    pub fn aus_spec(spec: &FrameSpec) -> Self {
        Self {
            sample_rate: spec.sample_rate,
            buffer_size: spec.sample_rate as usize * 2, // 2 Sekunden Puffer
        }
    }
}

/// Konsumiert Samples fuer die Verarbeitung
pub type CaptureConsumer = HeapCons<f32>;

/// Frame-Quelle auf einem cpal-Eingabegeraet
///
/// Haelt den cpal-Stream am Leben; wird die Quelle gedroppt, stoppt die Aufnahme.
pub struct CpalQuelle {
    _stream: Stream,
    consumer: CaptureConsumer,
    wecker: Receiver<()>,
    timeout: Duration,
    puffer: Vec<f32>,
}

impl FrameSource for CpalQuelle {
    fn read_frame(&mut self, frame: &mut [i32]) -> AudioResult<()> {
        while self.consumer.occupied_len() < frame.len() {
            match self.wecker.recv_timeout(self.timeout) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {
                    return Err(AudioError::StreamFehler(
                        "Capture liefert keine Samples".to_string(),
                    ))
                }
                Err(RecvTimeoutError::Disconnected) => return Err(AudioError::Geschlossen),
            }
        }

        self.puffer.resize(frame.len(), 0.0);
        let gelesen = self.consumer.pop_slice(&mut self.puffer);
        for (ziel, &s) in frame.iter_mut().zip(&self.puffer[..gelesen]) {
            *ziel = sample_von_f32(s);
        }
        Ok(())
    }
}

/// Oeffnet einen Mono-Capture-Stream auf dem gegebenen Geraet.
pub fn open_capture_stream(device: &Device, spec: &FrameSpec) -> AudioResult<CpalQuelle> {
    let config = CaptureConfig::aus_spec(spec);
    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(config.buffer_size);
    let (mut producer, consumer) = rb.split();

    // Kapazitaet 1: ein ausstehender Weckruf genuegt
    let (wecker_tx, wecker_rx) = bounded::<()>(1);

    let err_fn = |err| error!("Capture-Fehler: {}", err);

    // Unterstuetzte Sample-Formate pruefen
    let supported = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= config.sample_rate
                && c.max_sample_rate().0 >= config.sample_rate
        });

    let sample_format = supported
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _| {
                    let written = producer.push_slice(data);
                    if written < data.len() {
                        warn!(
                            "Capture Ring-Buffer voll, {} Samples verworfen",
                            data.len() - written
                        );
                    }
                    let _ = wecker_tx.try_send(());
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    let written = producer.push_slice(&floats);
                    if written < floats.len() {
                        warn!("Capture Ring-Buffer voll");
                    }
                    let _ = wecker_tx.try_send(());
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        _ => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                sample_format
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(sample_rate = config.sample_rate, "Capture-Stream geoeffnet");

    Ok(CpalQuelle {
        _stream: stream,
        consumer,
        wecker: wecker_rx,
        timeout: spec.frame_dauer * 4,
        puffer: Vec::with_capacity(spec.samples_pro_frame()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::traits::HostTrait;

    #[test]
    fn capture_config_aus_spec() {
        let config = CaptureConfig::aus_spec(&FrameSpec::default());
        assert_eq!(config.sample_rate, 8000);
        assert_eq!(config.buffer_size, 16000);
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn capture_stream_oeffnen() {
        let host = cpal::default_host();
        if let Some(device) = host.default_input_device() {
            let result = open_capture_stream(&device, &FrameSpec::default());
            assert!(result.is_ok(), "Capture-Stream sollte oeffenbar sein");
        }
    }
}
