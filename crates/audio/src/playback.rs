//! Audio-Playback via cpal
//!
//! Oeffnet einen cpal OutputStream und liest Samples aus einem
//! lock-free Ring-Buffer. Fehlende Samples werden mit Stille aufgefuellt.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use tracing::{debug, error, trace, warn};

use crate::device::FrameSink;
use crate::error::{AudioError, AudioResult};
use crate::frame::{sample_zu_f32, FrameSpec};

/// Produziert Samples fuer den Playback-Callback
pub type PlaybackProducer = HeapProd<f32>;

/// Frame-Senke auf einem cpal-Ausgabegeraet
pub struct CpalSenke {
    _stream: Stream,
    producer: PlaybackProducer,
    puffer: Vec<f32>,
}

impl FrameSink for CpalSenke {
    fn write_frame(&mut self, frame: &[i32]) -> AudioResult<()> {
        self.puffer.clear();
        self.puffer.extend(frame.iter().map(|&s| sample_zu_f32(s)));
        let written = self.producer.push_slice(&self.puffer);
        if written < self.puffer.len() {
            warn!(
                "Playback Ring-Buffer voll, {} Samples verworfen",
                self.puffer.len() - written
            );
        }
        Ok(())
    }
}

/// Oeffnet einen Mono-Playback-Stream auf dem gegebenen Geraet.
pub fn open_playback_stream(device: &Device, spec: &FrameSpec) -> AudioResult<CpalSenke> {
    let sample_rate = spec.sample_rate;
    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(sample_rate as usize * 2);
    let (producer, mut consumer) = rb.split();

    let err_fn = |err| error!("Playback-Fehler: {}", err);

    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate);

    let sample_format = supported
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    let read = consumer.pop_slice(data);
                    // Stille fuer fehlende Samples
                    if read < data.len() {
                        trace!("Playback Underrun: {} Samples fehlen", data.len() - read);
                        data[read..].fill(0.0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| {
                    let mut float_buf = vec![0.0f32; data.len()];
                    let read = consumer.pop_slice(&mut float_buf);
                    if read < data.len() {
                        trace!("Playback Underrun");
                    }
                    for (out, s) in data.iter_mut().zip(float_buf.iter()) {
                        *out = (*s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32)
                            as i16;
                    }
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

    debug!(sample_rate, "Playback-Stream geoeffnet");

    Ok(CpalSenke {
        _stream: stream,
        producer,
        puffer: Vec::with_capacity(spec.samples_pro_frame()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::traits::HostTrait;

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn playback_stream_oeffnen() {
        let host = cpal::default_host();
        if let Some(device) = host.default_output_device() {
            let result = open_playback_stream(&device, &FrameSpec::default());
            assert!(result.is_ok(), "Playback-Stream sollte oeffenbar sein");
        }
    }
}
