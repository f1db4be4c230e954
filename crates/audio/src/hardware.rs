//! cpal-basiertes Audio-Geraet
//!
//! Waehlt Ein- und Ausgabegeraet per Namensfragment oder nimmt die
//! Standardgeraete des Hosts.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use tracing::debug;

use crate::capture::open_capture_stream;
use crate::device::{AudioDevice, FrameSink, FrameSource};
use crate::error::{AudioError, AudioResult};
use crate::frame::FrameSpec;
use crate::playback::open_playback_stream;

#[derive(Debug, Clone, Default)]
pub struct CpalDevice {
    /// Namensfragment des Eingabegeraets (None = Standard)
    pub eingabe: Option<String>,
    /// Namensfragment des Ausgabegeraets (None = Standard)
    pub ausgabe: Option<String>,
}

impl AudioDevice for CpalDevice {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open_source(&self, spec: FrameSpec) -> AudioResult<Box<dyn FrameSource>> {
        let device = load_cpal_input_device(self.eingabe.as_deref())?;
        Ok(Box::new(open_capture_stream(&device, &spec)?))
    }

    fn open_sink(&self, spec: FrameSpec) -> AudioResult<Box<dyn FrameSink>> {
        let device = load_cpal_output_device(self.ausgabe.as_deref())?;
        Ok(Box::new(open_playback_stream(&device, &spec)?))
    }
}

/// Laedt ein cpal-Device anhand des Namens fuer Eingabe
pub fn load_cpal_input_device(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or(AudioError::KeinStandardEingabegeraet),
        Some(n) => {
            let devices = host
                .input_devices()
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
            finde_nach_name(devices, n)
        }
    }
}

/// Laedt ein cpal-Device anhand des Namens fuer Ausgabe
pub fn load_cpal_output_device(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or(AudioError::KeinStandardAusgabegeraet),
        Some(n) => {
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
            finde_nach_name(devices, n)
        }
    }
}

fn finde_nach_name(devices: impl Iterator<Item = Device>, name: &str) -> AudioResult<Device> {
    for device in devices {
        if let Ok(dev_name) = device.name() {
            if dev_name.contains(name) {
                debug!(geraet = %dev_name, "Audio-Geraet gewaehlt");
                return Ok(device);
            }
        }
    }
    Err(AudioError::GeraetNichtGefunden(name.to_string()))
}
