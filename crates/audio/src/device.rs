//! Audio-Geraete
//!
//! Ein `AudioDevice` oeffnet eine blockierende Frame-Quelle (Capture) und eine
//! Frame-Senke (Playback). Beide werden innerhalb des blockierenden Tasks
//! geoeffnet, der sie benutzt, da Hardware-Streams nicht `Send` sind.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::AudioResult;
use crate::frame::FrameSpec;

/// Blockierende Quelle aufgenommener Frames
pub trait FrameSource {
    /// Wartet auf den naechsten Frame und schreibt ihn nach `frame`
    fn read_frame(&mut self, frame: &mut [i32]) -> AudioResult<()>;
}

/// Senke fuer abzuspielende Frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &[i32]) -> AudioResult<()>;
}

pub trait AudioDevice: Send + Sync {
    fn name(&self) -> &str;

    fn open_source(&self, spec: FrameSpec) -> AudioResult<Box<dyn FrameSource>>;

    fn open_sink(&self, spec: FrameSpec) -> AudioResult<Box<dyn FrameSink>>;
}

// ---------------------------------------------------------------------------
// SilentDevice
// ---------------------------------------------------------------------------

/// Geraet ohne Hardware: liefert Stille im Takt der Frame-Dauer, verwirft Playback
#[derive(Debug, Clone, Default)]
pub struct SilentDevice;

impl AudioDevice for SilentDevice {
    fn name(&self) -> &str {
        "stille"
    }

    fn open_source(&self, spec: FrameSpec) -> AudioResult<Box<dyn FrameSource>> {
        debug!(frame_dauer = ?spec.frame_dauer, "Stille-Quelle geoeffnet");
        Ok(Box::new(StilleQuelle {
            takt: spec.frame_dauer,
            naechster: Instant::now(),
        }))
    }

    fn open_sink(&self, _spec: FrameSpec) -> AudioResult<Box<dyn FrameSink>> {
        Ok(Box::new(VerwerfendeSenke))
    }
}

struct StilleQuelle {
    takt: Duration,
    naechster: Instant,
}

impl FrameSource for StilleQuelle {
    fn read_frame(&mut self, frame: &mut [i32]) -> AudioResult<()> {
        let jetzt = Instant::now();
        if self.naechster > jetzt {
            std::thread::sleep(self.naechster - jetzt);
        } else {
            // Nach einer Pause nicht aufholen
            self.naechster = jetzt;
        }
        self.naechster += self.takt;
        frame.fill(0);
        Ok(())
    }
}

struct VerwerfendeSenke;

impl FrameSink for VerwerfendeSenke {
    fn write_frame(&mut self, _frame: &[i32]) -> AudioResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stille_quelle_liefert_nullen_im_takt() {
        let spec = FrameSpec::new(8000, Duration::from_millis(5)).unwrap();
        let mut quelle = SilentDevice.open_source(spec).unwrap();
        let mut frame = vec![7i32; spec.samples_pro_frame()];

        let start = Instant::now();
        for _ in 0..4 {
            quelle.read_frame(&mut frame).unwrap();
        }
        assert!(frame.iter().all(|&s| s == 0));
        // Erster Frame sofort, danach drei Takte
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn senke_akzeptiert_frames() {
        let mut senke = SilentDevice.open_sink(FrameSpec::default()).unwrap();
        assert!(senke.write_frame(&[1, 2, 3]).is_ok());
        assert_eq!(SilentDevice.name(), "stille");
    }
}
