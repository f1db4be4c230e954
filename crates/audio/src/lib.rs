//! ipcall-audio – Audio-Frames und Geraete
//!
//! - `AudioFrame` / `FrameSpec`: Frames fester Laenge N
//! - `BufferPool`: vorgewaermter Frame-Pool ohne Allokation im Hot Path
//! - `FrameCodec`: DEFLATE (verlustfrei) und Opus (Feature `opus`)
//! - `AudioDevice`: blockierende Capture-Quelle und Playback-Senke,
//!   cpal-Backend hinter dem Feature `hardware`

#[cfg(feature = "hardware")]
pub mod capture;
pub mod codec;
pub mod device;
pub mod error;
pub mod frame;
#[cfg(feature = "hardware")]
pub mod hardware;
#[cfg(feature = "hardware")]
pub mod playback;
pub mod pool;

// Bequeme Re-Exporte der wichtigsten Typen
pub use codec::{codec_protokollieren, CodecKind, DeflateCodec, FrameCodec};
#[cfg(feature = "opus")]
pub use codec::OpusCodec;
pub use device::{AudioDevice, FrameSink, FrameSource, SilentDevice};
pub use error::{AudioError, AudioResult};
pub use frame::{AudioFrame, FrameSpec};
#[cfg(feature = "hardware")]
pub use hardware::CpalDevice;
pub use pool::BufferPool;
