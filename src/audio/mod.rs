pub mod capture;
pub mod codec;
pub mod playback;

pub use capture::{AudioFrame, CaptureBackend, CaptureLoop, CaptureSink, WavFileCapture};
pub use playback::{PlaybackBackend, PlaybackSink, WavFilePlayback};
