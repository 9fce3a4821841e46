//! Backing-track audio — decoding, background loading and a cpal playback device.
//!
//! Audio is a timing enhancement only. When a track is playing, the beat clock
//! reads time from the device's playback cursor; when anything here fails, the
//! clock logs the [`AudioError`] and keeps running on its software timer.

pub mod callback;
pub mod command;
pub mod loader;
pub mod output;
pub mod track;

use std::sync::Arc;

use thiserror::Error;

pub use command::PlaybackCommand;
pub use loader::{AudioSource, PendingLoad};
pub use output::{CpalDevice, CpalFactory};
pub use track::DecodedTrack;

/// Audio loading and playback errors.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No audio output device found.
    #[error("no audio output device found")]
    NoOutputDevice,
    /// Failed to query device configuration.
    #[error("device config error: {0}")]
    DeviceConfig(String),
    /// Failed to build the audio stream.
    #[error("stream build error: {0}")]
    StreamBuild(String),
    /// Failed to start the audio stream.
    #[error("stream play error: {0}")]
    StreamPlay(String),
    /// Command ring buffer is full — audio thread is not draining fast enough.
    #[error("audio command ring buffer is full")]
    BufferFull,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("audio track contains no samples")]
    EmptyTrack,
    #[error("unsupported audio source: {0:?}")]
    UnsupportedSource(String),
    #[error("http error: {0}")]
    Http(String),
    /// The loader thread went away without reporting.
    #[error("audio loader disconnected")]
    Disconnected,
}

/// A device playing a decoded track, exposing its playback clock.
pub trait PlaybackDevice {
    /// Seek to `position_ms` of the track and start playing.
    fn play_from(&mut self, position_ms: f64) -> Result<(), AudioError>;

    /// Hold the current position.
    fn pause(&mut self) -> Result<(), AudioError>;

    /// Halt and rewind to the start of the track.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Set playback volume, 0.0 to 1.0.
    fn set_volume(&mut self, volume: f32) -> Result<(), AudioError>;

    /// Track position in milliseconds, as advanced by the hardware.
    fn position_ms(&self) -> f64;
}

/// Opens playback devices for decoded tracks.
pub trait DeviceFactory {
    fn open(&self, track: Arc<DecodedTrack>) -> Result<Box<dyn PlaybackDevice>, AudioError>;
}
