//! Background loading of backing tracks.
//!
//! Loading runs on its own thread so it never blocks clock operations. The
//! result is picked up by polling a [`PendingLoad`]; a load that never
//! resolves, or resolves to an error, simply leaves the clock in timer mode.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::track::DecodedTrack;
use super::AudioError;

/// Where a backing track comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// A local WAV file (plain path or `file://` URL).
    File(PathBuf),
    /// An `http://` or `https://` URL. Fetched only with the `http` feature.
    Http(String),
}

impl AudioSource {
    /// Classify a source string.
    pub fn parse(source: &str) -> Result<Self, AudioError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(AudioError::UnsupportedSource(String::new()));
        }
        if let Some(path) = source.strip_prefix("file://") {
            return Ok(Self::File(PathBuf::from(path)));
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(Self::Http(source.to_string()));
        }
        match source.split_once("://") {
            Some(_) => Err(AudioError::UnsupportedSource(source.to_string())),
            None => Ok(Self::File(PathBuf::from(source))),
        }
    }

    /// Fetch and decode the track, blocking the calling thread.
    pub fn fetch(&self) -> Result<DecodedTrack, AudioError> {
        match self {
            Self::File(path) => DecodedTrack::from_path(path),
            Self::Http(url) => fetch_http(url),
        }
    }
}

#[cfg(feature = "http")]
fn fetch_http(url: &str) -> Result<DecodedTrack, AudioError> {
    let bytes = reqwest::blocking::get(url)
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.bytes())
        .map_err(|e| AudioError::Http(e.to_string()))?;
    DecodedTrack::from_wav(std::io::Cursor::new(bytes.to_vec()))
}

#[cfg(not(feature = "http"))]
fn fetch_http(url: &str) -> Result<DecodedTrack, AudioError> {
    Err(AudioError::UnsupportedSource(url.to_string()))
}

/// An in-flight track load.
#[derive(Debug)]
pub struct PendingLoad {
    source: String,
    rx: Receiver<Result<DecodedTrack, AudioError>>,
}

impl PendingLoad {
    /// Start loading `source` on a background thread.
    pub fn spawn(source: &str) -> Self {
        let (tx, rx) = mpsc::channel();
        let owned = source.to_string();
        let spawned = thread::Builder::new()
            .name("beatword-audio-load".into())
            .spawn(move || {
                let outcome = AudioSource::parse(&owned).and_then(|s| s.fetch());
                // The clock may have been dropped while we were loading.
                let _ = tx.send(outcome);
            });

        if let Err(e) = spawned {
            log::warn!("could not spawn audio loader: {e}");
        }

        Self {
            source: source.to_string(),
            rx,
        }
    }

    /// The source string this load was started with.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Non-blocking poll. `None` while the load is still running.
    pub fn try_take(&self) -> Option<Result<Arc<DecodedTrack>, AudioError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome.map(Arc::new)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AudioError::Disconnected)),
        }
    }

    /// Block up to `timeout` for the outcome. `None` on timeout.
    pub fn wait(&self, timeout: Duration) -> Option<Result<Arc<DecodedTrack>, AudioError>> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome.map(Arc::new)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(AudioError::Disconnected)),
        }
    }
}
