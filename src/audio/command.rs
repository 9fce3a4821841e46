//! Commands sent from the clock's thread to the audio thread via ring buffer.

/// Transport commands for the playback callback.
///
/// Seeking is not a command: the track cursor is a shared atomic so a seek is
/// visible to position reads immediately, before the audio thread wakes up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackCommand {
    /// Start advancing the cursor and emitting track samples.
    Play,

    /// Hold the cursor and emit silence.
    Pause,

    /// Set playback volume (0.0 to 1.0).
    SetVolume(f32),
}
