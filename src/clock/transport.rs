//! Transport state — play/pause/stop control and tempo-anchored beat position.
//!
//! The transport does not know where its readings come from. The beat clock
//! feeds it either a software-timer reading or the audio device's playback
//! position; both are plain milliseconds. Elapsed time is
//! `paused_offset + (reading - origin)` while playing and frozen otherwise.
//!
//! Beat position is tracked relative to a tempo anchor: the beat count reached
//! at the last tempo change plus the beats elapsed since then at the current
//! tempo. A tempo change re-anchors at the current elapsed time, so the beat
//! index observed immediately before and after the change is identical.

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

/// Musical transport: tracks tempo, elapsed time and beat position.
#[derive(Debug, Clone)]
pub struct Transport {
    bpm: f64,
    state: PlayState,
    /// Reading captured when playback last (re)started.
    origin_ms: f64,
    /// Elapsed time preserved across pause/resume.
    paused_offset_ms: f64,
    /// Beats reached at the last tempo anchor.
    anchor_beats: f64,
    /// Elapsed time at the last tempo anchor.
    anchor_ms: f64,
}

/// Milliseconds per beat at `bpm`.
pub fn beat_interval_ms(bpm: f64) -> f64 {
    60_000.0 / bpm
}

impl Transport {
    /// Create a new transport in the stopped state at position zero.
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm,
            state: PlayState::Stopped,
            origin_ms: 0.0,
            paused_offset_ms: 0.0,
            anchor_beats: 0.0,
            anchor_ms: 0.0,
        }
    }

    /// Start playback at `reading`, continuing from the paused offset.
    ///
    /// Returns `false` if already playing.
    pub fn play(&mut self, reading: f64) -> bool {
        if self.state == PlayState::Playing {
            return false;
        }
        self.origin_ms = reading;
        self.state = PlayState::Playing;
        true
    }

    /// Freeze elapsed time at `reading`. Returns `false` if not playing.
    pub fn pause(&mut self, reading: f64) -> bool {
        if self.state != PlayState::Playing {
            return false;
        }
        self.paused_offset_ms = self.elapsed_ms(reading);
        self.state = PlayState::Paused;
        true
    }

    /// Stop and rewind to zero, dropping any tempo anchor.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.origin_ms = 0.0;
        self.paused_offset_ms = 0.0;
        self.anchor_beats = 0.0;
        self.anchor_ms = 0.0;
    }

    /// Current play state.
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Current BPM.
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Milliseconds per beat at the current tempo.
    pub fn interval_ms(&self) -> f64 {
        beat_interval_ms(self.bpm)
    }

    /// Elapsed playback time for a given reading.
    pub fn elapsed_ms(&self, reading: f64) -> f64 {
        match self.state {
            PlayState::Playing => self.paused_offset_ms + (reading - self.origin_ms).max(0.0),
            PlayState::Paused | PlayState::Stopped => self.paused_offset_ms,
        }
    }

    /// Fractional beat position at `elapsed_ms`.
    pub fn beat_position(&self, elapsed_ms: f64) -> f64 {
        self.anchor_beats + (elapsed_ms - self.anchor_ms) / self.interval_ms()
    }

    /// Whole beat index at `elapsed_ms`. Never negative.
    pub fn beat_index(&self, elapsed_ms: f64) -> u64 {
        self.beat_position(elapsed_ms).floor().max(0.0) as u64
    }

    /// Elapsed time at which beat `index` starts under the current anchor.
    pub fn beat_time_ms(&self, index: u64) -> f64 {
        self.anchor_ms + (index as f64 - self.anchor_beats) * self.interval_ms()
    }

    /// Change tempo, re-anchoring at `elapsed_ms` so the beat position is continuous.
    pub fn set_bpm(&mut self, bpm: f64, elapsed_ms: f64) {
        self.anchor_beats = self.beat_position(elapsed_ms);
        self.anchor_ms = elapsed_ms;
        self.bpm = bpm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn initial_state() {
        let t = Transport::new(120.0);
        assert_eq!(t.state(), PlayState::Stopped);
        assert_eq!(t.elapsed_ms(1234.0), 0.0);
        assert_approx_eq!(t.interval_ms(), 500.0);
    }

    #[test]
    fn play_pause_stop() {
        let mut t = Transport::new(120.0);
        assert!(t.play(0.0));
        assert!(!t.play(10.0));
        assert_eq!(t.state(), PlayState::Playing);
        assert!(t.pause(300.0));
        assert!(!t.pause(400.0));
        assert_eq!(t.state(), PlayState::Paused);
        t.stop();
        assert_eq!(t.state(), PlayState::Stopped);
    }

    #[test]
    fn elapsed_freezes_while_paused() {
        let mut t = Transport::new(120.0);
        t.play(1000.0);
        assert_approx_eq!(t.elapsed_ms(1750.0), 750.0);
        t.pause(1750.0);
        assert_approx_eq!(t.elapsed_ms(9000.0), 750.0);
    }

    #[test]
    fn resume_continues_from_paused_offset() {
        let mut t = Transport::new(120.0);
        t.play(0.0);
        t.pause(400.0);
        t.play(10_000.0);
        assert_approx_eq!(t.elapsed_ms(10_250.0), 650.0);
    }

    #[test]
    fn stop_rewinds() {
        let mut t = Transport::new(120.0);
        t.play(0.0);
        t.pause(2000.0);
        t.stop();
        assert_eq!(t.elapsed_ms(5000.0), 0.0);
        assert_eq!(t.beat_index(0.0), 0);
    }

    #[test]
    fn reading_before_origin_clamps_to_zero() {
        let mut t = Transport::new(120.0);
        t.play(500.0);
        assert_eq!(t.elapsed_ms(480.0), 0.0);
    }

    #[test]
    fn beat_index_at_120_bpm() {
        let t = Transport::new(120.0);
        assert_eq!(t.beat_index(0.0), 0);
        assert_eq!(t.beat_index(499.9), 0);
        assert_eq!(t.beat_index(500.0), 1);
        assert_eq!(t.beat_index(1250.0), 2);
    }

    #[test]
    fn tempo_change_preserves_index_and_phase() {
        let mut t = Transport::new(120.0);
        let elapsed = 1250.0; // beat 2.5
        let before = t.beat_index(elapsed);
        t.set_bpm(240.0, elapsed);
        assert_eq!(t.beat_index(elapsed), before);
        assert_approx_eq!(t.beat_position(elapsed), 2.5);
        // Half a beat later at 240 BPM is 125ms.
        assert_eq!(t.beat_index(elapsed + 125.0), 3);
    }

    #[test]
    fn tempo_change_on_exact_boundary() {
        let mut t = Transport::new(140.0);
        let elapsed = 3.0 * beat_interval_ms(140.0);
        let before = t.beat_index(elapsed);
        t.set_bpm(160.0, elapsed);
        assert_eq!(t.beat_index(elapsed), before);
    }

    #[test]
    fn beat_time_follows_anchor() {
        let mut t = Transport::new(120.0);
        assert_approx_eq!(t.beat_time_ms(3), 1500.0);
        t.set_bpm(60.0, 1500.0);
        assert_approx_eq!(t.beat_time_ms(4), 2500.0);
    }
}
