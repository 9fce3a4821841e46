//! Playback callback — runs on the cpal audio thread.
//!
//! Drains commands from the ring buffer, copies the track into the output
//! buffer and advances the shared frame cursor. The cursor is the hardware
//! playback clock: it only moves when the device actually consumes frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::command::PlaybackCommand;

/// Output ceiling applied after volume.
const CEILING: f32 = 0.95;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct PlaybackCallback {
    consumer: HeapCons<PlaybackCommand>,
    /// Mono track samples at the device sample rate.
    track: Arc<[f32]>,
    cursor: Arc<AtomicU64>,
    channels: usize,
    playing: bool,
    volume: f32,
}

impl PlaybackCallback {
    pub fn new(
        consumer: HeapCons<PlaybackCommand>,
        track: Arc<[f32]>,
        cursor: Arc<AtomicU64>,
        channels: u16,
    ) -> Self {
        Self {
            consumer,
            track,
            cursor,
            channels: channels.max(1) as usize,
            playing: false,
            volume: 1.0,
        }
    }

    /// Called by cpal for each output buffer of interleaved samples.
    pub fn process(&mut self, output: &mut [f32]) {
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                PlaybackCommand::Play => self.playing = true,
                PlaybackCommand::Pause => self.playing = false,
                PlaybackCommand::SetVolume(v) => self.volume = v.clamp(0.0, 1.0),
            }
        }

        if !self.playing {
            output.fill(0.0);
            return;
        }

        let start = self.cursor.load(Ordering::Acquire);
        let mut frames = 0u64;
        for (i, frame) in output.chunks_mut(self.channels).enumerate() {
            // Past the end of the track the cursor keeps counting in silence.
            let sample = self
                .track
                .get(start as usize + i)
                .map_or(0.0, |s| (s * self.volume).clamp(-CEILING, CEILING));
            frame.fill(sample);
            frames += 1;
        }

        // A seek from the control thread wins over this block's advance.
        let _ = self.cursor.compare_exchange(
            start,
            start + frames,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}
