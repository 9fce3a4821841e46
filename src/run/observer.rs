//! Feedback hooks for the layers around a run (sound effects, visuals).
//!
//! Observers are fire-and-forget: they return nothing, and the run state
//! never depends on what they do.

use crate::clock::BeatEvent;

use super::result::RunResult;
use super::HitRecord;

/// Receives run events. Every method defaults to doing nothing.
pub trait RunObserver {
    fn on_beat(&mut self, _beat: BeatEvent) {}

    fn on_judgment(&mut self, _hit: &HitRecord) {}

    /// A stage became active. `stage` is 1-based.
    fn on_stage_started(&mut self, _stage: usize, _tempo_bpm: f64) {}

    fn on_finished(&mut self, _result: &RunResult) {}
}

/// Observer that writes run events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_beat(&mut self, beat: BeatEvent) {
        log::trace!("beat {} at {:.1} ms", beat.index, beat.timestamp_ms);
    }

    fn on_judgment(&mut self, hit: &HitRecord) {
        match hit.offset_ms {
            Some(offset) => log::debug!(
                "{:?} on {:?} ({offset:+.1} ms): +{} combo {}",
                hit.judgment,
                hit.word,
                hit.points,
                hit.combo
            ),
            None => log::debug!(
                "{:?} on {:?}: +{} combo {}",
                hit.judgment,
                hit.word,
                hit.points,
                hit.combo
            ),
        }
    }

    fn on_stage_started(&mut self, stage: usize, tempo_bpm: f64) {
        log::info!("stage {stage} at {tempo_bpm} bpm");
    }

    fn on_finished(&mut self, result: &RunResult) {
        log::info!(
            "session {} finished: {} points, grade {} ({}%)",
            result.session_id,
            result.score,
            result.grade,
            result.accuracy
        );
    }
}
