//! Simulated player — hits every beat with seeded timing jitter.
//!
//! Drives a [`RunState`] without a human: after each poll it aims for the
//! next beat, offset by a uniform random jitter, and calls [`RunState::hit`]
//! once the clock reaches that time. The same seed always yields the same
//! sequence of offsets.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::RunError;
use crate::run::{HitRecord, RunState, RunStatus};

pub struct AutoPlayer {
    rng: ChaCha8Rng,
    jitter_ms: f64,
    /// Clock time of the next scheduled hit.
    due_ms: Option<f64>,
}

impl AutoPlayer {
    /// `jitter_ms` bounds the offset either side of the beat.
    pub fn new(seed: u64, jitter_ms: f64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            jitter_ms: jitter_ms.abs(),
            due_ms: None,
        }
    }

    pub fn jitter_ms(&self) -> f64 {
        self.jitter_ms
    }

    /// Fire a hit if one is due. Call after [`RunState::tick`].
    ///
    /// Outside of play the schedule is dropped and re-aimed at the first beat
    /// after play resumes.
    pub fn poll(&mut self, run: &mut RunState) -> Option<Result<HitRecord, RunError>> {
        if run.status() != RunStatus::Playing {
            self.due_ms = None;
            return None;
        }

        let now = run.clock().current_time_ms();
        let due = match self.due_ms {
            Some(due) => due,
            None => {
                let due = self.aim(run, now);
                self.due_ms = Some(due);
                due
            }
        };
        if now < due {
            return None;
        }
        self.due_ms = None;
        Some(run.hit())
    }

    fn aim(&mut self, run: &RunState, now: f64) -> f64 {
        let clock = run.clock();
        let position = clock.beat_position();
        let next = position.floor() + 1.0;
        now + (next - position) * clock.beat_interval_ms() + self.draw_jitter()
    }

    fn draw_jitter(&mut self) -> f64 {
        if self.jitter_ms == 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-self.jitter_ms..=self.jitter_ms)
    }
}
