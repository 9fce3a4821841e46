//! Error types for session setup and run-state transitions.
//!
//! Audio failures have their own [`AudioError`](crate::audio::AudioError) and
//! never reach these types: the beat clock absorbs them and falls back to its
//! software timer.

use thiserror::Error;

use crate::run::RunStatus;

/// Malformed input to [`RunState::init_session`](crate::run::RunState::init_session).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("word list is empty")]
    EmptyWordList,

    #[error("stage distribution has no stages")]
    NoStages,

    #[error("stage distribution sums to zero words")]
    ZeroWordQuota,

    #[error("stage {stage} has invalid tempo {bpm} bpm")]
    InvalidTempo { stage: usize, bpm: f64 },

    /// The word list ran out before this stage received any words.
    #[error("stage {stage} would receive no words")]
    EmptyStage { stage: usize },

    #[error("beat clock has been disposed")]
    ClockDisposed,
}

/// Lifecycle action attempted on a [`RunState`](crate::run::RunState).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    BeginCountdown,
    Start,
    RecordHit,
    AdvanceStage,
}

/// A lifecycle call that does not apply to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("no session has been initialized")]
    NotInitialized,

    #[error("cannot {action:?} while {from:?}")]
    InvalidTransition { from: RunStatus, action: RunAction },

    #[error("already on the final stage")]
    NoNextStage,
}
