//! Run state — one play session: stages, words, combo and score.
//!
//! The session moves through [`RunStatus`]:
//!
//! ```text
//! Idle -> Countdown -> Playing <-> Paused
//!                         |
//!                         +-> StageTransition -> Playing (next stage) -> ... -> Finished
//! ```
//!
//! Each transition method matches on the current phase and either performs
//! the transition, does nothing (`pause`/`resume` outside their states), or
//! returns a [`RunError`]. The run owns one [`BeatClock`]; it is re-tempo'd,
//! never recreated, when a stage advances.

pub mod observer;
pub mod result;
pub mod stage;

pub use observer::{LogObserver, RunObserver};
pub use result::{RunResult, Tally};
pub use stage::{partition_words, StageConfig, StageDistribution, WordItem};

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::clock::{BeatClock, BeatEvent, TimeSource};
use crate::config::GameConfig;
use crate::error::{RunAction, RunError, SessionError};
use crate::judge::{offset_between, Judgment};

/// Observable session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Idle,
    Countdown,
    Playing,
    Paused,
    StageTransition,
    Finished,
}

/// Internal phase, carrying the deadlines that belong to each state.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Countdown { since_ms: f64 },
    Playing,
    Paused,
    StageTransition { advance_at_ms: f64 },
    Finished,
}

impl Phase {
    fn status(self) -> RunStatus {
        match self {
            Phase::Idle => RunStatus::Idle,
            Phase::Countdown { .. } => RunStatus::Countdown,
            Phase::Playing => RunStatus::Playing,
            Phase::Paused => RunStatus::Paused,
            Phase::StageTransition { .. } => RunStatus::StageTransition,
            Phase::Finished => RunStatus::Finished,
        }
    }
}

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    /// Opaque caller-supplied identifier, e.g. a challenge id.
    pub session_id: String,
    pub words: Vec<WordItem>,
    pub stages: StageDistribution,
    /// Backing track to try loading. Failure only means no music.
    pub audio_source: Option<String>,
}

impl SessionSetup {
    pub fn new(
        session_id: impl Into<String>,
        words: Vec<WordItem>,
        stages: StageDistribution,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            words,
            stages,
            audio_source: None,
        }
    }

    pub fn with_audio(mut self, source: impl Into<String>) -> Self {
        self.audio_source = Some(source.into());
        self
    }
}

/// One recorded judgment, as reported to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub judgment: Judgment,
    pub points: u32,
    /// Combo after this hit.
    pub combo: u32,
    /// Timing offset when the hit was judged from the clock.
    pub offset_ms: Option<f64>,
    /// 1-based stage the hit landed in.
    pub stage: usize,
    pub word: String,
}

#[derive(Debug, Clone)]
struct Session {
    id: String,
    stages: StageDistribution,
    buckets: Vec<Vec<WordItem>>,
}

/// The session state machine.
pub struct RunState {
    config: GameConfig,
    clock: BeatClock,
    time: Arc<dyn TimeSource>,
    observer: Option<Box<dyn RunObserver>>,
    session: Option<Session>,
    phase: Phase,
    stage_index: usize,
    current_word_index: usize,
    words_completed: usize,
    tally: Tally,
    combo: u32,
    last_beat: Option<BeatEvent>,
    finished_at: Option<SystemTime>,
}

impl RunState {
    /// Create a run around a caller-constructed clock.
    pub fn new(mut clock: BeatClock, config: GameConfig) -> Self {
        let time = clock.time_source();
        clock.set_volume(config.volume);
        Self {
            config,
            clock,
            time,
            observer: None,
            session: None,
            phase: Phase::Idle,
            stage_index: 1,
            current_word_index: 0,
            words_completed: 0,
            tally: Tally::default(),
            combo: 0,
            last_beat: None,
            finished_at: None,
        }
    }

    pub fn with_observer(mut self, observer: impl RunObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Partition the words, reset every counter and prime the clock for stage 1.
    ///
    /// Malformed input is rejected before any state changes. The previous
    /// session's track is released; a new one, if given, starts loading in
    /// the background. Fails once the run has been disposed.
    pub fn init_session(&mut self, setup: SessionSetup) -> Result<(), SessionError> {
        if self.clock.is_disposed() {
            return Err(SessionError::ClockDisposed);
        }
        let SessionSetup {
            session_id,
            words,
            stages,
            audio_source,
        } = setup;
        let buckets = partition_words(words, &stages)?;

        log::info!(
            "session {session_id}: {} words over {} stages",
            buckets.iter().map(Vec::len).sum::<usize>(),
            stages.total_stages()
        );

        self.session = Some(Session {
            id: session_id,
            stages,
            buckets,
        });
        self.clock.release_audio();
        self.rewind();

        if let Some(source) = audio_source {
            self.clock.attempt_load_audio(&source);
        }
        Ok(())
    }

    /// `Idle -> Countdown`.
    pub fn begin_countdown(&mut self) -> Result<(), RunError> {
        self.require_session()?;
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Countdown {
                    since_ms: self.time.now_ms(),
                };
                Ok(())
            }
            other => Err(self.invalid(other, RunAction::BeginCountdown)),
        }
    }

    /// `Idle | Countdown -> Playing`, starting the clock. Resumes when paused;
    /// does nothing when already playing.
    pub fn start(&mut self) -> Result<(), RunError> {
        self.require_session()?;
        match self.phase {
            Phase::Idle | Phase::Countdown { .. } => {
                self.phase = Phase::Playing;
                self.clock.start();
                let bpm = self.clock.tempo_bpm();
                log::debug!("run started at stage {} ({bpm} bpm)", self.stage_index);
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_stage_started(self.stage_index, bpm);
                }
                Ok(())
            }
            Phase::Paused => {
                self.resume();
                Ok(())
            }
            Phase::Playing => Ok(()),
            other @ (Phase::StageTransition { .. } | Phase::Finished) => {
                Err(self.invalid(other, RunAction::Start))
            }
        }
    }

    /// `Playing -> Paused`. No-op in any other state.
    pub fn pause(&mut self) {
        if self.phase == Phase::Playing {
            self.phase = Phase::Paused;
            self.clock.pause();
        }
    }

    /// `Paused -> Playing`. No-op in any other state.
    pub fn resume(&mut self) {
        if self.phase == Phase::Paused {
            self.phase = Phase::Playing;
            self.clock.resume();
        }
    }

    /// Judge a hit against the nearest beat of the running clock.
    pub fn hit(&mut self) -> Result<HitRecord, RunError> {
        self.require_playing()?;
        let offset = self.clock.nearest_beat_offset_ms();
        let judgment = self.config.judge.judge(offset);
        self.apply_hit(judgment, Some(offset))
    }

    /// Judge a hit that was expected on beat `expected_beat`.
    pub fn hit_at_beat(&mut self, expected_beat: u64) -> Result<HitRecord, RunError> {
        self.require_playing()?;
        let offset = offset_between(
            self.clock.current_beat_index(),
            expected_beat,
            self.clock.beat_interval_ms(),
        );
        let judgment = self.config.judge.judge(offset);
        self.apply_hit(judgment, Some(offset))
    }

    /// Record an already-judged hit.
    ///
    /// Any non-miss advances to the next word. A miss leaves the word in
    /// place, so the player retries it.
    pub fn record_hit(&mut self, judgment: Judgment) -> Result<HitRecord, RunError> {
        self.require_playing()?;
        self.apply_hit(judgment, None)
    }

    /// `StageTransition -> Playing` on the next stage, at the next stage's tempo.
    pub fn advance_stage(&mut self) -> Result<(), RunError> {
        self.require_session()?;
        match self.phase {
            Phase::StageTransition { .. } => {}
            other => return Err(self.invalid(other, RunAction::AdvanceStage)),
        }
        if self.stage_index >= self.total_stages() {
            return Err(RunError::NoNextStage);
        }
        self.enter_next_stage();
        Ok(())
    }

    /// Stop the clock and zero everything, keeping the word partition for a replay.
    pub fn reset_session(&mut self) {
        self.rewind();
    }

    /// Reset, release the clock's resources and forget the session.
    pub fn dispose(&mut self) {
        self.rewind();
        self.clock.dispose();
        self.session = None;
    }

    /// Drive the clock and any timed transitions. Call once per frame.
    pub fn tick(&mut self) -> Vec<BeatEvent> {
        let beats = self.clock.tick();
        if let Some(&last) = beats.last() {
            self.last_beat = Some(last);
        }
        if let Some(observer) = self.observer.as_mut() {
            for &beat in &beats {
                observer.on_beat(beat);
            }
        }

        let now = self.time.now_ms();
        match self.phase {
            Phase::Countdown { since_ms } => {
                if let Some(countdown) = self.config.countdown_ms {
                    if now - since_ms >= countdown {
                        if let Err(e) = self.start() {
                            log::warn!("countdown could not start the run: {e}");
                        }
                    }
                }
            }
            Phase::StageTransition { advance_at_ms } if now >= advance_at_ms => {
                if let Err(e) = self.advance_stage() {
                    log::warn!("stage advance failed: {e}");
                }
            }
            _ => {}
        }
        beats
    }

    /// Summary of the session so far. `None` before any session is initialized.
    pub fn compute_result(&self) -> Option<RunResult> {
        let session = self.session.as_ref()?;
        Some(RunResult::new(
            session.id.clone(),
            self.tally,
            &self.config.grades,
            self.finished_at.unwrap_or_else(SystemTime::now),
        ))
    }

    pub fn status(&self) -> RunStatus {
        self.phase.status()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// 1-based active stage.
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    pub fn total_stages(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |s| s.stages.total_stages())
    }

    /// Index of the active word within the active stage.
    pub fn current_word_index(&self) -> usize {
        self.current_word_index
    }

    /// Words the player has cleared this session.
    pub fn words_completed(&self) -> usize {
        self.words_completed
    }

    /// Words of the active stage.
    pub fn stage_words(&self) -> &[WordItem] {
        self.session
            .as_ref()
            .and_then(|s| s.buckets.get(self.stage_index - 1))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The word waiting to be hit, if the session is still in progress.
    pub fn current_word(&self) -> Option<&WordItem> {
        if self.phase == Phase::Finished {
            return None;
        }
        self.stage_words().get(self.current_word_index)
    }

    pub fn score(&self) -> u64 {
        self.tally.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.tally.max_combo
    }

    pub fn perfect_count(&self) -> u32 {
        self.tally.perfect
    }

    pub fn good_count(&self) -> u32 {
        self.tally.good
    }

    pub fn miss_count(&self) -> u32 {
        self.tally.miss
    }

    /// Most recent beat the clock emitted.
    pub fn last_beat(&self) -> Option<BeatEvent> {
        self.last_beat
    }

    pub fn clock(&self) -> &BeatClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut BeatClock {
        &mut self.clock
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Tick period suggested by the config.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_ms)
    }

    fn require_session(&self) -> Result<&Session, RunError> {
        self.session.as_ref().ok_or(RunError::NotInitialized)
    }

    fn require_playing(&self) -> Result<(), RunError> {
        self.require_session()?;
        match self.phase {
            Phase::Playing => Ok(()),
            other => Err(self.invalid(other, RunAction::RecordHit)),
        }
    }

    fn invalid(&self, from: Phase, action: RunAction) -> RunError {
        RunError::InvalidTransition {
            from: from.status(),
            action,
        }
    }

    fn apply_hit(
        &mut self,
        judgment: Judgment,
        offset_ms: Option<f64>,
    ) -> Result<HitRecord, RunError> {
        let word = self
            .current_word()
            .map(|w| w.text.clone())
            .unwrap_or_default();

        let scored = self.config.scoring.score(judgment, self.combo);
        self.tally.score += scored.points as u64;
        self.combo = scored.combo;
        self.tally.max_combo = self.tally.max_combo.max(self.combo);
        match judgment {
            Judgment::Perfect => self.tally.perfect += 1,
            Judgment::Good => self.tally.good += 1,
            Judgment::Miss => self.tally.miss += 1,
        }

        let record = HitRecord {
            judgment,
            points: scored.points,
            combo: self.combo,
            offset_ms,
            stage: self.stage_index,
            word,
        };
        if let Some(observer) = self.observer.as_mut() {
            observer.on_judgment(&record);
        }

        if !judgment.is_miss() {
            self.advance_word();
        }
        Ok(record)
    }

    fn advance_word(&mut self) {
        self.current_word_index += 1;
        self.words_completed += 1;
        if self.current_word_index < self.stage_words().len() {
            return;
        }

        if self.stage_index >= self.total_stages() {
            self.finish();
        } else if self.config.transition_delay_ms <= 0.0 {
            self.enter_next_stage();
        } else {
            let advance_at_ms = self.time.now_ms() + self.config.transition_delay_ms;
            log::debug!("stage {} cleared", self.stage_index);
            self.phase = Phase::StageTransition { advance_at_ms };
        }
    }

    fn enter_next_stage(&mut self) {
        self.stage_index += 1;
        self.current_word_index = 0;
        let bpm = self
            .session
            .as_ref()
            .and_then(|s| s.stages.stage(self.stage_index))
            .map(|s| s.tempo_bpm);
        if let Some(bpm) = bpm {
            self.clock.set_tempo(bpm);
        }
        self.phase = Phase::Playing;

        let bpm = self.clock.tempo_bpm();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_stage_started(self.stage_index, bpm);
        }
    }

    fn finish(&mut self) {
        self.phase = Phase::Finished;
        self.clock.stop();
        self.finished_at = Some(SystemTime::now());
        if let Some(result) = self.compute_result() {
            if let Some(observer) = self.observer.as_mut() {
                observer.on_finished(&result);
            }
        }
    }

    /// Back to stage 1 with zeroed counters and a stopped clock at stage 1's tempo.
    fn rewind(&mut self) {
        self.clock.stop();
        let first_bpm = self
            .session
            .as_ref()
            .and_then(|s| s.stages.stage(1))
            .map(|s| s.tempo_bpm);
        if let Some(bpm) = first_bpm {
            self.clock.configure(bpm, self.config.start_offset_ms);
        }

        self.phase = Phase::Idle;
        self.stage_index = 1;
        self.current_word_index = 0;
        self.words_completed = 0;
        self.tally = Tally::default();
        self.combo = 0;
        self.last_beat = None;
        self.finished_at = None;
    }
}
