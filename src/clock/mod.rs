//! Beat clock — tempo-driven beat index over an audio or software time base.
//!
//! The [`BeatClock`] answers "which beat are we on" and emits a [`BeatEvent`]
//! for every beat index crossed. Time comes from the playback cursor of a
//! decoded backing track when one has been loaded and adopted, otherwise from
//! a [`TimeSource`]. Audio failures are logged and absorbed here; callers only
//! ever see a clock that keeps ticking.
//!
//! Nothing in the clock runs by itself. A scheduler (a frame loop, a timer
//! thread or a test) calls [`BeatClock::tick`] to detect and emit crossings.

pub mod time;
pub mod transport;

pub use time::{ManualTime, MonotonicTime, TimeSource};
pub use transport::{beat_interval_ms, PlayState, Transport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{
    AudioError, CpalFactory, DecodedTrack, DeviceFactory, PendingLoad, PlaybackDevice,
};

/// Tempo used until [`BeatClock::configure`] is called.
pub const DEFAULT_BPM: f64 = 120.0;

/// A crossed beat: its index and the elapsed time at which it started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    pub index: u64,
    pub timestamp_ms: f64,
}

/// A beat listener. Invoked on the thread that calls [`BeatClock::tick`].
pub type BeatListener = Box<dyn FnMut(BeatEvent)>;

/// Identifies a listener registered with [`BeatClock::subscribe_to_beats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Cloneable liveness flag for the tick loop.
///
/// Cancelling stops beat emission immediately, including the remainder of a
/// tick that is already emitting. [`BeatClock::start`] revives it.
#[derive(Debug, Clone)]
pub struct TickHandle {
    live: Arc<AtomicBool>,
}

impl TickHandle {
    pub fn cancel(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// Where elapsed time is read from.
enum TimeBase {
    Timer,
    Audio(Box<dyn PlaybackDevice>),
}

/// Monotonic beat-timing source with audio-or-timer fallback.
pub struct BeatClock {
    time: Arc<dyn TimeSource>,
    devices: Box<dyn DeviceFactory>,
    transport: Transport,
    base: TimeBase,
    pending: Option<PendingLoad>,
    /// Decoded track waiting for the clock to stop playing before adoption.
    ready: Option<Arc<DecodedTrack>>,
    start_offset_ms: f64,
    /// Playback volume applied to every device this clock opens.
    volume: f32,
    last_emitted: Option<u64>,
    listeners: Vec<(SubscriptionId, BeatListener)>,
    next_subscription: u64,
    live: Arc<AtomicBool>,
    disposed: bool,
}

fn valid_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

impl BeatClock {
    /// A clock on wall-clock time that plays tracks through cpal.
    pub fn new() -> Self {
        Self::with_sources(Arc::new(MonotonicTime::new()), Box::new(CpalFactory))
    }

    /// A clock with an injected time source and device factory.
    pub fn with_sources(time: Arc<dyn TimeSource>, devices: Box<dyn DeviceFactory>) -> Self {
        Self {
            time,
            devices,
            transport: Transport::new(DEFAULT_BPM),
            base: TimeBase::Timer,
            pending: None,
            ready: None,
            start_offset_ms: 0.0,
            volume: 1.0,
            last_emitted: None,
            listeners: Vec::new(),
            next_subscription: 0,
            live: Arc::new(AtomicBool::new(false)),
            disposed: false,
        }
    }

    /// Set the initial tempo and the track lead-in to skip. Rewinds the clock.
    pub fn configure(&mut self, initial_bpm: f64, start_offset_ms: f64) {
        if !valid_bpm(initial_bpm) {
            log::warn!("ignoring invalid tempo {initial_bpm} bpm");
            return;
        }
        self.stop();
        self.transport = Transport::new(initial_bpm);
        self.start_offset_ms = start_offset_ms.max(0.0);
    }

    /// Begin loading a backing track without blocking.
    ///
    /// Never fails: a track that cannot be fetched or decoded leaves the clock
    /// on its software timer. A track that arrives while the clock is playing
    /// is adopted at the next [`start`](Self::start) or [`resume`](Self::resume).
    pub fn attempt_load_audio(&mut self, source: &str) {
        if self.disposed {
            return;
        }
        log::debug!("loading backing track from {source}");
        self.ready = None;
        self.pending = Some(PendingLoad::spawn(source));
    }

    /// Drop the backing track, any pending load and the device, returning to
    /// the software timer. Stops the clock first.
    pub fn release_audio(&mut self) {
        self.stop();
        self.pending = None;
        self.ready = None;
        if self.audio_available() {
            log::debug!("releasing audio time base");
        }
        self.base = TimeBase::Timer;
    }

    /// Set the backing track volume (0.0 to 1.0), now and for later devices.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        let volume = self.volume;
        self.drive_device(|device| device.set_volume(volume));
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Block up to `timeout` for a pending load, then adopt it if possible.
    ///
    /// Returns whether the clock is audio-backed afterwards.
    pub fn settle_audio_load(&mut self, timeout: Duration) -> bool {
        if let Some(pending) = self.pending.take() {
            match pending.wait(timeout) {
                Some(outcome) => self.accept_load(pending.source(), outcome),
                None => self.pending = Some(pending),
            }
        }
        self.adopt_ready_track();
        self.audio_available()
    }

    /// Whether a hardware playback clock currently backs this instance.
    pub fn audio_available(&self) -> bool {
        matches!(self.base, TimeBase::Audio(_))
    }

    /// Start or continue timing from the paused offset. Idempotent while playing.
    pub fn start(&mut self) {
        if self.disposed {
            log::warn!("start called on a disposed beat clock");
            return;
        }
        if self.transport.state() == PlayState::Playing {
            return;
        }

        self.poll_audio_load();
        self.adopt_ready_track();

        let from_ms = self.start_offset_ms + self.transport.elapsed_ms(0.0);
        self.drive_device(|device| device.play_from(from_ms));

        let reading = self.reading_ms();
        self.transport.play(reading);
        self.live.store(true, Ordering::Release);
    }

    /// Freeze elapsed time. No-op if not playing.
    pub fn pause(&mut self) {
        if self.transport.state() != PlayState::Playing {
            return;
        }
        let reading = self.reading_ms();
        self.transport.pause(reading);
        self.drive_device(|device| device.pause());
    }

    /// Continue from the paused offset.
    pub fn resume(&mut self) {
        self.start();
    }

    /// Halt, rewind to zero and forget the last emitted beat.
    pub fn stop(&mut self) {
        self.live.store(false, Ordering::Release);
        self.transport.stop();
        self.last_emitted = None;
        self.drive_device(|device| device.stop());
    }

    /// Stop timing and release audio resources and listeners.
    pub fn dispose(&mut self) {
        self.stop();
        self.base = TimeBase::Timer;
        self.pending = None;
        self.ready = None;
        self.listeners.clear();
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Change tempo without moving the current beat index.
    pub fn set_tempo(&mut self, bpm: f64) {
        if !valid_bpm(bpm) {
            log::warn!("ignoring invalid tempo {bpm} bpm");
            return;
        }
        let elapsed = self.current_time_ms();
        self.transport.set_bpm(bpm, elapsed);
        log::debug!("tempo set to {bpm} bpm at {elapsed:.1} ms");
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.transport.bpm()
    }

    pub fn beat_interval_ms(&self) -> f64 {
        self.transport.interval_ms()
    }

    pub fn state(&self) -> PlayState {
        self.transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.state() == PlayState::Playing
    }

    /// Elapsed playback time. Frozen while paused.
    pub fn current_time_ms(&self) -> f64 {
        match self.transport.state() {
            PlayState::Playing => self.transport.elapsed_ms(self.reading_ms()),
            PlayState::Paused | PlayState::Stopped => self.transport.elapsed_ms(0.0),
        }
    }

    /// Fractional beat position at the current time.
    pub fn beat_position(&self) -> f64 {
        self.transport.beat_position(self.current_time_ms())
    }

    /// Whole beats elapsed. Never decreases while playing, across tempo changes too.
    ///
    /// Counted from the last tempo anchor, so after [`set_tempo`](Self::set_tempo)
    /// this is not `current_time_ms() / beat_interval_ms()`. Use this (or
    /// [`beat_position`](Self::beat_position)) rather than dividing time yourself.
    pub fn current_beat_index(&self) -> u64 {
        self.transport.beat_index(self.current_time_ms())
    }

    /// Signed distance to the nearest beat in milliseconds (negative = early).
    pub fn nearest_beat_offset_ms(&self) -> f64 {
        let pos = self.beat_position();
        (pos - pos.round()) * self.transport.interval_ms()
    }

    /// The time source backing the software timer.
    pub fn time_source(&self) -> Arc<dyn TimeSource> {
        Arc::clone(&self.time)
    }

    /// Liveness handle for an external tick scheduler.
    pub fn tick_handle(&self) -> TickHandle {
        TickHandle {
            live: Arc::clone(&self.live),
        }
    }

    /// Register a beat listener.
    pub fn subscribe_to_beats(
        &mut self,
        listener: impl FnMut(BeatEvent) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Poll for newly crossed beats and notify listeners.
    ///
    /// Emits every index after the last emitted one up to the current index,
    /// in order. Returns the emitted events.
    pub fn tick(&mut self) -> Vec<BeatEvent> {
        self.poll_audio_load();

        let mut emitted = Vec::new();
        if self.transport.state() != PlayState::Playing || !self.is_live() {
            return emitted;
        }

        let current = self.current_beat_index();
        let first = self.last_emitted.map_or(0, |i| i + 1);
        for index in first..=current {
            if !self.is_live() {
                break;
            }
            let event = BeatEvent {
                index,
                timestamp_ms: self.transport.beat_time_ms(index).max(0.0),
            };
            // Marked before delivery: a beat cut short by cancellation is not resent.
            self.last_emitted = Some(index);
            emitted.push(event);
            for (_, listener) in self.listeners.iter_mut() {
                if !self.live.load(Ordering::Acquire) {
                    return emitted;
                }
                listener(event);
            }
        }
        emitted
    }

    /// Last beat index handed to listeners, if any.
    pub fn last_emitted_beat(&self) -> Option<u64> {
        self.last_emitted
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn reading_ms(&self) -> f64 {
        match &self.base {
            TimeBase::Timer => self.time.now_ms(),
            TimeBase::Audio(device) => device.position_ms() - self.start_offset_ms,
        }
    }

    fn poll_audio_load(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending.try_take() {
            Some(outcome) => self.accept_load(pending.source(), outcome),
            None => self.pending = Some(pending),
        }
    }

    fn accept_load(&mut self, source: &str, outcome: Result<Arc<DecodedTrack>, AudioError>) {
        match outcome {
            Ok(track) => {
                log::info!(
                    "backing track ready: {source} ({:.0} ms)",
                    track.duration_ms()
                );
                self.ready = Some(track);
            }
            Err(e) => log::warn!("backing track unavailable ({source}): {e}; using timer"),
        }
    }

    /// Swap in a loaded track. Only while not playing, so a running beat is never disturbed.
    fn adopt_ready_track(&mut self) {
        if self.transport.state() == PlayState::Playing {
            return;
        }
        let Some(track) = self.ready.take() else {
            return;
        };
        match self.devices.open(track) {
            Ok(mut device) => {
                if let Err(e) = device.set_volume(self.volume) {
                    log::warn!("could not set track volume: {e}");
                }
                self.base = TimeBase::Audio(device);
                log::debug!("beat clock switched to audio time base");
            }
            Err(e) => log::warn!("could not open audio output: {e}; using timer"),
        }
    }

    /// Run a device operation, falling back to the timer if it fails.
    fn drive_device(
        &mut self,
        op: impl FnOnce(&mut dyn PlaybackDevice) -> Result<(), AudioError>,
    ) {
        let result = match &mut self.base {
            TimeBase::Audio(device) => op(device.as_mut()),
            TimeBase::Timer => Ok(()),
        };
        if let Err(e) = result {
            self.fall_back_to_timer(e);
        }
    }

    /// Drop the audio time base, keeping elapsed time continuous.
    fn fall_back_to_timer(&mut self, err: AudioError) {
        log::warn!("audio playback failed: {err}; falling back to timer");
        let playing = self.transport.state() == PlayState::Playing;
        if playing {
            let reading = self.reading_ms();
            self.transport.pause(reading);
        }
        self.base = TimeBase::Timer;
        if playing {
            let reading = self.reading_ms();
            self.transport.play(reading);
        }
    }
}

impl Default for BeatClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Factory that refuses to open a device.
    struct NoDevices;

    impl DeviceFactory for NoDevices {
        fn open(&self, _track: Arc<DecodedTrack>) -> Result<Box<dyn PlaybackDevice>, AudioError> {
            Err(AudioError::NoOutputDevice)
        }
    }

    /// Device that only remembers the volumes it was given.
    struct SilentDevice {
        volumes: Rc<RefCell<Vec<f32>>>,
    }

    impl PlaybackDevice for SilentDevice {
        fn play_from(&mut self, _position_ms: f64) -> Result<(), AudioError> {
            Ok(())
        }

        fn pause(&mut self) -> Result<(), AudioError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), AudioError> {
            Ok(())
        }

        fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
            self.volumes.borrow_mut().push(volume);
            Ok(())
        }

        fn position_ms(&self) -> f64 {
            0.0
        }
    }

    struct SilentDevices {
        volumes: Rc<RefCell<Vec<f32>>>,
    }

    impl DeviceFactory for SilentDevices {
        fn open(&self, _track: Arc<DecodedTrack>) -> Result<Box<dyn PlaybackDevice>, AudioError> {
            Ok(Box::new(SilentDevice {
                volumes: Rc::clone(&self.volumes),
            }))
        }
    }

    /// Clock that has adopted a silent device as its time base.
    fn audio_clock() -> (BeatClock, Arc<ManualTime>, Rc<RefCell<Vec<f32>>>) {
        let time = Arc::new(ManualTime::new(10_000.0));
        let volumes = Rc::new(RefCell::new(Vec::new()));
        let devices = SilentDevices {
            volumes: Rc::clone(&volumes),
        };
        let mut clock = BeatClock::with_sources(time.clone(), Box::new(devices));
        clock.configure(120.0, 0.0);
        clock.ready = Some(Arc::new(DecodedTrack::from_mono(vec![0.0; 100], 1000)));
        clock.start();
        (clock, time, volumes)
    }

    fn manual_clock(bpm: f64) -> (BeatClock, Arc<ManualTime>) {
        let time = Arc::new(ManualTime::new(10_000.0));
        let mut clock = BeatClock::with_sources(time.clone(), Box::new(NoDevices));
        clock.configure(bpm, 0.0);
        (clock, time)
    }

    fn collect(clock: &mut BeatClock) -> Rc<RefCell<Vec<BeatEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        clock.subscribe_to_beats(move |e| sink.borrow_mut().push(e));
        seen
    }

    #[test]
    fn idle_clock_reads_zero() {
        let (clock, time) = manual_clock(120.0);
        time.advance_ms(5000.0);
        assert_eq!(clock.current_time_ms(), 0.0);
        assert_eq!(clock.current_beat_index(), 0);
        assert!(!clock.audio_available());
    }

    #[test]
    fn timer_elapsed_and_beat_index() {
        let (mut clock, time) = manual_clock(120.0);
        clock.start();
        time.advance_ms(1250.0);
        assert_approx_eq!(clock.current_time_ms(), 1250.0);
        assert_eq!(clock.current_beat_index(), 2);
        assert_approx_eq!(clock.beat_interval_ms(), 500.0);
    }

    #[test]
    fn start_is_idempotent() {
        let (mut clock, time) = manual_clock(120.0);
        clock.start();
        time.advance_ms(300.0);
        clock.start();
        assert_approx_eq!(clock.current_time_ms(), 300.0);
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let (mut clock, time) = manual_clock(120.0);
        clock.start();
        time.advance_ms(700.0);
        clock.pause();
        time.advance_ms(5000.0);
        assert_approx_eq!(clock.current_time_ms(), 700.0);
        clock.resume();
        time.advance_ms(100.0);
        assert_approx_eq!(clock.current_time_ms(), 800.0);
    }

    #[test]
    fn pause_when_not_playing_is_noop() {
        let (mut clock, _time) = manual_clock(120.0);
        clock.pause();
        assert_eq!(clock.state(), PlayState::Stopped);
    }

    #[test]
    fn stop_rewinds_and_forgets_last_beat() {
        let (mut clock, time) = manual_clock(120.0);
        clock.start();
        time.advance_ms(1600.0);
        clock.tick();
        assert_eq!(clock.last_emitted_beat(), Some(3));
        clock.stop();
        assert_eq!(clock.current_time_ms(), 0.0);
        assert_eq!(clock.last_emitted_beat(), None);
    }

    #[test]
    fn tick_emits_every_crossed_beat_once() {
        let (mut clock, time) = manual_clock(120.0);
        let seen = collect(&mut clock);
        clock.start();
        clock.tick();
        time.advance_ms(1100.0);
        clock.tick();
        clock.tick();
        let indices: Vec<u64> = seen.borrow().iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_approx_eq!(seen.borrow()[2].timestamp_ms, 1000.0);
    }

    #[test]
    fn tick_does_nothing_while_paused() {
        let (mut clock, time) = manual_clock(120.0);
        let seen = collect(&mut clock);
        clock.start();
        clock.tick();
        clock.pause();
        time.advance_ms(3000.0);
        assert!(clock.tick().is_empty());
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn set_tempo_keeps_beat_index() {
        let (mut clock, time) = manual_clock(100.0);
        clock.start();
        time.advance_ms(1234.0);
        let before = clock.current_beat_index();
        clock.set_tempo(160.0);
        assert_eq!(clock.current_beat_index(), before);
        assert_approx_eq!(clock.tempo_bpm(), 160.0);
    }

    #[test]
    fn set_tempo_rejects_nonsense() {
        let (mut clock, _time) = manual_clock(100.0);
        clock.set_tempo(0.0);
        clock.set_tempo(f64::NAN);
        assert_approx_eq!(clock.tempo_bpm(), 100.0);
    }

    #[test]
    fn cancelled_handle_stops_emission() {
        let (mut clock, time) = manual_clock(120.0);
        let seen = collect(&mut clock);
        let handle = clock.tick_handle();
        clock.start();
        assert!(handle.is_live());
        handle.cancel();
        time.advance_ms(2000.0);
        assert!(clock.tick().is_empty());
        assert!(seen.borrow().is_empty());
        clock.pause();
        clock.start();
        assert!(handle.is_live());
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let (mut clock, time) = manual_clock(120.0);
        let seen = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&seen);
        let id = clock.subscribe_to_beats(move |_| *sink.borrow_mut() += 1);
        clock.start();
        clock.tick();
        assert!(clock.unsubscribe(id));
        assert!(!clock.unsubscribe(id));
        time.advance_ms(600.0);
        clock.tick();
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn dispose_silences_everything() {
        let (mut clock, time) = manual_clock(120.0);
        let seen = collect(&mut clock);
        clock.start();
        clock.dispose();
        clock.start();
        time.advance_ms(2000.0);
        assert!(clock.tick().is_empty());
        assert!(seen.borrow().is_empty());
        assert!(clock.is_disposed());
    }

    #[test]
    fn nearest_beat_offset_is_signed() {
        let (mut clock, time) = manual_clock(120.0);
        clock.start();
        time.advance_ms(530.0);
        assert_approx_eq!(clock.nearest_beat_offset_ms(), 30.0);
        time.advance_ms(440.0); // 970ms: 30ms before beat 2
        assert_approx_eq!(clock.nearest_beat_offset_ms(), -30.0);
    }

    #[test]
    fn failed_device_open_keeps_timer() {
        let (mut clock, time) = manual_clock(120.0);
        clock.ready = Some(Arc::new(DecodedTrack::from_mono(vec![0.0; 100], 1000)));
        clock.start();
        assert!(!clock.audio_available());
        time.advance_ms(500.0);
        assert_eq!(clock.current_beat_index(), 1);
    }

    #[test]
    fn cancel_inside_listener_does_not_repeat_the_beat() {
        let (mut clock, time) = manual_clock(120.0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let handle = clock.tick_handle();
        clock.subscribe_to_beats(move |e| {
            sink.borrow_mut().push(e.index);
            if e.index == 1 {
                handle.cancel();
            }
        });
        clock.start();
        time.advance_ms(1100.0);
        let emitted: Vec<u64> = clock.tick().iter().map(|e| e.index).collect();
        assert_eq!(emitted, vec![0, 1]);
        assert_eq!(clock.last_emitted_beat(), Some(1));

        clock.pause();
        clock.start();
        clock.tick();
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn release_audio_returns_to_timer() {
        let (mut clock, time, _volumes) = audio_clock();
        assert!(clock.audio_available());
        clock.release_audio();
        assert!(!clock.audio_available());
        assert!(!clock.settle_audio_load(Duration::ZERO));

        clock.start();
        time.advance_ms(750.0);
        assert_approx_eq!(clock.current_time_ms(), 750.0);
        assert_eq!(clock.current_beat_index(), 1);
    }

    #[test]
    fn volume_reaches_current_and_later_devices() {
        let time = Arc::new(ManualTime::new(0.0));
        let volumes = Rc::new(RefCell::new(Vec::new()));
        let devices = SilentDevices {
            volumes: Rc::clone(&volumes),
        };
        let mut clock = BeatClock::with_sources(time, Box::new(devices));
        clock.set_volume(0.25);
        assert!(volumes.borrow().is_empty());

        clock.ready = Some(Arc::new(DecodedTrack::from_mono(vec![0.0; 100], 1000)));
        clock.start();
        assert!(clock.audio_available());
        clock.set_volume(3.0);
        assert_eq!(*volumes.borrow(), vec![0.25, 1.0]);
        assert_eq!(clock.volume(), 1.0);
    }
}
