//! cpal output device — plays a decoded track and reports its playback clock.
//!
//! The device owns the cpal stream and talks to the audio thread through a
//! lock-free command queue. Position reads come from the frame cursor that the
//! audio thread advances as the hardware consumes samples.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};

use super::callback::PlaybackCallback;
use super::command::PlaybackCommand;
use super::track::DecodedTrack;
use super::{AudioError, DeviceFactory, PlaybackDevice};

/// Ring buffer capacity (number of commands).
const RING_BUFFER_CAPACITY: usize = 64;

/// Opens [`CpalDevice`]s on the default output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalFactory;

impl DeviceFactory for CpalFactory {
    fn open(&self, track: Arc<DecodedTrack>) -> Result<Box<dyn PlaybackDevice>, AudioError> {
        Ok(Box::new(CpalDevice::open(&track)?))
    }
}

/// A backing track playing on the default cpal output device.
pub struct CpalDevice {
    stream: cpal::Stream,
    producer: ringbuf::HeapProd<PlaybackCommand>,
    cursor: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CpalDevice {
    /// Open the default output device and prepare `track` for playback (paused).
    pub fn open(track: &DecodedTrack) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let rb = HeapRb::<PlaybackCommand>::new(RING_BUFFER_CAPACITY);
        let (producer, consumer) = rb.split();
        let cursor = Arc::new(AtomicU64::new(0));
        let samples: Arc<[f32]> = track.resampled(sample_rate).into();
        let mut callback = PlaybackCallback::new(consumer, samples, Arc::clone(&cursor), channels);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            log::warn!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        log::debug!("opened output device at {sample_rate} Hz, {channels} ch");

        Ok(Self {
            stream,
            producer,
            cursor,
            sample_rate,
        })
    }

    fn send(&mut self, cmd: PlaybackCommand) -> Result<(), AudioError> {
        self.producer
            .try_push(cmd)
            .map_err(|_| AudioError::BufferFull)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl PlaybackDevice for CpalDevice {
    fn play_from(&mut self, position_ms: f64) -> Result<(), AudioError> {
        let frame = (position_ms.max(0.0) / 1000.0 * self.sample_rate as f64).round() as u64;
        self.cursor.store(frame, Ordering::Release);
        self.send(PlaybackCommand::Play)
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.send(PlaybackCommand::Pause)
    }

    // Clamped again on the audio thread.
    fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.send(PlaybackCommand::SetVolume(volume))
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.send(PlaybackCommand::Pause)?;
        self.cursor.store(0, Ordering::Release);
        Ok(())
    }

    fn position_ms(&self) -> f64 {
        self.cursor.load(Ordering::Acquire) as f64 * 1000.0 / self.sample_rate as f64
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::debug!("pausing stream on drop failed: {e}");
        }
    }
}
