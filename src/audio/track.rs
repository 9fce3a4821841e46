//! Decoded backing track — WAV loading, mono mixdown and linear-interpolation resampling.

use std::io::{Read, Seek};
use std::path::Path;

use super::AudioError;

/// A decoded mono audio track at its source sample rate.
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl DecodedTrack {
    /// Create from raw mono f32 samples.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode a WAV stream, mixing multi-channel audio down to mono.
    ///
    /// Supports integer PCM of any bit depth hound reads, and 32-bit float.
    pub fn from_wav<R: Read + Seek>(reader: R) -> Result<Self, AudioError> {
        let wav = hound::WavReader::new(reader)?;
        let spec = wav.spec();
        let channels = spec.channels.max(1) as usize;

        let raw: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let max_val = (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                wav.into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<f32>, _>>()?
            }
            hound::SampleFormat::Float => {
                wav.into_samples::<f32>().collect::<Result<Vec<f32>, _>>()?
            }
        };

        if raw.is_empty() {
            return Err(AudioError::EmptyTrack);
        }

        let mono = raw
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Ok(Self {
            samples: mono,
            sample_rate: spec.sample_rate,
        })
    }

    /// Decode a WAV file from disk.
    pub fn from_path(path: &Path) -> Result<Self, AudioError> {
        let file = std::fs::File::open(path)?;
        Self::from_wav(std::io::BufReader::new(file))
    }

    /// The mono samples at the source rate.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Track length in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Samples converted to `target_rate`.
    pub fn resampled(&self, target_rate: u32) -> Vec<f32> {
        if target_rate == self.sample_rate {
            self.samples.clone()
        } else {
            resample_linear(&self.samples, self.sample_rate, target_rate)
        }
    }
}

/// Linear-interpolation resampling from `source_rate` to `target_rate`.
fn resample_linear(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if input.is_empty() {
        return Vec::new();
    }
    if input.len() == 1 || source_rate == 0 || target_rate == 0 {
        return input.to_vec();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = (input.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            if idx + 1 < input.len() {
                input[idx] * (1.0 - frac) + input[idx + 1] * frac
            } else {
                input[idx.min(input.len() - 1)]
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Write a 16-bit WAV to an in-memory buffer.
    pub(crate) fn wav_16bit(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut buf, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        buf.into_inner()
    }

    #[test]
    fn decodes_mono_16bit() {
        let data = wav_16bit(&[0, 16384, -16384], 8000, 1);
        let track = DecodedTrack::from_wav(Cursor::new(data)).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track.sample_rate(), 8000);
        assert!((track.samples()[1] - 0.5).abs() < 1e-3);
        assert!((track.samples()[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn stereo_mixes_down() {
        let data = wav_16bit(&[16384, 0, -16384, -16384], 8000, 2);
        let track = DecodedTrack::from_wav(Cursor::new(data)).unwrap();
        assert_eq!(track.len(), 2);
        assert!((track.samples()[0] - 0.25).abs() < 1e-3);
        assert!((track.samples()[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn empty_wav_is_rejected() {
        let data = wav_16bit(&[], 8000, 1);
        let err = DecodedTrack::from_wav(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, AudioError::EmptyTrack));
    }

    #[test]
    fn garbage_is_a_wav_error() {
        let err = DecodedTrack::from_wav(Cursor::new(b"not a wav file".to_vec())).unwrap_err();
        assert!(matches!(err, AudioError::Wav(_)));
    }

    #[test]
    fn duration_from_rate() {
        let track = DecodedTrack::from_mono(vec![0.0; 44100], 44100);
        assert!((track.duration_ms() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn resample_double_rate() {
        let track = DecodedTrack::from_mono((0..100).map(|i| i as f32 / 100.0).collect(), 22050);
        let out = track.resampled(44100);
        assert!(out.len() >= 190 && out.len() <= 210);
        assert!(out[0].abs() < 1e-6);
    }

    #[test]
    fn resample_identity_is_a_copy() {
        let track = DecodedTrack::from_mono(vec![0.1, 0.2], 48000);
        assert_eq!(track.resampled(48000), vec![0.1, 0.2]);
    }
}
