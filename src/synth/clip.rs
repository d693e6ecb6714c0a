//! Looping playback of a pre-recorded clip

use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::SignalSource;

/// Fastest playback rate relative to the clip's own speed
pub const MAX_CLIP_PITCH: f32 = 64.0;

/// Errors raised while loading a clip
#[derive(Debug, Error)]
pub enum ClipError {
    #[error("failed to read clip {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("clip contains no audio")]
    Empty,
}

/// A mono clip looped at a pitch-controlled playback rate
#[derive(Debug)]
pub struct ClipSource {
    samples: Vec<f32>,
    clip_rate: f64,
    engine_rate: f64,
    pitch: f64,
    step: f64,
    position: f64,
}

impl ClipSource {
    /// Load a WAV file, mixing all channels down to mono
    pub fn open(path: &Path) -> Result<Self, ClipError> {
        let read_err = |source| ClipError::Read {
            path: path.to_path_buf(),
            source,
        };

        let reader = WavReader::open(path).map_err(read_err)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(read_err)?,
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(read_err)?
            }
        };

        let mono = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Self::from_samples(mono, spec.sample_rate)
    }

    /// Build a clip from mono samples recorded at `sample_rate`
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Result<Self, ClipError> {
        if samples.is_empty() || sample_rate == 0 {
            return Err(ClipError::Empty);
        }

        let mut clip = Self {
            samples,
            clip_rate: sample_rate as f64,
            engine_rate: sample_rate as f64,
            pitch: 1.0,
            step: 1.0,
            position: 0.0,
        };
        clip.update_step();
        Ok(clip)
    }

    /// Clip length in samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback position in clip samples
    pub fn position(&self) -> f64 {
        self.position
    }

    fn update_step(&mut self) {
        self.step = if self.engine_rate > 0.0 {
            self.pitch * self.clip_rate / self.engine_rate
        } else {
            0.0
        };
    }
}

impl SignalSource for ClipSource {
    fn name(&self) -> &'static str {
        "clip"
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.engine_rate = sample_rate;
        self.update_step();
    }

    /// Clips have no base frequency; only the pitch multiplier changes the rate
    fn set_frequency(&mut self, _base_frequency: f32, pitch: f32) {
        self.pitch = if pitch.is_finite() {
            pitch.clamp(super::MIN_PITCH_FACTOR, MAX_CLIP_PITCH) as f64
        } else {
            1.0
        };
        self.update_step();
    }

    fn reset(&mut self) {
        self.position = 0.0;
    }

    fn generate(&mut self) -> f32 {
        let len = self.samples.len();
        let index = self.position as usize % len;
        let frac = (self.position - self.position.floor()) as f32;
        let a = self.samples[index];
        let b = self.samples[(index + 1) % len];
        let sample = a + (b - a) * frac;

        self.position = (self.position + self.step).rem_euclid(len as f64);

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_clip_rejected() {
        assert!(matches!(
            ClipSource::from_samples(Vec::new(), 44100),
            Err(ClipError::Empty)
        ));
    }

    #[test]
    fn test_clip_loops() {
        let mut clip = ClipSource::from_samples(vec![0.0, 0.5, 1.0], 48000).unwrap();
        clip.set_sample_rate(48000.0);

        let out: Vec<f32> = (0..6).map(|_| clip.generate()).collect();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_pitch_interpolates() {
        let mut clip = ClipSource::from_samples(vec![0.0, 1.0, 0.0, -1.0], 48000).unwrap();
        clip.set_sample_rate(48000.0);
        clip.set_frequency(440.0, 0.5);

        assert_eq!(clip.generate(), 0.0);
        assert!((clip.generate() - 0.5).abs() < 1e-6);
        assert!((clip.generate() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rate_conversion() {
        let mut clip = ClipSource::from_samples(vec![0.0; 100], 24000).unwrap();
        clip.set_sample_rate(48000.0);
        clip.generate();
        assert!((clip.position() - 0.5).abs() < 1e-9);

        clip.reset();
        assert_eq!(clip.position(), 0.0);
    }

    #[test]
    fn test_extreme_pitch_is_capped() {
        let mut clip = ClipSource::from_samples(vec![0.1; 100], 48000).unwrap();
        clip.set_sample_rate(48000.0);
        clip.set_frequency(220.0, 1e20);

        for _ in 0..1000 {
            assert!((clip.generate() - 0.1).abs() < 1e-6);
            assert!(clip.position() >= 0.0 && clip.position() < 100.0);
        }
        // 1000 steps of 64 samples wrap to 1000 * 64 % 100
        assert!((clip.position() - 0.0).abs() < 1e-9);

        clip.set_frequency(220.0, f32::MAX);
        clip.generate();
        assert!((clip.position() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_wav_mixes_to_mono() {
        let file = NamedTempFile::new().unwrap();
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        {
            let mut writer = WavWriter::create(file.path(), spec).unwrap();
            for _ in 0..10 {
                writer.write_sample(16384i16).unwrap();
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let mut clip = ClipSource::open(file.path()).unwrap();
        assert_eq!(clip.len(), 10);
        clip.set_sample_rate(22050.0);
        assert!((clip.generate() - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_open_missing_file() {
        let err = ClipSource::open(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, ClipError::Read { .. }));
    }
}
