//! 16-bit PCM buffers: decoding, remixing, resampling and splitting.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use crate::{
    error::{Error, Result},
    tools::{self, FfmpegTools},
};

/// Sample rates the SILK encoder supports.
pub const SILK_SAMPLE_RATES: [u32; 4] = [8000, 12000, 16000, 24000];

/// Nearest SILK-supported rate to `rate`; ties go to the lower rate.
#[must_use]
pub fn closest_silk_rate(rate: u32) -> u32 {
    SILK_SAMPLE_RATES
        .into_iter()
        .min_by_key(|candidate| candidate.abs_diff(rate))
        .unwrap_or(24000)
}

/// Interleaved signed 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmAudio {
    /// Samples per channel.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// Average all channels into one.
    #[must_use]
    pub fn to_mono(self) -> Self {
        if self.channels <= 1 {
            return Self {
                channels: 1,
                ..self
            };
        }
        let channels = usize::from(self.channels);
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|s| i32::from(*s)).sum();
                (sum / channels as i32) as i16
            })
            .collect();
        Self {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }

    /// Linear-interpolation resample of mono audio to `rate`.
    #[must_use]
    pub fn resample(self, rate: u32) -> Self {
        if rate == self.sample_rate || self.samples.is_empty() || self.sample_rate == 0 {
            return Self {
                sample_rate: rate,
                ..self
            };
        }

        let input = &self.samples;
        let out_len =
            (input.len() as u64 * u64::from(rate) / u64::from(self.sample_rate)) as usize;
        let step = f64::from(self.sample_rate) / f64::from(rate);
        let last = input.len() - 1;
        let samples = (0..out_len)
            .map(|i| {
                let pos = i as f64 * step;
                let idx = (pos as usize).min(last);
                let next = (idx + 1).min(last);
                let frac = pos - idx as f64;
                let a = f64::from(input[idx]);
                let b = f64::from(input[next]);
                (a + (b - a) * frac).round() as i16
            })
            .collect();

        Self {
            samples,
            sample_rate: rate,
            channels: self.channels,
        }
    }

    /// Consecutive chunks of at most `max_ms`, covering every sample once.
    #[must_use]
    pub fn split(&self, max_ms: u64) -> Vec<Self> {
        let per_chunk = (u64::from(self.sample_rate) * max_ms / 1000) as usize
            * usize::from(self.channels.max(1));
        if per_chunk == 0 || self.samples.len() <= per_chunk {
            return vec![self.clone()];
        }
        self.samples
            .chunks(per_chunk)
            .map(|chunk| Self {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
            })
            .collect()
    }

    /// Raw little-endian bytes, as encoders expect them.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn from_le_bytes(data: &[u8], sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: data
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect(),
            sample_rate,
            channels,
        }
    }
}

/// Decode a RIFF/WAVE file.
pub fn decode_wav(data: &[u8]) -> Result<PcmAudio> {
    let reader = WavReader::new(Cursor::new(data)).map_err(|e| Error::decode("WAV audio", e))?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect::<std::result::Result<Vec<_>, _>>(),
        (SampleFormat::Int, bits @ 1..=16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v << (16 - bits)))
            .collect(),
        (SampleFormat::Int, bits @ 17..=32) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| (v >> (bits - 16)) as i16))
            .collect(),
        (format, bits) => {
            return Err(Error::decode(
                "WAV audio",
                format!("unsupported sample format {format:?} at {bits} bits"),
            ));
        },
    }
    .map_err(|e| Error::decode("WAV audio", e))?;

    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(Error::decode("WAV audio", "invalid channel count or rate"));
    }
    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Decode MP3 (or anything else ffmpeg understands) to mono PCM at `rate`.
pub async fn decode_with_ffmpeg(tools: &FfmpegTools, data: &[u8], rate: u32) -> Result<PcmAudio> {
    let rate_arg = rate.to_string();
    let raw = tools::run(
        tools.ffmpeg()?,
        &[
            "-v", "error", "-i", "pipe:0", "-ac", "1", "-ar", rate_arg.as_str(), "-f", "s16le",
            "pipe:1",
        ],
        Some(data),
    )
    .await?;
    if raw.is_empty() {
        return Err(Error::decode("audio", "ffmpeg produced no samples"));
    }
    Ok(PcmAudio::from_le_bytes(&raw, rate, 1))
}
