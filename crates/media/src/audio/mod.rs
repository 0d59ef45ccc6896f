//! Voice-note preparation: AMR passthrough, otherwise SILK segments.

pub mod amr;
pub mod pcm;
pub mod silk;

use std::{fmt, sync::Arc};

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    courier_config::MediaConfig,
    tracing::{debug, info, warn},
};

pub use {
    pcm::{PcmAudio, SILK_SAMPLE_RATES, closest_silk_rate, decode_wav},
    silk::{SilkEncoder, VoiceEncoder},
};

use crate::{
    error::{Error, Result},
    fetch::{MediaFetcher, MediaKind},
    source::MediaSource,
    tools::FfmpegTools,
};

/// Sample rate voice audio is encoded at.
pub const VOICE_SAMPLE_RATE: u32 = 24000;

/// Container format, guessed from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Amr,
    Wav,
    Mp3,
}

impl AudioFormat {
    /// `amr`, `wav` or `mp3` by extension; anything else is assumed WAV.
    #[must_use]
    pub fn detect(source: &MediaSource) -> Self {
        match source.extension().as_deref() {
            Some("amr") => Self::Amr,
            Some("mp3") => Self::Mp3,
            _ => Self::Wav,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amr => "amr",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec tag the gateway expects in `Type` of a voice send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VoiceCodec {
    Amr = 0,
    Silk = 4,
}

impl VoiceCodec {
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One voice message worth of encoded audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSegment {
    /// Base64 of the encoded audio.
    pub payload: String,
    pub duration_ms: u64,
    pub codec: VoiceCodec,
}

/// Turns arbitrary audio into gateway voice segments.
#[derive(Clone)]
pub struct AudioProcessor {
    tools: FfmpegTools,
    encoder: Arc<dyn VoiceEncoder>,
    segment_ms: u64,
}

impl fmt::Debug for AudioProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioProcessor")
            .field("tools", &self.tools)
            .field("segment_ms", &self.segment_ms)
            .finish_non_exhaustive()
    }
}

impl AudioProcessor {
    #[must_use]
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            tools: FfmpegTools::locate(
                config.ffmpeg_path.as_deref(),
                config.ffprobe_path.as_deref(),
            ),
            encoder: Arc::new(SilkEncoder),
            segment_ms: config.voice_segment_ms.max(1),
        }
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: Arc<dyn VoiceEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    #[must_use]
    pub fn segment_ms(&self) -> u64 {
        self.segment_ms
    }

    /// Fetch `source` and encode it into chronologically ordered segments.
    pub async fn process(
        &self,
        fetcher: &MediaFetcher,
        source: &MediaSource,
    ) -> Result<Vec<VoiceSegment>> {
        let fetched = fetcher.resolve(source, MediaKind::Audio).await?;
        let format = AudioFormat::detect(source);
        debug!(source = %source.describe(), %format, bytes = fetched.bytes.len(), "processing voice");
        self.process_bytes(&fetched.bytes, format).await
    }

    /// Encode already fetched audio of a known format.
    pub async fn process_bytes(&self, data: &[u8], format: AudioFormat) -> Result<Vec<VoiceSegment>> {
        let format = match format {
            AudioFormat::Amr => match amr::inspect(data) {
                Ok(info) => {
                    info!(frames = info.frames, duration_ms = info.duration_ms(), "AMR voice passed through");
                    return Ok(vec![VoiceSegment {
                        payload: STANDARD.encode(data),
                        duration_ms: info.duration_ms(),
                        codec: VoiceCodec::Amr,
                    }]);
                },
                Err(reason) => {
                    warn!(%reason, "AMR decode failed, retrying as WAV");
                    AudioFormat::Wav
                },
            },
            other => other,
        };

        let pcm = match format {
            AudioFormat::Mp3 => {
                pcm::decode_with_ffmpeg(&self.tools, data, VOICE_SAMPLE_RATE).await?
            },
            AudioFormat::Wav | AudioFormat::Amr => {
                let data = data.to_vec();
                tokio::task::spawn_blocking(move || pcm::decode_wav(&data))
                    .await
                    .map_err(|e| Error::external("WAV decode task failed", e))??
            },
        };

        let encoder = Arc::clone(&self.encoder);
        let segment_ms = self.segment_ms;
        let segments = tokio::task::spawn_blocking(move || encode_segments(pcm, segment_ms, &*encoder))
            .await
            .map_err(|e| Error::external("voice encode task failed", e))??;

        info!(
            segments = segments.len(),
            duration_ms = segments.iter().map(|s| s.duration_ms).sum::<u64>(),
            "voice encoded as SILK"
        );
        Ok(segments)
    }
}

fn encode_segments(
    pcm: PcmAudio,
    segment_ms: u64,
    encoder: &dyn VoiceEncoder,
) -> Result<Vec<VoiceSegment>> {
    let pcm = pcm.to_mono().resample(VOICE_SAMPLE_RATE);
    if pcm.samples.is_empty() {
        return Err(Error::validation("audio contains no samples"));
    }

    pcm.split(segment_ms)
        .into_iter()
        .map(|chunk| {
            let encoded = encoder.encode(&chunk.to_le_bytes(), chunk.sample_rate)?;
            Ok(VoiceSegment {
                payload: STANDARD.encode(encoded),
                duration_ms: chunk.duration_ms(),
                codec: VoiceCodec::Silk,
            })
        })
        .collect()
}
