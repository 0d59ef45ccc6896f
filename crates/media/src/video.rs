//! First-frame thumbnails and durations for outgoing videos.

use std::{io::Cursor, path::Path, time::Duration};

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    bytes::Bytes,
    courier_config::MediaConfig,
    image::codecs::jpeg::JpegEncoder,
    serde::Deserialize,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    fetch::{MediaFetcher, MediaKind},
    source::MediaSource,
    tools::{self, FfmpegTools},
};

/// JPEG quality of the first-frame thumbnail.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 100;

const DEFAULT_UPLOAD_BYTES_PER_SEC: u64 = 300 * 1024;
const DEFAULT_UPLOAD_BASE_SECS: u64 = 90;

/// What the gateway needs to send a video.
///
/// Either everything is known or nothing is: extraction failures never
/// produce a partially filled value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoInfo {
    /// `data:image/jpeg;base64,...` of the first frame.
    pub thumbnail: Option<String>,
    pub data: Option<Bytes>,
    pub duration_secs: Option<u64>,
}

impl VideoInfo {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.thumbnail.is_some() && self.data.is_some() && self.duration_secs.is_some()
    }
}

/// Upload time estimate for video sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadBudget {
    pub bytes_per_sec: u64,
    pub base_secs: u64,
}

impl Default for UploadBudget {
    fn default() -> Self {
        Self {
            bytes_per_sec: DEFAULT_UPLOAD_BYTES_PER_SEC,
            base_secs: DEFAULT_UPLOAD_BASE_SECS,
        }
    }
}

impl UploadBudget {
    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            bytes_per_sec: config.upload_bytes_per_sec.max(1),
            base_secs: config.upload_base_timeout_secs,
        }
    }

    /// Seconds the upload itself is expected to take.
    #[must_use]
    pub fn expected_secs(&self, len: usize) -> u64 {
        (len as u64).div_ceil(self.bytes_per_sec.max(1))
    }

    /// Request timeout for uploading `len` bytes.
    #[must_use]
    pub fn timeout(&self, len: usize) -> Duration {
        Duration::from_secs(self.expected_secs(len) + self.base_secs)
    }
}

/// `ceil(len / 300 KiB) + 90` seconds.
#[must_use]
pub fn upload_timeout(len: usize) -> Duration {
    UploadBudget::default().timeout(len)
}

/// `ceil(len / 300 KiB)` seconds.
#[must_use]
pub fn expected_upload_secs(len: usize) -> u64 {
    UploadBudget::default().expected_secs(len)
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    nb_frames: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl ProbeOutput {
    /// Whole seconds: frame count over frame rate when both are known,
    /// the reported stream or container duration otherwise.
    fn duration_secs(&self) -> Option<u64> {
        let stream = self.streams.first()?;

        let frames = stream
            .nb_frames
            .as_deref()
            .and_then(|n| n.trim().parse::<u64>().ok())
            .filter(|n| *n > 0);
        let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
            .into_iter()
            .filter_map(|rate| rate.as_deref().and_then(parse_rate))
            .find(|fps| *fps > 0.0);
        if let (Some(frames), Some(fps)) = (frames, fps) {
            return Some((frames as f64 / fps).round() as u64);
        }

        stream
            .duration
            .as_deref()
            .or_else(|| self.format.as_ref()?.duration.as_deref())
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64)
    }
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        },
        None => rate.trim().parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

/// Produces the thumbnail and duration of a materialized video.
///
/// Implementations never fail: anything that goes wrong yields
/// [`VideoInfo::empty`].
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    async fn extract(&self, path: &Path, data: Bytes) -> VideoInfo;
}

/// Extracts the thumbnail and duration the gateway requires for videos.
#[derive(Debug, Clone, Default)]
pub struct VideoProcessor {
    tools: FfmpegTools,
}

impl VideoProcessor {
    #[must_use]
    pub fn new(config: &MediaConfig) -> Self {
        Self::with_tools(FfmpegTools::locate(
            config.ffmpeg_path.as_deref(),
            config.ffprobe_path.as_deref(),
        ))
    }

    #[must_use]
    pub fn with_tools(tools: FfmpegTools) -> Self {
        Self { tools }
    }

    /// Fetch `source` and extract from it. Never fails; see [`VideoInfo`].
    pub async fn probe(&self, fetcher: &MediaFetcher, source: &MediaSource) -> VideoInfo {
        let local = match fetcher.materialize(source, MediaKind::Video).await {
            Ok(local) => local,
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "failed to fetch video");
                return VideoInfo::empty();
            },
        };
        self.extract(local.path(), local.bytes().clone()).await
    }

    /// Thumbnail and duration of the video at `path`, whose content is
    /// `data`. Any failure yields [`VideoInfo::empty`].
    pub async fn extract(&self, path: &Path, data: Bytes) -> VideoInfo {
        match self.try_extract(path).await {
            Ok((thumbnail, duration_secs)) => {
                info!(
                    path = %path.display(),
                    bytes = data.len(),
                    duration_secs,
                    "video processed"
                );
                VideoInfo {
                    thumbnail: Some(thumbnail),
                    data: Some(data),
                    duration_secs: Some(duration_secs),
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "video extraction failed");
                VideoInfo::empty()
            },
        }
    }

    async fn try_extract(&self, path: &Path) -> Result<(String, u64)> {
        let path_arg = path.to_string_lossy().into_owned();

        let probe = tools::run(
            self.tools.ffprobe()?,
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
                path_arg.as_str(),
            ],
            None,
        )
        .await?;
        let probe: ProbeOutput =
            serde_json::from_slice(&probe).map_err(|e| Error::decode("ffprobe output", e))?;
        if probe.streams.is_empty() {
            return Err(Error::validation("no video stream"));
        }
        let duration = probe
            .duration_secs()
            .ok_or_else(|| Error::validation("video duration unknown"))?;
        debug!(path = %path.display(), duration, "video probed");

        let frame = tools::run(
            self.tools.ffmpeg()?,
            &[
                "-v",
                "error",
                "-i",
                path_arg.as_str(),
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "png",
                "pipe:1",
            ],
            None,
        )
        .await?;
        if frame.is_empty() {
            return Err(Error::decode("video frame", "no frame produced"));
        }

        let thumbnail = tokio::task::spawn_blocking(move || encode_thumbnail(&frame))
            .await
            .map_err(|e| Error::external("thumbnail task failed", e))??;
        Ok((thumbnail, duration))
    }
}

#[async_trait]
impl VideoExtractor for VideoProcessor {
    async fn extract(&self, path: &Path, data: Bytes) -> VideoInfo {
        VideoProcessor::extract(self, path, data).await
    }
}

/// Re-encode a decoded frame as a JPEG data URI.
fn encode_thumbnail(frame: &[u8]) -> Result<String> {
    let rgb = image::load_from_memory(frame)
        .map_err(|e| Error::decode("video frame", e))?
        .to_rgb8();
    let mut jpeg = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(
        &mut jpeg,
        THUMBNAIL_JPEG_QUALITY,
    ))
    .map_err(|e| Error::encode("thumbnail", e))?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        STANDARD.encode(jpeg.into_inner())
    ))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        image::{DynamicImage, ImageFormat, RgbImage},
        rstest::rstest,
    };

    #[rstest]
    #[case(0, 90)]
    #[case(1, 91)]
    #[case(300 * 1024, 91)]
    #[case(300 * 1024 + 1, 92)]
    #[case(10 * 1024 * 1024, 125)]
    fn upload_timeout_scales_with_size(#[case] len: usize, #[case] secs: u64) {
        assert_eq!(upload_timeout(len), Duration::from_secs(secs));
    }

    #[test]
    fn expected_upload_secs_rounds_up() {
        assert_eq!(expected_upload_secs(0), 0);
        assert_eq!(expected_upload_secs(1), 1);
        assert_eq!(expected_upload_secs(600 * 1024), 2);
    }

    #[test]
    fn budget_follows_config() {
        let config = MediaConfig {
            upload_bytes_per_sec: 1000,
            upload_base_timeout_secs: 10,
            ..MediaConfig::default()
        };
        let budget = UploadBudget::from_config(&config);
        assert_eq!(budget.timeout(2500), Duration::from_secs(13));
    }

    #[rstest]
    #[case("25", Some(25.0))]
    #[case("30000/1001", Some(30000.0 / 1001.0))]
    #[case("0/0", None)]
    #[case("abc", None)]
    fn parses_frame_rates(#[case] rate: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_rate(rate), expected);
    }

    #[test]
    fn duration_prefers_frame_count() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{"streams":[{"nb_frames":"250","avg_frame_rate":"25/1","duration":"3.2"}],
                "format":{"duration":"3.3"}}"#,
        )
        .unwrap();
        assert_eq!(probe.duration_secs(), Some(10));
    }

    #[test]
    fn duration_falls_back_to_reported_length() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{"streams":[{"avg_frame_rate":"0/0","r_frame_rate":"0/0"}],
                "format":{"duration":"7.6"}}"#,
        )
        .unwrap();
        assert_eq!(probe.duration_secs(), Some(8));

        let probe: ProbeOutput = serde_json::from_str(r#"{"streams":[{}]}"#).unwrap();
        assert_eq!(probe.duration_secs(), None);
    }

    #[test]
    fn thumbnail_is_jpeg_data_uri() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, image::Rgb([10, 200, 30])));
        let mut png = Cursor::new(Vec::new());
        frame.write_to(&mut png, ImageFormat::Png).unwrap();

        let uri = encode_thumbnail(&png.into_inner()).unwrap();
        let payload = uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        let jpeg = STANDARD.decode(payload).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
    }

    fn tools_or_skip() -> Option<FfmpegTools> {
        let tools = FfmpegTools::locate(None, None);
        if tools.ffmpeg().is_err() || tools.ffprobe().is_err() {
            eprintln!("ffmpeg/ffprobe not installed, skipping");
            return None;
        }
        Some(tools)
    }

    #[tokio::test]
    async fn corrupt_video_yields_nothing() {
        let Some(tools) = tools_or_skip() else {
            return;
        };
        let file = tempfile::NamedTempFile::with_suffix(".mp4").unwrap();
        std::fs::write(file.path(), b"this is not a video").unwrap();

        let info = VideoProcessor::with_tools(tools)
            .extract(file.path(), Bytes::from_static(b"this is not a video"))
            .await;
        assert_eq!(info, VideoInfo::empty());
        assert!(!info.is_complete());
    }

    #[tokio::test]
    async fn missing_tools_yield_nothing() {
        let file = tempfile::NamedTempFile::with_suffix(".mp4").unwrap();
        let info = VideoProcessor::with_tools(FfmpegTools::default())
            .extract(file.path(), Bytes::new())
            .await;
        assert_eq!(info, VideoInfo::empty());
    }

    #[tokio::test]
    async fn generated_clip_has_thumbnail_and_duration() {
        let Some(tools) = tools_or_skip() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        let status = std::process::Command::new(tools.ffmpeg().unwrap())
            .args(["-v", "error", "-f", "lavfi", "-i", "testsrc=duration=2:size=64x48:rate=10"])
            .args(["-c:v", "mpeg4", "-pix_fmt", "yuv420p"])
            .arg(&clip)
            .status()
            .unwrap();
        assert!(status.success());
        let data = Bytes::from(std::fs::read(&clip).unwrap());

        let info = VideoProcessor::with_tools(tools)
            .extract(&clip, data.clone())
            .await;
        assert!(info.is_complete());
        assert_eq!(info.duration_secs, Some(2));
        assert_eq!(info.data, Some(data));

        let thumbnail = info.thumbnail.unwrap();
        let jpeg = STANDARD
            .decode(thumbnail.strip_prefix("data:image/jpeg;base64,").unwrap())
            .unwrap();
        let frame = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 48));
    }

    #[tokio::test]
    async fn missing_video_yields_nothing() {
        let fetcher = MediaFetcher::new(&MediaConfig::default()).unwrap();
        let info = VideoProcessor::default()
            .probe(&fetcher, &MediaSource::classify("/no/such/clip.mp4"))
            .await;
        assert_eq!(info, VideoInfo::empty());
    }
}
