//! Config schema types (gateway, queues, media).

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub gateway: GatewayConfig,
    pub queues: QueueConfig,
    pub media: MediaConfig,
}

/// Where and how to reach the messaging gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL; endpoint names such as `Msg/SendTxt` are appended to it.
    pub base_url: String,
    /// Timeout applied to gateway calls that don't carry their own.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000/api".into(),
            request_timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Inter-item delays of the three dispatch queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub text_delay_ms: u64,
    pub video_delay_ms: u64,
    /// Lower bound (inclusive) of the random image delay.
    pub image_delay_min_ms: u64,
    /// Upper bound (exclusive) of the random image delay.
    pub image_delay_max_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            text_delay_ms: 1000,
            video_delay_ms: 2000,
            image_delay_min_ms: 500,
            image_delay_max_ms: 1000,
        }
    }
}

/// Media fetching and transcoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub image_fetch_timeout_secs: u64,
    /// Download timeout for video and audio.
    pub media_fetch_timeout_secs: u64,
    /// Explicit `ffmpeg` binary; looked up in `PATH` when unset.
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit `ffprobe` binary; looked up in `PATH` when unset.
    pub ffprobe_path: Option<PathBuf>,
    /// Longest voice segment the gateway accepts.
    pub voice_segment_ms: u64,
    /// Pause between consecutive voice segment sends.
    pub voice_segment_pause_ms: u64,
    /// Assumed upload throughput used to size video upload timeouts.
    pub upload_bytes_per_sec: u64,
    pub upload_base_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_fetch_timeout_secs: 20,
            media_fetch_timeout_secs: 30,
            ffmpeg_path: None,
            ffprobe_path: None,
            voice_segment_ms: 60_000,
            voice_segment_pause_ms: 1000,
            upload_bytes_per_sec: 300 * 1024,
            upload_base_timeout_secs: 90,
        }
    }
}
