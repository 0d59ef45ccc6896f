//! Semantic validation of a parsed [`CourierConfig`].

use crate::schema::CourierConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "queues.text_delay_ms"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Check value ranges that serde alone can't express.
#[must_use]
pub fn validate(config: &CourierConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    match url::Url::parse(&config.gateway.base_url) {
        Ok(url) if url.host_str().is_some() => {},
        Ok(_) => diagnostics.push(Diagnostic::error(
            "gateway.base_url",
            "base URL has no host",
        )),
        Err(e) => diagnostics.push(Diagnostic::error(
            "gateway.base_url",
            format!("not a valid URL: {e}"),
        )),
    }
    if config.gateway.request_timeout_secs == 0 {
        diagnostics.push(Diagnostic::error(
            "gateway.request_timeout_secs",
            "timeout must be greater than zero",
        ));
    }

    let queues = &config.queues;
    if queues.image_delay_min_ms >= queues.image_delay_max_ms {
        diagnostics.push(Diagnostic::error(
            "queues.image_delay_max_ms",
            format!(
                "must be greater than image_delay_min_ms ({})",
                queues.image_delay_min_ms
            ),
        ));
    }
    if queues.text_delay_ms == 0 || queues.video_delay_ms == 0 {
        diagnostics.push(Diagnostic::warning(
            "queues",
            "a zero delay disables gateway rate limiting for that queue",
        ));
    }

    let media = &config.media;
    if media.voice_segment_ms == 0 {
        diagnostics.push(Diagnostic::error(
            "media.voice_segment_ms",
            "segment length must be greater than zero",
        ));
    }
    if media.upload_bytes_per_sec == 0 {
        diagnostics.push(Diagnostic::error(
            "media.upload_bytes_per_sec",
            "upload rate must be greater than zero",
        ));
    }
    for (path, binary) in [
        ("media.ffmpeg_path", &media.ffmpeg_path),
        ("media.ffprobe_path", &media.ffprobe_path),
    ] {
        if let Some(binary) = binary
            && !binary.exists()
        {
            diagnostics.push(Diagnostic::warning(
                path,
                format!("{} does not exist, falling back to PATH", binary.display()),
            ));
        }
    }

    diagnostics
}
