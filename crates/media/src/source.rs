//! Media references accepted by the send operations.

use std::path::{Path, PathBuf};

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    bytes::Bytes,
    url::Url,
};

use crate::error::{Error, Result};

/// Base64 strings longer than this that contain both `/` and `+` are taken
/// to be base64 payloads rather than paths.
const BASE64_HEURISTIC_MIN_LEN: usize = 100;

/// Where a piece of media comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Path(PathBuf),
    Url(Url),
    /// Inline base64, with the MIME type when it came as a data URI.
    Base64 { mime: Option<String>, data: String },
    Bytes(Bytes),
}

/// Which variant a [`MediaSource`] is, for logs and hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Path,
    Url,
    Base64,
    Bytes,
}

impl MediaSource {
    /// Classify a caller-supplied string without touching the filesystem.
    ///
    /// Precedence is fixed: data URI, then long base64-looking strings, then
    /// URLs with both scheme and host, and finally local paths. Callers that
    /// know what they hold should build the variant directly instead.
    #[must_use]
    pub fn classify(input: &str) -> Self {
        if let Some((mime, data)) = parse_data_uri(input) {
            return Self::Base64 {
                mime,
                data: data.to_string(),
            };
        }

        if looks_like_base64(input) {
            return Self::Base64 {
                mime: None,
                data: input.to_string(),
            };
        }

        let trimmed = input.trim();
        if let Ok(url) = Url::parse(trimmed)
            && url.host_str().is_some_and(|host| !host.is_empty())
        {
            return Self::Url(url);
        }

        Self::Path(PathBuf::from(input))
    }

    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Path(_) => SourceKind::Path,
            Self::Url(_) => SourceKind::Url,
            Self::Base64 { .. } => SourceKind::Base64,
            Self::Bytes(_) => SourceKind::Bytes,
        }
    }

    /// File extension of a path or URL path, lowercased.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let ext = match self {
            Self::Path(path) => path.extension()?.to_str()?.to_string(),
            Self::Url(url) => {
                let last = url.path_segments()?.next_back()?;
                let (_, ext) = last.rsplit_once('.')?;
                ext.to_string()
            },
            Self::Base64 { .. } | Self::Bytes(_) => return None,
        };
        (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
    }

    /// Short description safe for logs (never includes inline payloads).
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Url(url) => url.to_string(),
            Self::Base64 { data, .. } => format!("<base64, {} chars>", data.len()),
            Self::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }

    /// Decode an inline base64 payload.
    pub(crate) fn decode_base64(data: &str) -> Result<Bytes> {
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD
            .decode(compact.as_bytes())
            .map(Bytes::from)
            .map_err(|e| Error::decode("base64 payload", e))
    }
}

impl From<&str> for MediaSource {
    fn from(input: &str) -> Self {
        Self::classify(input)
    }
}

impl From<String> for MediaSource {
    fn from(input: String) -> Self {
        Self::classify(&input)
    }
}

impl From<PathBuf> for MediaSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for MediaSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Url> for MediaSource {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl From<Vec<u8>> for MediaSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for MediaSource {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

/// Split `data:<mime>;base64,<payload>` into its MIME type and payload.
fn parse_data_uri(input: &str) -> Option<(Option<String>, &str)> {
    let rest = input.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(";base64,")?;
    let mime = (!meta.is_empty()).then(|| meta.to_ascii_lowercase());
    Some((mime, payload))
}

fn looks_like_base64(input: &str) -> bool {
    input.len() > BASE64_HEURISTIC_MIN_LEN && input.contains('/') && input.contains('+')
}
