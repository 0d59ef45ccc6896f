//! Resolve a [`MediaSource`] to bytes (and, for video, to a local path).

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use {
    bytes::Bytes,
    courier_config::MediaConfig,
    reqwest::header::{ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT},
    tempfile::NamedTempFile,
    tracing::{debug, info},
    url::Url,
};

use crate::{
    error::{Error, Result},
    source::{MediaSource, SourceKind},
};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT_LANGUAGE_VALUE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// What the caller intends to do with the media; drives headers, timeouts
/// and temp-file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    fn accept(self) -> &'static str {
        match self {
            Self::Image => "image/webp,image/apng,image/*,*/*;q=0.8",
            Self::Video | Self::Audio => "*/*",
        }
    }

    fn temp_suffix(self) -> &'static str {
        match self {
            Self::Image => ".img",
            Self::Video => ".mp4",
            Self::Audio => ".audio",
        }
    }
}

/// Raw media bytes plus what is known about their origin.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    /// `Content-Type` of a download, or the MIME type of a data URI.
    pub content_type: Option<String>,
    pub origin: SourceKind,
}

/// Media available as a file on disk.
///
/// Temporary copies are deleted when this value is dropped; original local
/// paths are never touched.
#[derive(Debug)]
pub struct LocalMedia {
    bytes: Bytes,
    path: PathBuf,
    temp: Option<NamedTempFile>,
}

impl LocalMedia {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

/// Downloads and reads media for the send pipeline.
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    image_timeout: Duration,
    media_timeout: Duration,
}

impl MediaFetcher {
    pub fn new(config: &MediaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::external("failed to build media HTTP client", e))?;
        Ok(Self::with_client(client, config))
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &MediaConfig) -> Self {
        Self {
            client,
            image_timeout: Duration::from_secs(config.image_fetch_timeout_secs),
            media_timeout: Duration::from_secs(config.media_fetch_timeout_secs),
        }
    }

    #[must_use]
    pub fn timeout_for(&self, kind: MediaKind) -> Duration {
        match kind {
            MediaKind::Image => self.image_timeout,
            MediaKind::Video | MediaKind::Audio => self.media_timeout,
        }
    }

    /// Load the bytes behind `source`.
    pub async fn resolve(&self, source: &MediaSource, kind: MediaKind) -> Result<FetchedMedia> {
        match source {
            MediaSource::Base64 { mime, data } => Ok(FetchedMedia {
                bytes: MediaSource::decode_base64(data)?,
                content_type: mime.clone(),
                origin: SourceKind::Base64,
            }),
            MediaSource::Bytes(bytes) => Ok(FetchedMedia {
                bytes: bytes.clone(),
                content_type: None,
                origin: SourceKind::Bytes,
            }),
            MediaSource::Url(url) => self.download(url, kind).await,
            MediaSource::Path(path) => Ok(FetchedMedia {
                bytes: read_local(path).await?,
                content_type: None,
                origin: SourceKind::Path,
            }),
        }
    }

    /// Make `source` available as a file, for tools that only take paths.
    ///
    /// Local paths are used in place. Everything else is written to a
    /// uniquely named temp file that lives as long as the returned value.
    pub async fn materialize(&self, source: &MediaSource, kind: MediaKind) -> Result<LocalMedia> {
        if let MediaSource::Path(path) = source {
            return Ok(LocalMedia {
                bytes: read_local(path).await?,
                path: path.clone(),
                temp: None,
            });
        }

        let fetched = self.resolve(source, kind).await?;
        let temp = tempfile::Builder::new()
            .prefix("courier-")
            .suffix(kind.temp_suffix())
            .tempfile()?;
        tokio::fs::write(temp.path(), &fetched.bytes).await?;
        debug!(
            path = %temp.path().display(),
            bytes = fetched.bytes.len(),
            "media written to temp file"
        );

        Ok(LocalMedia {
            bytes: fetched.bytes,
            path: temp.path().to_path_buf(),
            temp: Some(temp),
        })
    }

    async fn download(&self, url: &Url, kind: MediaKind) -> Result<FetchedMedia> {
        let timeout = self.timeout_for(kind);
        debug!(%url, ?kind, timeout_secs = timeout.as_secs(), "downloading media");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, kind.accept())
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(ACCEPT_ENCODING, "gzip, deflate")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::download(url.as_str(), None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download(
                url.as_str(),
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::download(url.as_str(), Some(status.as_u16()), e.to_string()))?;

        info!(%url, bytes = bytes.len(), content_type = ?content_type, "media downloaded");
        Ok(FetchedMedia {
            bytes,
            content_type,
            origin: SourceKind::Url,
        })
    }
}

async fn read_local(path: &Path) -> Result<Bytes> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Bytes::from(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::not_found(path)),
        Err(e) => Err(e.into()),
    }
}
