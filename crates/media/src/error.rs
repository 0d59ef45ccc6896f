use std::{error::Error as StdError, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A local media path does not exist.
    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// Fetching a remote URL failed or returned a non-success status.
    #[error("download of {url} failed{}: {message}", status_suffix(.status))]
    Download {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Image, audio or video content could not be decoded.
    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    /// Re-encoding into a gateway format failed.
    #[error("failed to encode {what}: {message}")]
    Encode { what: &'static str, message: String },

    /// Content decoded but is unusable for sending.
    #[error("{message}")]
    Validation { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    #[must_use]
    pub fn download(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(what: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn encode(what: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Encode {
            what,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// HTTP status of a failed download, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Download { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {code}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
