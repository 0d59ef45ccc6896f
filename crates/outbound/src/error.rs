use courier_queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Media(#[from] courier_media::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The file upload step did not report success or omitted a media id.
    #[error("file upload failed: {message}")]
    Upload { message: String },

    /// The gateway call failed or returned an unusable response.
    #[error("gateway call {endpoint} failed: {message}")]
    Gateway {
        endpoint: &'static str,
        message: String,
    },

    #[error("{message}")]
    Validation { message: String },

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn gateway(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::Gateway {
            endpoint,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
