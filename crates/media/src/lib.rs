//! Media normalization for outbound messages.
//!
//! Resolves paths, URLs, base64 and raw bytes, then converts them into the
//! gateway's formats: JPEG/PNG images, thumbnail plus duration for videos,
//! and AMR or SILK voice segments.

pub mod audio;
pub mod error;
pub mod fetch;
pub mod image_ops;
pub mod source;
pub mod tools;
pub mod video;

pub use {
    audio::{
        AudioFormat, AudioProcessor, PcmAudio, SilkEncoder, VoiceCodec, VoiceEncoder, VoiceSegment,
    },
    error::{Error, Result},
    fetch::{FetchedMedia, LocalMedia, MediaFetcher, MediaKind},
    image_ops::{ImageMetadata, image_metadata, normalize},
    source::{MediaSource, SourceKind},
    tools::FfmpegTools,
    video::{
        UploadBudget, VideoExtractor, VideoInfo, VideoProcessor, expected_upload_secs,
        upload_timeout,
    },
};
