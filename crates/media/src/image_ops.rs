//! Image normalization for the gateway, which only accepts JPEG and PNG.

use std::io::Cursor;

use {
    bytes::Bytes,
    image::{ImageFormat, ImageReader, codecs::jpeg::JpegEncoder},
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    fetch::FetchedMedia,
    source::MediaSource,
};

/// JPEG quality used when re-encoding unsupported formats.
pub const NORMALIZE_JPEG_QUALITY: u8 = 95;

/// Image metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

/// Read dimensions and format without decoding the pixel data.
pub fn image_metadata(data: &[u8]) -> Result<ImageMetadata> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| Error::decode("image", e))?;
    let format = reader.format();
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| Error::decode("image", e))?;

    Ok(ImageMetadata {
        width,
        height,
        format,
    })
}

/// Guarantee `data` is JPEG or PNG.
///
/// `hint` is a content type or file extension. When it names jpeg/jpg/png
/// the bytes pass through untouched; without a hint the format is sniffed.
/// Anything else is decoded, flattened to RGB and re-encoded as JPEG.
pub fn normalize(data: Bytes, hint: Option<&str>) -> Result<Bytes> {
    let passthrough = match hint {
        Some(hint) => is_gateway_format(hint),
        None => matches!(
            image::guess_format(&data),
            Ok(ImageFormat::Jpeg | ImageFormat::Png)
        ),
    };
    if passthrough {
        debug!(hint, bytes = data.len(), "image already in a gateway format");
        return Ok(data);
    }

    let img = ImageReader::new(Cursor::new(&data[..]))
        .with_guessed_format()
        .map_err(|e| Error::decode("image", e))?
        .decode()
        .map_err(|e| Error::decode("image", e))?;

    let rgb = img.to_rgb8();
    let mut output = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut output, NORMALIZE_JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| Error::encode("JPEG", e))?;

    let output = output.into_inner();
    info!(
        hint,
        original_bytes = data.len(),
        jpeg_bytes = output.len(),
        "image converted to JPEG"
    );
    Ok(Bytes::from(output))
}

/// Best available format hint for fetched image bytes.
#[must_use]
pub fn hint_for(fetched: &FetchedMedia, source: &MediaSource) -> Option<String> {
    fetched
        .content_type
        .clone()
        .or_else(|| source.extension())
}

fn is_gateway_format(hint: &str) -> bool {
    let hint = hint.to_ascii_lowercase();
    ["jpeg", "jpg", "png"].iter().any(|fmt| hint.contains(fmt))
}
