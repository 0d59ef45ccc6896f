//! Voice codec encoders.

use crate::error::{Error, Result};

/// SILK bit rate used for voice notes.
pub const SILK_BIT_RATE: i32 = 24000;

/// Encodes little-endian 16-bit mono PCM into the gateway's voice codec.
pub trait VoiceEncoder: Send + Sync {
    fn encode(&self, pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>>;
}

/// SILK v3 with the Tencent header byte, via `silk-rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilkEncoder;

impl VoiceEncoder for SilkEncoder {
    fn encode(&self, pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
        let rate = i32::try_from(sample_rate)
            .map_err(|_| Error::validation(format!("sample rate {sample_rate} out of range")))?;
        silk_rs::encode_silk(pcm, rate, SILK_BIT_RATE, true)
            .map_err(|e| Error::encode("SILK", format!("{e:?}")))
    }
}
