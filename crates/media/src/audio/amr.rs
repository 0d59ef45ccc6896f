//! AMR storage-format (RFC 4867 §5) inspection.

const NB_MAGIC: &[u8] = b"#!AMR\n";
const WB_MAGIC: &[u8] = b"#!AMR-WB\n";

/// Every AMR frame covers 20 ms of audio.
pub const AMR_FRAME_MS: u64 = 20;

/// Speech payload bytes per frame type, excluding the header byte. `None`
/// marks reserved frame types.
const NB_FRAME_BYTES: [Option<usize>; 16] = [
    Some(12),
    Some(13),
    Some(15),
    Some(17),
    Some(19),
    Some(20),
    Some(26),
    Some(31),
    Some(5),
    None,
    None,
    None,
    None,
    None,
    None,
    Some(0),
];

const WB_FRAME_BYTES: [Option<usize>; 16] = [
    Some(17),
    Some(23),
    Some(32),
    Some(36),
    Some(40),
    Some(46),
    Some(50),
    Some(58),
    Some(60),
    Some(5),
    None,
    None,
    None,
    None,
    Some(0),
    Some(0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmrVariant {
    Narrowband,
    Wideband,
}

/// Result of walking an AMR file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmrInfo {
    pub variant: AmrVariant,
    pub frames: u64,
}

impl AmrInfo {
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.frames * AMR_FRAME_MS
    }
}

/// Walk every frame of a single-channel AMR file.
///
/// Fails on a missing magic header, a reserved frame type, a truncated
/// final frame, or a file without any frames.
pub fn inspect(data: &[u8]) -> Result<AmrInfo, String> {
    let (variant, table, mut rest) = if let Some(rest) = data.strip_prefix(WB_MAGIC) {
        (AmrVariant::Wideband, &WB_FRAME_BYTES, rest)
    } else if let Some(rest) = data.strip_prefix(NB_MAGIC) {
        (AmrVariant::Narrowband, &NB_FRAME_BYTES, rest)
    } else {
        return Err("missing AMR magic header".into());
    };

    let mut frames = 0u64;
    while let Some((&header, body)) = rest.split_first() {
        let frame_type = usize::from((header >> 3) & 0x0F);
        let Some(size) = table[frame_type] else {
            return Err(format!("reserved frame type {frame_type} at frame {frames}"));
        };
        if body.len() < size {
            return Err(format!("truncated frame {frames}"));
        }
        rest = &body[size..];
        frames += 1;
    }

    if frames == 0 {
        return Err("no audio frames".into());
    }
    Ok(AmrInfo { variant, frames })
}
