//! Locating and running the `ffmpeg`/`ffprobe` command-line tools.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use {
    tokio::{io::AsyncWriteExt, process::Command},
    tracing::debug,
};

use crate::error::{Error, Result};

/// Paths to the ffmpeg suite, resolved once at construction.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTools {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
}

impl FfmpegTools {
    /// Use the configured binaries when they exist, otherwise search `PATH`.
    #[must_use]
    pub fn locate(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Self {
        Self {
            ffmpeg: find_binary("ffmpeg", ffmpeg),
            ffprobe: find_binary("ffprobe", ffprobe),
        }
    }

    pub fn ffmpeg(&self) -> Result<&Path> {
        self.ffmpeg
            .as_deref()
            .ok_or_else(|| Error::validation("ffmpeg binary not found in PATH"))
    }

    pub fn ffprobe(&self) -> Result<&Path> {
        self.ffprobe
            .as_deref()
            .ok_or_else(|| Error::validation("ffprobe binary not found in PATH"))
    }
}

fn find_binary(name: &str, configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured
        && path.is_file()
    {
        return Some(path.to_path_buf());
    }
    which::which(name).ok()
}

/// Run `binary` with `args`, optionally feeding `stdin`, and return stdout.
///
/// A non-zero exit status becomes an error carrying the tool's stderr.
pub(crate) async fn run(binary: &Path, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(binary = %binary.display(), ?args, "running media tool");
    let mut child = cmd
        .spawn()
        .map_err(|e| Error::external(format!("failed to spawn {}", binary.display()), e))?;

    // Feed stdin concurrently with draining stdout so large inputs can't
    // deadlock on a full pipe.
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => {
            let input = input.to_vec();
            Some(tokio::spawn(async move {
                let result = pipe.write_all(&input).await;
                drop(pipe);
                result
            }))
        },
        _ => None,
    };

    let output = child.wait_with_output().await?;
    if let Some(writer) = writer {
        // A tool that exits early closes its end; the exit status below is
        // what matters.
        let _ = writer.await;
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::external(
            format!("{} exited with {}", binary.display(), output.status),
            std::io::Error::other(stderr.trim().to_string()),
        ));
    }
    Ok(output.stdout)
}
