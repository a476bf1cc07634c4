//! Persisting uploaded files.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::fs::naming::sanitize_filename;

/// Stream `body` into `<upload_dir>/<filename>`, replacing any existing file.
///
/// Uploads never go through the allocator: a second upload with the same
/// name overwrites the first. A stream error leaves the partial file behind.
/// Returns the written path and the number of bytes written.
pub async fn write_upload<S, E>(upload_dir: &Path, filename: &str, body: S) -> Result<(PathBuf, u64)>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
{
    let filename = sanitize_filename(filename)?;
    let path = upload_dir.join(&filename);

    let mut file = File::create(&path).await?;
    let mut written: u64 = 0;

    futures::pin_mut!(body);
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                file.flush().await?;
                return Err(e.into());
            }
        };
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;

    tracing::debug!(path = %path.display(), bytes = written, "upload stored");

    Ok((path, written))
}
