//! Storage root shared by every tool handler.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::Stream;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::fs::naming::{reserve_unique_filename, unique_filename};
use crate::fs::paths::{tool_dirs, work_dir, ToolDirs, OUTPUTS_DIR};
use crate::fs::upload::write_upload;

/// Default cap on numbered candidates probed per allocation.
pub const DEFAULT_MAX_NAME_ATTEMPTS: u32 = 10_000;

/// A stored upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Filename as sent by the client.
    pub original_name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl StoredUpload {
    /// Stored filename without its extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file")
            .to_string()
    }
}

/// Upload and output partitions rooted at one directory.
///
/// Holds no state besides its configuration; everything else lives on disk.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    max_name_attempts: u32,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, max_name_attempts: u32) -> Self {
        Self {
            root: root.into(),
            max_name_attempts,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone(), config.max_name_attempts)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of every tool's output directory, as served under `/downloads`.
    pub fn outputs_root(&self) -> PathBuf {
        self.root.join(OUTPUTS_DIR)
    }

    /// Resolve (and create) a tool's partition.
    pub fn tool_dirs(&self, tool: &str) -> Result<ToolDirs> {
        tool_dirs(&self.root, tool)
    }

    /// Scratch root for `tool`'s running conversions.
    pub fn work_dir(&self, tool: &str) -> Result<PathBuf> {
        work_dir(&self.root, tool)
    }

    /// Path inside `tool`'s output directory that is free at the moment of the check.
    ///
    /// Nothing is reserved; prefer [`Storage::reserve_output_path`] when the
    /// path is about to be written.
    pub fn build_output_path(&self, base: &str, extension: &str, tool: &str) -> Result<PathBuf> {
        let dirs = self.tool_dirs(tool)?;
        let name = unique_filename(&dirs.output_dir, base, extension, self.max_name_attempts)?;
        Ok(dirs.output_dir.join(name))
    }

    /// Claim a free path inside `tool`'s output directory.
    ///
    /// An empty placeholder is created at the returned path.
    pub fn reserve_output_path(&self, base: &str, extension: &str, tool: &str) -> Result<PathBuf> {
        let dirs = self.tool_dirs(tool)?;
        let name =
            reserve_unique_filename(&dirs.output_dir, base, extension, self.max_name_attempts)?;
        let path = dirs.output_dir.join(name);
        tracing::debug!(tool, path = %path.display(), "output path reserved");
        Ok(path)
    }

    /// Stream an upload into `tool`'s upload directory under its original name.
    pub async fn save_upload<S, E>(&self, tool: &str, filename: &str, body: S) -> Result<StoredUpload>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Into<Error>,
    {
        let dirs = self.tool_dirs(tool)?;
        let (path, size) = write_upload(&dirs.upload_dir, filename, body).await?;
        Ok(StoredUpload {
            original_name: filename.to_string(),
            path,
            size,
        })
    }

    /// Path of an existing output, if `filename` names a file in `tool`'s output directory.
    pub fn find_output(&self, tool: &str, filename: &str) -> Result<Option<PathBuf>> {
        let filename = crate::fs::naming::sanitize_filename(filename)?;
        let dirs = self.tool_dirs(tool)?;
        let path = dirs.output_dir.join(filename);
        Ok(path.is_file().then_some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::{Arc, Barrier};
    use tokio_test::assert_ok;

    fn storage(root: &Path) -> Storage {
        Storage::new(root, DEFAULT_MAX_NAME_ATTEMPTS)
    }

    #[test]
    fn test_build_output_path_report_example() {
        let root = tempfile::tempdir().unwrap();
        let storage = storage(root.path());

        let first = storage
            .build_output_path("report", ".pdf", "pdf_to_word")
            .unwrap();
        assert_eq!(first, root.path().join("outputs/pdf_to_word/report.pdf"));

        std::fs::write(&first, b"%PDF").unwrap();
        let second = storage
            .build_output_path("report", ".pdf", "pdf_to_word")
            .unwrap();
        assert_eq!(second, root.path().join("outputs/pdf_to_word/report(1).pdf"));
    }

    #[test]
    fn test_build_output_path_repeats_without_write() {
        let root = tempfile::tempdir().unwrap();
        let storage = storage(root.path());

        let a = storage.build_output_path("scan", ".jpg", "bw_converter").unwrap();
        let b = storage.build_output_path("scan", ".jpg", "bw_converter").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_output_path_simultaneous_calls_collide() {
        let root = tempfile::tempdir().unwrap();
        let storage = Arc::new(storage(root.path()));
        std::fs::write(
            storage.tool_dirs("bw_converter").unwrap().output_dir.join("scan.jpg"),
            b"",
        )
        .unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let storage = Arc::clone(&storage);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    storage.build_output_path("scan", ".jpg", "bw_converter")
                })
            })
            .collect();
        let paths: Vec<PathBuf> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        // Nothing is written between the checks, so both callers get the same name.
        let expected = root.path().join("outputs/bw_converter/scan(1).jpg");
        assert_eq!(paths, vec![expected.clone(), expected]);
    }

    #[test]
    fn test_reserve_output_path_never_repeats() {
        let root = tempfile::tempdir().unwrap();
        let storage = storage(root.path());

        let a = storage.reserve_output_path("scan", ".jpg", "bw_converter").unwrap();
        let b = storage.reserve_output_path("scan", ".jpg", "bw_converter").unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }

    #[tokio::test]
    async fn test_save_upload_into_partition() {
        let root = tempfile::tempdir().unwrap();
        let storage = storage(root.path());
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"hello"))]);

        let stored = assert_ok!(storage.save_upload("text_to_speech", "speech.txt", body).await);
        assert_eq!(stored.path, root.path().join("uploads/text_to_speech/speech.txt"));
        assert_eq!(stored.size, 5);
        assert_eq!(stored.stem(), "speech");
    }

    #[test]
    fn test_find_output() {
        let root = tempfile::tempdir().unwrap();
        let storage = storage(root.path());
        let path = storage.reserve_output_path("a", ".pdf", "merge_pdf").unwrap();

        assert_eq!(storage.find_output("merge_pdf", "a.pdf").unwrap(), Some(path));
        assert_eq!(storage.find_output("merge_pdf", "b.pdf").unwrap(), None);
        assert!(storage.find_output("merge_pdf", "../a.pdf").is_err());
    }
}
