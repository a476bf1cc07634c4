//! PDF compression: run several strategies, keep the smallest result.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;

use crate::convert::{CommandRunner, Converter, Job, Outcome};
use crate::error::Result;

const KIB: f64 = 1024.0;
const MIB: u64 = 1024 * 1024;

/// Sizes before and after compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionStats {
    pub original: u64,
    pub compressed: u64,
}

impl CompressionStats {
    /// Percentage saved, never negative.
    pub fn reduction(&self) -> f64 {
        if self.original == 0 {
            return 0.0;
        }
        let saved = self.original as f64 - self.compressed as f64;
        (saved / self.original as f64 * 100.0).max(0.0)
    }
}

impl Serialize for CompressionStats {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("CompressionStats", 3)?;
        s.serialize_field("original_size", &format_size(self.original))?;
        s.serialize_field("compressed_size", &format_size(self.compressed))?;
        s.serialize_field("reduction", &format!("{:.1}%", self.reduction()))?;
        s.end()
    }
}

/// Human-readable size: MB above one mebibyte, KB otherwise.
pub fn format_size(bytes: u64) -> String {
    if bytes > MIB {
        format!("{:.2} MB", bytes as f64 / KIB / KIB)
    } else {
        format!("{:.2} KB", bytes as f64 / KIB)
    }
}

/// One compression strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    GhostscriptEbook,
    GhostscriptScreen,
    QpdfRecompress,
}

impl Strategy {
    const ALL: [Strategy; 3] = [
        Strategy::GhostscriptEbook,
        Strategy::GhostscriptScreen,
        Strategy::QpdfRecompress,
    ];

    fn file_name(&self) -> &'static str {
        match self {
            Strategy::GhostscriptEbook => "gs_ebook.pdf",
            Strategy::GhostscriptScreen => "gs_screen.pdf",
            Strategy::QpdfRecompress => "qpdf.pdf",
        }
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self {
            Strategy::GhostscriptEbook => {
                for flag in [
                    "-sDEVICE=pdfwrite",
                    "-dCompatibilityLevel=1.5",
                    "-dPDFSETTINGS=/ebook",
                    "-dNOPAUSE",
                    "-dQUIET",
                    "-dBATCH",
                    "-dDetectDuplicateImages=true",
                    "-dCompressFonts=true",
                    "-dSubsetFonts=true",
                    "-dOptimize=true",
                ] {
                    args.push(flag.into());
                }
                args.push(format!("-sOutputFile={}", output.display()).into());
                args.push(input.as_os_str().to_owned());
            }
            Strategy::GhostscriptScreen => {
                for flag in [
                    "-sDEVICE=pdfwrite",
                    "-dCompatibilityLevel=1.4",
                    "-dPDFSETTINGS=/screen",
                    "-dNOPAUSE",
                    "-dQUIET",
                    "-dBATCH",
                    "-dOptimize=true",
                ] {
                    args.push(flag.into());
                }
                args.push(format!("-sOutputFile={}", output.display()).into());
                args.push(input.as_os_str().to_owned());
            }
            Strategy::QpdfRecompress => {
                for flag in [
                    "--recompress-flate",
                    "--compression-level=9",
                    "--object-streams=generate",
                    "--optimize-images",
                ] {
                    args.push(flag.into());
                }
                args.push(input.as_os_str().to_owned());
                args.push(output.as_os_str().to_owned());
            }
        }
        args
    }
}

/// Runs every strategy and keeps the smallest successful output.
pub struct PdfCompressor {
    runner: CommandRunner,
    ghostscript: String,
    qpdf: String,
}

impl PdfCompressor {
    pub fn new(runner: CommandRunner, ghostscript: String, qpdf: String) -> Self {
        Self {
            runner,
            ghostscript,
            qpdf,
        }
    }

    fn program(&self, strategy: Strategy) -> &str {
        match strategy {
            Strategy::GhostscriptEbook | Strategy::GhostscriptScreen => &self.ghostscript,
            Strategy::QpdfRecompress => &self.qpdf,
        }
    }

    /// Run one strategy; `None` when it failed or wrote nothing.
    async fn attempt(&self, strategy: Strategy, input: &Path, scratch: &Path) -> Option<(PathBuf, u64)> {
        let output = scratch.join(strategy.file_name());
        let args = strategy.args(input, &output);

        if let Err(e) = self.runner.run(self.program(strategy), &args).await {
            tracing::debug!(?strategy, error = %e, "compression strategy failed");
            return None;
        }

        match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => Some((output, meta.len())),
            _ => None,
        }
    }
}

/// The smallest candidate, first one winning ties.
fn select_smallest(candidates: Vec<(PathBuf, u64)>) -> Option<(PathBuf, u64)> {
    candidates
        .into_iter()
        .reduce(|best, next| if next.1 < best.1 { next } else { best })
}

#[async_trait]
impl Converter for PdfCompressor {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let input = job.input()?;
        let original = tokio::fs::metadata(input).await?.len();
        let scratch = job.scratch_dir()?;

        let attempts = Strategy::ALL
            .iter()
            .map(|strategy| self.attempt(*strategy, input, scratch.path()));
        let candidates: Vec<_> = join_all(attempts).await.into_iter().flatten().collect();

        let compressed = match select_smallest(candidates) {
            Some((best, size)) => {
                tokio::fs::copy(&best, &job.output).await?;
                size
            }
            None => {
                tracing::warn!(path = %input.display(), "no compression strategy succeeded, keeping original");
                tokio::fs::copy(input, &job.output).await?;
                original
            }
        };

        let stats = CompressionStats {
            original,
            compressed,
        };
        tracing::info!(
            original,
            compressed,
            reduction = %format!("{:.1}%", stats.reduction()),
            "pdf compressed"
        );
        Ok(Outcome::Compressed(stats))
    }
}
