//! Conversion backends.
//!
//! Every tool is served by a [`Converter`]. Converters receive a [`Job`]
//! naming the stored uploads and an already reserved output path, and must
//! leave the finished file at that path. Most of them drive an external
//! program through [`CommandRunner`]; raster work uses the `image` crate.

pub mod compress;
pub mod image_ops;
pub mod office;
pub mod pdf;
pub mod process;
pub mod speech;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::{Config, Tool};
use crate::error::{Error, Result};
use crate::fs::{ensure_dir, Storage};

pub use compress::{CompressionStats, PdfCompressor};
pub use image_ops::{BackgroundRemover, BwConverter, WhiteBackground};
pub use office::{OfficeConverter, OfficeTarget, PdfToExcel};
pub use pdf::{JpgToPdf, PageNumberer, PdfMerger, PdfSplitter, PdfToJpg};
pub use process::CommandRunner;
pub use speech::{
    GttsCatalog, LanguageCatalog, LanguageResolver, SpeechRequest, SpeechSynthesizer,
    StaticCatalog, Voice,
};

/// Where page numbers are stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberPosition {
    #[default]
    Bottom,
    Top,
}

impl NumberPosition {
    /// Lenient parse: anything but `top` means bottom.
    pub fn from_request(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "top" => NumberPosition::Top,
            _ => NumberPosition::Bottom,
        }
    }
}

/// Tool-specific request parameters.
#[derive(Debug, Clone, Default)]
pub enum JobOptions {
    #[default]
    None,
    PageRange {
        start: u32,
        end: u32,
    },
    PageNumbers {
        position: NumberPosition,
        prefix: Option<String>,
    },
    Speech(SpeechRequest),
}

/// One conversion request.
#[derive(Debug, Clone)]
pub struct Job {
    pub tool: Tool,
    /// Stored uploads, in request order.
    pub inputs: Vec<PathBuf>,
    /// Reserved output path; exists as an empty placeholder.
    pub output: PathBuf,
    /// Base name the output was derived from.
    pub base_name: String,
    pub options: JobOptions,
    /// Where scratch directories are created.
    pub work_dir: PathBuf,
}

impl Job {
    /// The single input of a one-file tool.
    pub fn input(&self) -> Result<&Path> {
        self.inputs
            .first()
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::BadRequest("No file provided".into()))
    }

    /// Fresh scratch directory under `work_dir`, removed on drop.
    pub fn scratch_dir(&self) -> Result<TempDir> {
        ensure_dir(&self.work_dir)?;
        Ok(tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.work_dir)?)
    }
}

/// What a conversion produced besides the output file.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Written,
    Compressed(CompressionStats),
}

/// A conversion backend for one tool.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `job.inputs` into `job.output`.
    async fn convert(&self, job: &Job) -> Result<Outcome>;
}

/// Converters keyed by tool.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<Tool, Arc<dyn Converter>>,
    languages: Option<Arc<LanguageResolver>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `converter` for `tool`, replacing any previous one.
    pub fn insert(&mut self, tool: Tool, converter: Arc<dyn Converter>) -> &mut Self {
        self.converters.insert(tool, converter);
        self
    }

    pub fn set_languages(&mut self, languages: Arc<LanguageResolver>) -> &mut Self {
        self.languages = Some(languages);
        self
    }

    pub fn get(&self, tool: Tool) -> Result<Arc<dyn Converter>> {
        self.converters
            .get(&tool)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Tool '{}' is not available", tool)))
    }

    pub fn languages(&self) -> Result<Arc<LanguageResolver>> {
        self.languages
            .clone()
            .ok_or_else(|| Error::NotFound("Text to speech is not available".into()))
    }

    /// The production backends, driven by external programs.
    pub fn standard(config: &Config, storage: &Storage) -> Self {
        let tools = &config.tools;
        let runner = CommandRunner::new(tools.timeout());
        let office = |target| {
            Arc::new(OfficeConverter::new(
                runner.clone(),
                tools.office_binaries.clone(),
                target,
            )) as Arc<dyn Converter>
        };
        let languages = Arc::new(LanguageResolver::new(
            Arc::new(GttsCatalog::new(runner.clone(), tools.gtts.clone())),
            config.speech.default_language.clone(),
        ));

        let mut registry = Self::new();
        registry
            .insert(Tool::PdfToWord, office(OfficeTarget::Docx))
            .insert(Tool::WordToPdf, office(OfficeTarget::Pdf))
            .insert(Tool::ExcelToPdf, office(OfficeTarget::Pdf))
            .insert(Tool::PptxToPdf, office(OfficeTarget::Pdf))
            .insert(Tool::PdfToPpt, office(OfficeTarget::Pptx))
            .insert(
                Tool::PdfToExcel,
                Arc::new(PdfToExcel::new(runner.clone(), tools)),
            )
            .insert(
                Tool::PdfToJpg,
                Arc::new(PdfToJpg::new(
                    runner.clone(),
                    tools.pdftoppm.clone(),
                    tools.zip.clone(),
                    tools.jpg_dpi,
                    storage.clone(),
                )),
            )
            .insert(
                Tool::JpgToPdf,
                Arc::new(JpgToPdf::new(runner.clone(), tools.img2pdf.clone())),
            )
            .insert(
                Tool::AddPgNo,
                Arc::new(PageNumberer::new(runner.clone(), tools.cpdf.clone())),
            )
            .insert(
                Tool::MergePdf,
                Arc::new(PdfMerger::new(runner.clone(), tools.qpdf.clone())),
            )
            .insert(
                Tool::SplitPdf,
                Arc::new(PdfSplitter::new(runner.clone(), tools.qpdf.clone())),
            )
            .insert(
                Tool::PdfCompress,
                Arc::new(PdfCompressor::new(
                    runner.clone(),
                    tools.ghostscript.clone(),
                    tools.qpdf.clone(),
                )),
            )
            .insert(
                Tool::BgRemove,
                Arc::new(BackgroundRemover::new(runner.clone(), tools.rembg.clone())),
            )
            .insert(
                Tool::BgWhiteAdder,
                Arc::new(WhiteBackground::new(runner.clone(), tools.rembg.clone())),
            )
            .insert(Tool::BwConverter, Arc::new(BwConverter))
            .insert(
                Tool::TextToSpeech,
                Arc::new(SpeechSynthesizer::new(
                    runner.clone(),
                    tools.gtts.clone(),
                    tools.ffmpeg.clone(),
                    Arc::clone(&languages),
                    config.speech.clone(),
                )),
            )
            .set_languages(languages);

        registry
    }
}

/// Move `from` onto `to`, replacing the placeholder there.
pub(crate) async fn move_into_place(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to).await?;
    Ok(())
}

/// Fail unless `path` holds a non-empty file.
pub(crate) async fn ensure_produced(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(Error::Conversion(format!(
            "No output was produced at {}",
            path.display()
        ))),
    }
}
