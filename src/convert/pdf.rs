//! PDF page operations built on qpdf, cpdf, poppler and img2pdf.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::convert::{
    ensure_produced, move_into_place, CommandRunner, Converter, Job, JobOptions, NumberPosition,
    Outcome,
};
use crate::error::{Error, Result};
use crate::fs::Storage;

/// Distance of stamped page numbers from the page edge, in points.
const NUMBER_MARGIN: &str = "15";

fn os_args(parts: &[&str]) -> Vec<OsString> {
    parts.iter().map(OsString::from).collect()
}

/// Stamps page numbers with cpdf.
pub struct PageNumberer {
    runner: CommandRunner,
    cpdf: String,
}

impl PageNumberer {
    pub fn new(runner: CommandRunner, cpdf: String) -> Self {
        Self { runner, cpdf }
    }
}

/// cpdf arguments stamping `<prefix><page>` at `position`.
fn page_number_args(
    input: &Path,
    output: &Path,
    position: NumberPosition,
    prefix: Option<&str>,
) -> Vec<OsString> {
    let text = format!("{}%Page", prefix.unwrap_or(""));
    let edge = match position {
        NumberPosition::Top => "-top",
        NumberPosition::Bottom => "-bottom",
    };

    let mut args = os_args(&["-add-text"]);
    args.push(text.into());
    args.extend(os_args(&[edge, NUMBER_MARGIN, "-font", "Helvetica", "-font-size", "10"]));
    args.push(input.as_os_str().to_owned());
    args.push("-o".into());
    args.push(output.as_os_str().to_owned());
    args
}

#[async_trait]
impl Converter for PageNumberer {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let (position, prefix) = match &job.options {
            JobOptions::PageNumbers { position, prefix } => (*position, prefix.as_deref()),
            _ => (NumberPosition::Bottom, None),
        };

        let args = page_number_args(job.input()?, &job.output, position, prefix);
        self.runner.run(&self.cpdf, &args).await?;
        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}

/// Concatenates PDFs in upload order with qpdf.
pub struct PdfMerger {
    runner: CommandRunner,
    qpdf: String,
}

impl PdfMerger {
    pub fn new(runner: CommandRunner, qpdf: String) -> Self {
        Self { runner, qpdf }
    }
}

fn merge_args(inputs: &[PathBuf], output: &Path) -> Vec<OsString> {
    let mut args = os_args(&["--empty", "--pages"]);
    args.extend(inputs.iter().map(|p| p.as_os_str().to_owned()));
    args.push("--".into());
    args.push(output.as_os_str().to_owned());
    args
}

#[async_trait]
impl Converter for PdfMerger {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        if job.inputs.is_empty() {
            return Err(Error::BadRequest("No files provided".into()));
        }

        let args = merge_args(&job.inputs, &job.output);
        self.runner.run(&self.qpdf, &args).await?;
        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}

/// Extracts an inclusive page range with qpdf.
pub struct PdfSplitter {
    runner: CommandRunner,
    qpdf: String,
}

impl PdfSplitter {
    pub fn new(runner: CommandRunner, qpdf: String) -> Self {
        Self { runner, qpdf }
    }

    async fn page_count(&self, input: &Path) -> Result<u32> {
        let mut args = os_args(&["--show-npages"]);
        args.push(input.as_os_str().to_owned());
        let stdout = self.runner.run(&self.qpdf, &args).await?;
        parse_page_count(&stdout)
    }
}

/// Parse `qpdf --show-npages` output.
pub fn parse_page_count(stdout: &str) -> Result<u32> {
    stdout
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::Conversion(format!("Unexpected page count output: {:?}", stdout.trim())))
}

/// Check `start..=end` against a document of `total` pages (1-based).
pub fn validate_page_range(start: u32, end: u32, total: u32) -> Result<()> {
    if start < 1 || end > total || start > end {
        return Err(Error::InvalidPageRange { start, end, total });
    }
    Ok(())
}

#[async_trait]
impl Converter for PdfSplitter {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let (start, end) = match job.options {
            JobOptions::PageRange { start, end } => (start, end),
            _ => return Err(Error::BadRequest("start_page and end_page are required".into())),
        };

        let input = job.input()?;
        let total = self.page_count(input).await?;
        validate_page_range(start, end, total)?;

        let mut args: Vec<OsString> = vec![input.as_os_str().to_owned()];
        args.extend(os_args(&["--pages", "."]));
        args.push(format!("{}-{}", start, end).into());
        args.push("--".into());
        args.push(job.output.as_os_str().to_owned());

        self.runner.run(&self.qpdf, &args).await?;
        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}

/// Renders every page to JPEG and zips them; the first page is also kept as a preview.
pub struct PdfToJpg {
    runner: CommandRunner,
    pdftoppm: String,
    zip: String,
    dpi: u32,
    storage: Storage,
}

impl PdfToJpg {
    pub fn new(
        runner: CommandRunner,
        pdftoppm: String,
        zip: String,
        dpi: u32,
        storage: Storage,
    ) -> Self {
        Self {
            runner,
            pdftoppm,
            zip,
            dpi,
            storage,
        }
    }
}

/// Files in `dir` with `extension`, sorted by name.
///
/// pdftoppm zero-pads page numbers, so name order is page order.
pub(crate) fn collect_pages(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut pages: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect();
    pages.sort();
    Ok(pages)
}

#[async_trait]
impl Converter for PdfToJpg {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let input = job.input()?;
        let scratch = job.scratch_dir()?;
        let pages_dir = scratch.path().join("pages");
        tokio::fs::create_dir_all(&pages_dir).await?;

        let mut args = os_args(&["-jpeg", "-r"]);
        args.push(self.dpi.to_string().into());
        args.push(input.as_os_str().to_owned());
        args.push(pages_dir.join("page").into_os_string());
        self.runner.run(&self.pdftoppm, &args).await?;

        let pages = collect_pages(&pages_dir, "jpg")?;
        let first = pages
            .first()
            .cloned()
            .ok_or_else(|| Error::Conversion("PDF rendered no pages".into()))?;
        tracing::debug!(pages = pages.len(), "pages rendered");

        let archive = scratch.path().join("pages.zip");
        let mut zip_args = os_args(&["-j", "-q"]);
        zip_args.push(archive.as_os_str().to_owned());
        zip_args.extend(pages.iter().map(|p| p.as_os_str().to_owned()));
        self.runner.run(&self.zip, &zip_args).await?;

        move_into_place(&archive, &job.output).await?;
        ensure_produced(&job.output).await?;

        let preview = self
            .storage
            .reserve_output_path(&job.base_name, ".jpg", job.tool.as_str())?;
        if let Err(e) = tokio::fs::copy(&first, &preview).await {
            tracing::warn!(path = %preview.display(), error = %e, "could not write preview");
            let _ = tokio::fs::remove_file(&preview).await;
        }

        Ok(Outcome::Written)
    }
}

/// Wraps a JPEG into a PDF without re-encoding.
pub struct JpgToPdf {
    runner: CommandRunner,
    img2pdf: String,
}

impl JpgToPdf {
    pub fn new(runner: CommandRunner, img2pdf: String) -> Self {
        Self { runner, img2pdf }
    }
}

#[async_trait]
impl Converter for JpgToPdf {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let mut args: Vec<OsString> = vec![job.input()?.as_os_str().to_owned()];
        args.push("-o".into());
        args.push(job.output.as_os_str().to_owned());

        self.runner.run(&self.img2pdf, &args).await?;
        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}
