//! Office-suite conversions (headless LibreOffice).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use crate::config::ToolsConfig;
use crate::convert::pdf::collect_pages;
use crate::convert::{ensure_produced, move_into_place, CommandRunner, Converter, Job, Outcome};
use crate::error::{Error, Result};

/// Document format produced by the office suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeTarget {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl OfficeTarget {
    pub fn extension(&self) -> &'static str {
        match self {
            OfficeTarget::Pdf => "pdf",
            OfficeTarget::Docx => "docx",
            OfficeTarget::Pptx => "pptx",
            OfficeTarget::Xlsx => "xlsx",
        }
    }

    /// `--convert-to` argument, naming the export filter where one is needed.
    fn convert_to(&self) -> &'static str {
        match self {
            OfficeTarget::Pdf => "pdf",
            OfficeTarget::Docx => "docx:MS Word 2007 XML",
            OfficeTarget::Pptx => "pptx:Impress MS PowerPoint 2007 XML",
            OfficeTarget::Xlsx => "xlsx:Calc MS Excel 2007 XML",
        }
    }
}

/// Import filter needed to open `input` for `target`, if any.
///
/// PDFs open in Draw by default, which cannot export to Writer or Impress
/// formats. CSV needs its separator and encoding spelled out.
fn import_filter(input: &Path, target: OfficeTarget) -> Option<&'static str> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())?;

    match (ext.as_str(), target) {
        ("pdf", OfficeTarget::Docx) => Some("writer_pdf_import"),
        ("pdf", OfficeTarget::Pptx) => Some("impress_pdf_import"),
        ("csv", _) => Some("CSV:44,34,76,1"),
        _ => None,
    }
}

/// Arguments for one headless conversion of `input` into `outdir`.
fn office_args(input: &Path, outdir: &Path, profile: &Url, target: OfficeTarget) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--headless".into(),
        "--norestore".into(),
        "--nolockcheck".into(),
        "--invisible".into(),
    ];
    if let Some(filter) = import_filter(input, target) {
        args.push(format!("--infilter={}", filter).into());
    }
    args.push(format!("-env:UserInstallation={}", profile).into());
    args.push("--convert-to".into());
    args.push(target.convert_to().into());
    args.push("--outdir".into());
    args.push(outdir.as_os_str().to_owned());
    args.push(input.as_os_str().to_owned());
    args
}

/// Locate what the office suite wrote for `input` inside `outdir`.
///
/// The suite names its output after the input stem; when it doesn't, any
/// file with the target extension is taken.
fn find_converted(outdir: &Path, input: &Path, target: OfficeTarget) -> Result<PathBuf> {
    let ext = target.extension();
    if let Some(stem) = input.file_stem() {
        let mut expected = stem.to_owned();
        expected.push(".");
        expected.push(ext);
        let expected = outdir.join(expected);
        if expected.is_file() {
            return Ok(expected);
        }
    }

    let found = std::fs::read_dir(outdir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case(ext))
                    .unwrap_or(false)
        });

    found.ok_or_else(|| {
        Error::Conversion(format!(
            "Office conversion produced no .{} file for {}",
            ext,
            input.display()
        ))
    })
}

/// Run one conversion with the first office binary that works and return the produced file.
///
/// Each run gets its own profile directory so concurrent conversions don't
/// fight over the suite's lock.
async fn convert_with_office(
    runner: &CommandRunner,
    binaries: &[String],
    input: &Path,
    scratch: &Path,
    target: OfficeTarget,
) -> Result<PathBuf> {
    let scratch = tokio::fs::canonicalize(scratch).await?;
    let profile_dir = scratch.join("profile");
    let outdir = scratch.join("out");
    tokio::fs::create_dir_all(&profile_dir).await?;
    tokio::fs::create_dir_all(&outdir).await?;

    let profile = Url::from_directory_path(&profile_dir).map_err(|_| {
        Error::Conversion(format!(
            "Profile path is not absolute: {}",
            profile_dir.display()
        ))
    })?;

    let args = office_args(input, &outdir, &profile, target);
    let used = runner.first_success(binaries, &args).await?;
    tracing::debug!(program = used, target = target.extension(), "office conversion done");

    find_converted(&outdir, input, target)
}

/// Converts a single document with the office suite.
pub struct OfficeConverter {
    runner: CommandRunner,
    binaries: Vec<String>,
    target: OfficeTarget,
}

impl OfficeConverter {
    pub fn new(runner: CommandRunner, binaries: Vec<String>, target: OfficeTarget) -> Self {
        Self {
            runner,
            binaries,
            target,
        }
    }
}

#[async_trait]
impl Converter for OfficeConverter {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let input = tokio::fs::canonicalize(job.input()?).await?;
        let scratch = job.scratch_dir()?;

        let produced = convert_with_office(
            &self.runner,
            &self.binaries,
            &input,
            scratch.path(),
            self.target,
        )
        .await?;

        move_into_place(&produced, &job.output).await?;
        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}

/// Resolution pages are rendered at for OCR.
const OCR_DPI: u32 = 300;

const NO_TEXT: &str = "No text found in PDF. It may be a scanned document.";

/// PDF to spreadsheet: extract the text layer, tabulate it, let the office suite write xlsx.
///
/// PDFs without a text layer are rendered and read with tesseract.
pub struct PdfToExcel {
    runner: CommandRunner,
    pdftotext: String,
    pdftoppm: String,
    tesseract: String,
    office_binaries: Vec<String>,
}

impl PdfToExcel {
    pub fn new(runner: CommandRunner, tools: &ToolsConfig) -> Self {
        Self {
            runner,
            pdftotext: tools.pdftotext.clone(),
            pdftoppm: tools.pdftoppm.clone(),
            tesseract: tools.tesseract.clone(),
            office_binaries: tools.office_binaries.clone(),
        }
    }

    async fn extract_text(&self, input: &Path, scratch: &Path) -> Result<String> {
        let text_path = scratch.join("extracted.txt");
        let mut args: Vec<OsString> = vec!["-layout".into(), "-enc".into(), "UTF-8".into()];
        args.push(input.as_os_str().to_owned());
        args.push(text_path.as_os_str().to_owned());
        self.runner.run(&self.pdftotext, &args).await?;

        Ok(tokio::fs::read_to_string(&text_path).await?)
    }

    /// Render every page and OCR it, one page after another.
    async fn ocr(&self, input: &Path, scratch: &Path) -> Result<String> {
        let pages_dir = scratch.join("ocr");
        tokio::fs::create_dir_all(&pages_dir).await?;

        let mut args: Vec<OsString> =
            vec!["-png".into(), "-r".into(), OCR_DPI.to_string().into()];
        args.push(input.as_os_str().to_owned());
        args.push(pages_dir.join("page").into_os_string());
        self.runner.run(&self.pdftoppm, &args).await?;

        let mut text = String::new();
        for page in collect_pages(&pages_dir, "png")? {
            let args = [page.into_os_string(), OsString::from("stdout")];
            text.push_str(&self.runner.run(&self.tesseract, &args).await?);
            text.push('\n');
        }
        Ok(text)
    }
}

#[async_trait]
impl Converter for PdfToExcel {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let input = job.input()?;
        let scratch = job.scratch_dir()?;

        let mut text = self.extract_text(input, scratch.path()).await?;
        if text.trim().is_empty() {
            text = match self.ocr(input, scratch.path()).await {
                Ok(text) => text,
                Err(Error::ToolNotFound(program)) => {
                    tracing::warn!(%program, "OCR unavailable, scanned PDF left unread");
                    String::new()
                }
                Err(e) => return Err(e),
            };
        }
        if text.trim().is_empty() {
            return Err(Error::BadRequest(NO_TEXT.into()));
        }

        let stem = job.base_name.as_str();
        let csv_path = scratch.path().join(format!("{}.csv", stem));
        tokio::fs::write(&csv_path, text_to_csv(&text)).await?;
        let csv_path = tokio::fs::canonicalize(&csv_path).await?;

        let produced = convert_with_office(
            &self.runner,
            &self.office_binaries,
            &csv_path,
            scratch.path(),
            OfficeTarget::Xlsx,
        )
        .await?;

        move_into_place(&produced, &job.output).await?;
        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}

fn column_gap() -> &'static Regex {
    static GAP: OnceLock<Regex> = OnceLock::new();
    GAP.get_or_init(|| Regex::new(r"\s{2,}|\t").expect("column gap pattern is valid"))
}

/// Cells of one `-layout` line: columns are separated by two or more blanks or a tab.
pub fn split_columns(line: &str) -> Vec<&str> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    column_gap().split(line).collect()
}

/// CSV with one row per non-blank line of `text` and one cell per layout column.
pub fn text_to_csv(text: &str) -> String {
    let mut csv = String::new();
    for cells in text.lines().map(split_columns).filter(|c| !c.is_empty()) {
        let row: Vec<String> = cells
            .iter()
            .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
            .collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}
