//! Tool definitions: identifiers, routes, accepted inputs and output naming.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const PDF: &[&str] = &["pdf"];
const WORD: &[&str] = &["doc", "docx"];
const EXCEL: &[&str] = &["xlsx", "xls", "xlsm"];
const SLIDES: &[&str] = &["pptx", "ppt"];
const JPEG: &[&str] = &["jpg", "jpeg"];
const CUTOUT_IMAGES: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff"];
const BW_IMAGES: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];
const TEXT: &[&str] = &["txt"];

/// Every conversion the service offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    PdfToWord,
    WordToPdf,
    ExcelToPdf,
    PptxToPdf,
    PdfToPpt,
    PdfToExcel,
    PdfToJpg,
    JpgToPdf,
    AddPgNo,
    MergePdf,
    SplitPdf,
    PdfCompress,
    BgRemove,
    BgWhiteAdder,
    BwConverter,
    TextToSpeech,
}

/// How a tool names its output before collision resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputNaming {
    /// Stem of the (first) uploaded file.
    UploadStem,
    /// Upload stem followed by a fixed suffix that precedes the extension.
    UploadStemWithSuffix(&'static str),
    /// A fixed base name.
    Fixed(&'static str),
    /// `<stem>_pages_<start>_to_<end>`.
    PageRange,
    /// `<uuid>_<voice>_<language>`.
    Speech,
}

/// Extension of the produced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputExtension {
    Fixed(&'static str),
    /// Keep the upload's extension (lower-cased).
    SameAsInput,
}

impl Tool {
    pub const ALL: [Tool; 16] = [
        Tool::PdfToWord,
        Tool::WordToPdf,
        Tool::ExcelToPdf,
        Tool::PptxToPdf,
        Tool::PdfToPpt,
        Tool::PdfToExcel,
        Tool::PdfToJpg,
        Tool::JpgToPdf,
        Tool::AddPgNo,
        Tool::MergePdf,
        Tool::SplitPdf,
        Tool::PdfCompress,
        Tool::BgRemove,
        Tool::BgWhiteAdder,
        Tool::BwConverter,
        Tool::TextToSpeech,
    ];

    /// Storage identifier; also the first path segment of download links.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::PdfToWord => "pdf_to_word",
            Tool::WordToPdf => "word_to_pdf",
            Tool::ExcelToPdf => "excel_to_pdf",
            Tool::PptxToPdf => "pptx_to_pdf",
            Tool::PdfToPpt => "pdf_to_ppt",
            Tool::PdfToExcel => "pdf_to_excel",
            Tool::PdfToJpg => "pdf_to_jpg",
            Tool::JpgToPdf => "jpg_to_pdf",
            Tool::AddPgNo => "add_pg_no",
            Tool::MergePdf => "merge_pdf",
            Tool::SplitPdf => "split_pdf",
            Tool::PdfCompress => "pdf_compress",
            Tool::BgRemove => "bg_remove",
            Tool::BgWhiteAdder => "bg_white_adder",
            Tool::BwConverter => "bw_converter",
            Tool::TextToSpeech => "text_to_speech",
        }
    }

    /// HTTP route prefix.
    pub fn route(&self) -> &'static str {
        match self {
            Tool::PdfToWord => "/pdf-to-word",
            Tool::WordToPdf => "/word-to-pdf",
            Tool::ExcelToPdf => "/excel-to-pdf",
            Tool::PptxToPdf => "/pptx-to-pdf",
            Tool::PdfToPpt => "/pdf-to-ppt",
            Tool::PdfToExcel => "/pdf-to-excel",
            Tool::PdfToJpg => "/pdf-to-jpg",
            Tool::JpgToPdf => "/jpg-to-pdf",
            Tool::AddPgNo => "/add-page-number",
            Tool::MergePdf => "/merge-pdf",
            Tool::SplitPdf => "/split-pdf",
            Tool::PdfCompress => "/pdf-compress",
            Tool::BgRemove => "/remove-bg",
            Tool::BgWhiteAdder => "/white-background",
            Tool::BwConverter => "/bw-converter",
            Tool::TextToSpeech => "/text-to-speech",
        }
    }

    /// Upload extensions accepted, lower-case and without the dot.
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            Tool::PdfToWord
            | Tool::PdfToPpt
            | Tool::PdfToExcel
            | Tool::PdfToJpg
            | Tool::AddPgNo
            | Tool::MergePdf
            | Tool::SplitPdf
            | Tool::PdfCompress => PDF,
            Tool::WordToPdf => WORD,
            Tool::ExcelToPdf => EXCEL,
            Tool::PptxToPdf => SLIDES,
            Tool::JpgToPdf => JPEG,
            Tool::BgRemove | Tool::BgWhiteAdder => CUTOUT_IMAGES,
            Tool::BwConverter => BW_IMAGES,
            Tool::TextToSpeech => TEXT,
        }
    }

    /// Whether `filename` has one of the accepted extensions.
    pub fn accepts(&self, filename: &str) -> bool {
        input_extension(filename)
            .map(|ext| self.accepted_extensions().contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Message returned when an upload is rejected.
    pub fn rejection_message(&self) -> String {
        let list: Vec<String> = self
            .accepted_extensions()
            .iter()
            .map(|e| format!(".{}", e))
            .collect();
        format!("Only {} files are allowed", list.join(", "))
    }

    pub fn output_naming(&self) -> OutputNaming {
        match self {
            Tool::PdfToPpt => OutputNaming::Fixed("converted-slide"),
            Tool::MergePdf => OutputNaming::Fixed("merged-file"),
            Tool::AddPgNo => OutputNaming::UploadStemWithSuffix("_numbered"),
            Tool::SplitPdf => OutputNaming::PageRange,
            Tool::TextToSpeech => OutputNaming::Speech,
            _ => OutputNaming::UploadStem,
        }
    }

    pub fn output_extension(&self) -> OutputExtension {
        match self {
            Tool::PdfToWord => OutputExtension::Fixed(".docx"),
            Tool::PdfToPpt => OutputExtension::Fixed(".pptx"),
            Tool::PdfToExcel => OutputExtension::Fixed(".xlsx"),
            Tool::PdfToJpg => OutputExtension::Fixed(".zip"),
            Tool::BgRemove => OutputExtension::Fixed(".png"),
            Tool::BgWhiteAdder => OutputExtension::Fixed(".jpg"),
            Tool::BwConverter => OutputExtension::SameAsInput,
            Tool::TextToSpeech => OutputExtension::Fixed(".mp3"),
            _ => OutputExtension::Fixed(".pdf"),
        }
    }

    /// Whether the tool takes several uploads in one request.
    pub fn takes_many_files(&self) -> bool {
        matches!(self, Tool::MergePdf)
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Tool::PdfToWord => "PDF converted successfully!",
            Tool::WordToPdf => "Converted successfully!",
            Tool::ExcelToPdf => "Excel converted to PDF successfully!",
            Tool::PptxToPdf => "PPTX converted to PDF successfully!",
            Tool::PdfToPpt => "Converted PDF to PPT successfully!",
            Tool::PdfToExcel => "PDF converted to Excel successfully!",
            Tool::PdfToJpg => "PDF converted into JPG successfully!",
            Tool::JpgToPdf => "JPG file converted into PDF successfully!",
            Tool::AddPgNo => "Page numbers added successfully!",
            Tool::MergePdf => "Successfully merged PDF files!",
            Tool::SplitPdf => "PDF split successfully!",
            Tool::PdfCompress => "PDF compressed successfully!",
            Tool::BgRemove => "Background removed successfully!",
            Tool::BgWhiteAdder => "White background added successfully",
            Tool::BwConverter => "Successfully converted image into B&W format.",
            Tool::TextToSpeech => "Speech generated successfully!",
        }
    }
}

/// Lower-cased extension of `filename`, without the dot.
pub fn input_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Tool::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| format!("Unknown tool: {}", s))
    }
}
