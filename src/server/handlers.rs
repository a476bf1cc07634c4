//! Request handlers.

use std::path::Path;
use std::time::Instant;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::config::{input_extension, OutputExtension, OutputNaming, Tool};
use crate::convert::{Job, JobOptions, NumberPosition, Outcome, SpeechRequest, Voice};
use crate::error::{Error, Result};
use crate::fs::{download_url, StoredUpload};
use crate::server::form::{ToolForm, Unaccepted};
use crate::server::response::{BatchItem, BatchResponse, ConversionResponse};
use crate::server::AppState;

fn multipart_or_400(multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Multipart> {
    multipart.map_err(|rejection| Error::BadRequest(rejection.body_text()))
}

/// `POST <prefix>`: run one tool on the uploaded file(s).
pub async fn convert(
    state: AppState,
    tool: Tool,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ConversionResponse>> {
    let form = ToolForm::read(
        &state.storage,
        tool,
        multipart_or_400(multipart)?,
        Unaccepted::Reject,
    )
    .await?;

    let mut options = job_options(tool, &form).await?;
    if let JobOptions::Speech(request) = &mut options {
        request.language = state
            .converters
            .languages()?
            .resolve(&request.language, &request.text)
            .await?;
    }
    let inputs: Vec<&StoredUpload> = if tool.takes_many_files() {
        form.uploads.iter().collect()
    } else {
        form.uploads.first().into_iter().collect()
    };
    if inputs.is_empty() && tool != Tool::TextToSpeech {
        return Err(Error::BadRequest("No file provided".into()));
    }

    run_tool(&state, tool, &inputs, options).await.map(Json)
}

/// `POST /pdf-compress/batch`: compress each uploaded PDF independently.
pub async fn compress_batch(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchResponse>> {
    let tool = Tool::PdfCompress;
    let form = ToolForm::read(
        &state.storage,
        tool,
        multipart_or_400(multipart)?,
        Unaccepted::Skip,
    )
    .await?;

    if form.uploads.is_empty() && form.skipped.is_empty() {
        return Err(Error::BadRequest("No file provided".into()));
    }

    let mut results = Vec::with_capacity(form.uploads.len() + form.skipped.len());
    for upload in &form.uploads {
        let item = match run_tool(&state, tool, &[upload], JobOptions::None).await {
            Ok(response) => BatchItem::converted(upload.original_name.clone(), response),
            Err(e) => BatchItem::failed(upload.original_name.clone(), e.to_string()),
        };
        results.push(item);
    }
    for (file_name, reason) in &form.skipped {
        results.push(BatchItem::failed(file_name.clone(), reason.clone()));
    }

    Ok(Json(BatchResponse {
        status: "success",
        results,
    }))
}

/// Tool-specific options from the form's text fields.
async fn job_options(tool: Tool, form: &ToolForm) -> Result<JobOptions> {
    let options = match tool {
        Tool::SplitPdf => {
            let start = page_field(form, "start_page")?;
            let end = page_field(form, "end_page")?;
            JobOptions::PageRange { start, end }
        }
        Tool::AddPgNo => JobOptions::PageNumbers {
            position: NumberPosition::from_request(form.field("position")),
            prefix: form.field("custom_text").map(str::to_string),
        },
        Tool::TextToSpeech => JobOptions::Speech(speech_request(form).await?),
        _ => JobOptions::None,
    };
    Ok(options)
}

fn page_field(form: &ToolForm, name: &str) -> Result<u32> {
    let value = form
        .field(name)
        .ok_or_else(|| Error::BadRequest("start_page and end_page are required".into()))?;
    value
        .parse()
        .map_err(|_| Error::BadRequest(format!("{} must be a positive integer", name)))
}

/// Exactly one of a non-blank `text` field or an uploaded `.txt` file.
async fn speech_request(form: &ToolForm) -> Result<SpeechRequest> {
    let text = match (form.field("text"), form.uploads.first()) {
        (Some(_), Some(_)) => {
            return Err(Error::BadRequest(
                "Provide either text OR .txt file, not both.".into(),
            ))
        }
        (Some(text), None) => text.to_string(),
        (None, Some(upload)) => {
            let bytes = tokio::fs::read(&upload.path).await?;
            String::from_utf8(bytes)
                .map_err(|_| Error::BadRequest("Text file must be UTF-8".into()))?
        }
        (None, None) => return Err(Error::BadRequest("Provide text or a .txt file.".into())),
    };

    Ok(SpeechRequest {
        text,
        voice: Voice::from_request(form.field("gender")),
        language: form.field("language").unwrap_or("auto").to_string(),
    })
}

/// Base name for the output before collision resolution.
fn output_base(tool: Tool, first: Option<&StoredUpload>, options: &JobOptions) -> Result<String> {
    let stem = || {
        first
            .map(StoredUpload::stem)
            .ok_or_else(|| Error::BadRequest("No file provided".into()))
    };

    Ok(match tool.output_naming() {
        OutputNaming::UploadStem => stem()?,
        OutputNaming::UploadStemWithSuffix(suffix) => format!("{}{}", stem()?, suffix),
        OutputNaming::Fixed(base) => base.to_string(),
        OutputNaming::PageRange => match options {
            JobOptions::PageRange { start, end } => {
                format!("{}_pages_{}_to_{}", stem()?, start, end)
            }
            _ => stem()?,
        },
        OutputNaming::Speech => match options {
            JobOptions::Speech(request) => format!(
                "{}_{}_{}",
                Uuid::new_v4(),
                request.voice.as_str(),
                request.language
            ),
            _ => Uuid::new_v4().to_string(),
        },
    })
}

fn output_extension(tool: Tool, first: Option<&StoredUpload>) -> String {
    match tool.output_extension() {
        OutputExtension::Fixed(ext) => ext.to_string(),
        OutputExtension::SameAsInput => first
            .and_then(|upload| input_extension(&upload.original_name))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default(),
    }
}

/// Reserve the output, run the converter and build the response.
///
/// The placeholder is removed again when the conversion fails.
async fn run_tool(
    state: &AppState,
    tool: Tool,
    inputs: &[&StoredUpload],
    options: JobOptions,
) -> Result<ConversionResponse> {
    let first = inputs.first().copied();
    let base_name = output_base(tool, first, &options)?;
    let extension = output_extension(tool, first);
    let converter = state.converters.get(tool)?;
    let work_dir = state.storage.work_dir(tool.as_str())?;

    let output = state
        .storage
        .reserve_output_path(&base_name, &extension, tool.as_str())?;

    let job = Job {
        tool,
        inputs: inputs.iter().map(|upload| upload.path.clone()).collect(),
        output: output.clone(),
        base_name,
        options,
        work_dir,
    };

    let started = Instant::now();
    let outcome = match converter.convert(&job).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&output).await {
                tracing::warn!(path = %output.display(), error = %cleanup, "could not remove placeholder");
            }
            tracing::warn!(tool = %tool, error = %e, "conversion failed");
            return Err(e);
        }
    };

    let file_name = output
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Conversion("Output name is not valid UTF-8".into()))?
        .to_string();
    let link = download_url(&state.download_base, tool.as_str(), &file_name)?;

    tracing::info!(
        tool = %tool,
        file = %file_name,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "conversion finished"
    );

    let mut response = ConversionResponse::success(tool.success_message(), link, file_name);
    if let Outcome::Compressed(stats) = outcome {
        response.details = Some(serde_json::to_value(stats)?);
    }
    Ok(response)
}

/// `GET <prefix>/file/:file_name`: stream a stored output as an attachment.
pub async fn download_file(state: AppState, tool: Tool, file_name: String) -> Result<Response> {
    let path = state
        .storage
        .find_output(tool.as_str(), &file_name)?
        .ok_or_else(|| Error::NotFound("File not found".into()))?;

    let file = tokio::fs::File::open(&path).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&path)),
            (header::CONTENT_DISPOSITION, attachment(&path)),
        ],
        body,
    )
        .into_response())
}

fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn attachment(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .replace('"', "");
    format!("attachment; filename=\"{}\"", name)
}

/// `GET /text-to-speech/languages`.
pub async fn languages(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let languages = state.converters.languages()?.supported().await?;
    Ok(Json(serde_json::json!({ "supported_languages": languages })))
}

/// `GET /api/`.
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": format!("{} running successfully!", state.title)
    }))
}

/// `GET /health`.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = Utc::now() - state.started_at;
    Json(serde_json::json!({
        "status": "healthy",
        "service": &*state.title,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
    }))
}
