use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use convertd::config::{ServerConfig, Tool};
use convertd::convert::{CompressionStats, LanguageResolver, StaticCatalog};
use convertd::{create_router, AppState, Converter, ConverterRegistry, Error, Job, Outcome, Result, Storage};

const BOUNDARY: &str = "convertd-test-boundary";

/// Writes the first input (or a fixed payload) to the output.
struct CopyFirst;

#[async_trait]
impl Converter for CopyFirst {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let data = match job.inputs.first() {
            Some(input) => tokio::fs::read(input).await?,
            None => b"ID3 fake audio".to_vec(),
        };
        tokio::fs::write(&job.output, data).await?;
        Ok(Outcome::Written)
    }
}

/// Fails like a crashed external program.
struct Broken;

#[async_trait]
impl Converter for Broken {
    async fn convert(&self, _job: &Job) -> Result<Outcome> {
        Err(Error::ToolFailed {
            program: "soffice".into(),
            message: "source file could not be loaded".into(),
        })
    }
}

/// Halves the input.
struct HalfSize;

#[async_trait]
impl Converter for HalfSize {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let data = tokio::fs::read(job.input()?).await?;
        let half = &data[..data.len() / 2];
        tokio::fs::write(&job.output, half).await?;
        Ok(Outcome::Compressed(CompressionStats {
            original: data.len() as u64,
            compressed: half.len() as u64,
        }))
    }
}

fn setup() -> (TempDir, Router) {
    let root = TempDir::new().unwrap();

    let mut registry = ConverterRegistry::new();
    for tool in Tool::ALL {
        registry.insert(tool, Arc::new(CopyFirst));
    }
    registry
        .insert(Tool::ExcelToPdf, Arc::new(Broken))
        .insert(Tool::PdfCompress, Arc::new(HalfSize))
        .set_languages(Arc::new(LanguageResolver::new(
            Arc::new(StaticCatalog::new([("en", "English"), ("fr", "French")])),
            "en",
        )));

    let state = AppState::new(
        Storage::new(root.path(), 100),
        Url::parse("http://localhost:8000/downloads").unwrap(),
        registry,
        "Test Tools",
    );
    let router = create_router(state, &ServerConfig::default());
    (root, router)
}

enum Part<'a> {
    File(&'a str, &'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn output_names(root: &Path, tool: &str) -> Vec<String> {
    dir_names(&root.join("outputs").join(tool))
}

#[tokio::test]
async fn test_repeated_conversion_gets_numbered_name() {
    let (root, router) = setup();
    let upload = [Part::File("file", "report.docx", b"PK fake docx")];

    let (status, first) = send_json(&router, multipart_request("/word-to-pdf", &upload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "success");
    assert_eq!(first["message"], "Converted successfully!");
    assert_eq!(first["file_name"], "report.pdf");
    assert_eq!(
        first["download_link"],
        "http://localhost:8000/downloads/word_to_pdf/report.pdf"
    );

    let (status, second) = send_json(&router, multipart_request("/word-to-pdf/", &upload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["file_name"], "report(1).pdf");

    assert_eq!(
        output_names(root.path(), "word_to_pdf"),
        vec!["report(1).pdf", "report.pdf"]
    );
    assert_eq!(
        std::fs::read(root.path().join("uploads/word_to_pdf/report.docx")).unwrap(),
        b"PK fake docx"
    );
}

#[tokio::test]
async fn test_fixed_and_derived_names() {
    let (_root, router) = setup();

    let (_, merged) = send_json(
        &router,
        multipart_request(
            "/merge-pdf",
            &[
                Part::File("files", "a.pdf", b"%PDF a"),
                Part::File("files", "b.pdf", b"%PDF b"),
            ],
        ),
    )
    .await;
    assert_eq!(merged["file_name"], "merged-file.pdf");

    let (_, numbered) = send_json(
        &router,
        multipart_request(
            "/add-page-number",
            &[
                Part::File("file", "thesis.pdf", b"%PDF"),
                Part::Text("position", "top"),
            ],
        ),
    )
    .await;
    assert_eq!(numbered["file_name"], "thesis_numbered.pdf");

    let (_, split) = send_json(
        &router,
        multipart_request(
            "/split-pdf",
            &[
                Part::File("file", "book.pdf", b"%PDF"),
                Part::Text("start_page", "2"),
                Part::Text("end_page", "5"),
            ],
        ),
    )
    .await;
    assert_eq!(split["file_name"], "book_pages_2_to_5.pdf");

    let (_, bw) = send_json(
        &router,
        multipart_request("/bw-converter", &[Part::File("file", "Photo.PNG", b"png")]),
    )
    .await;
    assert_eq!(bw["file_name"], "Photo.png");
}

#[tokio::test]
async fn test_rejected_extension_stores_nothing() {
    let (root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request("/word-to-pdf", &[Part::File("file", "notes.txt", b"hi")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Only .doc, .docx files are allowed");
    assert!(!root.path().join("uploads/word_to_pdf/notes.txt").exists());
}

#[tokio::test]
async fn test_dots_inside_filename_are_kept() {
    let (root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request(
            "/pdf-to-word",
            &[Part::File("file", "Q1..Q2 report.pdf", b"%PDF quarters")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_name"], "Q1..Q2 report.docx");
    assert_eq!(
        std::fs::read(root.path().join("uploads/pdf_to_word/Q1..Q2 report.pdf")).unwrap(),
        b"%PDF quarters"
    );
}

#[tokio::test]
async fn test_rejected_request_removes_earlier_uploads() {
    let (root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request(
            "/merge-pdf",
            &[
                Part::File("files", "a.pdf", b"%PDF a"),
                Part::File("files", "b.txt", b"not a pdf"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only .pdf files are allowed");
    assert!(dir_names(&root.path().join("uploads/merge_pdf")).is_empty());
    assert!(output_names(root.path(), "merge_pdf").is_empty());
}

#[tokio::test]
async fn test_empty_upload_rejected() {
    let (_root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request("/pdf-to-word", &[Part::File("file", "empty.pdf", b"")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Empty file");
}

#[tokio::test]
async fn test_missing_file_is_bad_request() {
    let (_root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request("/pdf-to-word", &[Part::Text("note", "no file here")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file provided");
}

#[tokio::test]
async fn test_failed_conversion_releases_reservation() {
    let (root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request("/excel-to-pdf", &[Part::File("file", "sheet.xlsx", b"PK")]),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("soffice failed"));
    assert!(output_names(root.path(), "excel_to_pdf").is_empty());
}

#[tokio::test]
async fn test_download_routes() {
    let (_root, router) = setup();
    send(
        &router,
        multipart_request("/jpg-to-pdf", &[Part::File("file", "scan.jpg", b"%PDF scan")]),
    )
    .await;

    let response = router
        .clone()
        .oneshot(get("/jpg-to-pdf/file/scan.pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"scan.pdf\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"%PDF scan");

    let (status, body) = send(&router, get("/downloads/jpg_to_pdf/scan.pdf")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"%PDF scan");

    let (status, body) = send_json(&router, get("/jpg-to-pdf/file/missing.pdf")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "File not found");
}

/// `<uuid>_<voice>_<language>.mp3` split into its id and the rest.
fn speech_name(name: &str) -> (uuid::Uuid, &str) {
    let (id, rest) = name.split_at(36);
    (uuid::Uuid::parse_str(id).unwrap(), rest)
}

#[tokio::test]
async fn test_text_to_speech() {
    let (root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request(
            "/text-to-speech",
            &[
                Part::Text(
                    "text",
                    "Bonjour à tous, je voudrais écouter ce texte lu à voix haute \
                     pendant que je prépare le dîner ce soir.",
                ),
                Part::Text("gender", "male"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let name = body["file_name"].as_str().unwrap();
    assert_eq!(speech_name(name).1, "_male_fr.mp3");
    assert!(root.path().join("outputs/text_to_speech").join(name).exists());

    let (status, body) = send_json(
        &router,
        multipart_request(
            "/text-to-speech",
            &[
                Part::File("file", "speech.txt", b"Hello again"),
                Part::Text("language", "en"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(speech_name(body["file_name"].as_str().unwrap()).1, "_female_en.mp3");

    let (status, body) = send_json(
        &router,
        multipart_request(
            "/text-to-speech",
            &[Part::Text("text", "Hallo"), Part::Text("language", "de")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid language code. Supported: en, fr");

    let (status, body) = send_json(
        &router,
        multipart_request(
            "/text-to-speech",
            &[
                Part::Text("text", "Hello"),
                Part::File("file", "speech.txt", b"Hello again"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Provide either text OR .txt file, not both.");

    let (status, body) = send_json(&router, get("/text-to-speech/languages")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["supported_languages"]["fr"], "French");
}

#[tokio::test]
async fn test_compress_batch_reports_each_file() {
    let (_root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request(
            "/pdf-compress/batch",
            &[
                Part::File("files", "big.pdf", b"0123456789"),
                Part::File("files", "readme.txt", b"not a pdf"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["file_name"], "big.pdf");
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["details"]["reduction"], "50.0%");
    assert_eq!(results[1]["file_name"], "readme.txt");
    assert_eq!(results[1]["status"], "error");
    assert_eq!(results[1]["error"], "Only .pdf files are allowed");
}

#[tokio::test]
async fn test_compress_batch_skips_bad_filename() {
    let (root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request(
            "/pdf-compress/batch",
            &[
                Part::File("files", "nested/evil.pdf", b"0123"),
                Part::File("files", "good.pdf", b"01234567"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["file_name"], "good.pdf");
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[1]["file_name"], "nested/evil.pdf");
    assert_eq!(results[1]["status"], "error");
    assert!(results[1]["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid filename"));
    assert_eq!(output_names(root.path(), "pdf_compress"), vec!["good.pdf"]);
}

#[tokio::test]
async fn test_single_compress_has_details() {
    let (_root, router) = setup();

    let (status, body) = send_json(
        &router,
        multipart_request("/pdf-compress", &[Part::File("file", "doc.pdf", b"0123")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["original_size"], "0.00 KB");
    assert_eq!(body["details"]["reduction"], "50.0%");
}

#[tokio::test]
async fn test_service_endpoints() {
    let (_root, router) = setup();

    let (status, body) = send_json(&router, get("/api/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Test Tools running successfully!");

    let (status, body) = send_json(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Test Tools");
}

#[tokio::test]
async fn test_non_multipart_body_is_json_error() {
    let (_root, router) = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/pdf-to-word")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send_json(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}
