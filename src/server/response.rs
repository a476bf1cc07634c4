//! JSON bodies and the error-to-status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::Error;

/// Body of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResponse {
    pub status: &'static str,
    pub message: String,
    pub download_link: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ConversionResponse {
    pub fn success(message: impl Into<String>, download_link: String, file_name: String) -> Self {
        Self {
            status: "success",
            message: message.into(),
            download_link,
            file_name,
            details: None,
        }
    }
}

/// One file's result in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    /// Filename as uploaded.
    pub file_name: String,
    pub status: &'static str,
    pub download_link: Option<String>,
    pub details: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl BatchItem {
    pub fn converted(file_name: String, response: ConversionResponse) -> Self {
        Self {
            file_name,
            status: "success",
            download_link: Some(response.download_link),
            details: response.details,
            error: None,
        }
    }

    pub fn failed(file_name: String, error: impl Into<String>) -> Self {
        Self {
            file_name,
            status: "error",
            download_link: None,
            details: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub status: &'static str,
    pub results: Vec<BatchItem>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl Error {
    /// HTTP status reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ToolNotFound(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::ToolTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::UnsupportedFile("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::InvalidPageRange {
                start: 2,
                end: 9,
                total: 3
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::ToolNotFound("qpdf".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::ToolTimeout {
                program: "gs".into(),
                secs: 120
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            Error::Conversion("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_success_body_omits_empty_details() {
        let body = ConversionResponse::success(
            "Converted successfully!",
            "http://localhost:8000/downloads/word_to_pdf/letter.pdf".into(),
            "letter.pdf".into(),
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["file_name"], "letter.pdf");
        assert!(json.get("details").is_none());
    }
}
