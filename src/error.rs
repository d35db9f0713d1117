use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Everything that can go wrong while serving `POST /download`.
///
/// All variants are reported to the caller as `400 {"detail": ...}`.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Bad request body, malformed URL, or a host outside the allow-list.
    #[error("{0}")]
    Validation(String),

    /// yt-dlp (or its ffmpeg post-processing) failed.
    #[error("{0}")]
    Extraction(String),

    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub fn fs(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            context: context.into(),
            source,
        }
    }
}

impl ResponseError for DownloadError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        log::warn!("[DOWNLOAD] Failed: {}", self);
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "detail": self.to_string()
        }))
    }
}
