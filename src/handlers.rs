use std::path::PathBuf;

use actix_web::http::header;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use url::Url;

use crate::error::DownloadError;
use crate::extractor::{Extractor, TARGET_EXT};
use crate::state::AppState;
use crate::stream;
use crate::util;
use crate::workspace::Workspace;

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

/// A finished file, ready to stream.
struct Prepared {
    title: String,
    path: PathBuf,
    size: u64,
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "service": "Media Fetch Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /": "Health check",
            "POST /download": "Download a video from a supported platform and return it as mp4 (body: {url})"
        }
    }))
}

/// Give the produced file the target extension, renaming it in place if needed.
async fn ensure_extension(path: PathBuf) -> Result<PathBuf, DownloadError> {
    if path.extension().and_then(|e| e.to_str()) == Some(TARGET_EXT) {
        return Ok(path);
    }
    let renamed = path.with_extension(TARGET_EXT);
    tokio::fs::rename(&path, &renamed).await.map_err(|e| {
        DownloadError::fs(
            format!("Failed to rename {} to {}", path.display(), renamed.display()),
            e,
        )
    })?;
    log::debug!("[DOWNLOAD] Renamed {} -> {}", path.display(), renamed.display());
    Ok(renamed)
}

async fn prepare(
    extractor: &dyn Extractor,
    url: &Url,
    workspace: &Workspace,
) -> Result<Prepared, DownloadError> {
    let artifact = extractor.fetch(url, workspace.path()).await?;
    let title = util::sanitize_filename(&artifact.title);
    let path = ensure_extension(artifact.path).await?;

    let meta = tokio::fs::metadata(&path).await.map_err(|e| {
        DownloadError::fs(format!("Output file missing: {}", path.display()), e)
    })?;

    Ok(Prepared {
        title,
        path,
        size: meta.len(),
    })
}

pub async fn download(
    req: web::Json<DownloadRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, DownloadError> {
    // Nothing touches the filesystem until the URL has passed.
    let url = util::validate_url(&req.url)?;
    log::info!("[DOWNLOAD] Request: url={}", url);

    let workspace = Workspace::create(&state.config.temp_root)?;
    let prepared = match prepare(state.extractor.as_ref(), &url, &workspace).await {
        Ok(p) => p,
        Err(e) => {
            workspace.cleanup();
            return Err(e);
        }
    };

    log::info!(
        "[DOWNLOAD] Completed; streaming {} ({} bytes)",
        prepared.path.display(),
        prepared.size
    );

    // The body owns the workspace; it is removed when the body finishes or is dropped.
    let body = stream::file_stream(prepared.path, workspace);

    Ok(HttpResponse::Ok()
        .content_type("video/mp4")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}.{}", prepared.title, TARGET_EXT),
        ))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .no_chunking(prepared.size)
        .streaming(body))
}
