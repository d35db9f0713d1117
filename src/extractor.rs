use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;
use url::Url;

use crate::config::AppConfig;
use crate::error::DownloadError;

pub const TARGET_EXT: &str = "mp4";

const STDERR_TAIL_LINES: usize = 50;

const PROXY_ENV_VARS: &[&str] = &[
    "http_proxy",
    "https_proxy",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "no_proxy",
    "NO_PROXY",
];

// Printed by yt-dlp once the final (recoded) file is in place.
const PRINT_TEMPLATE: &str = "after_move:%(.{title,filepath,ext,_filename})j";

/// What the extractor left in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    pub title: String,
    pub path: PathBuf,
}

/// Resolves a URL into a media file written inside `workspace`.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch(&self, url: &Url, workspace: &Path) -> Result<MediaArtifact, DownloadError>;
}

/// [`Extractor`] backed by the `yt-dlp` binary, recoding to mp4 via ffmpeg.
pub struct YtDlp {
    config: Arc<AppConfig>,
}

#[derive(Debug, Deserialize)]
struct PrintedInfo {
    title: Option<String>,
    filepath: Option<PathBuf>,
    #[serde(rename = "_filename")]
    filename: Option<PathBuf>,
}

type StderrTail = Arc<AsyncMutex<VecDeque<String>>>;

async fn collect_stderr(stderr: tokio::process::ChildStderr, tail: StderrTail) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        log::debug!("[yt-dlp] {}", line);
        let mut g = tail.lock().await;
        if g.len() == STDERR_TAIL_LINES {
            g.pop_front();
        }
        g.push_back(line.to_string());
    }
}

/// The message surfaced to the caller when yt-dlp fails: its last `ERROR:` line
/// if there is one, otherwise whatever stderr it left behind.
fn failure_message(tail: &VecDeque<String>, status: std::process::ExitStatus) -> String {
    if let Some(line) = tail.iter().rev().find(|l| l.starts_with("ERROR:")) {
        return line.clone();
    }
    if tail.is_empty() {
        return format!("yt-dlp exited with error (status={})", status);
    }
    tail.iter().cloned().collect::<Vec<_>>().join("\n")
}

fn parse_printed_info(stdout: &str) -> Result<MediaArtifact, DownloadError> {
    let info = stdout
        .lines()
        .rev()
        .filter(|l| l.trim_start().starts_with('{'))
        .find_map(|l| serde_json::from_str::<PrintedInfo>(l).ok())
        .ok_or_else(|| {
            DownloadError::Extraction("yt-dlp did not report the downloaded file".to_string())
        })?;

    let path = info.filepath.or(info.filename).ok_or_else(|| {
        DownloadError::Extraction("yt-dlp did not report the downloaded file".to_string())
    })?;

    Ok(MediaArtifact {
        title: info.title.unwrap_or_default(),
        path,
    })
}

impl YtDlp {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    fn find_ffmpeg(&self) -> Option<PathBuf> {
        if let Some(p) = &self.config.ffmpeg_bin {
            return Some(p.clone());
        }
        which::which_in("ffmpeg", Some(&self.config.ytdlp_path), ".").ok()
    }

    fn command(&self, url: &Url, workspace: &Path) -> Command {
        let cfg = self.config.as_ref();
        let mut cmd = Command::new(&cfg.ytdlp_bin);
        cmd.env("PATH", &cfg.ytdlp_path);

        // Only `ytdlp_proxy` routes traffic unless the service env is opted in.
        if !cfg.inherit_proxy_env {
            for var in PROXY_ENV_VARS {
                cmd.env_remove(var);
            }
        }

        if let Some(p) = &cfg.ytdlp_proxy {
            cmd.arg("--proxy").arg(p);
        }
        if let Some(ffmpeg) = self.find_ffmpeg() {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }

        cmd.arg("--no-playlist")
            .arg("--no-cache-dir")
            .arg("--no-part")
            .arg("-f")
            .arg("best")
            .arg("-o")
            .arg(workspace.join("%(title)s.%(ext)s"))
            .arg("--recode-video")
            .arg(TARGET_EXT)
            .arg("--no-simulate")
            .arg("--print")
            .arg(PRINT_TEMPLATE)
            .arg(url.as_str())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn fetch(&self, url: &Url, workspace: &Path) -> Result<MediaArtifact, DownloadError> {
        let mut child = self.command(url, workspace).spawn().map_err(|e| {
            DownloadError::Extraction(format!("Failed to start yt-dlp: {}", e))
        })?;
        if let Some(pid) = child.id() {
            log::info!("[DOWNLOAD] yt-dlp started (pid={})", pid);
        }

        let tail: StderrTail = Arc::new(AsyncMutex::new(VecDeque::new()));
        let stderr = child.stderr.take().ok_or_else(|| {
            DownloadError::Extraction("Failed to capture yt-dlp stderr".to_string())
        })?;
        let stderr_task = tokio::spawn(collect_stderr(stderr, tail.clone()));

        let mut stdout = child.stdout.take().ok_or_else(|| {
            DownloadError::Extraction("Failed to capture yt-dlp stdout".to_string())
        })?;
        let mut printed = String::new();
        stdout
            .read_to_string(&mut printed)
            .await
            .map_err(|e| DownloadError::Extraction(format!("Failed reading yt-dlp output: {}", e)))?;

        // If the client disconnects while we wait, the handler future is dropped,
        // which kills the child (kill_on_drop) and removes the workspace.
        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::Extraction(format!("Failed waiting for yt-dlp: {}", e)))?;
        let _ = stderr_task.await;

        if !status.success() {
            let g = tail.lock().await;
            return Err(DownloadError::Extraction(failure_message(&g, status)));
        }

        parse_printed_info(&printed)
    }
}
