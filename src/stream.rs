use std::io;
use std::path::PathBuf;

use async_stream::stream;
use bytes::Bytes;
use futures_util::Stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::workspace::Workspace;

pub const CHUNK_SIZE: usize = 8192;

/// Read `path` in [`CHUNK_SIZE`] pieces as the response drains.
///
/// The stream owns `workspace`, so the directory goes away once the body is
/// finished or dropped by the transport (client disconnect).
pub fn file_stream(
    path: PathBuf,
    workspace: Workspace,
) -> impl Stream<Item = Result<Bytes, io::Error>> {
    stream! {
        let _workspace: Workspace = workspace;

        let mut file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) => {
                log::error!("[STREAM] Failed to open {}: {}", path.display(), e);
                yield Err(e);
                return;
            }
        };

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut sent: u64 = 0;
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => {
                    sent += n as u64;
                    yield Ok(Bytes::copy_from_slice(&buffer[..n]));
                }
                Err(e) => {
                    log::error!("[STREAM] Read failed after {} bytes: {}", sent, e);
                    yield Err(e);
                    break;
                }
            }
        }
        log::info!("[STREAM] Finished {} ({} bytes)", path.display(), sent);
    }
}
