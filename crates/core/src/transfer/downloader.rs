//! Peer Downloader — issues an outbound request to a [`super::sender`],
//! streams the response to disk, and reports progress.
//!
//! Connects with a 10s timeout, sends one `GET` line, picks a collision-safe
//! local filename, detects the 404 sentinel on the first chunk, then streams
//! the rest to disk while reporting `floor(bytes_written * 100 / expected_size)`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::transfer::{percent_encode_path, CHUNK_SIZE, NOT_FOUND_SENTINEL};
use crate::transfer::progress::ProgressSink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on the `name(n).type` collision probe before giving up and
/// overwriting the base filename.
const MAX_COLLISION_SUFFIX: u32 = 1000;

/// Why a download did not complete.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("connection timed out")]
    Timeout,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote peer reports the file does not exist")]
    Peer404,
}

/// Download `{remote_path}{file_name}.{file_type}` from `(ip, port)` into
/// `dest_dir`. `remote_path` is the directory a host lookup returns (e.g.
/// `/home/a/`); the request target is that directory joined with the file's
/// own name and type, matching how the file was registered. The local file
/// is named from `(file_name, file_type)` with collision-safe suffixing.
/// Reports progress against `expected_size` through `sink`. Returns the
/// path the file was written to.
pub async fn download(
    ip: &str,
    port: u16,
    remote_path: &str,
    dest_dir: &Path,
    file_name: &str,
    file_type: &str,
    expected_size: u64,
    sink: &dyn ProgressSink,
) -> Result<PathBuf, DownloadError> {
    let local_path = resolve_local_filename(dest_dir, file_name, file_type).await;

    let connect = async { TcpStream::connect((ip, port)).await };
    let mut stream = match timeout(CONNECT_TIMEOUT, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            sink.on_error(&e.to_string());
            return Err(DownloadError::Io(e));
        }
        Err(_) => {
            sink.on_error("connection timed out");
            return Err(DownloadError::Timeout);
        }
    };

    let remote_target = format!("{remote_path}{file_name}.{file_type}");
    let request = format!("GET {}\n", percent_encode_path(&remote_target));
    if let Err(e) = stream.write_all(request.as_bytes()).await {
        sink.on_error(&e.to_string());
        return Err(DownloadError::Io(e));
    }

    match run(&mut stream, &local_path, expected_size, sink).await {
        Ok(()) => {
            sink.on_complete();
            Ok(local_path)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&local_path).await;
            sink.on_error(&e.to_string());
            Err(e)
        }
    }
}

async fn run(
    stream: &mut TcpStream,
    local_path: &Path,
    expected_size: u64,
    sink: &dyn ProgressSink,
) -> Result<(), DownloadError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let read = stream.read(&mut buf).await?;
    if read == 0 {
        // Peer closed immediately with no bytes; treat as an empty file.
        File::create(local_path).await?;
        return Ok(());
    }
    if buf[..read].starts_with(NOT_FOUND_SENTINEL) {
        return Err(DownloadError::Peer404);
    }

    let mut file = File::create(local_path).await?;
    file.write_all(&buf[..read]).await?;
    let mut written = read as u64;
    report_progress(sink, written, expected_size);

    loop {
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        file.write_all(&buf[..read]).await?;
        written += read as u64;
        report_progress(sink, written, expected_size);
    }

    file.flush().await?;
    Ok(())
}

fn report_progress(sink: &dyn ProgressSink, written: u64, expected_size: u64) {
    if expected_size == 0 {
        return;
    }
    let percent = ((written * 100) / expected_size).min(100) as u8;
    sink.on_progress(percent);
}

/// Prefer `file_name.file_type`; on collision, try `file_name(1).file_type`,
/// `(2)`, … up to `(1000)`; on overflow, fall back to overwriting the base
/// name.
async fn resolve_local_filename(dir: &Path, file_name: &str, file_type: &str) -> PathBuf {
    let base = dir.join(format!("{file_name}.{file_type}"));
    if !exists(&base).await {
        return base;
    }
    for n in 1..=MAX_COLLISION_SUFFIX {
        let candidate = dir.join(format!("{file_name}({n}).{file_type}"));
        if !exists(&candidate).await {
            return candidate;
        }
    }
    base
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::progress::test_support::RecordingProgressSink;
    use tokio::net::TcpListener;

    async fn test_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tracker-downloader-test-{}-{}-{}",
            tag,
            std::process::id(),
            rand::random::<u32>()
        ));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn downloads_bytes_verbatim_and_reports_completion() {
        let dir = test_dir("ok").await;
        let payload = vec![9u8; CHUNK_SIZE * 2 + 5];

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let payload_clone = payload.clone();
        let (request_tx, request_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut reader = tokio::io::BufReader::new(&mut stream);
            let mut line = String::new();
            tokio::io::AsyncBufReadExt::read_line(&mut reader, &mut line)
                .await
                .unwrap();
            let _ = request_tx.send(line);
            stream.write_all(&payload_clone).await.unwrap();
        });

        let sink = RecordingProgressSink::default();
        let result = download(
            "127.0.0.1",
            addr.port(),
            "/remote/",
            &dir,
            "file",
            "bin",
            payload.len() as u64,
            &sink,
        )
        .await
        .unwrap();

        assert_eq!(request_rx.await.unwrap(), "GET /remote/file.bin\n");

        let written = tokio::fs::read(&result).await.unwrap();
        assert_eq!(written, payload);
        assert_eq!(*sink.completed.lock(), true);
        assert_eq!(sink.percents.lock().last().copied(), Some(100));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn peer_404_deletes_partial_file_and_reports_error() {
        let dir = test_dir("404").await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut line = vec![0u8; 4096];
            let _ = stream.read(&mut line).await.unwrap();
            stream.write_all(NOT_FOUND_SENTINEL).await.unwrap();
        });

        let sink = RecordingProgressSink::default();
        let err = download(
            "127.0.0.1",
            addr.port(),
            "/remote/",
            &dir,
            "missing",
            "bin",
            1024,
            &sink,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::Peer404));
        assert!(sink.error.lock().is_some());
        assert!(!exists(&dir.join("missing.bin")).await);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn collision_suffix_picks_next_free_name() {
        let dir = test_dir("collision").await;
        tokio::fs::write(dir.join("report.pdf"), b"existing").await.unwrap();
        tokio::fs::write(dir.join("report(1).pdf"), b"existing").await.unwrap();

        let chosen = resolve_local_filename(&dir, "report", "pdf").await;
        assert_eq!(chosen, dir.join("report(2).pdf"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
