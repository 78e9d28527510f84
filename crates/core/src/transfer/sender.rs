//! Peer Sender — serves a single inbound request by streaming file bytes.
//!
//! Reads exactly one request line of the form `GET <percent-encoded-path>\n`,
//! then either writes the 404 sentinel or streams the named file in
//! [`super::CHUNK_SIZE`]-byte chunks until EOF. No headers, no length
//! prefix.

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{ParseErrorKind, Result, TrackerError};
use crate::transfer::{percent_decode_path, CHUNK_SIZE, NOT_FOUND_SENTINEL};

/// Serve one request on an accepted socket, then let it close.
pub async fn serve(stream: TcpStream) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(TrackerError::Parse {
            kind: ParseErrorKind::EmptyRequest,
        });
    }

    let path = parse_request_line(&line)?;
    tracing::debug!(path, "peer transfer request");

    match File::open(&path).await {
        Ok(mut file) => {
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let read = file.read(&mut buf).await?;
                if read == 0 {
                    break;
                }
                write_half.write_all(&buf[..read]).await?;
            }
            write_half.flush().await?;
            tracing::debug!(path, "file served");
        }
        Err(_) => {
            write_half.write_all(NOT_FOUND_SENTINEL).await?;
            write_half.flush().await?;
            tracing::debug!(path, "file not found, sentinel sent");
        }
    }

    Ok(())
}

/// Parse `GET <target>\n` into the decoded filesystem path.
fn parse_request_line(line: &str) -> Result<String> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    let target = trimmed
        .strip_prefix("GET ")
        .ok_or(TrackerError::Parse {
            kind: ParseErrorKind::InvalidRequestLine,
        })?;
    if target.is_empty() {
        return Err(TrackerError::Parse {
            kind: ParseErrorKind::InvalidRequestLine,
        });
    }
    Ok(percent_decode_path(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn parse_request_line_decodes_spaces() {
        let path = parse_request_line("GET /home/a/My%20File.pdf\n").unwrap();
        assert_eq!(path, "/home/a/My File.pdf");
    }

    #[test]
    fn parse_request_line_rejects_missing_get() {
        assert!(parse_request_line("POST /x\n").is_err());
    }

    #[tokio::test]
    async fn missing_file_yields_sentinel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve(stream).await.unwrap();
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /nonexistent/path/zzz.bin\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, NOT_FOUND_SENTINEL);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn existing_file_is_streamed_verbatim() {
        let dir = std::env::temp_dir().join(format!("tracker-sender-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let file_path = dir.join("payload.bin");
        let payload = vec![7u8; CHUNK_SIZE * 3 + 17];
        tokio::fs::write(&file_path, &payload).await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve(stream).await.unwrap();
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {}\n", file_path.display());
        client.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, payload);

        server.await.unwrap();
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
