//! Peer Transfer Protocol — the line-based request/response exchange by
//! which one peer fetches a file from another, carried over a direct TCP
//! socket independent of the tracker RPC leg.
//!
//! Split by role, with a single combined socket per transfer (no separate
//! control channel): [`listener`] accepts inbound sockets, [`sender`] serves
//! one request each, [`downloader`] drives the client side of a transfer.

pub mod downloader;
pub mod listener;
pub mod progress;
pub mod sender;

pub use downloader::{download, DownloadError};
pub use listener::PeerListener;
pub use progress::{NullProgressSink, ProgressSink};

/// Literal bytes written by [`sender`] when the requested path doesn't
/// exist, and recognized by [`downloader`] as the miss sentinel. No length
/// framing backs this protocol: a served file whose contents happen to begin
/// with these exact bytes would be misidentified as a miss. Preserved here
/// for peer-to-peer wire compatibility, not because it is a good design.
pub const NOT_FOUND_SENTINEL: &[u8] = b"HTTP/1.1 404 Not Found\n";

/// Chunk size used by both the sender's file-streaming loop and the
/// downloader's read loop.
pub const CHUNK_SIZE: usize = 1024;

/// Percent-encode a filesystem path for the `GET` request line. The wire
/// protocol encodes exactly one character — U+0020 space — as `%20`; it is
/// not a general URL-encoding implementation.
pub fn percent_encode_path(path: &str) -> String {
    path.replace(' ', "%20")
}

/// Reverse [`percent_encode_path`].
pub fn percent_decode_path(encoded: &str) -> String {
    encoded.replace("%20", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips_spaces() {
        let path = "/home/alice/My Documents/report final.pdf";
        let encoded = percent_encode_path(path);
        assert_eq!(encoded, "/home/alice/My%20Documents/report%20final.pdf");
        assert_eq!(percent_decode_path(&encoded), path);
    }

    #[test]
    fn encode_is_a_noop_without_spaces() {
        assert_eq!(percent_encode_path("/home/alice/report.pdf"), "/home/alice/report.pdf");
    }
}
