//! Tracker RPC surface and its minimal demonstration transport.
//!
//! The nine tracker operations are implemented as async methods on
//! [`Tracker`], a transport-agnostic service type — the stable surface a
//! real deployment would drive through gRPC, JSON-RPC, or anything else.
//! [`serve`] is the pipe-delimited line-protocol carrier this workspace
//! ships as a drop-in demonstration: one `tokio::spawn`-per-connection task
//! reading and dispatching requests against a shared service handle.
//!
//! Wire format: request `operation|arg1|arg2|...\n`, response
//! `tag|field1|...\n`. One connection may carry many requests in sequence
//! (a peer logs in once, then heartbeats and registers files over the same
//! socket) until it closes.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::error::TrackerError;
use crate::file_index::FileIndex;
use crate::session_manager::{Outcome, SessionManager};

/// The service surface backing every tracker RPC.
///
/// Constructed once at startup from an already-initialized
/// [`crate::peers::ActivePeerTable`] and
/// [`crate::persistence::PersistenceGateway`] — see [`crate::session_manager`]
/// and [`crate::file_index`]. The `NOT_READY` tag models the window before
/// that construction completes; in this workspace's own CLI that window
/// never has an RPC arrive in it (`ActivePeerTable` is built before the RPC
/// listener is spawned), but `Tracker::uninitialized` keeps the contract
/// observable and testable.
#[derive(Clone)]
pub enum Tracker {
    Ready {
        sessions: SessionManager,
        files: FileIndex,
    },
    NotReady,
}

impl Tracker {
    pub fn new(sessions: SessionManager, files: FileIndex) -> Self {
        Tracker::Ready { sessions, files }
    }

    pub fn uninitialized() -> Self {
        Tracker::NotReady
    }

    fn parts(&self) -> Result<(&SessionManager, &FileIndex), TrackerError> {
        match self {
            Tracker::Ready { sessions, files } => Ok((sessions, files)),
            Tracker::NotReady => Err(TrackerError::NotReady),
        }
    }

    pub async fn connect_to_server(
        &self,
        name: &str,
        password: &str,
        ip: &str,
        port: u16,
    ) -> Result<(Outcome, String), TrackerError> {
        let (sessions, _) = self.parts()?;
        sessions.login(name, password, ip, port).await
    }

    pub async fn resume_session(
        &self,
        token: &str,
        name: &str,
        ip: &str,
        port: u16,
    ) -> Result<(Outcome, String), TrackerError> {
        let (sessions, _) = self.parts()?;
        sessions.resume(token, name, ip, port).await
    }

    pub fn disconnect_from_server(&self, token: &str, name: &str) -> Result<(), TrackerError> {
        let (sessions, _) = self.parts()?;
        sessions.disconnect(token, name)
    }

    pub fn send_heart_beat(&self, token: &str, name: &str) -> Result<(), TrackerError> {
        let (sessions, _) = self.parts()?;
        sessions.heartbeat(token, name)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn register_file(
        &self,
        token: &str,
        name: &str,
        file_name: &str,
        file_type: &str,
        file_path: &str,
        file_size: i64,
    ) -> Result<(), TrackerError> {
        let (sessions, files) = self.parts()?;
        files
            .register(sessions, token, name, file_name, file_type, file_path, file_size)
            .await
    }

    pub async fn deregister_file(
        &self,
        token: &str,
        name: &str,
        file_name: &str,
        file_type: &str,
        file_path: &str,
    ) -> Result<(), TrackerError> {
        let (sessions, files) = self.parts()?;
        files
            .deregister(sessions, token, name, file_name, file_type, file_path)
            .await
    }

    pub async fn get_user_files(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Vec<crate::file_index::OwnedFile>, TrackerError> {
        let (sessions, files) = self.parts()?;
        files.list(sessions, token, name).await
    }

    pub async fn search_file(
        &self,
        token: &str,
        name: &str,
        query: &str,
    ) -> Result<Vec<crate::file_index::FoundFile>, TrackerError> {
        let (sessions, files) = self.parts()?;
        files.search(sessions, token, name, query).await
    }

    pub async fn get_file_host_info(
        &self,
        token: &str,
        name: &str,
        file_id: i64,
    ) -> Result<Vec<crate::file_index::Host>, TrackerError> {
        let (sessions, files) = self.parts()?;
        files.host_lookup(sessions, token, name, file_id).await
    }
}

fn outcome_tag(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::New => "NEW",
        Outcome::Updated => "UPDATE",
        Outcome::Unchanged => "OK",
    }
}

/// Map a failed operation to its wire tag plus a human-readable second
/// field. No internal error representation ever crosses this boundary
/// directly — every `TrackerError` variant is translated here.
fn error_tag(err: &TrackerError) -> &'static str {
    match err {
        TrackerError::NotReady => "ERROR",
        TrackerError::SessionFull => "FULL",
        TrackerError::DuplicateSession => "COPY",
        TrackerError::BadCredentials => "CRED",
        TrackerError::BadPassword => "PASSWORD",
        TrackerError::QuotaExceeded => "FULL",
        TrackerError::DuplicateFile => "COPY",
        TrackerError::NotFound => "404",
        _ => "ERROR",
    }
}

fn encode(fields: &[&str]) -> String {
    format!("{}\n", fields.join("|"))
}

/// Parse and dispatch a single request line, returning the already
/// newline-terminated response line.
pub async fn dispatch(tracker: &Tracker, line: &str) -> String {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut parts = line.split('|');
    let Some(op) = parts.next() else {
        return encode(&["ERROR", "empty request"]);
    };
    let args: Vec<&str> = parts.collect();

    macro_rules! need {
        ($n:expr) => {
            if args.len() != $n {
                return encode(&["ERROR", "wrong argument count"]);
            }
        };
    }

    macro_rules! port_of {
        ($s:expr) => {
            match $s.parse::<u16>() {
                Ok(p) => p,
                Err(_) => return encode(&["ERROR", "invalid port"]),
            }
        };
    }

    match op {
        "connectToServer" => {
            need!(4);
            let port = port_of!(args[3]);
            match tracker
                .connect_to_server(args[0], args[1], args[2], port)
                .await
            {
                Ok((outcome, token)) => encode(&[outcome_tag(outcome), &token]),
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        "resumeSession" => {
            need!(4);
            let port = port_of!(args[3]);
            match tracker
                .resume_session(args[0], args[1], args[2], port)
                .await
            {
                Ok((outcome, token)) => encode(&[outcome_tag(outcome), &token]),
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        "disconnectFromServer" => {
            need!(2);
            match tracker.disconnect_from_server(args[0], args[1]) {
                Ok(()) => encode(&["OK", "disconnected"]),
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        "sendHeartBeat" => {
            need!(2);
            match tracker.send_heart_beat(args[0], args[1]) {
                Ok(()) => encode(&["OK", "alive"]),
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        "registerFile" => {
            need!(6);
            let size = match args[5].parse::<i64>() {
                Ok(s) => s,
                Err(_) => return encode(&["ERROR", "invalid size"]),
            };
            match tracker
                .register_file(args[0], args[1], args[2], args[3], args[4], size)
                .await
            {
                Ok(()) => encode(&["OK", "registered"]),
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        "deregisterFile" => {
            need!(5);
            match tracker
                .deregister_file(args[0], args[1], args[2], args[3], args[4])
                .await
            {
                Ok(()) => encode(&["OK", "deregistered"]),
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        "getUserFiles" => {
            need!(2);
            match tracker.get_user_files(args[0], args[1]).await {
                Ok(rows) => {
                    let mut fields = vec!["OK".to_string()];
                    for row in rows {
                        fields.push(row.id.to_string());
                        fields.push(row.name);
                        fields.push(row.file_type);
                        fields.push(row.path);
                        fields.push(row.size.to_string());
                    }
                    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
                    encode(&refs)
                }
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        "searchFile" => {
            need!(3);
            match tracker.search_file(args[0], args[1], args[2]).await {
                Ok(rows) => {
                    let mut fields = vec!["OK".to_string()];
                    for row in rows {
                        fields.push(row.id.to_string());
                        fields.push(row.name);
                        fields.push(row.file_type);
                        fields.push(row.size.to_string());
                    }
                    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
                    encode(&refs)
                }
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        "getFileHostInfo" => {
            need!(3);
            let file_id = match args[2].parse::<i64>() {
                Ok(id) => id,
                Err(_) => return encode(&["ERROR", "invalid file id"]),
            };
            match tracker.get_file_host_info(args[0], args[1], file_id).await {
                Ok(rows) => {
                    let mut fields = vec!["OK".to_string()];
                    for row in rows {
                        fields.push(row.ip);
                        fields.push(row.port.to_string());
                        fields.push(row.path);
                    }
                    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
                    encode(&refs)
                }
                Err(e) => encode(&[error_tag(&e), &e.to_string()]),
            }
        }
        other => encode(&["ERROR", &format!("unknown operation: {other}")]),
    }
}

/// Bind `addr` and serve the tracker RPC line protocol until the process
/// exits. Each connection is handled on its own task and may carry many
/// sequential requests.
pub async fn serve(addr: &str, tracker: Tracker) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr, "tracker RPC listener started");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let tracker = tracker.clone();
        tokio::spawn(async move {
            tracing::debug!(%peer_addr, "RPC connection opened");
            if let Err(e) = handle_connection(stream, tracker).await {
                tracing::warn!(%peer_addr, error = %e, "RPC connection error");
            }
            tracing::debug!(%peer_addr, "RPC connection closed");
        });
    }
}

async fn handle_connection(stream: TcpStream, tracker: Tracker) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }
        let response = dispatch(&tracker, &line).await;
        write_half.write_all(response.as_bytes()).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uninitialized_tracker_reports_not_ready() {
        let tracker = Tracker::uninitialized();
        let response = dispatch(&tracker, "sendHeartBeat|tok|alice\n").await;
        assert!(response.starts_with("ERROR|"));
    }

    #[tokio::test]
    async fn unknown_operation_is_reported() {
        let tracker = Tracker::uninitialized();
        let response = dispatch(&tracker, "frobnicate|x\n").await;
        assert!(response.starts_with("ERROR|unknown operation"));
    }

    #[tokio::test]
    async fn wrong_argument_count_is_reported() {
        let tracker = Tracker::uninitialized();
        let response = dispatch(&tracker, "connectToServer|onlyonearg\n").await;
        assert_eq!(response, "ERROR|wrong argument count\n");
    }

    #[test]
    fn error_tag_mapping_covers_every_failure_mode() {
        assert_eq!(error_tag(&TrackerError::SessionFull), "FULL");
        assert_eq!(error_tag(&TrackerError::DuplicateSession), "COPY");
        assert_eq!(error_tag(&TrackerError::BadCredentials), "CRED");
        assert_eq!(error_tag(&TrackerError::BadPassword), "PASSWORD");
        assert_eq!(error_tag(&TrackerError::NotFound), "404");
        assert_eq!(error_tag(&TrackerError::QuotaExceeded), "FULL");
        assert_eq!(error_tag(&TrackerError::DuplicateFile), "COPY");
    }
}
