//! ClamAV scanning backend.
//!
//! This module provides a scanner implementation that communicates with
//! the ClamAV daemon (clamd) over TCP or a Unix socket.
//!
//! # Protocol
//!
//! Uses the INSTREAM command:
//!
//! ```text
//! client: "zINSTREAM\0"
//! client: [u32 BE len][len bytes]   (repeated, one per non-empty chunk)
//! client: [u32 BE 0]                (terminator, always sent exactly once)
//! daemon: "stream: OK\0" | "stream: <name> FOUND\0" | anything else
//! daemon: closes the connection
//! ```

use crate::core::{ByteStream, ScanError, ScanVerdict, Scanner};

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const INSTREAM_COMMAND: &[u8] = b"zINSTREAM\0";
const PING_COMMAND: &[u8] = b"zPING\0";
const VERSION_COMMAND: &[u8] = b"zVERSION\0";

const RESPONSE_PREFIX: &str = "stream: ";
const RESPONSE_CLEAN: &str = "stream: OK";
const RESPONSE_FOUND_SUFFIX: &str = " FOUND";

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClamAvEndpoint {
    /// TCP `host:port`.
    Tcp(String),
    /// Unix domain socket path.
    Unix(PathBuf),
}

/// ClamAV scanner configuration.
#[derive(Debug, Clone)]
pub struct ClamAvConfig {
    /// Daemon address.
    pub endpoint: ClamAvEndpoint,

    /// Connection timeout.
    pub connection_timeout: Duration,

    /// Deadline for one whole INSTREAM exchange. `None` waits forever, so
    /// a hung daemon blocks the run.
    pub scan_timeout: Option<Duration>,

    /// Size of the buffer used to read the source stream; each non-empty
    /// read becomes one frame.
    pub chunk_size: usize,
}

impl Default for ClamAvConfig {
    fn default() -> Self {
        Self {
            endpoint: ClamAvEndpoint::Tcp("127.0.0.1:3310".to_string()),
            connection_timeout: Duration::from_secs(10),
            scan_timeout: None,
            chunk_size: 64 * 1024,
        }
    }
}

impl ClamAvConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a TCP connection to `host:port`.
    pub fn with_tcp(mut self, address: impl Into<String>) -> Self {
        self.endpoint = ClamAvEndpoint::Tcp(address.into());
        self
    }

    /// Uses a Unix socket.
    pub fn with_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.endpoint = ClamAvEndpoint::Unix(path.into());
        self
    }

    /// Sets the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the per-exchange deadline.
    pub fn with_scan_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Sets the read buffer size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}

/// ClamAV scanner implementation.
///
/// Every call to [`Scanner::scan`] opens one fresh connection, streams the
/// object with INSTREAM and closes it again. No retries happen here.
///
/// # Example
///
/// ```rust,ignore
/// use bucketscan::backends::clamav::{ClamAvConfig, ClamAvScanner};
///
/// let scanner = ClamAvScanner::new(ClamAvConfig::new().with_tcp("clamd:3310"))?;
/// let verdict = scanner.scan(stream).await?;
/// ```
#[derive(Debug)]
pub struct ClamAvScanner {
    config: ClamAvConfig,
}

impl ClamAvScanner {
    /// Creates a new ClamAV scanner with the given configuration.
    pub fn new(config: ClamAvConfig) -> Result<Self, ScanError> {
        match &config.endpoint {
            ClamAvEndpoint::Tcp(address) if address.trim().is_empty() => {
                return Err(ScanError::configuration("clamd TCP address is empty"));
            }
            #[cfg(not(unix))]
            ClamAvEndpoint::Unix(_) => {
                return Err(ScanError::configuration(
                    "Unix sockets not supported on this platform",
                ));
            }
            _ => {}
        }

        Ok(Self { config })
    }

    /// Creates a ClamAV scanner with default configuration.
    pub fn with_defaults() -> Result<Self, ScanError> {
        Self::new(ClamAvConfig::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClamAvConfig {
        &self.config
    }

    /// Runs one command on a fresh connection, applying the connect timeout
    /// and the optional per-exchange deadline.
    async fn with_connection<T>(
        &self,
        command: &'static [u8],
        source: Option<ByteStream>,
        finish: impl FnOnce(Vec<u8>) -> Result<T, ScanError>,
    ) -> Result<T, ScanError> {
        let start = Instant::now();
        let chunk_size = self.config.chunk_size;

        let attempt = async {
            let response = match &self.config.endpoint {
                ClamAvEndpoint::Tcp(address) => {
                    let conn = self
                        .connect_timeout(tokio::net::TcpStream::connect(address.as_str()))
                        .await?;
                    exchange(conn, command, source, chunk_size).await?
                }
                #[cfg(unix)]
                ClamAvEndpoint::Unix(path) => {
                    let conn = self
                        .connect_timeout(tokio::net::UnixStream::connect(path))
                        .await?;
                    exchange(conn, command, source, chunk_size).await?
                }
                #[cfg(not(unix))]
                ClamAvEndpoint::Unix(_) => {
                    return Err(ScanError::configuration(
                        "Unix sockets not supported on this platform",
                    ));
                }
            };
            finish(response)
        };

        match self.config.scan_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, attempt).await {
                Ok(result) => result,
                Err(_) => Err(ScanError::Timeout {
                    elapsed: start.elapsed(),
                }),
            },
            None => attempt.await,
        }
    }

    async fn connect_timeout<C>(
        &self,
        connect: impl std::future::Future<Output = std::io::Result<C>>,
    ) -> Result<C, ScanError> {
        match tokio::time::timeout(self.config.connection_timeout, connect).await {
            Ok(conn) => conn.map_err(ScanError::Transport),
            Err(_) => Err(ScanError::Transport(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!(
                    "connecting to clamd timed out after {:?}",
                    self.config.connection_timeout
                ),
            ))),
        }
    }
}

/// Sends `command` (and, for INSTREAM, the framed `source`) while draining
/// the daemon's response until it closes the connection.
///
/// Writing and reading run concurrently, so a daemon that answers before
/// the terminator arrives cannot stall the writer. The first failure wins
/// and the connection is dropped, closing it.
async fn exchange<C>(
    conn: C,
    command: &[u8],
    source: Option<ByteStream>,
    chunk_size: usize,
) -> Result<Vec<u8>, ScanError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(conn);

    let send = async {
        writer
            .write_all(command)
            .await
            .map_err(ScanError::Transport)?;

        if let Some(mut source) = source {
            let mut buf = vec![0u8; chunk_size];
            let mut sent: u64 = 0;
            loop {
                let n = source.read(&mut buf).await.map_err(ScanError::SourceRead)?;
                if n == 0 {
                    break;
                }
                write_frame(&mut writer, &buf[..n]).await?;
                sent += n as u64;
            }
            writer
                .write_all(&0u32.to_be_bytes())
                .await
                .map_err(ScanError::Transport)?;
            tracing::trace!(bytes = sent, "INSTREAM payload sent");
        }

        writer.flush().await.map_err(ScanError::Transport)
    };

    let receive = async {
        let mut response = Vec::new();
        reader
            .read_to_end(&mut response)
            .await
            .map_err(ScanError::Transport)?;
        Ok::<_, ScanError>(response)
    };

    let ((), response) = tokio::try_join!(send, receive)?;
    Ok(response)
}

async fn write_frame<W>(writer: &mut W, chunk: &[u8]) -> Result<(), ScanError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(chunk.len()).map_err(|_| {
        ScanError::configuration(format!("chunk of {} bytes exceeds frame limit", chunk.len()))
    })?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(ScanError::Transport)?;
    writer.write_all(chunk).await.map_err(ScanError::Transport)
}

/// Strips trailing NULs and surrounding whitespace from a daemon response.
fn clean_response(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

/// Parses an INSTREAM response into a verdict.
pub fn parse_response(raw: &[u8]) -> Result<ScanVerdict, ScanError> {
    let text = clean_response(raw);

    if text.eq_ignore_ascii_case(RESPONSE_CLEAN) {
        return Ok(ScanVerdict::clean());
    }

    if let Some(name) = found_signature(&text) {
        return Ok(ScanVerdict::infected(name));
    }

    Err(ScanError::protocol(text, raw))
}

/// Extracts `<name>` from `stream: <name> FOUND`, case-insensitively.
fn found_signature(text: &str) -> Option<&str> {
    let prefix = text.get(..RESPONSE_PREFIX.len())?;
    let suffix_start = text.len().checked_sub(RESPONSE_FOUND_SUFFIX.len())?;
    let suffix = text.get(suffix_start..)?;

    if !prefix.eq_ignore_ascii_case(RESPONSE_PREFIX)
        || !suffix.eq_ignore_ascii_case(RESPONSE_FOUND_SUFFIX)
    {
        return None;
    }

    text.get(RESPONSE_PREFIX.len()..suffix_start)
        .filter(|name| !name.is_empty())
}

#[async_trait]
impl Scanner for ClamAvScanner {
    fn name(&self) -> &str {
        "clamav"
    }

    async fn scan(&self, stream: ByteStream) -> Result<ScanVerdict, ScanError> {
        let start = Instant::now();

        let verdict = self
            .with_connection(INSTREAM_COMMAND, Some(stream), |raw| parse_response(&raw))
            .await?;

        tracing::debug!(
            verdict = %verdict,
            duration_ms = start.elapsed().as_millis() as u64,
            "clamd INSTREAM completed"
        );

        Ok(verdict)
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        self.with_connection(PING_COMMAND, None, |raw| {
            let text = clean_response(&raw);
            if text == "PONG" {
                Ok(())
            } else {
                Err(ScanError::protocol(text, raw))
            }
        })
        .await
    }

    async fn version(&self) -> Option<String> {
        let version = self
            .with_connection(VERSION_COMMAND, None, |raw| Ok(clean_response(&raw)))
            .await;

        match version {
            Ok(version) if !version.is_empty() => Some(version),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "clamd VERSION failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fake_clamd::{FakeClamd, Reply};
    use crate::backends::mock::{EICAR, EICAR_SIGNATURE};
    use crate::core::{byte_stream_from_bytes, ChunkedReader};

    fn scanner_for(fake: &FakeClamd) -> ClamAvScanner {
        ClamAvScanner::new(ClamAvConfig::new().with_tcp(fake.addr().to_string())).unwrap()
    }

    #[test]
    fn test_parse_response_clean() {
        assert!(parse_response(b"stream: OK\0").unwrap().is_clean());
        assert!(parse_response(b"STREAM: ok\0\0\0").unwrap().is_clean());
        assert!(parse_response(b"  stream: OK\n").unwrap().is_clean());
    }

    #[test]
    fn test_parse_response_infected() {
        let verdict = parse_response(b"stream: Eicar-Test-Signature FOUND\0").unwrap();
        assert_eq!(verdict.virus_name(), Some("Eicar-Test-Signature"));

        let verdict = parse_response(b"Stream: Win.Trojan.Agent-1 found").unwrap();
        assert_eq!(verdict.virus_name(), Some("Win.Trojan.Agent-1"));

        let verdict = parse_response(b"stream: Name With Spaces FOUND").unwrap();
        assert_eq!(verdict.virus_name(), Some("Name With Spaces"));
    }

    #[test]
    fn test_parse_response_unexpected() {
        let raw = b"INSTREAM size limit exceeded. ERROR\0";
        match parse_response(raw) {
            Err(ScanError::Protocol { text, raw: kept }) => {
                assert_eq!(text, "INSTREAM size limit exceeded. ERROR");
                assert_eq!(kept, raw.to_vec());
            }
            other => panic!("expected protocol error, got {:?}", other),
        }

        assert!(parse_response(b"stream:  FOUND").is_err());
        assert!(parse_response(b"").is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ClamAvConfig::new()
            .with_socket("/custom/clamd.sock")
            .with_scan_timeout(Some(Duration::from_secs(60)))
            .with_chunk_size(0);

        assert_eq!(
            config.endpoint,
            ClamAvEndpoint::Unix(PathBuf::from("/custom/clamd.sock"))
        );
        assert_eq!(config.scan_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.chunk_size, 1);
    }

    #[test]
    fn test_empty_tcp_address_rejected() {
        let result = ClamAvScanner::new(ClamAvConfig::new().with_tcp(" "));
        assert!(matches!(result, Err(ScanError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_scan_clean_text() {
        let mut fake = FakeClamd::start(Reply::Verdict).await;
        let scanner = scanner_for(&fake);

        let verdict = scanner
            .scan(byte_stream_from_bytes(b"just some text".to_vec()))
            .await
            .unwrap();
        assert!(verdict.is_clean());
        assert_eq!(verdict.virus_name(), None);

        let session = fake.next_session().await;
        assert_eq!(session.command, b"zINSTREAM");
        assert_eq!(session.payload, b"just some text");
        assert_eq!(session.terminator_count(), 1);
    }

    #[tokio::test]
    async fn test_scan_eicar() {
        let fake = FakeClamd::start(Reply::Verdict).await;
        let scanner = scanner_for(&fake);

        let verdict = scanner
            .scan(byte_stream_from_bytes(EICAR.to_vec()))
            .await
            .unwrap();
        assert!(verdict.is_infected());
        assert_eq!(verdict.virus_name(), Some(EICAR_SIGNATURE));
    }

    #[tokio::test]
    async fn test_scan_empty_stream_sends_one_terminator() {
        let mut fake = FakeClamd::start(Reply::Verdict).await;
        let scanner = scanner_for(&fake);

        let verdict = scanner
            .scan(byte_stream_from_bytes(Vec::new()))
            .await
            .unwrap();
        assert!(verdict.is_clean());

        let session = fake.next_session().await;
        assert_eq!(session.frames, vec![0]);
        assert!(session.terminated);
    }

    #[tokio::test]
    async fn test_chunk_boundaries_do_not_matter() {
        let mut fake = FakeClamd::start(Reply::Verdict).await;
        let scanner = scanner_for(&fake);

        let mut content = b"prefix bytes ".to_vec();
        content.extend_from_slice(EICAR);
        content.extend_from_slice(b" suffix bytes");

        let single = scanner
            .scan(byte_stream_from_bytes(content.clone()))
            .await
            .unwrap();
        let single_session = fake.next_session().await;

        let chunked = scanner
            .scan(Box::new(ChunkedReader::split(&content, 5)))
            .await
            .unwrap();
        let chunked_session = fake.next_session().await;

        assert_eq!(single, chunked);
        assert_eq!(single_session.payload, chunked_session.payload);
        assert!(chunked_session.frames.len() > single_session.frames.len());
        assert_eq!(chunked_session.terminator_count(), 1);
    }

    #[tokio::test]
    async fn test_source_failure_surfaces_and_closes() {
        let mut fake = FakeClamd::start(Reply::Verdict).await;
        let scanner = scanner_for(&fake);

        let source = ChunkedReader::new([b"partial".to_vec()]).with_failure(
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "body truncated"),
        );

        let err = scanner.scan(Box::new(source)).await.unwrap_err();
        match err {
            ScanError::SourceRead(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof);
                assert_eq!(e.to_string(), "body truncated");
            }
            other => panic!("expected source read error, got {:?}", other),
        }

        // The daemon sees the connection close before any terminator.
        let session = fake.next_session().await;
        assert!(!session.terminated);
        assert_eq!(session.payload, b"partial");
    }

    #[tokio::test]
    async fn test_unexpected_reply_is_protocol_error() {
        let fake = FakeClamd::start(Reply::Fixed(b"stream: weird\0".to_vec())).await;
        let scanner = scanner_for(&fake);

        let err = scanner
            .scan(byte_stream_from_bytes(b"x".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Protocol { ref text, .. } if text == "stream: weird"));
    }

    #[tokio::test]
    async fn test_early_reply_does_not_deadlock() {
        let mut fake = FakeClamd::start(Reply::Early).await;
        let scanner = scanner_for(&fake);

        let content = vec![b'a'; 4 * 1024 * 1024];
        let verdict = scanner
            .scan(byte_stream_from_bytes(content))
            .await
            .unwrap();
        assert!(verdict.is_clean());

        let session = fake.next_session().await;
        assert!(session.terminated);
        assert_eq!(session.payload.len(), 4 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let scanner =
            ClamAvScanner::new(ClamAvConfig::new().with_tcp(addr.to_string())).unwrap();
        let err = scanner
            .scan(byte_stream_from_bytes(b"x".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Transport(_)));
    }

    #[tokio::test]
    async fn test_ping_and_version() {
        let fake = FakeClamd::start(Reply::Verdict).await;
        let scanner = scanner_for(&fake);

        scanner.health_check().await.unwrap();
        let version = scanner.version().await.unwrap();
        assert!(version.starts_with("ClamAV"));
    }
}
