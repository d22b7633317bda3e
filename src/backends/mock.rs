//! Mock scanner for testing.
//!
//! This module provides a scanner that needs no daemon: it reads the whole
//! stream, reports the EICAR test pattern as infected and everything else
//! as clean, and can be scripted to fail a number of times first.

use crate::core::{ByteStream, ScanError, ScanVerdict, Scanner};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncReadExt;

/// The EICAR anti-malware test file.
pub const EICAR: &[u8] =
    br"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Signature name the mock reports for EICAR, matching ClamAV.
pub const EICAR_SIGNATURE: &str = "Eicar-Test-Signature";

/// A failure the mock scanner can be scripted to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Connection refused by the daemon.
    Transport,
    /// Unparseable daemon response.
    Protocol,
}

impl MockFailure {
    fn to_error(self) -> ScanError {
        match self {
            Self::Transport => ScanError::Transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock daemon refused the connection",
            )),
            Self::Protocol => ScanError::protocol("mock garbage", b"mock garbage\0".to_vec()),
        }
    }
}

/// A mock scanner for testing purposes.
///
/// # Examples
///
/// ```rust
/// use bucketscan::backends::{MockFailure, MockScanner};
///
/// // Clean unless the stream contains EICAR
/// let scanner = MockScanner::new();
///
/// // Refuse the first two attempts, then scan normally
/// let flaky = MockScanner::new().with_failures(MockFailure::Transport, 2);
/// ```
#[derive(Debug)]
pub struct MockScanner {
    /// Name of this scanner instance.
    name: String,
    /// Failures handed out before scanning for real, in order.
    failures: Mutex<VecDeque<MockFailure>>,
    /// Counter for scan operations.
    scan_count: AtomicU64,
}

impl MockScanner {
    /// Creates a new mock scanner.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            failures: Mutex::new(VecDeque::new()),
            scan_count: AtomicU64::new(0),
        }
    }

    /// Sets the name of this scanner.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Makes the next `times` scans fail with `failure`.
    pub fn with_failures(self, failure: MockFailure, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(std::iter::repeat(failure).take(times));
        self
    }

    /// Returns the number of scans attempted.
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::Relaxed)
    }

    fn next_failure(&self) -> Option<MockFailure> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `true` if `haystack` contains the EICAR pattern.
pub fn contains_eicar(haystack: &[u8]) -> bool {
    haystack.windows(EICAR.len()).any(|w| w == EICAR)
}

#[async_trait]
impl Scanner for MockScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, mut stream: ByteStream) -> Result<ScanVerdict, ScanError> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);

        if let Some(failure) = self.next_failure() {
            return Err(failure.to_error());
        }

        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .await
            .map_err(ScanError::SourceRead)?;

        if contains_eicar(&data) {
            Ok(ScanVerdict::infected(EICAR_SIGNATURE))
        } else {
            Ok(ScanVerdict::clean())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{byte_stream_from_bytes, ChunkedReader};

    #[tokio::test]
    async fn test_mock_scanner_clean() {
        let scanner = MockScanner::new();
        let verdict = scanner
            .scan(byte_stream_from_bytes(b"hello".to_vec()))
            .await
            .unwrap();
        assert!(verdict.is_clean());
        assert_eq!(scanner.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_scanner_eicar_across_chunks() {
        let scanner = MockScanner::new();
        let stream: ByteStream = Box::new(ChunkedReader::split(EICAR, 7));
        let verdict = scanner.scan(stream).await.unwrap();
        assert_eq!(verdict.virus_name(), Some(EICAR_SIGNATURE));
    }

    #[tokio::test]
    async fn test_mock_scanner_scripted_failures() {
        let scanner = MockScanner::new().with_failures(MockFailure::Protocol, 1);

        let first = scanner.scan(byte_stream_from_bytes(Vec::new())).await;
        assert!(matches!(first, Err(ScanError::Protocol { .. })));

        let second = scanner.scan(byte_stream_from_bytes(Vec::new())).await;
        assert!(second.unwrap().is_clean());
        assert_eq!(scanner.scan_count(), 2);
    }
}
