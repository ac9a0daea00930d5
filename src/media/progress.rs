//! Download progress reporting.

use tracing::debug;

/// Receives progress of a single media download.
///
/// Purely advisory: implementations must not influence the download.
pub trait ProgressSink: Send + Sync {
    fn start(&self, uri: &str, total: Option<u64>);

    fn advance(&self, uri: &str, received: u64, total: Option<u64>);

    fn finish(&self, uri: &str, received: u64);
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _uri: &str, _total: Option<u64>) {}

    fn advance(&self, _uri: &str, _received: u64, _total: Option<u64>) {}

    fn finish(&self, _uri: &str, _received: u64) {}
}

/// Emits progress as `debug` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn start(&self, uri: &str, total: Option<u64>) {
        debug!(uri = %uri, total = ?total, "Downloading media");
    }

    fn advance(&self, uri: &str, received: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                let percent = received as f64 * 100.0 / total as f64;
                debug!(uri = %uri, received, total, "{percent:.1}%");
            }
            _ => debug!(uri = %uri, received, "Received bytes"),
        }
    }

    fn finish(&self, uri: &str, received: u64) {
        debug!(uri = %uri, received, "Download complete");
    }
}
