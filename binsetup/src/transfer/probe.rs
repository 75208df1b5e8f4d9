//! Size and Range-capability discovery.

use tracing::{debug, warn};

use super::http::HttpSource;

/// What the server disclosed about a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeResult {
    /// Total length in bytes (0 if unknown).
    pub total_bytes: u64,
    /// Whether byte-range requests are honoured.
    pub supports_range: bool,
}

impl ProbeResult {
    /// Whether the windowed, resumable engine can be used.
    pub fn is_chunkable(&self) -> bool {
        self.supports_range && self.total_bytes > 0
    }
}

/// Probe `url` for its length and Range support.
///
/// Never fails: transport errors degrade to "length unknown, no ranges",
/// which routes the caller onto the streaming path. Nothing is written to
/// disk.
pub fn probe(source: &dyn HttpSource, url: &str) -> ProbeResult {
    let mut result = ProbeResult::default();

    match source.head(url) {
        Ok(head) if (200..300).contains(&head.status) => {
            result.total_bytes = head.content_length.unwrap_or(0);
            result.supports_range = head
                .accept_ranges
                .as_deref()
                .is_some_and(|v| v.eq_ignore_ascii_case("bytes"))
                || head.content_range.is_some();
        }
        Ok(head) => {
            debug!(url, status = head.status, "HEAD not usable, trying range probe");
        }
        Err(e) => {
            warn!(url, error = %e, "HEAD request failed, falling back to direct download");
            return result;
        }
    }

    if result.total_bytes == 0 {
        match source.get_range(url, 0, 0) {
            Ok(response) if response.status == 206 => {
                result.supports_range = true;
                if let Some(total) = response
                    .content_range
                    .as_deref()
                    .and_then(parse_content_range_total)
                {
                    result.total_bytes = total;
                }
            }
            Ok(response) => {
                debug!(url, status = response.status, "range probe not honoured");
            }
            Err(e) => {
                warn!(url, error = %e, "range probe failed, falling back to direct download");
                return ProbeResult::default();
            }
        }
    }

    debug!(
        url,
        total_bytes = result.total_bytes,
        supports_range = result.supports_range,
        "probe complete"
    );
    result
}

/// Extract the complete-length field from a `Content-Range` header value.
///
/// `bytes 0-0/1234` yields `Some(1234)`; an unknown length (`*`) yields `None`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}

/// Extract the first-byte position from a `Content-Range` header value.
///
/// `bytes 1000-1999/3000` yields `Some(1000)`; `bytes */3000` yields `None`.
pub fn parse_content_range_start(value: &str) -> Option<u64> {
    let value = value.trim();
    let spec = value.strip_prefix("bytes").unwrap_or(value).trim_start();
    let (first, _) = spec.split_once('-')?;
    first.trim().parse::<u64>().ok()
}
