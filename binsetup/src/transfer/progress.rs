//! Progress snapshots and speed estimation for transfers.

use std::time::{Duration, Instant};

/// How often the chunked engine re-bases its speed estimate.
pub const CHUNKED_SPEED_WINDOW: Duration = Duration::from_secs(1);

/// Minimum interval between progress callbacks on the streaming path.
pub const STREAM_REPORT_INTERVAL: Duration = Duration::from_millis(200);

/// Snapshot of a running transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    /// Bytes on disk, including bytes from a previous run.
    pub loaded_bytes: u64,
    /// Total expected bytes (0 if unknown).
    pub total_bytes: u64,
    /// Current throughput in bytes per second.
    pub speed_bps: f64,
    /// Windows completed during this run.
    pub chunk_index: u64,
    /// Windows this run has to fetch (1 for streaming).
    pub total_chunks: u64,
    /// Whether the transfer honours pause requests.
    pub resumable: bool,
}

impl TransferProgress {
    /// Bytes still to fetch, if the total is known.
    pub fn remaining_bytes(&self) -> Option<u64> {
        (self.total_bytes > 0).then(|| self.total_bytes.saturating_sub(self.loaded_bytes))
    }
}

/// Callback receiving transfer progress snapshots.
pub type TransferProgressCallback<'a> = dyn Fn(&TransferProgress) + 'a;

/// Sliding-window throughput estimator.
///
/// The rate is measured against an anchor that only moves forward once at
/// least `window` of wall time has passed, so tiny windows on fast links do
/// not produce a jittery instantaneous rate.
#[derive(Debug, Clone)]
pub struct SpeedMeter {
    window: Duration,
    anchor_time: Instant,
    anchor_bytes: u64,
    last_rate: f64,
}

impl SpeedMeter {
    /// Start measuring from `start_bytes` at the current instant.
    pub fn new(window: Duration, start_bytes: u64) -> Self {
        Self::starting_at(window, start_bytes, Instant::now())
    }

    /// Start measuring from `start_bytes` at `now`.
    pub fn starting_at(window: Duration, start_bytes: u64, now: Instant) -> Self {
        Self {
            window,
            anchor_time: now,
            anchor_bytes: start_bytes,
            last_rate: 0.0,
        }
    }

    /// Record the byte counter now and return the current rate.
    pub fn sample(&mut self, bytes: u64) -> f64 {
        self.sample_at(bytes, Instant::now())
    }

    /// Record the byte counter at `now` and return the current rate.
    pub fn sample_at(&mut self, bytes: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.anchor_time);
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.last_rate = bytes.saturating_sub(self.anchor_bytes) as f64 / secs;
        }

        if elapsed >= self.window {
            self.anchor_time = now;
            self.anchor_bytes = bytes;
        }

        self.last_rate
    }

    /// Most recent rate estimate.
    pub fn rate(&self) -> f64 {
        self.last_rate
    }
}
