//! Human-readable labels for install progress.

const MIB: f64 = 1024.0 * 1024.0;

/// Label shown when no ETA can be computed.
pub const ETA_UNKNOWN: &str = "Unknown";

/// Bytes as mebibytes with one decimal, e.g. `"12.5"`.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / MIB)
}

/// Throughput label, e.g. `"3.2 MB/s"`.
pub fn format_speed(speed_bps: f64) -> String {
    format!("{:.1} MB/s", speed_bps.max(0.0) / MIB)
}

/// Time-remaining label: `"Xm Ys"` above one minute, `"Ns"` otherwise.
///
/// Returns [`ETA_UNKNOWN`] when the speed is zero or the total is unknown.
pub fn format_eta(remaining_bytes: Option<u64>, speed_bps: f64) -> String {
    match remaining_bytes {
        Some(remaining) if remaining > 0 && speed_bps > 0.0 => {
            let secs = (remaining as f64 / speed_bps).ceil() as u64;
            if secs > 60 {
                format!("{}m {}s", secs / 60, secs % 60)
            } else {
                format!("{}s", secs)
            }
        }
        _ => ETA_UNKNOWN.to_string(),
    }
}

/// Percent complete in `0.0..=100.0`.
///
/// With an unknown total this is a sawtooth over downloaded MiB so a
/// progress bar still moves.
pub fn progress_percent(loaded_bytes: u64, total_bytes: u64) -> f64 {
    if total_bytes > 0 {
        (loaded_bytes as f64 / total_bytes as f64 * 100.0).min(100.0)
    } else {
        ((loaded_bytes / (1024 * 1024)) % 100) as f64
    }
}

/// Status phrase for a running download, e.g.
/// `"Downloading yt-dlp... 1.5 / 10.0 MB"`.
pub fn download_status(label: &str, loaded_bytes: u64, total_bytes: u64) -> String {
    let total = if total_bytes > 0 {
        format_mb(total_bytes)
    } else {
        "?".to_string()
    };
    format!(
        "Downloading {}... {} / {} MB",
        label,
        format_mb(loaded_bytes),
        total
    )
}
