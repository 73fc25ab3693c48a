//! Parsing of engine progress output.
//!
//! The transcoder reports the input duration once on stderr
//! (`Duration: HH:MM:SS.cc`) and then key=value progress blocks on stdout
//! (`-progress pipe:1`). Progress is the ratio of `out_time_us` to the
//! duration.

/// Parse a `Duration: 00:01:02.50, start: ...` stderr line into microseconds.
///
/// Returns `None` for other lines and for `Duration: N/A`.
pub fn parse_duration_line(line: &str) -> Option<u64> {
    let rest = line.trim_start().strip_prefix("Duration:")?.trim_start();
    let stamp = rest.split(',').next()?.trim();

    let mut parts = stamp.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let total = (hours * 3600 + minutes * 60) as f64 + seconds;
    Some((total * 1_000_000.0).round() as u64)
}

/// Parse one stdout progress line into a fraction of `duration_us`.
///
/// `progress=end` always maps to `1.0`. Time lines are ignored while the
/// duration is unknown (zero).
pub fn parse_progress_line(line: &str, duration_us: u64) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "progress" if value == "end" => Some(1.0),
        // out_time_ms is also in microseconds
        "out_time_us" | "out_time_ms" => {
            if duration_us == 0 {
                return None;
            }
            let elapsed: i64 = value.parse().ok()?;
            if elapsed < 0 {
                return None;
            }
            Some((elapsed as f64 / duration_us as f64).min(1.0))
        }
        _ => None,
    }
}
