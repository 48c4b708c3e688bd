//! Display formatting for dates, sizes and durations

use chrono::NaiveDate;
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Reformat an 8-digit `YYYYMMDD` date as `Mon DD, YYYY`.
///
/// Anything else, including impossible calendar dates, is returned unchanged.
pub fn format_upload_date(raw: &str) -> String {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }

    match NaiveDate::parse_from_str(raw, "%Y%m%d") {
        Ok(date) => date.format("%b %d, %Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Bytes as MiB with two decimals
pub fn format_bytes(bytes: u64) -> String {
    format!("{:.2}MiB", bytes as f64 / MIB)
}

pub fn format_speed(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(speed) if speed > 0.0 => format!("{:.2}MiB/s", speed / MIB),
        _ => "N/A".to_string(),
    }
}

/// `HH:MM:SS`, or `N/A` when unknown
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => {
            let secs = eta.as_secs();
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
        None => "N/A".to_string(),
    }
}
