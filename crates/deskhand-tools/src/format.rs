//! Human-readable formatting for durations, sizes and rates.

use chrono::NaiveDateTime;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 3600.0;
const DAY: f64 = 24.0 * HOUR;
const MONTH: f64 = 30.44 * DAY;
const YEAR: f64 = 365.25 * DAY;

/// `1y 2mo 3d 4h 5m`, omitting zero units. Anything under a minute is `0m`.
pub fn format_uptime(seconds: u64) -> String {
    let s = seconds as f64;
    let years = (s / YEAR).floor();
    let months = ((s % YEAR) / MONTH).floor();
    let days = ((s % MONTH) / DAY).floor();
    let hours = ((s % DAY) / HOUR).floor();
    let minutes = ((s % HOUR) / MINUTE).floor();

    let parts: Vec<String> = [
        (years, "y"),
        (months, "mo"),
        (days, "d"),
        (hours, "h"),
        (minutes, "m"),
    ]
    .iter()
    .filter(|(value, _)| *value > 0.0)
    .map(|(value, unit)| format!("{value}{unit}"))
    .collect();

    if parts.is_empty() {
        "0m".to_string()
    } else {
        parts.join(" ")
    }
}

/// Size in B/KB/MB/GB (base 1024) with up to two decimals.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(&format!("{value:.2}")), UNITS[unit])
}

/// Throughput as MB/s, KB/s or B/s.
pub fn format_network_speed(bytes_per_sec: f64) -> String {
    let kbps = bytes_per_sec / 1024.0;
    let mbps = kbps / 1024.0;
    if mbps >= 1.0 {
        format!("{mbps:.1} MB/s")
    } else if kbps >= 1.0 {
        format!("{kbps:.1} KB/s")
    } else {
        format!("{bytes_per_sec:.0} B/s")
    }
}

/// Escape the characters Telegram's legacy Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `dd.mm.yy-HH.MM.SS`, used to prefix saved uploads.
pub fn file_timestamp(at: NaiveDateTime) -> String {
    at.format("%d.%m.%y-%H.%M.%S").to_string()
}

/// Drop trailing zeros after the decimal point, and the point itself.
fn trim_decimals(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
