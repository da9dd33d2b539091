/// Formats a byte count as a human-readable decimal size.
///
/// Uses powers of 1000 and one decimal place, the way the front-end shows
/// sizes next to each format.
///
/// # Example
///
/// ```
/// use vidfetch::core::utils::format_filesize;
///
/// assert_eq!(format_filesize(999), "999 Bytes");
/// assert_eq!(format_filesize(1_500), "1.5 kB");
/// assert_eq!(format_filesize(12_345_678), "12.3 MB");
/// ```
pub fn format_filesize(bytes: u64) -> String {
    const SUFFIXES: [&str; 8] = ["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
    const BASE: f64 = 1000.0;

    if bytes == 1 {
        return "1 Byte".to_string();
    }
    if bytes < 1000 {
        return format!("{} Bytes", bytes);
    }

    let value = bytes as f64;
    let mut unit = BASE;
    for suffix in SUFFIXES {
        unit *= BASE;
        if value < unit {
            return format!("{:.1} {}", BASE * value / unit, suffix);
        }
    }
    format!("{:.1} YB", BASE * value / unit)
}

/// Formats seconds as `H:MM:SS` (hours are not zero-padded and not capped).
///
/// # Example
///
/// ```
/// use vidfetch::core::utils::format_hms;
///
/// assert_eq!(format_hms(205), "0:03:25");
/// assert_eq!(format_hms(3_725), "1:02:05");
/// ```
pub fn format_hms(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{}:{:02}:{:02}", h, m, s)
}
