//! Pure checks applied to an upload before anything touches the disk.

/// Returns true if the filename ends with one of the allowed suffixes.
///
/// Comparison is case-insensitive on both sides, so `"REPORT.PDF"` matches `".pdf"` and a
/// configured `".PDF"` matches `"report.pdf"`. Suffixes are matched as plain string endings,
/// which means multi-part suffixes such as `".tar.gz"` work as expected.
pub fn validate_extension(filename: &str, allowed: &[String]) -> bool {
    let lower = filename.to_lowercase();
    allowed.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Returns true if `byte_count` does not exceed `max_bytes`.
pub fn validate_size(byte_count: u64, max_bytes: u64) -> bool {
    byte_count <= max_bytes
}

/// Message returned when an upload exceeds `max_bytes`, with the limit expressed in MB.
pub fn size_limit_message(max_bytes: u64) -> String {
    format!(
        "File size exceeds maximum allowed size of {:.1}MB",
        max_bytes as f64 / 1024.0 / 1024.0
    )
}
