//! Shared CLI argument parsers.

use autoballoon::config::parse_size_kib;

/// Parse a memory size (e.g. "2048", "512M", "2GiB") into KiB.
pub fn parse_size(s: &str) -> Result<u64, String> {
    parse_size_kib(s)
}

/// Parse a poll period in whole seconds.
///
/// Accepts a bare number or a humantime duration such as "30s" or "1m".
pub fn parse_period(s: &str) -> Result<u64, String> {
    if let Ok(secs) = s.trim().parse::<u64>() {
        return Ok(secs);
    }

    let duration = humantime::parse_duration(s).map_err(|e| format!("invalid period {:?}: {}", s, e))?;
    if duration.subsec_nanos() != 0 {
        return Err(format!("period must be whole seconds: {:?}", s));
    }
    Ok(duration.as_secs())
}
