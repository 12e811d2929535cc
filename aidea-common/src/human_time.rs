//! Human-readable work durations
//!
//! Durations are stored the way Jira/Tempo displays them: `"Xh Ym"`, `"Xh"` or
//! `"Ym"`. Text generation produces these strings; this module converts them
//! to seconds when a local conversion is needed.

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3600;

/// Parse a `"Xh Ym"` style duration into seconds.
///
/// Accepts any whitespace between components, an optional trailing `s` for
/// seconds, and upper or lower case unit letters. Returns `None` for empty
/// input, unknown units, or a repeated unit.
///
/// # Examples
///
/// ```
/// use aidea_common::human_time::parse_duration_seconds;
///
/// assert_eq!(parse_duration_seconds("1h 15m"), Some(4500));
/// assert_eq!(parse_duration_seconds("45m"), Some(2700));
/// assert_eq!(parse_duration_seconds("2h"), Some(7200));
/// assert_eq!(parse_duration_seconds("soon"), None);
/// ```
pub fn parse_duration_seconds(s: &str) -> Option<i64> {
    let compact: String = s.split_whitespace().collect();
    if compact.is_empty() {
        return None;
    }

    let mut total = 0i64;
    let mut digits = String::new();
    let mut seen = [false; 3];

    for c in compact.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let (slot, scale) = match c.to_ascii_lowercase() {
            'h' => (0, SECONDS_PER_HOUR),
            'm' => (1, SECONDS_PER_MINUTE),
            's' => (2, 1),
            _ => return None,
        };
        if digits.is_empty() || seen[slot] {
            return None;
        }
        seen[slot] = true;

        let value: i64 = digits.parse().ok()?;
        total = total.checked_add(value.checked_mul(scale)?)?;
        digits.clear();
    }

    // Trailing number without a unit
    if !digits.is_empty() {
        return None;
    }

    Some(total)
}
