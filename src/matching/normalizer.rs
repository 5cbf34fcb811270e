use chrono::NaiveDate;

/// Canonical comparison form for free-text fields: lower-case, trimmed,
/// internal whitespace runs collapsed to a single space.
pub fn normalize_text(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical comparison form for phone numbers.
///
/// Keeps decimal digits only, then strips a leading "1" country code when
/// exactly 11 digits remain, so "+1 (555) 123-4567" and "555-123-4567"
/// compare equal as the national number "5551234567".
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}

/// Parse a stored date string into a calendar date, trying multiple formats.
///
/// Time-of-day and timezone information is discarded; malformed input yields
/// None rather than an error.
pub fn parse_calendar_date(date_str: &str) -> Option<NaiveDate> {
    let date_str = date_str.trim();

    // Try RFC3339 format with timezone (1990-05-15T10:30:00+00:00)
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(date_str) {
        return Some(datetime.date_naive());
    }

    // Try ISO format with time but no timezone (1990-05-15T10:30:00)
    if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime.date());
    }

    // Try ISO format (YYYY-MM-DD)
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Some(date);
    }

    // Try common formats
    let formats = [
        "%Y/%m/%d", // 1990/05/15
        "%m/%d/%Y", // 05/15/1990
        "%d %B %Y", // 15 May 1990
    ];

    for format in &formats {
        if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
            return Some(date);
        }
    }

    None
}
