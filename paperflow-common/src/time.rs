//! Timestamp utilities

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Unix epoch, the ordering floor for missing or corrupt timestamps
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Parse an ISO 8601 timestamp, falling back to the epoch
///
/// Accepts RFC 3339 (`2024-03-01T12:00:00Z`, offsets) and the naive
/// `YYYY-MM-DD HH:MM:SS` form, read as UTC. Anything else maps to
/// [`epoch`], never to the current time.
pub fn parse_timestamp_or_epoch(value: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return epoch();
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(|_| epoch())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_zulu() {
        let ts = parse_timestamp_or_epoch(Some("2024-03-01T12:00:00Z"));
        assert_eq!(ts.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_offset_converted_to_utc() {
        let ts = parse_timestamp_or_epoch(Some("2024-03-01T14:00:00+02:00"));
        assert_eq!(ts, parse_timestamp_or_epoch(Some("2024-03-01T12:00:00Z")));
    }

    #[test]
    fn test_naive_form() {
        let ts = parse_timestamp_or_epoch(Some("2021-07-04 08:30:00"));
        assert_eq!(ts.timestamp(), 1_625_387_400);
    }

    #[test]
    fn test_missing_and_garbage_are_epoch() {
        assert_eq!(parse_timestamp_or_epoch(None), epoch());
        assert_eq!(parse_timestamp_or_epoch(Some("")), epoch());
        assert_eq!(parse_timestamp_or_epoch(Some("yesterday")), epoch());
        assert_eq!(parse_timestamp_or_epoch(Some("2024-13-45T99:00:00Z")), epoch());
    }

    #[test]
    fn test_epoch_sorts_before_real_dates() {
        assert!(epoch() < parse_timestamp_or_epoch(Some("1971-01-01T00:00:00Z")));
    }
}
