//! Small rendering helpers shared by the report builders.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as Json;

/// Placeholder for structurally mandatory text that the provider left out.
pub const NOT_AVAILABLE: &str = "N/A";

pub fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Unix epoch seconds as `HH:MM` in `tz`.
pub fn epoch_clock<Tz>(secs: f64, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if !secs.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs.trunc() as i64, 0)
        .map(|dt| dt.with_timezone(tz).format("%H:%M").to_string())
}

/// RFC 3339 timestamp (`Z` or numeric offset) parsed to UTC.
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// RFC 3339 timestamp as `HH:MM` in `tz`.
pub fn iso_clock<Tz>(s: &str, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    parse_iso(s).map(|dt| dt.with_timezone(tz).format("%H:%M").to_string())
}

/// `Weekday HH:MM AM/PM`, as used for forecast periods.
pub fn period_label<Tz>(dt: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dt.with_timezone(tz).format("%a %I:%M %p").to_string()
}

/// Scalar JSON rendered as text the way the provider sent it.
pub fn json_text(value: Option<&Json>) -> Option<String> {
    match value? {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use serde_json::json;

    #[test]
    fn epoch_in_utc_and_offset_zone() {
        assert_eq!(epoch_clock(1_700_000_000.0, &Utc).as_deref(), Some("22:13"));

        let mst = FixedOffset::west_opt(7 * 3600).unwrap();
        assert_eq!(epoch_clock(1_700_000_000.0, &mst).as_deref(), Some("15:13"));
        assert_eq!(epoch_clock(f64::NAN, &Utc), None);
    }

    #[test]
    fn iso_with_z_suffix_is_utc() {
        let mst = FixedOffset::west_opt(7 * 3600).unwrap();
        assert_eq!(iso_clock("2024-06-01T18:55:00Z", &mst).as_deref(), Some("11:55"));
        assert_eq!(iso_clock("2024-06-01T11:55:00-07:00", &Utc).as_deref(), Some("18:55"));
        assert_eq!(iso_clock("yesterday", &Utc), None);
    }

    #[test]
    fn period_label_is_twelve_hour() {
        let dt = parse_iso("2024-06-01T21:00:00Z").unwrap();
        assert_eq!(period_label(&dt, &Utc), "Sat 09:00 PM");
    }

    #[test]
    fn json_text_keeps_provider_rendering() {
        assert_eq!(json_text(Some(&json!(75))).as_deref(), Some("75"));
        assert_eq!(json_text(Some(&json!("10 mph"))).as_deref(), Some("10 mph"));
        assert_eq!(json_text(Some(&json!(null))), None);
        assert_eq!(json_text(None), None);
        assert_eq!(or_na(None), "N/A");
    }
}
