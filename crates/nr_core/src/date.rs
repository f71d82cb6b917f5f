use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Shown by the API when an item carries no timestamp at all.
pub const MISSING_DATE: &str = "Дата відсутня";

/// Parses the timestamp shapes the data sources produce.
///
/// RFC 3339 values keep their offset, naive date-times are read as local time and
/// bare dates as UTC midnight.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Formats a timestamp as `DD.MM.YYYY` in local calendar fields.
///
/// Input that does not parse is returned unchanged.
pub fn format_date(input: &str) -> String {
    match parse_timestamp(input) {
        Some(dt) => format_datetime(&dt),
        None => input.to_string(),
    }
}

pub fn format_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Local).format("%d.%m.%Y").to_string()
}

pub fn formatted_or_missing(input: Option<&str>) -> String {
    match input {
        Some(value) if !value.is_empty() => format_date(value),
        _ => MISSING_DATE.to_string(),
    }
}

/// Current time in the `toISOString` shape used for `createdAt`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
