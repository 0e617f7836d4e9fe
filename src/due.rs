use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::models::DueStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct DueMeta {
    pub label: Option<String>,
    pub status: DueStatus,
}

impl DueMeta {
    pub fn none() -> Self {
        Self {
            label: None,
            status: DueStatus::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    #[default]
    H24,
    H12,
}

impl TimeFormat {
    /// Regions that read the clock in 12-hour form; everyone else gets 24-hour.
    const TWELVE_HOUR_LOCALES: [&'static str; 8] = [
        "en-us", "en-ca", "en-au", "en-nz", "en-ph", "en-in", "es-mx", "ar-eg",
    ];

    pub fn detect() -> Self {
        Self::from_locale(&sys_locale::get_locale().unwrap_or_default())
    }

    pub fn from_locale(locale: &str) -> Self {
        let normalized = locale.trim().replace('_', "-").to_lowercase();
        let matched = Self::TWELVE_HOUR_LOCALES
            .iter()
            .any(|prefix| normalized.starts_with(prefix));
        if matched {
            TimeFormat::H12
        } else {
            TimeFormat::H24
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            TimeFormat::H24 => "%H:%M",
            TimeFormat::H12 => "%I:%M %p",
        }
    }
}

/// Parses the timestamp shapes the server has been seen to emit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn timestamp_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Canonical wire form: RFC 3339, UTC, millisecond precision.
pub fn to_iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn classify<Tz>(due_date: Option<&str>, now: &DateTime<Tz>) -> DueMeta
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    classify_with(due_date, now, TimeFormat::H24)
}

/// Labels a due timestamp relative to the calendar day of `now`, in `now`'s timezone.
pub fn classify_with<Tz>(due_date: Option<&str>, now: &DateTime<Tz>, format: TimeFormat) -> DueMeta
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let due = match due_date.and_then(parse_timestamp) {
        Some(due) => due.with_timezone(&now.timezone()),
        None => return DueMeta::none(),
    };

    let diff_days = (due.date_naive() - now.date_naive()).num_days();
    let (prefix, status) = match diff_days {
        days if days < 0 => (format!("Late by {} days", days.abs()), DueStatus::Overdue),
        0 => ("Today".to_string(), DueStatus::Today),
        1 => ("Tomorrow".to_string(), DueStatus::Upcoming),
        days => (format!("In {days} days"), DueStatus::Upcoming),
    };
    let time = due.format(format.pattern());

    DueMeta {
        label: Some(format!("{prefix} • {time}")),
        status,
    }
}
