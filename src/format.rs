//! Display formatting for amounts and timestamps.
//!
//! Amounts are rendered in Indian Rupees with Indian digit grouping
//! (`₹1,23,456.78`); timestamps are shown in India Standard Time.

use time::format_description::well_known::Rfc3339;
use time::macros::{format_description, offset};
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub const RUPEE: &str = "₹";

/// India Standard Time. No daylight saving, so a fixed offset is exact.
pub const IST: UtcOffset = offset!(+5:30);

/// `1234567.5` -> `12,34,567.50`. Non-finite input formats as zero.
pub fn format_amount(amount: f64) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let s = format!("{:.2}", amount.abs());
    let (int_part, dec_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let negative = amount < 0.0 && s.chars().any(|c| c != '0' && c != '.');
    let sign = if negative { "-" } else { "" };
    format!("{}{}.{}", sign, group_indian(int_part), dec_part)
}

/// `49.99` -> `₹49.99`, `-1500` -> `-₹1,500.00`.
pub fn format_currency(amount: f64) -> String {
    let body = format_amount(amount);
    match body.strip_prefix('-') {
        Some(rest) => format!("-{RUPEE}{rest}"),
        None => format!("{RUPEE}{body}"),
    }
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);

    let mut out = String::new();
    let chars: Vec<char> = head.chars().collect();
    let mut cnt = 0;
    for i in (0..chars.len()).rev() {
        if cnt == 2 {
            out.push(',');
            cnt = 0;
        }
        out.push(chars[i]);
        cnt += 1;
    }
    let head_grouped: String = out.chars().rev().collect();
    format!("{},{}", head_grouped, tail)
}

/// Accepts RFC 3339 (what the store returns for `timestamptz`), a bare
/// `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC) or a plain `YYYY-MM-DD` date
/// (read as midnight IST so the calendar day is preserved).
pub fn parse_timestamp(input: &str) -> Option<OffsetDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt);
    }
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    if let Ok(dt) = PrimitiveDateTime::parse(s, naive) {
        return Some(dt.assume_utc());
    }
    let day = format_description!("[year]-[month]-[day]");
    Date::parse(s, day)
        .ok()
        .map(|d| d.midnight().assume_offset(IST))
}

/// `dd/MM/yyyy` in IST.
pub fn format_date(at: OffsetDateTime) -> String {
    let d = at.to_offset(IST).date();
    format!("{:02}/{:02}/{:04}", d.day(), u8::from(d.month()), d.year())
}

/// `dd/MM/yyyy, HH:mm` in IST.
pub fn format_date_time(at: OffsetDateTime) -> String {
    let local = at.to_offset(IST);
    format!(
        "{}, {:02}:{:02}",
        format_date(local),
        local.hour(),
        local.minute()
    )
}

/// Formats a stored timestamp string; unparseable input is shown as-is.
pub fn format_date_str(input: &str) -> String {
    parse_timestamp(input)
        .map(format_date)
        .unwrap_or_else(|| input.to_string())
}

pub fn format_date_time_str(input: &str) -> String {
    parse_timestamp(input)
        .map(format_date_time)
        .unwrap_or_else(|| input.to_string())
}

/// Distance phrase relative to `now`, e.g. `3 days ago` or `in about 2 hours`.
/// Buckets follow date-fns `formatDistance`: months are 30-day spans and past
/// a year the remainder picks "about", "over" or "almost".
pub fn format_relative_time(at: OffsetDateTime, now: OffsetDateTime) -> String {
    let delta = now - at;
    let future = delta.is_negative();
    let secs = delta.whole_seconds().unsigned_abs();

    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const MONTH: u64 = 30 * DAY;

    let minutes = (secs + MINUTE / 2) / MINUTE;
    let months = secs / MONTH;
    let phrase = if secs < 30 {
        "less than a minute".to_string()
    } else if secs < 90 {
        "1 minute".to_string()
    } else if secs < 45 * MINUTE {
        format!("{} minutes", minutes)
    } else if secs < 90 * MINUTE {
        "about 1 hour".to_string()
    } else if secs < DAY {
        format!("about {} hours", (secs + HOUR / 2) / HOUR)
    } else if secs < 42 * HOUR {
        "1 day".to_string()
    } else if secs < MONTH {
        format!("{} days", (secs + DAY / 2) / DAY)
    } else if secs < 45 * DAY {
        "about 1 month".to_string()
    } else if secs < 60 * DAY {
        "about 2 months".to_string()
    } else if months < 12 {
        format!("{} months", months.max(2))
    } else {
        let years = months / 12;
        let rest = months % 12;
        if rest < 3 {
            format!("about {}", plural_years(years))
        } else if rest < 9 {
            format!("over {}", plural_years(years))
        } else {
            format!("almost {}", plural_years(years + 1))
        }
    };

    if future {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

fn plural_years(n: u64) -> String {
    if n == 1 {
        "1 year".to_string()
    } else {
        format!("{n} years")
    }
}

pub fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Today's calendar date in IST as `YYYY-MM-DD`.
pub fn today_ymd() -> String {
    let d = OffsetDateTime::now_utc().to_offset(IST).date();
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn currency_uses_rupee_and_two_decimals() {
        assert_eq!(format_currency(49.99), "₹49.99");
        assert_eq!(format_currency(0.0), "₹0.00");
        assert_eq!(format_currency(230.0), "₹230.00");
    }

    #[test]
    fn currency_groups_lakhs_and_crores() {
        assert_eq!(format_currency(1234.5), "₹1,234.50");
        assert_eq!(format_currency(123456.78), "₹1,23,456.78");
        assert_eq!(format_currency(12345678.0), "₹1,23,45,678.00");
    }

    #[test]
    fn negative_amounts_put_sign_before_symbol() {
        assert_eq!(format_currency(-1500.0), "-₹1,500.00");
        assert_eq!(format_currency(-0.001), "₹0.00");
    }

    #[test]
    fn non_finite_amounts_format_as_zero() {
        assert_eq!(format_currency(f64::NAN), "₹0.00");
        assert_eq!(format_currency(f64::INFINITY), "₹0.00");
    }

    #[test]
    fn dates_are_shown_in_ist() {
        // 20:00 UTC is already the next day in India.
        let at = datetime!(2024-03-09 20:00 UTC);
        assert_eq!(format_date(at), "10/03/2024");
        assert_eq!(format_date_time(at), "10/03/2024, 01:30");
    }

    #[test]
    fn parses_store_timestamp_shapes() {
        assert_eq!(
            format_date_time_str("2024-05-01T10:20:30.123456+00:00"),
            "01/05/2024, 15:50"
        );
        assert_eq!(format_date_str("2024-05-01T10:20:30"), "01/05/2024");
        assert_eq!(format_date_str("2024-05-01"), "01/05/2024");
        assert_eq!(format_date_str("yesterday"), "yesterday");
    }

    #[test]
    fn relative_time_phrases() {
        let now = datetime!(2024-05-10 12:00 UTC);
        assert_eq!(
            format_relative_time(datetime!(2024-05-10 11:59:50 UTC), now),
            "less than a minute ago"
        );
        assert_eq!(
            format_relative_time(datetime!(2024-05-10 11:50 UTC), now),
            "10 minutes ago"
        );
        assert_eq!(
            format_relative_time(datetime!(2024-05-10 09:00 UTC), now),
            "about 3 hours ago"
        );
        assert_eq!(
            format_relative_time(datetime!(2024-05-07 12:00 UTC), now),
            "3 days ago"
        );
        assert_eq!(
            format_relative_time(datetime!(2024-05-12 12:00 UTC), now),
            "in 2 days"
        );
    }

    #[test]
    fn relative_time_year_buckets() {
        let now = datetime!(2024-05-10 12:00 UTC);
        let days_ago = |d: i64| now - time::Duration::days(d);
        assert_eq!(format_relative_time(days_ago(50), now), "about 2 months ago");
        assert_eq!(format_relative_time(days_ago(130), now), "4 months ago");
        assert_eq!(format_relative_time(days_ago(400), now), "about 1 year ago");
        assert_eq!(format_relative_time(days_ago(500), now), "over 1 year ago");
        assert_eq!(format_relative_time(days_ago(660), now), "almost 2 years ago");
        assert_eq!(format_relative_time(days_ago(1100), now), "about 3 years ago");
    }
}
