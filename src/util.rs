use chrono::{DateTime, NaiveDate};

/// Converts a provider epoch timestamp to the trading date in the exchange's local time.
pub fn timestamp_to_date(timestamp: i64, utc_offset_secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp.checked_add(utc_offset_secs)?, 0).map(|dt| dt.date_naive())
}

/// Formats a number rounded to an integer with comma thousands separators, e.g. `1,234,568`.
pub fn group_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `12.345` -> `12.35%`
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_uses_exchange_offset() {
        // 2024-10-16 13:30 UTC is still 2024-10-16 in New York (-4h)
        let date = timestamp_to_date(1729085400, -14400).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 10, 16).unwrap());
        // 2024-10-17 02:00 UTC is the evening of the 16th in New York
        let date = timestamp_to_date(1729130400, -14400).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 10, 16).unwrap());
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.4), "999");
        assert_eq!(group_thousands(1000.0), "1,000");
        assert_eq!(group_thousands(1234567.6), "1,234,568");
        assert_eq!(group_thousands(-45210.0), "-45,210");
    }

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(format_percent(10.0), "10.00%");
        assert_eq!(format_percent(-3.14159), "-3.14%");
    }
}
