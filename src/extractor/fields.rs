//! Tag value parsing with fallbacks, plus display formatting.
//!
//! Every parser here is total: absent or malformed input yields the
//! documented default instead of an error.

/// Text used for absent text tags.
pub const UNKNOWN: &str = "Unknown";

/// Trimmed text, or [`UNKNOWN`] when absent.
pub fn text_or_unknown(raw: Option<&str>) -> String {
    raw.map(|s| s.trim().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Integer value, 0 when absent or non-numeric.
pub fn int_or_zero(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0)
}

/// Float value, 0 when absent, non-numeric or not finite.
pub fn float_or_zero(raw: Option<&str>) -> f32 {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Year from a year or date tag (`"1999"`, `"1999-04-01"`), 0 otherwise.
pub fn year_or_zero(raw: Option<&str>) -> i32 {
    let Some(raw) = raw.map(str::trim) else {
        return 0;
    };
    raw.parse::<i32>()
        .ok()
        .or_else(|| {
            let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
            if digits.len() == 4 { digits.parse().ok() } else { None }
        })
        .unwrap_or(0)
}

/// Bytes to megabytes.
pub fn bytes_to_mb(bytes: i64) -> f32 {
    (bytes.max(0) as f64 / (1024.0 * 1024.0)) as f32
}

/// Unix seconds as `dd Mon yyyy` (UTC), empty for out-of-range values.
pub fn format_date(unix_secs: i64) -> String {
    chrono::DateTime::from_timestamp(unix_secs, 0)
        .map(|dt| dt.format("%d %b %Y").to_string())
        .unwrap_or_default()
}

/// Milliseconds as `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_duration(millis: i64) -> String {
    let total_secs = millis.max(0) / 1000;
    let (hours, minutes, seconds) = (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_fallback() {
        assert_eq!(text_or_unknown(Some("  Björk ")), "Björk");
        assert_eq!(text_or_unknown(None), UNKNOWN);
    }

    #[test]
    fn test_numeric_fallbacks() {
        assert_eq!(int_or_zero(Some("215000")), 215_000);
        assert_eq!(int_or_zero(Some("abc")), 0);
        assert_eq!(int_or_zero(None), 0);
        assert_eq!(float_or_zero(Some("44100")), 44_100.0);
        assert_eq!(float_or_zero(Some("NaN")), 0.0);
        assert_eq!(float_or_zero(Some("")), 0.0);
    }

    #[test]
    fn test_year_parsing() {
        assert_eq!(year_or_zero(Some("1997")), 1997);
        assert_eq!(year_or_zero(Some("2004-05-01")), 2004);
        assert_eq!(year_or_zero(Some("sometime")), 0);
        assert_eq!(year_or_zero(Some("19")), 19);
        assert_eq!(year_or_zero(None), 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(61_500), "1:01");
        assert_eq!(format_duration(3_725_000), "1:02:05");
        assert_eq!(format_duration(-5), "0:00");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(0), "01 Jan 1970");
        assert_eq!(format_date(1_700_000_000), "14 Nov 2023");
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(1_048_576), 1.0);
        assert_eq!(bytes_to_mb(-1), 0.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Parsers never panic and non-numeric input yields zero.
            #[test]
            fn alphabetic_input_falls_back(input in "[a-zA-Z ]{0,20}") {
                prop_assert_eq!(int_or_zero(Some(&input)), 0);
                prop_assert_eq!(year_or_zero(Some(&input)), 0);
                prop_assert_eq!(float_or_zero(Some(&input)), 0.0);
            }

            /// Numbers survive surrounding whitespace.
            #[test]
            fn numbers_roundtrip(n in 0i64..10_000_000, pad in " {0,3}") {
                let raw = format!("{pad}{n}{pad}");
                prop_assert_eq!(int_or_zero(Some(&raw)), n);
            }

            /// Formatted durations always have two-digit seconds.
            #[test]
            fn duration_format_shape(ms in 0i64..100_000_000) {
                let formatted = format_duration(ms);
                let secs = formatted.rsplit(':').next().unwrap();
                prop_assert_eq!(secs.len(), 2);
            }
        }
    }
}
