//! Date layouts and time zones used by date columns.
//!
//! Formats may be written either as chrono `strftime` patterns (`%Y-%m-%d`)
//! or as Go reference layouts (`2006-01-02`), which is how most existing
//! job configurations spell them. Go layouts are compiled to `strftime`.

use std::{fmt::Write, str::FromStr};

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc,
    format::{Item, StrftimeItems},
};
use chrono_tz::Tz;

use crate::error::{InvalidDateFormatSnafu, InvalidTimeZoneSnafu, Result};

/// Layout that source dates are parsed with when the configured format
/// does not match the value.
pub const LEGACY_SOURCE_LAYOUT: &str = "2006/01/02 15:04:05";

/// Layout used to render values that are already timestamps.
pub const TIMESTAMP_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// A compiled date format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLayout {
    pattern: String,
}

/// A time zone, either a fixed offset or a named IANA zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

// Longest tokens first, so `2006` wins over `2` and `January` over `Jan`.
const GO_LAYOUT_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    (".000000000", "%.9f"),
    (".999999999", "%.f"),
    (".000000", "%.6f"),
    (".000", "%.3f"),
    ("Z07:00", "%:z"),
    ("-07:00", "%:z"),
    ("-0700", "%z"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("_2", "%e"),
    ("01", "%m"),
    ("02", "%d"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%P"),
    ("1", "%-m"),
    ("2", "%-d"),
    ("3", "%-I"),
    ("4", "%-M"),
    ("5", "%-S"),
];

impl DateLayout {
    /// Compiles a date format, accepting `strftime` or Go reference layouts.
    pub fn new(format: &str) -> Result<Self> {
        let pattern = if format.contains('%') {
            format.to_string()
        } else {
            compile_go_layout(format)
        };

        if pattern.is_empty() {
            return InvalidDateFormatSnafu {
                format: format.to_string(),
                message: "empty format".to_string(),
            }
            .fail();
        }

        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return InvalidDateFormatSnafu {
                format: format.to_string(),
                message: format!("unsupported pattern {pattern}"),
            }
            .fail();
        }

        Ok(Self { pattern })
    }

    /// The compiled `strftime` pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parses `text` as a UTC instant.
    ///
    /// Layouts without an offset are read as UTC. Layouts without a time
    /// of day resolve to midnight.
    pub fn parse(&self, text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        let text = text.trim();
        if let Ok(parsed) = DateTime::parse_from_str(text, &self.pattern) {
            return Ok(parsed.with_timezone(&Utc));
        }

        match NaiveDateTime::parse_from_str(text, &self.pattern) {
            Ok(parsed) => Ok(parsed.and_utc()),
            Err(datetime_err) => NaiveDate::parse_from_str(text, &self.pattern)
                .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
                .map_err(|_| datetime_err),
        }
    }

    /// Renders `instant` in `zone`.
    pub fn format(&self, instant: &DateTime<Utc>, zone: Zone) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        match zone {
            Zone::Fixed(offset) => write!(
                out,
                "{}",
                instant.with_timezone(&offset).format(&self.pattern)
            )?,
            Zone::Named(tz) => write!(out, "{}", instant.with_timezone(&tz).format(&self.pattern))?,
        }
        Ok(out)
    }
}

impl Zone {
    pub fn utc() -> Self {
        Zone::Fixed(Utc.fix())
    }

    /// Parses `UTC`, a fixed offset like `+08:00`, or an IANA name.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("utc") || name == "Z" {
            return Ok(Zone::utc());
        }
        if let Ok(offset) = FixedOffset::from_str(name) {
            return Ok(Zone::Fixed(offset));
        }
        Tz::from_str(name).map(Zone::Named).map_err(|_| {
            InvalidTimeZoneSnafu {
                name: name.to_string(),
            }
            .build()
        })
    }
}

impl Default for Zone {
    fn default() -> Self {
        Zone::utc()
    }
}

fn compile_go_layout(layout: &str) -> String {
    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    'outer: while !rest.is_empty() {
        for (token, replacement) in GO_LAYOUT_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_go_layouts_compile_to_strftime() {
        assert_eq!(
            DateLayout::new("2006/01/02 15:04:05").unwrap().pattern(),
            "%Y/%m/%d %H:%M:%S"
        );
        assert_eq!(DateLayout::new("2006-01-02").unwrap().pattern(), "%Y-%m-%d");
        assert_eq!(
            DateLayout::new("2006-01-02T15:04:05.000Z07:00")
                .unwrap()
                .pattern(),
            "%Y-%m-%dT%H:%M:%S%.3f%:z"
        );
        assert_eq!(
            DateLayout::new("Jan _2 03:04PM").unwrap().pattern(),
            "%b %e %I:%M%p"
        );
    }

    #[test]
    fn test_strftime_is_kept() {
        assert_eq!(DateLayout::new("%d.%m.%Y").unwrap().pattern(), "%d.%m.%Y");
        assert!(DateLayout::new("%Q").is_err());
        assert!(DateLayout::new("").is_err());
    }

    #[test]
    fn test_parse_and_format_across_zones() {
        let source = DateLayout::new("2006/01/02 15:04:05").unwrap();
        let instant = source.parse("2024/01/02 10:00:00").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());

        let target = DateLayout::new("2006-01-02 15:04").unwrap();
        let shanghai = Zone::parse("Asia/Shanghai").unwrap();
        assert_eq!(target.format(&instant, shanghai).unwrap(), "2024-01-02 18:00");

        let behind = Zone::parse("-11:00").unwrap();
        assert_eq!(target.format(&instant, behind).unwrap(), "2024-01-01 23:00");
    }

    #[test]
    fn test_parse_date_only_layout() {
        let layout = DateLayout::new("2006-01-02").unwrap();
        let instant = layout.parse("2023-07-09").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2023, 7, 9, 0, 0, 0).unwrap());
        assert!(layout.parse("09/07/2023").is_err());
    }

    #[test]
    fn test_zone_parse() {
        assert_eq!(Zone::parse("").unwrap(), Zone::utc());
        assert_eq!(Zone::parse("utc").unwrap(), Zone::utc());
        assert!(matches!(Zone::parse("+08:00").unwrap(), Zone::Fixed(_)));
        assert!(matches!(
            Zone::parse("Europe/Paris").unwrap(),
            Zone::Named(chrono_tz::Tz::Europe__Paris)
        ));
        assert!(Zone::parse("Mars/Olympus").is_err());
    }
}
