//! Timestamp normalization.
//!
//! Feeds encode dates in whatever way their CMS happens to emit. Rather than a
//! single lenient parser, dates go through an ordered list of known grammars and
//! the first one that accepts the text wins. New encodings are supported by
//! appending an entry to [`GRAMMARS`].

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// One textual timestamp encoding. `regional` is the offset assumed by grammars
/// that carry no zone of their own.
pub struct DateGrammar {
    pub name: &'static str,
    parse: fn(&str, FixedOffset) -> Option<DateTime<Utc>>,
}

impl DateGrammar {
    pub fn parse(&self, text: &str, regional: FixedOffset) -> Option<DateTime<Utc>> {
        (self.parse)(text, regional)
    }
}

pub const GRAMMARS: &[DateGrammar] = &[
    DateGrammar { name: "rfc2822", parse: parse_rfc2822 },
    DateGrammar { name: "iso8601", parse: parse_iso8601 },
    DateGrammar { name: "day-month-comma-year", parse: parse_day_month_comma_year },
    DateGrammar { name: "zoneless-regional", parse: parse_zoneless },
];

/// Parse a feed timestamp into UTC. `None` when no grammar accepts it.
pub fn parse_timestamp(raw: &str, regional: FixedOffset) -> Option<DateTime<Utc>> {
    parse_with_grammar(raw, regional).map(|(instant, _)| instant)
}

/// Like [`parse_timestamp`], also reporting which grammar matched.
pub fn parse_with_grammar(raw: &str, regional: FixedOffset) -> Option<(DateTime<Utc>, &'static str)> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return None;
    }
    GRAMMARS
        .iter()
        .find_map(|grammar| grammar.parse(&cleaned, regional).map(|instant| (instant, grammar.name)))
}

/// Trim, collapse runs of whitespace, and spell common zone names as offsets.
fn clean(raw: &str) -> String {
    raw.split_whitespace()
        .map(|token| match token {
            "GMT" | "UTC" | "UT" => "+0000",
            "IST" => "+0530",
            "EDT" => "-0400",
            "EST" => "-0500",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_rfc2822(text: &str, _regional: FixedOffset) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text).ok().map(|dt| dt.with_timezone(&Utc))
}

fn parse_iso8601(text: &str, _regional: FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f %z"]
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// `02 Feb, 2026 +0530`: a date with an offset but no time of day.
fn parse_day_month_comma_year(text: &str, _regional: FixedOffset) -> Option<DateTime<Utc>> {
    let (date, offset) = text.rsplit_once(' ')?;
    if !date.contains(',') || !offset.starts_with(['+', '-']) {
        return None;
    }
    let with_midnight = format!("{} 00:00:00 {}", date, offset);
    DateTime::parse_from_str(&with_midnight, "%d %b, %Y %H:%M:%S %z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Timestamps without any zone, emitted by sources publishing in regional time.
fn parse_zoneless(text: &str, regional: FixedOffset) -> Option<DateTime<Utc>> {
    [
        "%a, %d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ]
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    .and_then(|naive| regional.from_local_datetime(&naive).single())
    .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn utc(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn internet_mail_style() {
        let parsed = parse_with_grammar("Mon, 02 Feb 2026 10:30:00 +0530", ist()).unwrap();
        assert_eq!(parsed, (utc("2026-02-02T05:00:00Z"), "rfc2822"));
    }

    #[test]
    fn international_standard_style() {
        let parsed = parse_with_grammar("2026-02-02T10:30:00Z", ist()).unwrap();
        assert_eq!(parsed, (utc("2026-02-02T10:30:00Z"), "iso8601"));

        assert_eq!(
            parse_timestamp("2026-02-02T10:30:00.123+0530", ist()),
            Some(utc("2026-02-02T05:00:00.123Z"))
        );
    }

    #[test]
    fn date_only_with_offset() {
        let parsed = parse_with_grammar("02 Feb, 2026 +0530", ist()).unwrap();
        assert_eq!(parsed, (utc("2026-02-01T18:30:00Z"), "day-month-comma-year"));
    }

    #[test]
    fn zoneless_is_read_in_regional_offset() {
        let parsed = parse_with_grammar("02 Feb 2026 10:30:00", ist()).unwrap();
        assert_eq!(parsed, (utc("2026-02-02T05:00:00Z"), "zoneless-regional"));

        assert_eq!(
            parse_timestamp("Mon, 02 Feb 2026 10:30:00", ist()),
            Some(utc("2026-02-02T05:00:00Z"))
        );
        assert_eq!(
            parse_timestamp("2026-02-02 10:30:00", FixedOffset::east_opt(0).unwrap()),
            Some(utc("2026-02-02T10:30:00Z"))
        );
    }

    #[test]
    fn zone_names_and_messy_whitespace() {
        assert_eq!(
            parse_timestamp("  Mon,  02 Feb 2026\t10:30:00 IST ", ist()),
            Some(utc("2026-02-02T05:00:00Z"))
        );
        assert_eq!(
            parse_timestamp("Mon, 02 Feb 2026 10:30:00 GMT", ist()),
            Some(utc("2026-02-02T10:30:00Z"))
        );
        assert_eq!(
            parse_timestamp("Mon, 02 Feb 2026 10:30:00 EST", ist()),
            Some(utc("2026-02-02T15:30:00Z"))
        );
        assert_eq!(
            parse_timestamp("2026-02-02 10:30:00 UTC", ist()),
            Some(utc("2026-02-02T10:30:00Z"))
        );
    }

    #[test]
    fn unparseable_is_absent() {
        assert_eq!(parse_timestamp("", ist()), None);
        assert_eq!(parse_timestamp("yesterday", ist()), None);
        assert_eq!(parse_timestamp("Feb 2026", ist()), None);
    }
}
