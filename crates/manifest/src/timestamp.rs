use std::fmt;

use chrono::{
    DateTime,
    NaiveDate,
    NaiveDateTime,
    TimeZone,
    Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{
    de::Error as DeError,
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};

use errors::KernelError;

static QUERY_TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<date>\d{4}-\d{2}-\d{2})(T(?P<hour>\d{2}):(?P<minute>\d{2})(:(?P<second>\d{2})(\.(?P<micro>\d{1,6}))?)?Z)?$",
    )
    .expect("static regex is valid")
});

/// A UTC instant stored with microsecond precision and rendered with a
/// fixed six-digit fractional part, so two serialized timestamps always
/// compare the same way lexically as they do chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Timestamp(dt)
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.fZ").map_err(DeError::custom)?;
        Ok(Timestamp(Utc.from_utc_datetime(&naive)))
    }
}

/// Parses a caller-supplied timestamp bounding a `version_at` query.
///
/// A bare date (`2020-01-01`) is padded out to the last representable
/// instant of that day, so "as of this date" includes every version
/// recorded during it. A full or partial `T`-separated time of day with
/// 0-6 digits of fractional seconds is accepted as given; anything else is
/// rejected.
pub fn parse_query_timestamp(raw: &str) -> Result<Timestamp, KernelError> {
    let caps = QUERY_TIMESTAMP_RE
        .captures(raw)
        .ok_or_else(|| KernelError::InvalidTimestamp(raw.to_string()))?;

    let date = caps.name("date").expect("date is a required group").as_str();
    let naive_date =
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| KernelError::InvalidTimestamp(raw.to_string()))?;

    let naive = match caps.name("hour") {
        None => naive_date
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .expect("23:59:59.999999 is always a valid time of day"),
        Some(hour) => {
            let hour: u32 = hour.as_str().parse().expect("regex guarantees digits");
            let minute: u32 = caps
                .name("minute")
                .expect("minute accompanies hour in the pattern")
                .as_str()
                .parse()
                .expect("regex guarantees digits");
            let second: u32 = caps
                .name("second")
                .map(|m| m.as_str().parse().expect("regex guarantees digits"))
                .unwrap_or(0);
            let micro: u32 = match caps.name("micro") {
                Some(m) => {
                    let padded = format!("{:0<6}", m.as_str());
                    padded.parse().expect("six zero-padded digits always parse")
                },
                None => 0,
            };
            naive_date
                .and_hms_micro_opt(hour, minute, second, micro)
                .ok_or_else(|| KernelError::InvalidTimestamp(raw.to_string()))?
        },
    };

    Ok(Timestamp(Utc.from_utc_datetime(&naive)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_six_fractional_digits_even_when_zero() {
        let ts = Timestamp::from_datetime(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(ts.to_string(), "2020-01-01T00:00:00.000000Z");
    }

    #[test]
    fn round_trips_through_serde_json() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn bare_date_pads_to_end_of_day() {
        let ts = parse_query_timestamp("2020-01-01").unwrap();
        assert_eq!(ts.to_string(), "2020-01-01T23:59:59.999999Z");
    }

    #[test]
    fn full_timestamp_parses_exactly() {
        let ts = parse_query_timestamp("2020-01-01T10:00:00Z").unwrap();
        assert_eq!(ts.to_string(), "2020-01-01T10:00:00.000000Z");
    }

    #[test]
    fn partial_fraction_is_right_padded_not_scaled() {
        let ts = parse_query_timestamp("2020-01-01T10:00:00.5Z").unwrap();
        assert_eq!(ts.to_string(), "2020-01-01T10:00:00.500000Z");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_query_timestamp("not-a-date").is_err());
        assert!(parse_query_timestamp("2020-01-01T10Z").is_err());
        assert!(parse_query_timestamp("2020-13-40").is_err());
    }
}
