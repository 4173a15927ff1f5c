//! Telemetry samples and the record parser.
//!
//! A record is one JSON object with a string `ts`, numeric `x`, `y`, `z` and optionally one
//! temperature field. Records arrive either as text (socket line, file line, broker payload)
//! or as an already decoded [`serde_json::Value`]; both go through [`SampleParser`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MalformedRecord;

/// One validated telemetry reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Timestamp exactly as received, kept for display and export.
    pub ts: String,
    /// Resolved absolute instant used for ordering and plotting.
    pub instant: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub temperature: Option<f64>,
}

impl Sample {
    /// Milliseconds since the UNIX epoch.
    #[inline]
    pub fn epoch_millis(&self) -> i64 {
        self.instant.timestamp_millis()
    }

    /// Value of one channel, `None` when the channel is absent (temperature only).
    #[inline]
    pub fn channel(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::X => Some(self.x),
            Channel::Y => Some(self.y),
            Channel::Z => Some(self.z),
            Channel::Temperature => self.temperature,
        }
    }

    /// Canonical export form: numbers rounded to 3 decimals, `temp` only when defined.
    pub fn to_record(&self) -> SampleRecord {
        SampleRecord {
            ts: self.ts.clone(),
            x: round3(self.x),
            y: round3(self.y),
            z: round3(self.z),
            temp: self.temperature.map(round3),
        }
    }
}

/// The four plotted channels of a [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    X,
    Y,
    Z,
    Temperature,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::X, Channel::Y, Channel::Z, Channel::Temperature];

    /// Chart / table heading including the unit.
    pub fn label(&self) -> &'static str {
        match self {
            Channel::X => "X (nT)",
            Channel::Y => "Y (nT)",
            Channel::Z => "Z (nT)",
            Channel::Temperature => "Temp (°C)",
        }
    }
}

/// Serialized shape of one exported line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub ts: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
}

/// Round to a fixed 3-decimal precision.
#[inline]
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Ordered list of field names that may carry the temperature value.
///
/// Fields are checked in order; the first one holding a number wins. Non-numeric values
/// under an alias are ignored and the search continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureAliases(Vec<String>);

impl Default for TemperatureAliases {
    fn default() -> Self {
        Self::new(["rt", "T", "t", "temp"])
    }
}

impl TemperatureAliases {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    fn resolve(&self, obj: &Map<String, Value>) -> Option<f64> {
        self.0
            .iter()
            .find_map(|name| obj.get(name).and_then(Value::as_f64))
    }
}

/// A raw record handed to the parser.
#[derive(Debug, Clone, Copy)]
pub enum RawRecord<'a> {
    Text(&'a str),
    Value(&'a Value),
}

impl<'a> From<&'a str> for RawRecord<'a> {
    fn from(s: &'a str) -> Self {
        RawRecord::Text(s)
    }
}

impl<'a> From<&'a String> for RawRecord<'a> {
    fn from(s: &'a String) -> Self {
        RawRecord::Text(s.as_str())
    }
}

impl<'a> From<&'a Value> for RawRecord<'a> {
    fn from(v: &'a Value) -> Self {
        RawRecord::Value(v)
    }
}

/// Turns raw records into [`Sample`]s. Pure: parsing never has side effects.
#[derive(Debug, Clone, Default)]
pub struct SampleParser {
    aliases: TemperatureAliases,
}

impl SampleParser {
    pub fn new(aliases: TemperatureAliases) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &TemperatureAliases {
        &self.aliases
    }

    pub fn parse<'a>(&self, raw: impl Into<RawRecord<'a>>) -> Result<Sample, MalformedRecord> {
        match raw.into() {
            RawRecord::Text(text) => {
                let value: Value = serde_json::from_str(text)
                    .map_err(|e| MalformedRecord::InvalidJson(e.to_string()))?;
                self.parse_value(&value)
            }
            RawRecord::Value(value) => self.parse_value(value),
        }
    }

    fn parse_value(&self, value: &Value) -> Result<Sample, MalformedRecord> {
        let obj = value.as_object().ok_or(MalformedRecord::NotAnObject)?;
        let ts = obj
            .get("ts")
            .and_then(Value::as_str)
            .ok_or(MalformedRecord::TimestampNotString)?;
        let channel = |name: &'static str| {
            obj.get(name)
                .and_then(Value::as_f64)
                .ok_or(MalformedRecord::ChannelNotNumber(name))
        };
        let x = channel("x")?;
        let y = channel("y")?;
        let z = channel("z")?;
        let instant =
            resolve_instant(ts).ok_or_else(|| MalformedRecord::InvalidTimestamp(ts.to_string()))?;
        Ok(Sample {
            ts: ts.to_string(),
            instant,
            x,
            y,
            z,
            temperature: self.aliases.resolve(obj),
        })
    }
}

/// Parse one record with the default temperature alias order.
pub fn parse<'a>(raw: impl Into<RawRecord<'a>>) -> Result<Sample, MalformedRecord> {
    SampleParser::default().parse(raw)
}

/// Resolve an ISO-8601-like timestamp to an absolute instant.
///
/// Accepted forms, tried in order: RFC 3339 (with `T` or space), an explicit numeric offset
/// without colon, a naive date-time (taken as UTC) and a bare date (midnight UTC).
pub fn resolve_instant(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    const WITH_OFFSET: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
    for fmt in WITH_OFFSET {
        if let Ok(dt) = DateTime::parse_from_str(ts, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    const NAIVE: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}
