//! Transfer statistics for the most recent round-trip.
//!
//! Statistics are looked up by dash-separated names (`transfer-time`,
//! `effective-uri`, ...). Each name maps to one `StatName` variant and one
//! typed accessor; unknown names are reported as such instead of failing.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Measurements of one completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStats {
    pub transfer_time: Duration,
    /// Full URL the request was sent to, query string included.
    pub effective_uri: String,
    pub status_code: u16,
    /// Length of the response body in bytes.
    pub body_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatName {
    TransferTime,
    EffectiveUri,
    StatusCode,
    BodySize,
}

impl StatName {
    pub const ALL: [StatName; 4] = [
        StatName::TransferTime,
        StatName::EffectiveUri,
        StatName::StatusCode,
        StatName::BodySize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatName::TransferTime => "transfer-time",
            StatName::EffectiveUri => "effective-uri",
            StatName::StatusCode => "status-code",
            StatName::BodySize => "body-size",
        }
    }
}

impl FromStr for StatName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        StatName::ALL
            .into_iter()
            .find(|stat| stat.as_str().eq_ignore_ascii_case(name))
            .ok_or(())
    }
}

/// Value of a single statistic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatValue {
    Duration(Duration),
    Text(String),
    Count(u64),
}

impl fmt::Display for StatValue {
    /// Durations render as fractional seconds.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Duration(duration) => write!(f, "{}", duration.as_secs_f64()),
            StatValue::Text(text) => f.write_str(text),
            StatValue::Count(count) => write!(f, "{count}"),
        }
    }
}

impl TransferStats {
    pub fn get(&self, name: StatName) -> StatValue {
        match name {
            StatName::TransferTime => StatValue::Duration(self.transfer_time),
            StatName::EffectiveUri => StatValue::Text(self.effective_uri.clone()),
            StatName::StatusCode => StatValue::Count(u64::from(self.status_code)),
            StatName::BodySize => StatValue::Count(self.body_size as u64),
        }
    }
}

/// Result of looking a statistic up by name.
///
/// "Nothing recorded yet" and "no such statistic" stay distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatLookup {
    /// No request has completed yet.
    NotCollected,
    /// The name does not match any `StatName`.
    UnknownName,
    Value(StatValue),
}

impl StatLookup {
    pub fn lookup(stats: Option<&TransferStats>, name: &str) -> Self {
        let Some(stats) = stats else {
            return StatLookup::NotCollected;
        };
        match name.parse::<StatName>() {
            Ok(stat) => StatLookup::Value(stats.get(stat)),
            Err(()) => StatLookup::UnknownName,
        }
    }

    pub fn value(&self) -> Option<&StatValue> {
        match self {
            StatLookup::Value(value) => Some(value),
            _ => None,
        }
    }
}
