use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Reconcile ticks are never scheduled faster than this.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Longest accepted interval string, e.g. `65535ms`.
const MAX_LEN: usize = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidDuration {
    pub input: String,
    pub reason: String,
}

impl fmt::Display for InvalidDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid duration {:?}: {}", self.input, self.reason)
    }
}

impl std::error::Error for InvalidDuration {}

/// Parse `<digits><unit>` where unit is `ms` (also when omitted), `s` or `m`.
///
/// The number is capped at 65535. A bare unit or an empty string is zero.
pub fn parse_duration(s: &str) -> Result<Duration, InvalidDuration> {
    let invalid = |reason: String| InvalidDuration {
        input: s.to_string(),
        reason,
    };

    let t = s.trim();
    if t.len() > MAX_LEN {
        return Err(invalid(
            "expected a number followed by 'ms', 's', or 'm'".to_string(),
        ));
    }

    let split = t.find(|c: char| !c.is_ascii_digit()).unwrap_or(t.len());
    let (digits, unit) = t.split_at(split);
    let n: u64 = if digits.is_empty() {
        0
    } else {
        digits
            .parse()
            .map_err(|_| invalid(format!("not a number: {digits:?}")))?
    };

    if n > u64::from(u16::MAX) {
        return Err(invalid(format!(
            "number must be <= {}, got {n}",
            u16::MAX
        )));
    }

    match unit {
        "" | "ms" => Ok(Duration::from_millis(n)),
        "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        other => Err(invalid(format!(
            "unknown unit {other:?}; expected 'ms', 's', or 'm'"
        ))),
    }
}

/// Accepts either an interval string (`"1s"`) or a bare number of
/// milliseconds, as YAML renders `interval: 1500` as an integer.
pub(crate) fn deserialize_interval<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(u64),
    }

    let text = match Raw::deserialize(d)? {
        Raw::Text(s) => s,
        Raw::Millis(n) => n.to_string(),
    };
    parse_duration(&text).map_err(serde::de::Error::custom)
}
