//! Literal values embedded in the expression IR (`ColumnExpression::PyValue`).
//!
//! Grounded on `original_source/src/run/compile/utils/custom_value_types.py`:
//! plain JSON-representable values (`null`, `bool`, `int`, `float`, `str`,
//! `list`) serialize as their native JSON shape; the four calendar/duration
//! types that JSON has no native shape for serialize with a `$typeKey`
//! discriminator field instead of guessing from string shape.

use serde::de::Error as DeError;
use serde::ser::{Error as SerError, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Interval unit for `Literal::TimeInterval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Seconds => "seconds",
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
            IntervalUnit::Weeks => "weeks",
            IntervalUnit::Months => "months",
            IntervalUnit::Years => "years",
        }
    }

    /// Singular form used by quoted-interval dialects (`INTERVAL '1 day'`).
    pub fn singular(&self) -> &'static str {
        self.as_str().trim_end_matches('s')
    }
}

/// A literal value. `Date`/`DateTime` carry ISO-8601 text; `TimeDelta`
/// carries a duration in whole seconds; `TimeInterval` carries a
/// `(unit, quantity)` pair, the two source shapes intervals can arrive in
/// per spec.md §4.5.1.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Date(String),
    DateTime(String),
    TimeDelta(i64),
    TimeInterval { unit: IntervalUnit, num: i64 },
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Promote a plain seconds duration to the widest unit with an integer
    /// quantity (e.g. `3600` seconds -> `1 HOUR`), per spec.md §4.5.1.
    pub fn normalize_duration(seconds: i64) -> Literal {
        const YEAR: i64 = 365 * 86_400;
        const MONTH: i64 = 30 * 86_400;
        const WEEK: i64 = 7 * 86_400;
        const DAY: i64 = 86_400;
        const HOUR: i64 = 3_600;
        const MINUTE: i64 = 60;

        let (unit, divisor) = if seconds != 0 && seconds % YEAR == 0 {
            (IntervalUnit::Years, YEAR)
        } else if seconds != 0 && seconds % MONTH == 0 {
            (IntervalUnit::Months, MONTH)
        } else if seconds != 0 && seconds % WEEK == 0 {
            (IntervalUnit::Weeks, WEEK)
        } else if seconds != 0 && seconds % DAY == 0 {
            (IntervalUnit::Days, DAY)
        } else if seconds != 0 && seconds % HOUR == 0 {
            (IntervalUnit::Hours, HOUR)
        } else if seconds != 0 && seconds % MINUTE == 0 {
            (IntervalUnit::Minutes, MINUTE)
        } else {
            (IntervalUnit::Seconds, 1)
        };

        Literal::TimeInterval {
            unit,
            num: seconds / divisor,
        }
    }

    pub fn as_interval_seconds(&self) -> Option<i64> {
        match self {
            Literal::TimeDelta(s) => Some(*s),
            Literal::TimeInterval { unit, num } => {
                let mul = match unit {
                    IntervalUnit::Seconds => 1,
                    IntervalUnit::Minutes => 60,
                    IntervalUnit::Hours => 3_600,
                    IntervalUnit::Days => 86_400,
                    IntervalUnit::Weeks => 7 * 86_400,
                    IntervalUnit::Months => 30 * 86_400,
                    IntervalUnit::Years => 365 * 86_400,
                };
                Some(num * mul)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Literal::Date(d) => write!(f, "date({d})"),
            Literal::DateTime(d) => write!(f, "datetime({d})"),
            Literal::TimeDelta(s) => write!(f, "timedelta({s}s)"),
            Literal::TimeInterval { unit, num } => write!(f, "interval({num} {})", unit.as_str()),
        }
    }
}

// ---------------------------------------------------------------------
// Wire format: plain JSON shapes for the four JSON-native variants, a
// `$typeKey`-discriminated object for the four calendar/duration variants.
// ---------------------------------------------------------------------

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Literal::Null => serializer.serialize_none(),
            Literal::Bool(b) => serializer.serialize_bool(*b),
            Literal::Int(i) => serializer.serialize_i64(*i),
            Literal::Float(v) => serializer.serialize_f64(*v),
            Literal::Str(s) => serializer.serialize_str(s),
            Literal::List(items) => items.serialize(serializer),
            Literal::Date(d) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$typeKey", "py.date")?;
                map.serialize_entry("value", d)?;
                map.end()
            }
            Literal::DateTime(d) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$typeKey", "py.datetime")?;
                map.serialize_entry("value", d)?;
                map.end()
            }
            Literal::TimeDelta(s) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$typeKey", "py.timedelta")?;
                map.serialize_entry("seconds", s)?;
                map.end()
            }
            Literal::TimeInterval { unit, num } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("$typeKey", "py.timeinterval")?;
                map.serialize_entry("unit", unit.as_str())?;
                map.serialize_entry("num", num)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Literal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        literal_from_json(value).map_err(DeError::custom)
    }
}

fn literal_from_json(value: serde_json::Value) -> Result<Literal, String> {
    use serde_json::Value;
    match value {
        Value::Null => Ok(Literal::Null),
        Value::Bool(b) => Ok(Literal::Bool(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Literal::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Literal::Float(f))
            } else {
                Err(format!("unrepresentable number literal: {n}"))
            }
        }
        Value::String(s) => Ok(Literal::Str(s)),
        Value::Array(items) => {
            let items = items
                .into_iter()
                .map(literal_from_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Literal::List(items))
        }
        Value::Object(mut map) => {
            let type_key = map
                .remove("$typeKey")
                .and_then(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| "object literal missing $typeKey".to_string())?;
            match type_key.as_str() {
                "py.date" => {
                    let v = map
                        .remove("value")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .ok_or("py.date literal missing value")?;
                    Ok(Literal::Date(v))
                }
                "py.datetime" => {
                    let v = map
                        .remove("value")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .ok_or("py.datetime literal missing value")?;
                    Ok(Literal::DateTime(v))
                }
                "py.timedelta" => {
                    let s = map
                        .remove("seconds")
                        .and_then(|v| v.as_i64())
                        .ok_or("py.timedelta literal missing seconds")?;
                    Ok(Literal::TimeDelta(s))
                }
                "py.timeinterval" => {
                    let unit_str = map
                        .remove("unit")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .ok_or("py.timeinterval literal missing unit")?;
                    let num = map
                        .remove("num")
                        .and_then(|v| v.as_i64())
                        .ok_or("py.timeinterval literal missing num")?;
                    let unit = match unit_str.as_str() {
                        "seconds" => IntervalUnit::Seconds,
                        "minutes" => IntervalUnit::Minutes,
                        "hours" => IntervalUnit::Hours,
                        "days" => IntervalUnit::Days,
                        "weeks" => IntervalUnit::Weeks,
                        "months" => IntervalUnit::Months,
                        "years" => IntervalUnit::Years,
                        other => return Err(format!("unknown interval unit: {other}")),
                    };
                    Ok(Literal::TimeInterval { unit, num })
                }
                other => Err(format!("unknown $typeKey: {other}")),
            }
        }
    }
}

/// Secret-holding value: serializes to a fixed placeholder and never
/// appears in `Debug` output, per spec.md §5 ("Secrets").
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Only the owning `ExecutionDriver` implementation should ever call
    /// this; the core never inspects secret contents.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

const SECRET_PLACEHOLDER: &str = "**********";

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({SECRET_PLACEHOLDER})")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(SECRET_PLACEHOLDER)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == SECRET_PLACEHOLDER {
            Err(DeError::custom(
                "cannot deserialize a redacted secret placeholder back into a value",
            ))
        } else {
            Ok(Secret(s))
        }
    }
}

impl PartialEq for Secret {
    fn eq(&self, _other: &Self) -> bool {
        // Secrets never compare equal to each other by content from
        // outside the owning driver; structural-equality checks on a
        // `Model` only care that *some* connection is present.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_literals_round_trip_as_native_json() {
        let lit = Literal::Int(42);
        let json = serde_json::to_value(&lit).unwrap();
        assert_eq!(json, serde_json::json!(42));
        let back: Literal = serde_json::from_value(json).unwrap();
        assert_eq!(back, lit);
    }

    #[test]
    fn datetime_literal_uses_typekey_discriminator() {
        let lit = Literal::DateTime("2024-01-01T00:00:00".into());
        let json = serde_json::to_value(&lit).unwrap();
        assert_eq!(json["$typeKey"], "py.datetime");
        let back: Literal = serde_json::from_value(json).unwrap();
        assert_eq!(back, lit);
    }

    #[test]
    fn normalize_duration_promotes_to_widest_unit() {
        assert_eq!(
            Literal::normalize_duration(3600),
            Literal::TimeInterval {
                unit: IntervalUnit::Hours,
                num: 1
            }
        );
        assert_eq!(
            Literal::normalize_duration(90),
            Literal::TimeInterval {
                unit: IntervalUnit::Seconds,
                num: 90
            }
        );
    }

    #[test]
    fn secret_serializes_to_placeholder_and_debug_is_redacted() {
        let secret = Secret::new("super-secret-password");
        assert_eq!(format!("{secret:?}"), "Secret(**********)");
        let json = serde_json::to_value(&secret).unwrap();
        assert_eq!(json, serde_json::json!("**********"));
    }
}
