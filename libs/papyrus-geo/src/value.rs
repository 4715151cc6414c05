//! Column value codecs.
//!
//! `to_json` is the `GeoJSON` encoder for scalar column values, `from_json`
//! coerces feature properties into typed `SeaORM` values and `parse_text`
//! does the same for query-string text.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::Value;
use serde_json::{Number, Value as JsonValue};

use crate::adapter::{parse_geometry, to_shape, to_wkb};
use crate::column::ColumnKind;
use crate::error::{GeoError, ValueError};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn float(f: f64) -> JsonValue {
    Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}

fn scalar<T: Into<JsonValue>>(v: Option<T>) -> JsonValue {
    v.map_or(JsonValue::Null, Into::into)
}

/// Encode a column value for a feature's `properties`.
///
/// Dates, times and datetimes become ISO-8601 strings, decimals become
/// (lossy) floats, bytes become base64 and UUIDs their hyphenated form.
#[must_use]
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Bool(v) => scalar(*v),
        Value::TinyInt(v) => scalar(*v),
        Value::SmallInt(v) => scalar(*v),
        Value::Int(v) => scalar(*v),
        Value::BigInt(v) => scalar(*v),
        Value::TinyUnsigned(v) => scalar(*v),
        Value::SmallUnsigned(v) => scalar(*v),
        Value::Unsigned(v) => scalar(*v),
        Value::BigUnsigned(v) => scalar(*v),
        Value::Float(v) => v.map_or(JsonValue::Null, |f| float(f64::from(f))),
        Value::Double(v) => v.map_or(JsonValue::Null, float),
        Value::String(v) => v
            .as_ref()
            .map_or(JsonValue::Null, |s| JsonValue::String(s.as_str().to_owned())),
        Value::Char(v) => v.map_or(JsonValue::Null, |c| JsonValue::String(c.to_string())),
        Value::Bytes(v) => v
            .as_ref()
            .map_or(JsonValue::Null, |b| JsonValue::String(BASE64.encode(b.as_slice()))),
        Value::Json(v) => v.as_ref().map_or(JsonValue::Null, |j| (**j).clone()),
        Value::ChronoDate(v) => v.as_ref().map_or(JsonValue::Null, |d| {
            JsonValue::String(d.format(DATE_FORMAT).to_string())
        }),
        Value::ChronoTime(v) => v.as_ref().map_or(JsonValue::Null, |t| {
            JsonValue::String(t.format(TIME_FORMAT).to_string())
        }),
        Value::ChronoDateTime(v) => v.as_ref().map_or(JsonValue::Null, |dt| {
            JsonValue::String(dt.format(DATETIME_FORMAT).to_string())
        }),
        Value::ChronoDateTimeUtc(v) => v.as_ref().map_or(JsonValue::Null, |dt| {
            JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
        }),
        Value::ChronoDateTimeLocal(v) => v.as_ref().map_or(JsonValue::Null, |dt| {
            JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
        }),
        Value::ChronoDateTimeWithTimeZone(v) => v.as_ref().map_or(JsonValue::Null, |dt| {
            JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
        }),
        Value::Uuid(v) => v
            .as_ref()
            .map_or(JsonValue::Null, |u| JsonValue::String(u.to_string())),
        Value::Decimal(v) => v
            .as_ref()
            .and_then(|d| d.to_f64())
            .map_or(JsonValue::Null, float),
        #[allow(unreachable_patterns)]
        other => {
            tracing::debug!(value = ?other, "no JSON encoding for column value");
            JsonValue::Null
        }
    }
}

/// Typed null for a column kind.
#[must_use]
pub fn null_of(kind: &ColumnKind) -> Value {
    match kind {
        ColumnKind::SmallInt => Value::SmallInt(None),
        ColumnKind::Int => Value::Int(None),
        ColumnKind::BigInt => Value::BigInt(None),
        ColumnKind::Float => Value::Float(None),
        ColumnKind::Double => Value::Double(None),
        ColumnKind::Decimal { .. } => Value::Decimal(None),
        ColumnKind::String { .. } | ColumnKind::Interval | ColumnKind::Enum(_) => {
            Value::String(None)
        }
        ColumnKind::Bool => Value::Bool(None),
        ColumnKind::Date => Value::ChronoDate(None),
        ColumnKind::Time => Value::ChronoTime(None),
        ColumnKind::DateTime => Value::ChronoDateTime(None),
        ColumnKind::DateTimeUtc => Value::ChronoDateTimeUtc(None),
        ColumnKind::Binary | ColumnKind::Geometry { .. } => Value::Bytes(None),
        ColumnKind::Uuid => Value::Uuid(None),
        ColumnKind::Json => Value::Json(None),
    }
}

fn json_type(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Coerce a feature property to the column's value type.
///
/// `null` yields the kind's typed null. Strings go through [`parse_text`],
/// so numeric and temporal kinds accept their textual forms. Geometry
/// columns take a `GeoJSON` geometry object and store its WKB.
///
/// # Errors
/// `ValueError::TypeMismatch` when the JSON type cannot represent the kind,
/// or any error of [`parse_text`].
pub fn from_json(kind: &ColumnKind, value: &JsonValue) -> Result<Value, ValueError> {
    match (kind, value) {
        (_, JsonValue::Null) => Ok(null_of(kind)),
        (ColumnKind::Json, v) => Ok(Value::Json(Some(Box::new(v.clone())))),
        (ColumnKind::Geometry { .. }, v) => {
            let geometry: geojson::Geometry = serde_json::from_value(v.clone())
                .map_err(|e| GeoError::InvalidGeometry(e.to_string()))?;
            Ok(Value::Bytes(Some(Box::new(to_wkb(&to_shape(&geometry)?)?))))
        }
        (_, JsonValue::String(s)) => parse_text(kind, s),
        (ColumnKind::SmallInt | ColumnKind::Int | ColumnKind::BigInt, JsonValue::Number(n)) => {
            integer(kind, n)
        }
        (ColumnKind::Float, JsonValue::Number(n)) => {
            #[allow(clippy::cast_possible_truncation)]
            let f = n.as_f64().map(|f| f as f32);
            f.map(|f| Value::Float(Some(f)))
                .ok_or_else(|| mismatch(kind, value))
        }
        (ColumnKind::Double, JsonValue::Number(n)) => n
            .as_f64()
            .map(|f| Value::Double(Some(f)))
            .ok_or_else(|| mismatch(kind, value)),
        (ColumnKind::Decimal { .. }, JsonValue::Number(n)) => parse_text(kind, &n.to_string()),
        (ColumnKind::Bool, JsonValue::Bool(b)) => Ok(Value::Bool(Some(*b))),
        _ => Err(mismatch(kind, value)),
    }
}

fn mismatch(kind: &ColumnKind, value: &JsonValue) -> ValueError {
    ValueError::TypeMismatch {
        expected: kind.name(),
        got: json_type(value),
    }
}

fn integer(kind: &ColumnKind, n: &Number) -> Result<Value, ValueError> {
    let i = n.as_i64().ok_or(ValueError::TypeMismatch {
        expected: kind.name(),
        got: "fractional number",
    })?;
    let out_of_range = |_| ValueError::Parse {
        expected: kind.name(),
        value: i.to_string(),
    };
    match kind {
        ColumnKind::SmallInt => i16::try_from(i)
            .map(|v| Value::SmallInt(Some(v)))
            .map_err(out_of_range),
        ColumnKind::Int => i32::try_from(i)
            .map(|v| Value::Int(Some(v)))
            .map_err(out_of_range),
        _ => Ok(Value::BigInt(Some(i))),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
}

fn parse_utc_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive_datetime(s).map(|n| n.and_utc()))
}

/// Coerce query-string text to the column's value type.
///
/// # Errors
/// - `ValueError::Parse` when the text is not a valid literal of the kind
/// - `ValueError::NotInEnum` for a value outside an enum's choices
/// - `ValueError::Geo` for an invalid `GeoJSON` geometry document
pub fn parse_text(kind: &ColumnKind, text: &str) -> Result<Value, ValueError> {
    let bad = || ValueError::Parse {
        expected: kind.name(),
        value: text.to_owned(),
    };
    let t = text.trim();
    Ok(match kind {
        ColumnKind::SmallInt => Value::SmallInt(Some(t.parse().map_err(|_| bad())?)),
        ColumnKind::Int => Value::Int(Some(t.parse().map_err(|_| bad())?)),
        ColumnKind::BigInt => Value::BigInt(Some(t.parse().map_err(|_| bad())?)),
        ColumnKind::Float => Value::Float(Some(t.parse().map_err(|_| bad())?)),
        ColumnKind::Double => Value::Double(Some(t.parse().map_err(|_| bad())?)),
        ColumnKind::Decimal { .. } => {
            let d = t
                .parse::<Decimal>()
                .or_else(|_| Decimal::from_scientific(t))
                .map_err(|_| bad())?;
            Value::Decimal(Some(Box::new(d)))
        }
        ColumnKind::String { .. } | ColumnKind::Interval => {
            Value::String(Some(Box::new(text.to_owned())))
        }
        ColumnKind::Enum(choices) => {
            if !choices.iter().any(|c| c == text) {
                return Err(ValueError::NotInEnum(text.to_owned()));
            }
            Value::String(Some(Box::new(text.to_owned())))
        }
        ColumnKind::Bool => Value::Bool(Some(parse_bool(t).ok_or_else(bad)?)),
        ColumnKind::Date => {
            Value::ChronoDate(Some(Box::new(t.parse::<NaiveDate>().map_err(|_| bad())?)))
        }
        ColumnKind::Time => {
            Value::ChronoTime(Some(Box::new(t.parse::<NaiveTime>().map_err(|_| bad())?)))
        }
        ColumnKind::DateTime => {
            Value::ChronoDateTime(Some(Box::new(parse_naive_datetime(t).ok_or_else(bad)?)))
        }
        ColumnKind::DateTimeUtc => {
            Value::ChronoDateTimeUtc(Some(Box::new(parse_utc_datetime(t).ok_or_else(bad)?)))
        }
        ColumnKind::Uuid => {
            Value::Uuid(Some(Box::new(t.parse::<uuid::Uuid>().map_err(|_| bad())?)))
        }
        ColumnKind::Binary => Value::Bytes(Some(Box::new(BASE64.decode(t).map_err(|_| bad())?))),
        ColumnKind::Json => {
            Value::Json(Some(Box::new(serde_json::from_str(text).map_err(|_| bad())?)))
        }
        ColumnKind::Geometry { .. } => Value::Bytes(Some(Box::new(to_wkb(&parse_geometry(text)?)?))),
    })
}
