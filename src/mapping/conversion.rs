//! Value conversion
//!
//! Formatting and parsing of leaf values. All representations are
//! locale-independent: booleans are `true`/`false`, floats use the XML Schema
//! spellings `INF`, `-INF` and `NaN`, binary data is base64.
//!
//! Temporal values are written with the first configured pattern and read by
//! trying each pattern in order. Without patterns the canonical forms are
//! RFC 3339 for offset date-times, `%Y-%m-%dT%H:%M:%S%.f`, `%Y-%m-%d` and
//! `%H:%M:%S%.f` for the naive kinds, and `-?PnDTnHnMn.nS` for durations.

use crate::error::FieldConversionError;
use crate::schema::{EnumMap, ScalarType, TemporalType, TypeDescriptor, TypeKind};
use crate::values::{Temporal, Value};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::str::FromStr;

/// Result of a single conversion
pub type ConversionResult<T> = std::result::Result<T, FieldConversionError>;

const NAIVE_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%.f";
const NAIVE_DATE: &str = "%Y-%m-%d";
const NAIVE_TIME: &str = "%H:%M:%S%.f";

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-)?P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d{1,9}))?S)?)?$")
        .expect("duration pattern is valid")
});

/// Format a non-null leaf value
pub fn format_leaf(descriptor: &TypeDescriptor, value: &Value, formats: &[String]) -> ConversionResult<String> {
    match &descriptor.kind {
        TypeKind::Scalar(scalar) => format_scalar(*scalar, value),
        TypeKind::NullableScalar(inner) => format_leaf(inner, value, formats),
        TypeKind::Temporal(temporal) => format_temporal(*temporal, value, formats),
        TypeKind::Enum(map) => format_enum(map, value),
        _ => Err(FieldConversionError::new(format!(
            "'{}' is not a leaf type",
            descriptor
        ))),
    }
}

/// Parse leaf text
pub fn parse_leaf(descriptor: &TypeDescriptor, text: &str, formats: &[String]) -> ConversionResult<Value> {
    match &descriptor.kind {
        TypeKind::Scalar(scalar) => parse_scalar(*scalar, text),
        TypeKind::NullableScalar(inner) => parse_leaf(inner, text, formats),
        TypeKind::Temporal(temporal) => parse_temporal(*temporal, text, formats),
        TypeKind::Enum(map) => parse_enum(map, text),
        _ => Err(FieldConversionError::new(format!(
            "'{}' is not a leaf type",
            descriptor
        ))),
    }
}

fn mismatch(value: &Value, target: &str) -> FieldConversionError {
    FieldConversionError::new(format!("Cannot write a {} value as {}", value.kind_name(), target))
        .with_target(target)
}

fn invalid(message: impl ToString, text: &str, target: &str) -> FieldConversionError {
    FieldConversionError::new(message.to_string())
        .with_value(text)
        .with_target(target)
}

fn integer_bounds(scalar: ScalarType) -> Option<(i128, i128)> {
    let bounds = match scalar {
        ScalarType::I8 => (i8::MIN as i128, i8::MAX as i128),
        ScalarType::I16 => (i16::MIN as i128, i16::MAX as i128),
        ScalarType::I32 => (i32::MIN as i128, i32::MAX as i128),
        ScalarType::I64 => (i64::MIN as i128, i64::MAX as i128),
        ScalarType::U8 => (0, u8::MAX as i128),
        ScalarType::U16 => (0, u16::MAX as i128),
        ScalarType::U32 => (0, u32::MAX as i128),
        ScalarType::U64 => (0, u64::MAX as i128),
        _ => return None,
    };
    Some(bounds)
}

/// Format a scalar value
pub fn format_scalar(scalar: ScalarType, value: &Value) -> ConversionResult<String> {
    let target = scalar.xml_name();

    if let Some((min, max)) = integer_bounds(scalar) {
        let n = match value {
            Value::Int(i) => *i as i128,
            Value::UInt(u) => *u as i128,
            _ => return Err(mismatch(value, target)),
        };
        if n < min || n > max {
            return Err(FieldConversionError::new(format!("{} is out of range for {}", n, target))
                .with_value(n.to_string())
                .with_target(target));
        }
        return Ok(n.to_string());
    }

    match (scalar, value) {
        (ScalarType::String, Value::String(s)) => Ok(s.clone()),
        (ScalarType::String, Value::Char(c)) => Ok(c.to_string()),
        (ScalarType::Bool, Value::Bool(b)) => Ok(if *b { "true" } else { "false" }.to_string()),
        (ScalarType::F32, Value::Float(f)) => Ok(format_float(*f as f32 as f64, true)),
        (ScalarType::F64, Value::Float(f)) => Ok(format_float(*f, false)),
        (ScalarType::F32 | ScalarType::F64, Value::Int(i)) => Ok(i.to_string()),
        (ScalarType::F32 | ScalarType::F64, Value::UInt(u)) => Ok(u.to_string()),
        (ScalarType::Decimal, Value::Decimal(d)) => Ok(d.to_string()),
        (ScalarType::Decimal, Value::Int(i)) => Ok(i.to_string()),
        (ScalarType::Decimal, Value::UInt(u)) => Ok(u.to_string()),
        (ScalarType::Char, Value::Char(c)) => Ok(c.to_string()),
        (ScalarType::Char, Value::String(s)) if s.chars().count() == 1 => Ok(s.clone()),
        (ScalarType::Bytes, Value::Bytes(b)) => Ok(STANDARD.encode(b)),
        _ => Err(mismatch(value, target)),
    }
}

fn format_float(f: f64, single: bool) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF" } else { "-INF" }.to_string()
    } else if single {
        (f as f32).to_string()
    } else {
        f.to_string()
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse::<f64>().ok(),
    }
}

/// Parse scalar text
pub fn parse_scalar(scalar: ScalarType, text: &str) -> ConversionResult<Value> {
    let target = scalar.xml_name();
    let trimmed = text.trim();

    if let Some((min, max)) = integer_bounds(scalar) {
        let n = trimmed
            .strip_prefix('+')
            .unwrap_or(trimmed)
            .parse::<i128>()
            .map_err(|e| invalid(e, text, target))?;
        if n < min || n > max {
            return Err(invalid(format!("{} is out of range for {}", n, target), text, target));
        }
        return Ok(if min < 0 {
            Value::Int(n as i64)
        } else {
            Value::UInt(n as u64)
        });
    }

    match scalar {
        ScalarType::String => Ok(Value::String(text.to_string())),
        ScalarType::Bool => match trimmed {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid("expected true, false, 1 or 0", text, target)),
        },
        ScalarType::F32 => parse_float(trimmed)
            .map(|f| Value::Float(f as f32 as f64))
            .ok_or_else(|| invalid("invalid float literal", text, target)),
        ScalarType::F64 => parse_float(trimmed)
            .map(Value::Float)
            .ok_or_else(|| invalid("invalid float literal", text, target)),
        ScalarType::Decimal => Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Value::Decimal)
            .map_err(|e| invalid(e, text, target)),
        ScalarType::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(invalid("expected exactly one character", text, target)),
            }
        }
        ScalarType::Bytes => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact)
                .map(Value::Bytes)
                .map_err(|e| invalid(e, text, target))
        }
        _ => Err(invalid("unsupported scalar", text, target)),
    }
}

/// Format a temporal value
pub fn format_temporal(temporal: TemporalType, value: &Value, formats: &[String]) -> ConversionResult<String> {
    let target = temporal.xml_name();
    let pattern = formats.first().map(|s| s.as_str());

    let mut out = String::new();
    let written = match (temporal, value) {
        (TemporalType::DateTime, Value::Temporal(Temporal::DateTime(dt))) => match pattern {
            Some(p) => write!(out, "{}", dt.format(p)),
            None => {
                out.push_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, false));
                Ok(())
            }
        },
        (TemporalType::NaiveDateTime, Value::Temporal(Temporal::NaiveDateTime(dt))) => {
            write!(out, "{}", dt.format(pattern.unwrap_or(NAIVE_DATE_TIME)))
        }
        (TemporalType::Date, Value::Temporal(Temporal::Date(d))) => {
            write!(out, "{}", d.format(pattern.unwrap_or(NAIVE_DATE)))
        }
        (TemporalType::Time, Value::Temporal(Temporal::Time(t))) => {
            write!(out, "{}", t.format(pattern.unwrap_or(NAIVE_TIME)))
        }
        (TemporalType::Duration, Value::Temporal(Temporal::Duration(d))) => {
            out.push_str(&format_duration(d));
            Ok(())
        }
        _ => return Err(mismatch(value, target)),
    };

    written.map_err(|_| {
        FieldConversionError::new(format!("Invalid temporal pattern '{}'", pattern.unwrap_or("")))
            .with_target(target)
    })?;
    Ok(out)
}

/// Parse temporal text, trying each pattern in order
pub fn parse_temporal(temporal: TemporalType, text: &str, formats: &[String]) -> ConversionResult<Value> {
    let target = temporal.xml_name();
    let trimmed = text.trim();

    if temporal == TemporalType::Duration {
        return parse_duration(trimmed)
            .map(|d| Value::Temporal(Temporal::Duration(d)))
            .ok_or_else(|| invalid("invalid duration", text, target));
    }

    let parse_one = |pattern: Option<&str>| -> Option<Temporal> {
        match temporal {
            TemporalType::DateTime => {
                let parsed = match pattern {
                    Some(p) => DateTime::parse_from_str(trimmed, p).ok(),
                    None => DateTime::parse_from_rfc3339(trimmed).ok(),
                };
                parsed.map(Temporal::DateTime)
            }
            TemporalType::NaiveDateTime => {
                NaiveDateTime::parse_from_str(trimmed, pattern.unwrap_or(NAIVE_DATE_TIME))
                    .ok()
                    .map(Temporal::NaiveDateTime)
            }
            TemporalType::Date => NaiveDate::parse_from_str(trimmed, pattern.unwrap_or(NAIVE_DATE))
                .ok()
                .map(Temporal::Date),
            TemporalType::Time => NaiveTime::parse_from_str(trimmed, pattern.unwrap_or(NAIVE_TIME))
                .ok()
                .map(Temporal::Time),
            TemporalType::Duration => None,
        }
    };

    let parsed = if formats.is_empty() {
        parse_one(None)
    } else {
        formats.iter().find_map(|f| parse_one(Some(f)))
    };

    parsed.map(Value::Temporal).ok_or_else(|| {
        let message = if formats.is_empty() {
            format!("invalid {} literal", target)
        } else {
            format!("no pattern matched: {}", formats.join(", "))
        };
        invalid(message, text, target)
    })
}

/// Format a duration as `-?PnDTnHnMn.nS`
pub fn format_duration(duration: &Duration) -> String {
    let negative = *duration < Duration::zero();
    let abs = if negative { -*duration } else { *duration };

    let total = abs.num_seconds();
    let nanos = (abs - Duration::seconds(total))
        .num_nanoseconds()
        .unwrap_or(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    let has_time = hours > 0 || minutes > 0 || seconds > 0 || nanos > 0;
    if has_time || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds > 0 || nanos > 0 || !has_time {
            if nanos > 0 {
                let fraction = format!("{:09}", nanos);
                out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
            } else {
                out.push_str(&format!("{}S", seconds));
            }
        }
    }
    out
}

/// Parse a day-time duration; years and months are rejected
pub fn parse_duration(text: &str) -> Option<Duration> {
    let caps = DURATION.captures(text)?;
    if text.ends_with('P') || text.ends_with('T') {
        return None;
    }

    let number = |i: usize| -> Option<i64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse::<i64>().ok(),
            None => Some(0),
        }
    };

    let seconds = number(2)?
        .checked_mul(86_400)?
        .checked_add(number(3)?.checked_mul(3_600)?)?
        .checked_add(number(4)?.checked_mul(60)?)?
        .checked_add(number(5)?)?;
    if seconds > i64::MAX / 1_000 - 1 {
        return None;
    }
    let nanos = match caps.get(6) {
        Some(m) => format!("{:0<9}", m.as_str()).parse::<i64>().ok()?,
        None => 0,
    };

    let duration = Duration::seconds(seconds).checked_add(&Duration::nanoseconds(nanos))?;
    Some(if caps.get(1).is_some() { -duration } else { duration })
}

/// Format an enumeration label as its XML token
pub fn format_enum(map: &EnumMap, value: &Value) -> ConversionResult<String> {
    let label = match value {
        Value::Enum(label) | Value::String(label) => label,
        other => return Err(mismatch(other, &map.name)),
    };
    if !map.has_label(label) {
        return Err(FieldConversionError::new(format!(
            "'{}' is not a member of {}",
            label, map.name
        ))
        .with_value(label.clone())
        .with_target(map.name.clone()));
    }
    Ok(map.token_for(label).to_string())
}

/// Parse an XML token into an enumeration label
pub fn parse_enum(map: &EnumMap, text: &str) -> ConversionResult<Value> {
    map.label_for(text.trim())
        .map(|label| Value::Enum(label.to_string()))
        .ok_or_else(|| invalid(format!("'{}' is not a member of {}", text, map.name), text, &map.name))
}
