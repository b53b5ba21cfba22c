//! Scalar coercion.
//!
//! A [`ValueConverter`] wraps one materialized scalar and converts it on
//! demand. The variant is picked from the *source* value; the accessor picks
//! the target. Values with no converter of their own (characters, binaries,
//! objects, arrays) are rendered to text and handled as strings.

use std::borrow::Cow;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::ConversionError;

use super::temporal::{format_iso8601, parse_iso8601, Calendar, Date, ZonedDateTime};
use super::Value;

/// A numeric source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// 8-bit integer.
    Byte(i8),
    /// 16-bit integer.
    Short(i16),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Decimal.
    Decimal(Decimal),
}

impl Number {
    fn to_long(self) -> i64 {
        match self {
            Number::Byte(v) => i64::from(v),
            Number::Short(v) => i64::from(v),
            Number::Int(v) => i64::from(v),
            Number::Long(v) => v,
            Number::Float(v) => v as i64,
            Number::Double(v) => v as i64,
            Number::Decimal(v) => decimal_to_i128(v) as i64,
        }
    }

    // Narrow integer targets go through 32 bits for floating sources.
    fn to_int(self) -> i32 {
        match self {
            Number::Float(v) => v as i32,
            Number::Double(v) => v as i32,
            other => other.to_long() as i32,
        }
    }

    fn to_double(self) -> f64 {
        match self {
            Number::Byte(v) => f64::from(v),
            Number::Short(v) => f64::from(v),
            Number::Int(v) => f64::from(v),
            Number::Long(v) => v as f64,
            Number::Float(v) => f64::from(v),
            Number::Double(v) => v,
            Number::Decimal(v) => v.to_f64().unwrap_or(f64::NAN),
        }
    }

    fn to_decimal(self) -> Result<Decimal, ConversionError> {
        match self {
            Number::Decimal(v) => Ok(v),
            Number::Float(_) | Number::Double(_) => parse_decimal(&self.render()),
            other => Ok(Decimal::from(other.to_long())),
        }
    }

    fn is_nonzero(self) -> bool {
        match self {
            Number::Float(v) => v != 0.0,
            Number::Double(v) => v != 0.0,
            Number::Decimal(v) => !v.is_zero(),
            other => other.to_long() != 0,
        }
    }

    fn render(self) -> String {
        match self {
            Number::Byte(v) => v.to_string(),
            Number::Short(v) => v.to_string(),
            Number::Int(v) => v.to_string(),
            Number::Long(v) => v.to_string(),
            Number::Float(v) => format!("{v:?}"),
            Number::Double(v) => format!("{v:?}"),
            Number::Decimal(v) => v.to_string(),
        }
    }
}

fn decimal_to_i128(value: Decimal) -> i128 {
    value.trunc().to_i128().unwrap_or_default()
}

fn parse_decimal(text: &str) -> Result<Decimal, ConversionError> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| ConversionError::parse(text, "decimal"))
}

/// Converter over one scalar source value.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueConverter<'a> {
    /// Any numeric source.
    Number(Number),
    /// Boolean source; converts to numbers as 0 or 1.
    Boolean(bool),
    /// Text source, or the rendering of a value with no converter.
    Text(Cow<'a, str>),
    /// UTC instant.
    Date(Date),
    /// Timestamp with offset.
    Calendar(Calendar),
    /// Zoned timestamp.
    Zoned(ZonedDateTime),
}

impl<'a> ValueConverter<'a> {
    /// Selects the converter for `value`.
    pub fn new(value: &'a Value) -> Self {
        match value {
            Value::Byte(v) => ValueConverter::Number(Number::Byte(*v)),
            Value::Short(v) => ValueConverter::Number(Number::Short(*v)),
            Value::Int(v) => ValueConverter::Number(Number::Int(*v)),
            Value::Long(v) => ValueConverter::Number(Number::Long(*v)),
            Value::Float(v) => ValueConverter::Number(Number::Float(*v)),
            Value::Double(v) => ValueConverter::Number(Number::Double(*v)),
            Value::Decimal(v) => ValueConverter::Number(Number::Decimal(*v)),
            Value::Bool(v) => ValueConverter::Boolean(*v),
            Value::String(v) => ValueConverter::Text(Cow::Borrowed(v.as_str())),
            Value::Date(v) => ValueConverter::Date(*v),
            Value::Calendar(v) => ValueConverter::Calendar(*v),
            Value::Zoned(v) => ValueConverter::Zoned(*v),
            other => ValueConverter::Text(Cow::Owned(other.to_string())),
        }
    }

    /// Numeric view of non-text sources; temporal values count epoch millis.
    fn number(&self) -> Option<Number> {
        match self {
            ValueConverter::Number(n) => Some(*n),
            ValueConverter::Boolean(b) => Some(Number::Int(i32::from(*b))),
            ValueConverter::Date(d) => Some(Number::Long(d.unix_millis())),
            ValueConverter::Calendar(c) => Some(Number::Long(c.unix_millis())),
            ValueConverter::Zoned(z) => Some(Number::Long(z.unix_millis())),
            ValueConverter::Text(_) => None,
        }
    }

    fn parse<T: FromStr>(text: &str, target: &'static str) -> Result<T, ConversionError> {
        text.parse().map_err(|_| ConversionError::parse(text, target))
    }

    /// Converts to a 64-bit integer.
    pub fn to_long(&self) -> Result<i64, ConversionError> {
        match self {
            ValueConverter::Text(text) => Self::parse(text, "long"),
            _ => Ok(self.number().map_or(0, Number::to_long)),
        }
    }

    /// Converts to a 32-bit integer.
    pub fn to_int(&self) -> Result<i32, ConversionError> {
        match self {
            ValueConverter::Text(text) => Self::parse(text, "int"),
            _ => Ok(self.number().map_or(0, Number::to_int)),
        }
    }

    /// Converts to a 16-bit integer.
    pub fn to_short(&self) -> Result<i16, ConversionError> {
        match self {
            ValueConverter::Text(text) => Self::parse(text, "short"),
            _ => Ok(self.number().map_or(0, Number::to_int) as i16),
        }
    }

    /// Converts to an 8-bit integer.
    pub fn to_byte(&self) -> Result<i8, ConversionError> {
        match self {
            ValueConverter::Text(text) => Self::parse(text, "byte"),
            _ => Ok(self.number().map_or(0, Number::to_int) as i8),
        }
    }

    /// Converts to a 64-bit float. Text is trimmed before parsing.
    pub fn to_double(&self) -> Result<f64, ConversionError> {
        match self {
            ValueConverter::Text(text) => Self::parse(text.trim(), "double"),
            _ => Ok(self.number().map_or(0.0, Number::to_double)),
        }
    }

    /// Converts to a 32-bit float. Text is trimmed before parsing.
    pub fn to_float(&self) -> Result<f32, ConversionError> {
        match self {
            ValueConverter::Text(text) => Self::parse(text.trim(), "float"),
            ValueConverter::Number(Number::Float(v)) => Ok(*v),
            _ => Ok(self.number().map_or(0.0, Number::to_double) as f32),
        }
    }

    /// Converts to a decimal.
    pub fn to_decimal(&self) -> Result<Decimal, ConversionError> {
        match self {
            ValueConverter::Text(text) => parse_decimal(text),
            _ => self.number().map_or(Ok(Decimal::ZERO), Number::to_decimal),
        }
    }

    /// Converts to a boolean. Only the text `"true"` (any case) is true for
    /// text sources; numbers are true when nonzero.
    pub fn to_bool(&self) -> Result<bool, ConversionError> {
        Ok(match self {
            ValueConverter::Text(text) => text.eq_ignore_ascii_case("true"),
            ValueConverter::Boolean(b) => *b,
            _ => self.number().is_some_and(Number::is_nonzero),
        })
    }

    /// Converts to a calendar. Text must be in the canonical ISO-8601 form;
    /// numbers are epoch milliseconds in UTC.
    pub fn to_calendar(&self) -> Result<Calendar, ConversionError> {
        match self {
            ValueConverter::Text(text) => parse_iso8601(text).map(Calendar::new),
            ValueConverter::Calendar(c) => Ok(*c),
            ValueConverter::Date(d) => Ok(Calendar::from(*d)),
            ValueConverter::Zoned(z) => Ok(Calendar::from(*z)),
            _ => Calendar::from_unix_millis(self.to_long()?),
        }
    }

    /// Converts to a UTC instant.
    pub fn to_date(&self) -> Result<Date, ConversionError> {
        match self {
            ValueConverter::Date(d) => Ok(*d),
            _ => self.to_calendar().map(Date::from),
        }
    }

    /// Converts to a zoned timestamp.
    pub fn to_zoned(&self) -> Result<ZonedDateTime, ConversionError> {
        match self {
            ValueConverter::Zoned(z) => Ok(*z),
            _ => self.to_calendar().map(ZonedDateTime::from),
        }
    }

    /// Converts to a character. The text form must be exactly one character.
    pub fn to_char(&self) -> Result<char, ConversionError> {
        let text = self.to_text()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConversionError::parse(text, "char")),
        }
    }

    /// Renders the source as text; temporal values use the ISO-8601 form.
    pub fn to_text(&self) -> Result<String, ConversionError> {
        match self {
            ValueConverter::Text(text) => Ok(text.clone().into_owned()),
            ValueConverter::Number(n) => Ok(n.render()),
            ValueConverter::Boolean(b) => Ok(b.to_string()),
            ValueConverter::Date(d) => format_iso8601(d.offset_date_time()),
            ValueConverter::Calendar(c) => format_iso8601(c.offset_date_time()),
            ValueConverter::Zoned(z) => format_iso8601(z.offset_date_time()),
        }
    }
}
