//! In-process value model.
//!
//! [`Value`] is what a property materializes into, and what callers hand to
//! `put`. [`ValueType`] names a requested target type; it is the dynamic
//! counterpart of the [`Convertible`] trait used by the typed accessors.

mod binary;
mod convert;
mod stored;
mod temporal;
mod typed;

use std::fmt;

use rust_decimal::Decimal;
use time::OffsetDateTime;

pub use binary::{
    Binary, BinarySource, ObjectStream, ObjectStreamError, ObjectValue, OBJECT_STREAM_MAGIC,
};
pub use convert::{Number, ValueConverter};
pub use stored::{PropertyType, StoredValue};
pub use temporal::{format_iso8601, parse_iso8601, Calendar, Date, ZonedDateTime};
pub use typed::{Convertible, Converted};

/// A materialized property value.
///
/// There is no null variant; absence is expressed with `Option`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// 8-bit signed integer.
    Byte(i8),
    /// 16-bit signed integer.
    Short(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// Boolean.
    Bool(bool),
    /// Single character.
    Char(char),
    /// Text.
    String(String),
    /// UTC instant.
    Date(Date),
    /// Timestamp with offset.
    Calendar(Calendar),
    /// Zoned timestamp.
    Zoned(ZonedDateTime),
    /// Readable binary content.
    Binary(Binary),
    /// Arbitrary object, possibly serializable.
    Object(ObjectValue),
    /// Multi-valued property content.
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the value's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Byte(_) => "Byte",
            Value::Short(_) => "Short",
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::Decimal(_) => "Decimal",
            Value::Bool(_) => "Bool",
            Value::Char(_) => "Char",
            Value::String(_) => "String",
            Value::Date(_) => "Date",
            Value::Calendar(_) => "Calendar",
            Value::Zoned(_) => "Zoned",
            Value::Binary(_) => "Binary",
            Value::Object(_) => "Object",
            Value::Array(_) => "Array",
        }
    }

    /// Whether the value can travel in serialized form.
    ///
    /// Scalars always can; binaries are streams and cannot; objects can when
    /// they carry a serialized payload; arrays when every element can.
    pub fn is_serializable(&self) -> bool {
        match self {
            Value::Binary(_) => false,
            Value::Object(object) => object.is_serializable(),
            Value::Array(items) => items.iter().all(Value::is_serializable),
            _ => true,
        }
    }

    /// Whether the value is a multi-valued array.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// The text content, for string values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{v}"),
            Value::Calendar(v) => write!(f, "{v}"),
            Value::Zoned(v) => write!(f, "{v}"),
            Value::Binary(v) => write!(f, "{v}"),
            Value::Object(v) => write!(f, "{v}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    bool => Bool,
    char => Char,
    String => String,
    Date => Date,
    Calendar => Calendar,
    ZonedDateTime => Zoned,
    Binary => Binary,
    ObjectValue => Object,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::Calendar(Calendar::new(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// A requested conversion target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No preference: the natural materialized value.
    Unknown,
    /// Text.
    String,
    /// 8-bit integer.
    Byte,
    /// 16-bit integer.
    Short,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Decimal.
    Decimal,
    /// Boolean.
    Bool,
    /// Character; only satisfied by character values.
    Char,
    /// UTC instant.
    Date,
    /// Timestamp with offset.
    Calendar,
    /// Zoned timestamp.
    Zoned,
    /// Readable binary stream.
    Binary,
    /// Deserializing reader over a binary value.
    ObjectStream,
    /// Any value with a serialized form.
    Serializable,
    /// An object of the named type.
    Object(String),
    /// The repository-native value.
    Stored,
    /// The live property handle.
    Property,
    /// Array of the component type.
    Array(Box<ValueType>),
}

impl ValueType {
    /// The target type that reproduces `value`.
    ///
    /// Arrays take their first element's type; an empty array has an
    /// [`ValueType::Unknown`] component.
    pub fn of(value: &Value) -> ValueType {
        match value {
            Value::Byte(_) => ValueType::Byte,
            Value::Short(_) => ValueType::Short,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Bool(_) => ValueType::Bool,
            Value::Char(_) => ValueType::Char,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Calendar(_) => ValueType::Calendar,
            Value::Zoned(_) => ValueType::Zoned,
            Value::Binary(_) => ValueType::Binary,
            Value::Object(object) => ValueType::Object(object.type_name().to_owned()),
            Value::Array(items) => ValueType::Array(Box::new(
                items.first().map_or(ValueType::Unknown, ValueType::of),
            )),
        }
    }

    /// Whether the target is one of the numeric types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Byte
                | ValueType::Short
                | ValueType::Int
                | ValueType::Long
                | ValueType::Float
                | ValueType::Double
                | ValueType::Decimal
        )
    }

    /// Whether the target is an array type.
    pub fn is_array(&self) -> bool {
        matches!(self, ValueType::Array(_))
    }

    /// Whether `value` already satisfies this target without conversion.
    pub fn is_instance(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Unknown, _) => true,
            (ValueType::Serializable, value) => value.is_serializable(),
            (ValueType::Object(name), Value::Object(object)) => object.type_name() == name,
            (ValueType::Array(component), Value::Array(items)) => {
                items.iter().all(|item| component.is_instance(item))
            }
            (target, value) => match ValueType::of(value) {
                ValueType::Object(_) | ValueType::Array(_) => false,
                kind => *target == kind,
            },
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Object(name) => write!(f, "Object<{name}>"),
            ValueType::Array(component) => write!(f, "{component}[]"),
            other => write!(f, "{other:?}"),
        }
    }
}
