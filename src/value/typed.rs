//! Results of a conversion and the typed accessor bridge.

use rust_decimal::Decimal;

use crate::repo::PropertyHandle;

use super::{
    Binary, Calendar, Date, ObjectStream, ObjectValue, StoredValue, Value, ValueType,
    ZonedDateTime,
};

/// Output of a conversion request.
///
/// Most targets produce a [`Value`]; the repository-native value, the live
/// property handle and object streams have variants of their own.
#[derive(Debug)]
pub enum Converted {
    /// A materialized value.
    Value(Value),
    /// The repository-native value.
    Stored(StoredValue),
    /// The live property handle.
    Property(PropertyHandle),
    /// A deserializing reader over a binary value.
    Stream(ObjectStream),
    /// One converted result per array element.
    Array(Vec<Converted>),
}

impl Converted {
    /// Collapses the result into a plain value where one exists.
    ///
    /// Streams have no value form; property handles are materialized.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Converted::Value(value) => Some(value),
            Converted::Stored(stored) => Some(stored.to_value()),
            Converted::Property(property) => property.value().ok(),
            Converted::Stream(_) => None,
            Converted::Array(items) => Some(Value::Array(
                items.into_iter().filter_map(Converted::into_value).collect(),
            )),
        }
    }

    /// The value, if this is a plain value result.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Converted::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for Converted {
    fn from(value: Value) -> Self {
        Converted::Value(value)
    }
}

/// A Rust type that property values can be converted into.
pub trait Convertible: Sized {
    /// The conversion target this type requests.
    fn value_type() -> ValueType;

    /// Extracts `Self` from a conversion result for [`Self::value_type`].
    fn from_converted(converted: Converted) -> Option<Self>;
}

macro_rules! convertible_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Convertible for $ty {
                fn value_type() -> ValueType {
                    ValueType::$variant
                }

                fn from_converted(converted: Converted) -> Option<Self> {
                    match converted {
                        Converted::Value(Value::$variant(v)) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

convertible_value! {
    String => String,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    bool => Bool,
    char => Char,
    Date => Date,
    Calendar => Calendar,
    ZonedDateTime => Zoned,
    Binary => Binary,
}

impl Convertible for ObjectValue {
    fn value_type() -> ValueType {
        ValueType::Serializable
    }

    fn from_converted(converted: Converted) -> Option<Self> {
        match converted {
            Converted::Value(Value::Object(object)) => Some(object),
            _ => None,
        }
    }
}

impl Convertible for ObjectStream {
    fn value_type() -> ValueType {
        ValueType::ObjectStream
    }

    fn from_converted(converted: Converted) -> Option<Self> {
        match converted {
            Converted::Stream(stream) => Some(stream),
            _ => None,
        }
    }
}

impl Convertible for StoredValue {
    fn value_type() -> ValueType {
        ValueType::Stored
    }

    fn from_converted(converted: Converted) -> Option<Self> {
        match converted {
            Converted::Stored(stored) => Some(stored),
            _ => None,
        }
    }
}

impl Convertible for PropertyHandle {
    fn value_type() -> ValueType {
        ValueType::Property
    }

    fn from_converted(converted: Converted) -> Option<Self> {
        match converted {
            Converted::Property(property) => Some(property),
            _ => None,
        }
    }
}

impl Convertible for Value {
    fn value_type() -> ValueType {
        ValueType::Unknown
    }

    fn from_converted(converted: Converted) -> Option<Self> {
        converted.into_value()
    }
}

impl<T: Convertible> Convertible for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::Array(Box::new(T::value_type()))
    }

    fn from_converted(converted: Converted) -> Option<Self> {
        match converted {
            Converted::Array(items) => {
                Some(items.into_iter().filter_map(T::from_converted).collect())
            }
            Converted::Value(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|item| T::from_converted(Converted::Value(item)))
                    .collect(),
            ),
            _ => None,
        }
    }
}
