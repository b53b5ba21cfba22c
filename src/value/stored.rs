use std::fmt;

use rust_decimal::Decimal;

use crate::repo::Session;
use crate::types::RepoResult;

use super::temporal::{format_iso8601, Calendar};
use super::{Binary, Value};

/// Storage type declared by a repository property.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PropertyType {
    /// UTF-8 text.
    String,
    /// Binary content.
    Binary,
    /// 64-bit integer.
    Long,
    /// 64-bit float.
    Double,
    /// Timestamp.
    Date,
    /// Boolean.
    Boolean,
    /// Qualified name.
    Name,
    /// Repository path.
    Path,
    /// Referential-integrity reference.
    Reference,
    /// Reference without integrity.
    WeakReference,
    /// URI.
    Uri,
    /// Arbitrary-precision decimal.
    Decimal,
}

impl PropertyType {
    /// Name of the type as used in repository node type definitions.
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::Binary => "Binary",
            PropertyType::Long => "Long",
            PropertyType::Double => "Double",
            PropertyType::Date => "Date",
            PropertyType::Boolean => "Boolean",
            PropertyType::Name => "Name",
            PropertyType::Path => "Path",
            PropertyType::Reference => "Reference",
            PropertyType::WeakReference => "WeakReference",
            PropertyType::Uri => "URI",
            PropertyType::Decimal => "Decimal",
        }
    }
}

/// A value in the repository's native model.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredValue {
    /// Text.
    String(String),
    /// Binary content.
    Binary(Binary),
    /// 64-bit integer.
    Long(i64),
    /// 64-bit float.
    Double(f64),
    /// Decimal.
    Decimal(Decimal),
    /// Boolean.
    Boolean(bool),
    /// Timestamp.
    Date(Calendar),
}

impl StoredValue {
    /// Creates the native representation of `value`.
    ///
    /// Returns `Ok(None)` when the value has no native form: nested arrays and
    /// opaque objects. Serializable objects become binaries built through the
    /// session's value factory.
    pub fn create(value: &Value, session: &dyn Session) -> RepoResult<Option<StoredValue>> {
        let stored = match value {
            Value::String(v) => StoredValue::String(v.clone()),
            Value::Char(v) => StoredValue::String(v.to_string()),
            Value::Byte(v) => StoredValue::Long(i64::from(*v)),
            Value::Short(v) => StoredValue::Long(i64::from(*v)),
            Value::Int(v) => StoredValue::Long(i64::from(*v)),
            Value::Long(v) => StoredValue::Long(*v),
            Value::Float(v) => StoredValue::Double(f64::from(*v)),
            Value::Double(v) => StoredValue::Double(*v),
            Value::Decimal(v) => StoredValue::Decimal(*v),
            Value::Bool(v) => StoredValue::Boolean(*v),
            Value::Date(v) => StoredValue::Date(Calendar::from(*v)),
            Value::Calendar(v) => StoredValue::Date(*v),
            Value::Zoned(v) => StoredValue::Date(Calendar::from(*v)),
            Value::Binary(v) => StoredValue::Binary(v.clone()),
            Value::Object(object) => match object.to_stream_bytes() {
                Some(bytes) => StoredValue::Binary(session.create_binary(bytes)?),
                None => return Ok(None),
            },
            Value::Array(_) => return Ok(None),
        };
        Ok(Some(stored))
    }

    /// The property type this value is stored as.
    pub fn property_type(&self) -> PropertyType {
        match self {
            StoredValue::String(_) => PropertyType::String,
            StoredValue::Binary(_) => PropertyType::Binary,
            StoredValue::Long(_) => PropertyType::Long,
            StoredValue::Double(_) => PropertyType::Double,
            StoredValue::Decimal(_) => PropertyType::Decimal,
            StoredValue::Boolean(_) => PropertyType::Boolean,
            StoredValue::Date(_) => PropertyType::Date,
        }
    }

    /// Materializes the value into the in-process model.
    pub fn to_value(&self) -> Value {
        match self {
            StoredValue::String(v) => Value::String(v.clone()),
            StoredValue::Binary(v) => Value::Binary(v.clone()),
            StoredValue::Long(v) => Value::Long(*v),
            StoredValue::Double(v) => Value::Double(*v),
            StoredValue::Decimal(v) => Value::Decimal(*v),
            StoredValue::Boolean(v) => Value::Bool(*v),
            StoredValue::Date(v) => Value::Calendar(*v),
        }
    }

    /// Length of the value: bytes for binaries, characters of the text form
    /// otherwise.
    pub fn length(&self) -> RepoResult<u64> {
        let text = match self {
            StoredValue::Binary(binary) => {
                return match binary.len() {
                    Some(len) => Ok(len),
                    None => Ok(binary.read_to_end()?.len() as u64),
                }
            }
            StoredValue::Date(cal) => format_iso8601(cal.offset_date_time())
                .map_err(|err| crate::types::RepositoryError::ValueFormat(err.to_string()))?,
            other => other.to_string(),
        };
        Ok(text.chars().count() as u64)
    }
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredValue::String(v) => f.write_str(v),
            StoredValue::Binary(v) => write!(f, "{v}"),
            StoredValue::Long(v) => write!(f, "{v}"),
            StoredValue::Double(v) => write!(f, "{v:?}"),
            StoredValue::Decimal(v) => write!(f, "{v}"),
            StoredValue::Boolean(v) => write!(f, "{v}"),
            StoredValue::Date(v) => write!(f, "{v}"),
        }
    }
}
