//! One cached property value and the type-coercion engine.

use std::io::{self, BufReader, Read};

use thiserror::Error;
use tracing::{info, trace};

use crate::repo::{Node, PropertyHandle};
use crate::types::{ConversionError, MapError, RepoResult, RepositoryError, Result};
use crate::value::{
    Binary, Converted, ObjectStream, PropertyType, StoredValue, Value, ValueConverter, ValueType,
};

use super::HelperData;


#[derive(Clone, Debug)]
enum Source {
    /// Read path. Binary properties leave `value` empty and are read on demand.
    Stored {
        property: PropertyHandle,
        value: Option<Value>,
    },
    /// Write path: a value that has not been stored yet.
    Pending(Value),
}

/// A property value as held by the map cache.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    source: Source,
    is_array: bool,
}

#[derive(Debug, Error)]
enum Miss {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

type Attempt = std::result::Result<Option<Converted>, Miss>;

impl CacheEntry {
    /// Entry backed by a live property. Non-binary values are materialized
    /// immediately.
    pub fn from_property(property: PropertyHandle) -> RepoResult<Self> {
        let is_array = property.is_multiple();
        let value = if property.property_type() == PropertyType::Binary {
            None
        } else {
            Some(property.value()?)
        };
        Ok(Self {
            source: Source::Stored { property, value },
            is_array,
        })
    }

    /// Entry for a value about to be written to `node`.
    ///
    /// Fails with [`MapError::InvalidArgument`] when the value, or any
    /// element of an array, has no stored form. Binaries are accepted without
    /// inspection so their content is not consumed.
    pub fn from_value(value: Value, node: &dyn Node) -> Result<Self> {
        match &value {
            Value::Array(items) => {
                for item in items {
                    Self::check_storable(item, node)?;
                }
            }
            single => Self::check_storable(single, node)?,
        }
        Ok(Self {
            is_array: value.is_array(),
            source: Source::Pending(value),
        })
    }

    fn check_storable(value: &Value, node: &dyn Node) -> Result<()> {
        if matches!(value, Value::Binary(_)) {
            return Ok(());
        }
        match StoredValue::create(value, node.session())? {
            Some(_) => Ok(()),
            None => Err(MapError::InvalidArgument(format!(
                "value can't be stored in the repository: {value}"
            ))),
        }
    }

    /// Whether the logical value is multi-valued.
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// The live property, for entries read from the repository.
    pub fn property(&self) -> Option<&PropertyHandle> {
        match &self.source {
            Source::Stored { property, .. } => Some(property),
            Source::Pending(_) => None,
        }
    }

    /// The natural materialized value.
    pub fn property_value(&self) -> RepoResult<Value> {
        match &self.source {
            Source::Stored {
                value: Some(value), ..
            } => Ok(value.clone()),
            Source::Stored { property, .. } => property.value(),
            Source::Pending(value) => Ok(value.clone()),
        }
    }

    /// Like [`CacheEntry::property_value`], with failures mapped to `None`.
    pub fn property_value_or_none(&self) -> Option<Value> {
        self.property_value().ok()
    }

    /// Converts the entry to `target`.
    ///
    /// Conversion problems never escape: they are logged and reported as
    /// `None`, as are targets the value cannot be turned into.
    pub fn convert_to_type(
        &self,
        target: &ValueType,
        node: &dyn Node,
        helper: &HelperData,
    ) -> Option<Converted> {
        match self.try_convert(target, node, helper) {
            Ok(converted) => converted,
            Err(err) => {
                info!(
                    value = ?self.property_value_or_none(),
                    target = %target,
                    error = %err,
                    "convert_to_type: cannot convert"
                );
                None
            }
        }
    }

    fn try_convert(&self, target: &ValueType, node: &dyn Node, helper: &HelperData) -> Attempt {
        let value = self.property_value()?;
        if self.is_array {
            let items = match value {
                Value::Array(items) => items,
                single => vec![single],
            };
            return match target {
                ValueType::Array(component) => {
                    let converted = items
                        .into_iter()
                        .enumerate()
                        .filter_map(|(idx, item)| {
                            self.convert_element(Some(idx), item, component, node, helper)
                        })
                        .collect();
                    Ok(Some(Converted::Array(converted)))
                }
                _ => match items.into_iter().next() {
                    Some(first) => self.convert_scalar(Some(0), first, target, node, helper),
                    None => Ok(None),
                },
            };
        }
        match target {
            ValueType::Array(component) => {
                let converted = self.convert_element(None, value, component, node, helper);
                Ok(Some(Converted::Array(converted.into_iter().collect())))
            }
            _ => self.convert_scalar(None, value, target, node, helper),
        }
    }

    /// Array elements that cannot be converted are dropped.
    fn convert_element(
        &self,
        index: Option<usize>,
        value: Value,
        target: &ValueType,
        node: &dyn Node,
        helper: &HelperData,
    ) -> Option<Converted> {
        match self.convert_scalar(index, value, target, node, helper) {
            Ok(converted) => converted,
            Err(err) => {
                trace!(?index, target = %target, error = %err, "convert_to_type: element dropped");
                None
            }
        }
    }

    fn convert_scalar(
        &self,
        index: Option<usize>,
        value: Value,
        target: &ValueType,
        node: &dyn Node,
        helper: &HelperData,
    ) -> Attempt {
        if target.is_instance(&value) {
            return Ok(Some(Converted::Value(value)));
        }
        match value {
            Value::Binary(binary) => self.convert_binary(index, binary, target, node, helper),
            other => self.convert_value(&other, target, node),
        }
    }

    fn convert_binary(
        &self,
        index: Option<usize>,
        binary: Binary,
        target: &ValueType,
        node: &dyn Node,
        helper: &HelperData,
    ) -> Attempt {
        match target {
            ValueType::ObjectStream => match ObjectStream::open(&binary, helper.type_loader()) {
                Ok(stream) => return Ok(Some(Converted::Stream(stream))),
                Err(err) => trace!(error = %err, "convert_to_type: not an object stream"),
            },
            numeric if numeric.is_numeric() => {
                let Source::Stored { property, .. } = &self.source else {
                    return Ok(None);
                };
                let length = match index {
                    None => property.length()?,
                    Some(idx) => property.lengths()?.get(idx).copied().ok_or_else(|| {
                        RepositoryError::ValueFormat(format!(
                            "{} has no value at index {idx}",
                            property.name()
                        ))
                    })?,
                };
                return self.convert_value(&Value::Long(length as i64), target, node);
            }
            ValueType::String => {
                let text = drain_to_string(&binary, helper.options().stream_buffer_size)?;
                return Ok(Some(Converted::Value(Value::String(text))));
            }
            ValueType::Serializable
            | ValueType::Object(_)
            | ValueType::Bool
            | ValueType::Char
            | ValueType::Date
            | ValueType::Calendar
            | ValueType::Zoned => {
                let read = ObjectStream::open(&binary, helper.type_loader())
                    .and_then(|mut stream| stream.read_object());
                match read {
                    Ok(object) => {
                        let object = Value::Object(object);
                        if target.is_instance(&object) {
                            return Ok(Some(Converted::Value(object)));
                        }
                        return self.convert_value(&object, target, node);
                    }
                    Err(err) => trace!(error = %err, "convert_to_type: no serialized object"),
                }
            }
            _ => {}
        }
        self.convert_value(&Value::Binary(binary), target, node)
    }

    fn convert_value(&self, value: &Value, target: &ValueType, node: &dyn Node) -> Attempt {
        let converter = ValueConverter::new(value);
        let converted = match target {
            ValueType::String => Value::String(converter.to_text()?),
            ValueType::Byte => Value::Byte(converter.to_byte()?),
            ValueType::Short => Value::Short(converter.to_short()?),
            ValueType::Int => Value::Int(converter.to_int()?),
            ValueType::Long => Value::Long(converter.to_long()?),
            ValueType::Float => Value::Float(converter.to_float()?),
            ValueType::Double => Value::Double(converter.to_double()?),
            ValueType::Decimal => Value::Decimal(converter.to_decimal()?),
            ValueType::Bool => Value::Bool(converter.to_bool()?),
            ValueType::Char => Value::Char(converter.to_char()?),
            ValueType::Date => Value::Date(converter.to_date()?),
            ValueType::Calendar => Value::Calendar(converter.to_calendar()?),
            ValueType::Zoned => Value::Zoned(converter.to_zoned()?),
            ValueType::Stored => {
                return Ok(StoredValue::create(value, node.session())?.map(Converted::Stored))
            }
            ValueType::Property => return Ok(self.property().cloned().map(Converted::Property)),
            _ => return Ok(None),
        };
        Ok(Some(Converted::Value(converted)))
    }
}

fn drain_to_string(binary: &Binary, buffer_size: usize) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(buffer_size, binary.open()?);
    let mut bytes = Vec::with_capacity(binary.len().unwrap_or(0) as usize);
    reader.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
