//! Binary payloads and serialized objects.
//!
//! A [`Binary`] is a cheap handle to readable content; opening it yields a
//! fresh reader when the content is buffered, or the single underlying stream
//! when it was created from a one-shot reader. Serialized objects travel as
//! binaries framed by [`OBJECT_STREAM_MAGIC`] followed by a JSON envelope.

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repo::TypeLoader;

/// Header that opens every serialized object stream.
pub const OBJECT_STREAM_MAGIC: [u8; 4] = [0xAC, 0xED, 0x00, 0x01];

/// Provider of binary content.
pub trait BinarySource: Send + Sync {
    /// Opens a reader positioned at the start of the content.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Length in bytes, when known without reading.
    fn len(&self) -> Option<u64>;
}

struct BufferedSource(Bytes);

impl BinarySource for BufferedSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.0.clone())))
    }

    fn len(&self) -> Option<u64> {
        Some(self.0.len() as u64)
    }
}

struct ReaderSource(Mutex<Option<Box<dyn Read + Send>>>);

impl BinarySource for ReaderSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        self.0.lock().take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "binary stream already consumed")
        })
    }

    fn len(&self) -> Option<u64> {
        None
    }
}

/// Handle to binary content.
#[derive(Clone)]
pub struct Binary {
    source: Arc<dyn BinarySource>,
}

impl Binary {
    /// Buffered content that can be opened any number of times.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::from_source(Arc::new(BufferedSource(bytes.into())))
    }

    /// A one-shot stream; the first open consumes it.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self::from_source(Arc::new(ReaderSource(Mutex::new(Some(Box::new(reader))))))
    }

    /// Content served by a caller-provided source.
    pub fn from_source(source: Arc<dyn BinarySource>) -> Self {
        Self { source }
    }

    /// Opens a reader over the content.
    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        self.source.open()
    }

    /// Length in bytes, when known without reading.
    pub fn len(&self) -> Option<u64> {
        self.source.len()
    }

    /// Reads the whole content.
    pub fn read_to_end(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len().unwrap_or(0) as usize);
        self.open()?.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Whether two handles share the same source.
    pub fn same_source(&self, other: &Binary) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

impl PartialEq for Binary {
    fn eq(&self, other: &Self) -> bool {
        self.same_source(other)
    }
}

impl fmt::Debug for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binary").field("len", &self.len()).finish()
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.len() {
            Some(len) => write!(f, "binary(len={len})"),
            None => f.write_str("binary(stream)"),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    type_name: String,
    data: serde_json::Value,
}

/// An arbitrary object value.
///
/// Serializable objects carry their JSON form and can be stored as binaries.
/// Opaque objects only carry a type name and are rejected by the repository.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectValue {
    type_name: String,
    payload: Option<serde_json::Value>,
}

impl ObjectValue {
    /// Serializes `value` under the given type name.
    pub fn serialize<T: Serialize>(
        type_name: impl Into<String>,
        value: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            type_name: type_name.into(),
            payload: Some(serde_json::to_value(value)?),
        })
    }

    /// An object with no serialized form.
    pub fn opaque(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            payload: None,
        }
    }

    /// The object's type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the object has a serialized form.
    pub fn is_serializable(&self) -> bool {
        self.payload.is_some()
    }

    /// The serialized form, if any.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    /// Decodes the serialized form into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.payload
            .as_ref()
            .map(|payload| serde_json::from_value(payload.clone()))
    }

    /// Frames the object as an object stream, or `None` for opaque objects.
    pub fn to_stream_bytes(&self) -> Option<Vec<u8>> {
        let envelope = Envelope {
            type_name: self.type_name.clone(),
            data: self.payload.clone()?,
        };
        let mut out = OBJECT_STREAM_MAGIC.to_vec();
        serde_json::to_writer(&mut out, &envelope).ok()?;
        Some(out)
    }
}

impl fmt::Display for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(payload) => write!(f, "{}{}", self.type_name, payload),
            None => write!(f, "{}(opaque)", self.type_name),
        }
    }
}

/// Failure while reading an object stream.
#[derive(Debug, Error)]
pub enum ObjectStreamError {
    /// The underlying binary could not be read.
    #[error("object stream I/O: {0}")]
    Io(#[from] io::Error),
    /// The content does not start with [`OBJECT_STREAM_MAGIC`].
    #[error("not an object stream")]
    BadHeader,
    /// The envelope is not valid JSON.
    #[error("malformed object: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The type loader does not know the object's type.
    #[error("type not found: {0}")]
    UnknownType(String),
}

/// Deserializing reader over a binary value.
///
/// The header is checked when the stream is opened; the object itself is read
/// by [`ObjectStream::read_object`]. Type names are resolved through the
/// optional [`TypeLoader`]; without one every well-formed object is accepted.
pub struct ObjectStream {
    reader: Box<dyn Read + Send>,
    loader: Option<Arc<dyn TypeLoader>>,
}

impl ObjectStream {
    /// Opens `binary` and validates the stream header.
    pub fn open(
        binary: &Binary,
        loader: Option<Arc<dyn TypeLoader>>,
    ) -> Result<Self, ObjectStreamError> {
        let mut reader = binary.open()?;
        let mut header = [0u8; OBJECT_STREAM_MAGIC.len()];
        reader.read_exact(&mut header).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => ObjectStreamError::BadHeader,
            _ => ObjectStreamError::Io(err),
        })?;
        if header != OBJECT_STREAM_MAGIC {
            return Err(ObjectStreamError::BadHeader);
        }
        Ok(Self { reader, loader })
    }

    /// Reads the next (and only) object from the stream.
    pub fn read_object(&mut self) -> Result<ObjectValue, ObjectStreamError> {
        let envelope: Envelope = serde_json::from_reader(&mut self.reader)?;
        if let Some(loader) = &self.loader {
            if !loader.resolves(&envelope.type_name) {
                return Err(ObjectStreamError::UnknownType(envelope.type_name));
            }
        }
        Ok(ObjectValue {
            type_name: envelope.type_name,
            payload: Some(envelope.data),
        })
    }
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}
