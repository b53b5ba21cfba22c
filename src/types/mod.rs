//! Error taxonomy and well-known property names shared by every layer.

use std::io;

use thiserror::Error;

/// Property holding a node's primary type name.
pub const JCR_PRIMARY_TYPE: &str = "jcr:primaryType";
/// Property holding a node's mixin type names.
pub const JCR_MIXIN_TYPES: &str = "jcr:mixinTypes";
/// Logical resource type, falling back to the primary type when unset.
pub const SLING_RESOURCE_TYPE: &str = "sling:resourceType";
/// Primary type given to nodes created without an explicit one.
pub const NT_UNSTRUCTURED: &str = "nt:unstructured";

/// Failure reported by the repository collaborator.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The addressed item does not exist.
    #[error("item not found: {0}")]
    NotFound(String),
    /// The session may not read or write the item.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// A stored value does not have the expected shape.
    #[error("value format: {0}")]
    ValueFormat(String),
    /// A write violated a node type or protection constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    /// Reading binary content failed.
    #[error("repository I/O: {0}")]
    Io(#[from] io::Error),
    /// Any other repository failure.
    #[error("{0}")]
    Other(String),
}

/// Result type returned by repository collaborators.
pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// A scalar could not be coerced to the requested type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Text did not parse as the target type.
    #[error("cannot parse {input:?} as {target}")]
    Parse {
        /// The rejected input.
        input: String,
        /// Name of the requested type.
        target: &'static str,
    },
    /// A timestamp fell outside the representable range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
    /// A timestamp could not be rendered.
    #[error("cannot format timestamp: {0}")]
    Format(String),
}

impl ConversionError {
    pub(crate) fn parse(input: impl Into<String>, target: &'static str) -> Self {
        ConversionError::Parse {
            input: input.into(),
            target,
        }
    }
}

/// Errors surfaced by the property maps.
#[derive(Debug, Error)]
pub enum MapError {
    /// Bad key, unstorable value, or a write the node rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The repository failed where no recovery is possible.
    #[error("{context}: {source}")]
    State {
        /// What the map was doing.
        context: String,
        /// The underlying repository failure.
        #[source]
        source: RepositoryError,
    },
    /// Mutation through a map that does not allow it.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// A single-property lookup failed inside the repository.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result type returned by the property maps.
pub type Result<T> = std::result::Result<T, MapError>;

impl MapError {
    pub(crate) fn state(context: impl Into<String>, source: RepositoryError) -> Self {
        MapError::State {
            context: context.into(),
            source,
        }
    }
}
