use std::io;

/// Errors produced while building, checking or (de)serializing datasets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying file or stream failure.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Malformed JSON text.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Malformed INI text.
    #[error(transparent)]
    Ini(#[from] ini::ParseError),

    /// Failure reported by the HDF5 library.
    #[cfg(feature = "h5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),

    /// Nothing is stored at the requested path.
    ///
    /// Item deserialization treats this as "use the default value".
    #[error("no value stored at '{path}'")]
    MissingKey {
        /// `/`-joined path of the missing key.
        path: String,
    },

    /// A value is stored, but not of the kind the caller asked for.
    #[error("expected {expected} at '{path}', found {found}")]
    TypeMismatch {
        /// `/`-joined path of the offending value.
        path: String,
        /// Kind requested by the reader.
        expected: &'static str,
        /// Kind actually stored.
        found: String,
    },

    /// A path component exists but is a scalar rather than a group.
    #[error("'{path}' is not a group")]
    NotAGroup {
        /// `/`-joined path of the offending component.
        path: String,
    },

    /// Attribute name that the dataset schema does not declare.
    #[error("unknown attribute {name}")]
    UnknownItem {
        /// Name that was looked up.
        name: String,
    },

    /// Property lookup without default on a property that was never set.
    #[error("property '{name}' is not set in realm '{realm}'")]
    UnknownProp {
        /// Realm that was searched.
        realm: &'static str,
        /// Property name.
        name: String,
    },

    /// A value was rejected in strict validation mode.
    #[error("invalid value for item '{item}': {message}")]
    Validation {
        /// Item name.
        item: String,
        /// Description of the rejected value.
        message: String,
    },

    /// A configuration value could not be formatted or parsed as a Python literal.
    #[error("python literal: {0}")]
    Literal(String),

    /// A dtype name or type string that cannot be interpreted.
    #[error("invalid dtype: {0}")]
    InvalidDType(String),

    /// Array data inconsistent with its declared shape or dtype.
    #[error("invalid array: {0}")]
    InvalidArray(String),

    /// Anything else the backends refuse to store.
    #[error("{0}")]
    Unsupported(String),
}

/// Shorthand used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// `true` for the "nothing stored here" condition that item deserialization
    /// recovers from by falling back to the item default.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, Error::MissingKey { .. })
    }

    pub(crate) fn missing(path: impl Into<String>) -> Self {
        Error::MissingKey { path: path.into() }
    }

    pub(crate) fn mismatch(path: impl Into<String>, expected: &'static str, found: &crate::Value) -> Self {
        Error::TypeMismatch { path: path.into(), expected, found: found.kind_name().to_string() }
    }
}
