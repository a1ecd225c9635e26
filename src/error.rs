use std::fmt;

use thiserror::Error;

/// Boxed error produced by decoders and custom setters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What a raw value failed to parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Bool,
    Int,
    Uint,
    Float,
}

impl Expected {
    pub fn label(self) -> &'static str {
        match self {
            Expected::Bool => "bool",
            Expected::Int => "int",
            Expected::Uint => "uint",
            Expected::Float => "float",
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Int | Expected::Uint => write!(f, "an {}", self.label()),
            Expected::Bool | Expected::Float => write!(f, "a {}", self.label()),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("multiple {0} options")]
    MultipleOptions(&'static str),

    #[error("invalid tag '{tag}' on field '{field}'")]
    InvalidTag { tag: String, field: String },

    #[error("cannot use env tag '{token}' without value on field '{field}' (use quotes if necessary)")]
    TagWithoutValue { token: String, field: String },

    #[error("cannot use env tag 'prefix' on field '{0}' (only for records or string-to-string maps)")]
    PrefixNotAllowed(String),

    #[error("cannot use env tag 'match' on field '{0}' (only for string-to-string maps)")]
    MatchNotAllowed(String),

    #[error("env tag 'match' on field '{field}' - invalid regex: {source}")]
    InvalidMatch { field: String, source: regex::Error },

    #[error("unknown encoding '{encoding}' on field '{field}'")]
    UnknownEncoding { encoding: String, field: String },

    #[error("field '{field}' has unsupported type - {type_name}")]
    UnsupportedType { field: String, type_name: String },

    #[error("field '{field}' has unsupported {part} type")]
    UnsupportedPart { field: String, part: &'static str },

    #[error("missing env var '{0}'")]
    Missing(String),

    #[error("env var '{name}' is not {expected}")]
    NotA { name: String, expected: Expected },

    #[error("env var '{name}' contains invalid key/value pair - {pair}")]
    InvalidPair { name: String, pair: String },

    #[error("unable to decode env var '{name}' (encoding: '{encoding}'): {source}")]
    Decode {
        name: String,
        encoding: String,
        source: BoxError,
    },

    #[error("env var '{0}' cannot be bound to this field type")]
    NotCoercible(String),

    #[error(transparent)]
    Custom(BoxError),

    #[error(transparent)]
    Flatten(#[from] crate::flatten::FlattenError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_a(name: &str, expected: Expected) -> Self {
        Error::NotA {
            name: name.to_string(),
            expected,
        }
    }
}
