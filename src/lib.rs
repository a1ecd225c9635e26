//! Typed configuration records from environment variables and other
//! key/value sources. Define a struct, tag its fields, and load.
//!
//! ```
//! use cfgenv::{MapSource, Record};
//!
//! #[derive(Record, Default)]
//! struct Config {
//!     host: String,
//!     #[env("default=8080")]
//!     port: u16,
//!     #[env("optional")]
//!     tags: Vec<String>,
//! }
//!
//! let config: Config = cfgenv::Cfgenv::builder()
//!     .prefix("MYAPP")
//!     .source(MapSource::from([("MYAPP_HOST", "example.org"), ("MYAPP_TAGS", "a,b")]))
//!     .load()?;
//! assert_eq!(config.host, "example.org");
//! assert_eq!(config.port, 8080);
//! assert_eq!(config.tags, ["a", "b"]);
//! # Ok::<(), cfgenv::Error>(())
//! ```
//!
//! Every field has a lookup name (`MYAPP_HOST`), derived from the prefix,
//! the separator and the field identifier, and a binding chosen from its
//! type: scalars parse directly, `Vec<T>` splits on a delimiter, maps split
//! into `key:value` pairs, nested records recurse under a longer prefix.
//!
//! # Field directives
//!
//! `#[env("...")]` takes a comma-separated directive list:
//!
//! | Directive | Meaning |
//! |-----------|---------|
//! | `NAME` or `name=NAME` | Use `NAME` instead of the upper-snake-cased identifier |
//! | `optional` | Absence is not an error; the field keeps its value |
//! | `default=VALUE` | Used when the variable is absent, coerced like a real value |
//! | `prefix=P` | On a nested record: extend the prefix. On a `String` map: collect every variable starting with `P` |
//! | `match=REGEX` | On a `String` map: collect every variable whose name matches |
//! | `sep=S` / `delim=D` | Map pair separator (default `:`) and item delimiter (default `,`) |
//! | `encoding=E` | Decode the raw text first (`base64`, `base64url`, `rawBase64`, `rawBase64url`, or a registered [`Decoder`]) |
//! | `expand` / `no-expand` | Force `${NAME}` expansion on or off for this field |
//!
//! Values containing `,` or `=` can be quoted: `default='a,b'`.
//! `#[env(flatten)]` walks a nested record under the parent's prefix and
//! `#[env(skip)]` hides a field.
//!
//! # Optional values
//!
//! - `Option<T>` stays `None` when its variable is absent.
//! - [`Optional<T>`] also records *how* it got a value:
//!   [`Set`](Optional::Set) from the source, [`Defaulted`](Optional::Defaulted)
//!   from `default=`, or [`Absent`](Optional::Absent).
//! - Plain fields tagged `optional` keep whatever value they held.
//!
//! # Sources
//!
//! The process environment is the default [`Source`]. [`EnvFileSource`]
//! reads `.env` style files, [`MapSource`] holds static pairs (or the
//! flattening of any `serde::Serialize` value), `FlagSource` adapts clap
//! matches (with the `clap` feature, on by default) and [`MultiSource`]
//! layers several with first-match-wins lookup.
//!
//! # Writing
//!
//! [`Options::write`] renders a record's current values as `KEY=VALUE`
//! lines that load back into an equal record. [`Options::example`] writes a
//! placeholder for every variable a record reads, suitable for a `.env`
//! template.
//!
//! # Custom types
//!
//! A [`CustomSetter`] claims fields by type and binds them itself.
//! [`DurationSetter`] (`1h30m`) and [`DateTimeSetter`] (RFC 3339 or a chrono
//! format) are provided. Without a setter, `Duration` binds as integer
//! nanoseconds.
//!
//! # Errors
//!
//! Everything fallible returns [`Error`]. The first problem aborts the call;
//! messages name the variable or field involved.

extern crate self as cfgenv;

pub mod error;
pub mod types;

mod builder;
mod classify;
mod coerce;
mod custom;
mod decoder;
mod directive;
mod expand;
mod flatten;
mod naming;
mod optional;
mod resolve;
pub mod source;
mod write;

#[cfg(test)]
mod fixtures;

pub use builder::{Cfgenv, CfgenvBuilder, Options};
pub use cfgenv_derive::Record;
pub use coerce::{parse_bool, parse_signed, parse_unsigned};
pub use custom::{CustomSetter, DateTimeSetter, DurationError, DurationSetter, format_duration, parse_duration};
pub use decoder::{Base64Decoder, Decoder};
pub use error::{BoxError, Error, Result};
pub use expand::Expander;
pub use flatten::FlattenError;
pub use naming::{NamingStrategy, UpperSnake, add_prefixes, upper_snake};
pub use optional::Optional;
#[cfg(feature = "clap")]
pub use source::{FlagNameConverter, FlagSource, KebabCase};
pub use source::{EnvFileSource, EnvSource, MapSource, MultiSource, Source};
pub use types::{Field, FieldDescriptor, Layout, Record, ScalarKind, Shape};

/// Load a `T` from the process environment with default options.
pub fn load<T: Record + Default>() -> Result<T> {
    Cfgenv::builder().load()
}

/// Load a `T` from the process environment, with every name under `prefix`.
pub fn load_with_prefix<T: Record + Default>(prefix: &str) -> Result<T> {
    Cfgenv::builder().prefix(prefix).load()
}

/// Write an example `.env` for `T` with default options.
pub fn example<T: Record + Default>(out: impl std::io::Write) -> Result<()> {
    Cfgenv::builder().example::<T>(out)
}
