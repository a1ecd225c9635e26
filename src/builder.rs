use std::io;
use std::sync::Arc;

use crate::custom::CustomSetter;
use crate::decoder::{Decoder, DecoderRegistry};
use crate::error::{Error, Result};
use crate::expand::Expander;
use crate::naming::{NamingStrategy, UpperSnake};
use crate::resolve::Populator;
use crate::source::{EnvSource, Source};
use crate::types::Record;
use crate::write::{Mode, Writer};

/// Entry point for configuring a load or write.
pub struct Cfgenv;

impl Cfgenv {
    pub fn builder() -> CfgenvBuilder {
        CfgenvBuilder::new()
    }
}

/// Collects options for loading and writing records.
///
/// Prefix, separator, naming strategy, expander and source may each be given
/// at most once; a repeat is reported by [`build()`](Self::build) (and by
/// every terminal method) as [`Error::MultipleOptions`]. Custom setters and
/// decoders accumulate.
///
/// ```
/// use cfgenv::{Cfgenv, MapSource, Record};
///
/// #[derive(Record, Default)]
/// struct Server {
///     host: String,
///     #[env("default=8080")]
///     port: u16,
/// }
///
/// let server: Server = Cfgenv::builder()
///     .prefix("APP")
///     .source(MapSource::from([("APP_HOST", "example.org")]))
///     .load()?;
/// assert_eq!(server.host, "example.org");
/// assert_eq!(server.port, 8080);
/// # Ok::<(), cfgenv::Error>(())
/// ```
pub struct CfgenvBuilder {
    prefix: Option<String>,
    separator: Option<String>,
    naming: Option<Box<dyn NamingStrategy>>,
    expander: Option<Expander>,
    source: Option<Box<dyn Source>>,
    customs: Vec<Arc<dyn CustomSetter>>,
    decoders: Vec<Arc<dyn Decoder>>,
    duplicate: Option<&'static str>,
}

impl CfgenvBuilder {
    fn new() -> Self {
        Self {
            prefix: None,
            separator: None,
            naming: None,
            expander: None,
            source: None,
            customs: Vec::new(),
            decoders: Vec::new(),
            duplicate: None,
        }
    }

    /// Store a singleton option, remembering the first kind given twice.
    fn once<T>(slot: &mut Option<T>, value: T, kind: &'static str, duplicate: &mut Option<&'static str>) {
        if slot.is_some() {
            duplicate.get_or_insert(kind);
        }
        *slot = Some(value);
    }

    /// Prefix for every variable name (default: none).
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        Self::once(&mut self.prefix, prefix.into(), "prefix", &mut self.duplicate);
        self
    }

    /// Joins prefixes and names (default: `_`).
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        Self::once(&mut self.separator, separator.into(), "separator", &mut self.duplicate);
        self
    }

    /// Replace the default [`UpperSnake`] naming.
    pub fn naming(mut self, naming: impl NamingStrategy + 'static) -> Self {
        let naming: Box<dyn NamingStrategy> = Box::new(naming);
        Self::once(&mut self.naming, naming, "naming", &mut self.duplicate);
        self
    }

    /// Expand `${NAME}` references in every value not marked `no-expand`.
    pub fn expand(mut self, expander: Expander) -> Self {
        Self::once(&mut self.expander, expander, "expander", &mut self.duplicate);
        self
    }

    /// Read values from `source` instead of the process environment.
    pub fn source(mut self, source: impl Source + 'static) -> Self {
        let source: Box<dyn Source> = Box::new(source);
        Self::once(&mut self.source, source, "source", &mut self.duplicate);
        self
    }

    /// Register a custom setter. Setters are consulted in registration order.
    pub fn custom_setter(mut self, setter: impl CustomSetter + 'static) -> Self {
        self.customs.push(Arc::new(setter));
        self
    }

    /// Register a decoder for `encoding=` directives. A decoder reusing a
    /// built-in encoding name replaces it.
    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoders.push(Arc::new(decoder));
        self
    }

    /// Validate the collected options.
    pub fn build(self) -> Result<Options> {
        if let Some(kind) = self.duplicate {
            return Err(Error::MultipleOptions(kind));
        }
        let options = Options {
            source: self.source.unwrap_or_else(|| Box::new(EnvSource)),
            prefix: self.prefix.unwrap_or_default(),
            separator: self.separator.unwrap_or_else(|| "_".to_string()),
            naming: self.naming.unwrap_or_else(|| Box::new(UpperSnake)),
            expander: self.expander,
            decoders: DecoderRegistry::new(&self.decoders),
            customs: self.customs,
        };
        log::debug!(
            "cfgenv options: prefix={:?} separator={:?} expand={} custom_setters={} decoders={}",
            options.prefix,
            options.separator,
            options.expander.is_some(),
            options.customs.len(),
            self.decoders.len()
        );
        Ok(options)
    }

    /// Build the options and load a fresh `T`.
    pub fn load<T: Record + Default>(self) -> Result<T> {
        self.build()?.load()
    }

    /// Build the options and populate an existing record.
    pub fn load_into<R: Record>(self, record: &mut R) -> Result<()> {
        self.build()?.load_into(record)
    }

    /// Build the options and write the record's current values.
    pub fn write<R: Record>(self, record: &R, out: impl io::Write) -> Result<()> {
        self.build()?.write(record, out)
    }

    /// Build the options and write an example for `T`.
    pub fn example<T: Record + Default>(self, out: impl io::Write) -> Result<()> {
        self.build()?.example::<T>(out)
    }

    /// Build the options and write an example shaped by `record`.
    pub fn example_of<R: Record>(self, record: &R, out: impl io::Write) -> Result<()> {
        self.build()?.example_of(record, out)
    }
}

/// A validated option set. Reusable across calls.
pub struct Options {
    pub(crate) source: Box<dyn Source>,
    pub(crate) prefix: String,
    pub(crate) separator: String,
    pub(crate) naming: Box<dyn NamingStrategy>,
    pub(crate) expander: Option<Expander>,
    pub(crate) decoders: DecoderRegistry,
    pub(crate) customs: Vec<Arc<dyn CustomSetter>>,
}

impl Options {
    pub fn load<T: Record + Default>(&self) -> Result<T> {
        let mut record = T::default();
        self.load_into(&mut record)?;
        Ok(record)
    }

    pub fn load_into<R: Record>(&self, record: &mut R) -> Result<()> {
        Populator::new(self).populate(record, &self.prefix)
    }

    /// Write `KEY=VALUE` lines for the record's current values.
    pub fn write<R: Record>(&self, record: &R, out: impl io::Write) -> Result<()> {
        Writer::new(self, out, Mode::Actual).finish(record, &self.prefix)
    }

    /// Write `KEY=<placeholder>` lines for a default `T`.
    pub fn example<T: Record + Default>(&self, out: impl io::Write) -> Result<()> {
        self.example_of(&T::default(), out)
    }

    /// Write placeholders for every field of `record`; values are ignored.
    pub fn example_of<R: Record>(&self, record: &R, out: impl io::Write) -> Result<()> {
        Writer::new(self, out, Mode::Example).finish(record, &self.prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("prefix", &self.prefix)
            .field("separator", &self.separator)
            .field("expander", &self.expander)
            .field("custom_setters", &self.customs.len())
            .finish_non_exhaustive()
    }
}
