//! Clap adapter: parsed command-line arguments as a [`Source`].
//!
//! Compiled only with the `clap` Cargo feature (on by default). Arguments are
//! looked up by their clap id; multi-valued arguments are joined with `,` so
//! they bind to sequence fields unchanged.

use clap::ArgMatches;
use clap::parser::ValueSource;

use super::Source;

/// Maps variable names to argument ids and back.
pub trait FlagNameConverter {
    fn to_flag_name(&self, env_name: &str) -> String;
    fn to_env_name(&self, flag_name: &str) -> String;
}

/// `DB_HOST` <-> `db-host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KebabCase;

impl FlagNameConverter for KebabCase {
    fn to_flag_name(&self, env_name: &str) -> String {
        env_name.to_lowercase().replace('_', "-")
    }

    fn to_env_name(&self, flag_name: &str) -> String {
        flag_name.to_uppercase().replace('-', "_")
    }
}

pub struct FlagSource {
    matches: ArgMatches,
    converter: Option<Box<dyn FlagNameConverter>>,
    use_defaults: bool,
}

impl FlagSource {
    /// Arguments given on the command line (or via clap's own `env`) count as
    /// present; clap default values do not unless
    /// [`use_defaults`](Self::use_defaults) is set.
    pub fn new(matches: ArgMatches) -> Self {
        Self {
            matches,
            converter: None,
            use_defaults: false,
        }
    }

    pub fn converter(mut self, converter: impl FlagNameConverter + 'static) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    pub fn use_defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }

    fn value(&self, id: &str) -> Option<String> {
        // value_source panics on unknown ids in debug builds; probe first.
        let raw = self.matches.try_get_raw(id).ok().flatten()?;
        if !self.use_defaults
            && self.matches.value_source(id) == Some(ValueSource::DefaultValue)
        {
            return None;
        }
        let values: Vec<String> = raw.map(|v| v.to_string_lossy().into_owned()).collect();
        Some(values.join(","))
    }
}

impl Source for FlagSource {
    fn lookup(&self, key: &str) -> Option<String> {
        let id = match &self.converter {
            Some(converter) => converter.to_flag_name(key),
            None => key.to_string(),
        };
        log::trace!("flag lookup {key} -> --{id}");
        self.value(&id)
    }

    fn environ(&self) -> Vec<(String, String)> {
        self.matches
            .ids()
            .filter_map(|id| {
                let value = self.value(id.as_str())?;
                let key = match &self.converter {
                    Some(converter) => converter.to_env_name(id.as_str()),
                    None => id.as_str().to_string(),
                };
                Some((key, value))
            })
            .collect()
    }
}

impl std::fmt::Debug for FlagSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagSource")
            .field("use_defaults", &self.use_defaults)
            .field("converter", &self.converter.is_some())
            .finish_non_exhaustive()
    }
}
