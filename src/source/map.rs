use std::collections::BTreeMap;

use serde::Serialize;

use super::Source;
use crate::error::Result;
use crate::flatten::flatten;

/// A fixed set of variables held in memory. Enumerates in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSource {
    vars: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Flatten any serializable value into variables: struct fields and map
    /// keys are upper-cased and nested levels joined with `separator`.
    ///
    /// ```
    /// # use cfgenv::{MapSource, Source};
    /// #[derive(serde::Serialize)]
    /// struct Db { host: String, port: u16 }
    /// #[derive(serde::Serialize)]
    /// struct App { db: Db }
    ///
    /// let source = MapSource::from_serialize(
    ///     &App { db: Db { host: "localhost".into(), port: 5432 } },
    ///     "_",
    /// )?;
    /// assert_eq!(source.lookup("DB_PORT").as_deref(), Some("5432"));
    /// # Ok::<(), cfgenv::Error>(())
    /// ```
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T, separator: &str) -> Result<Self> {
        Ok(flatten(value, separator)?.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Source for MapSource {
    fn lookup(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn environ(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for MapSource {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
