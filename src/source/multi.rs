use std::collections::HashSet;

use super::Source;

/// Layers several sources: the first one defining a key wins.
///
/// Only the first process-environment source is kept, so layering
/// `EnvSource` twice does not double every enumeration.
#[derive(Default)]
pub struct MultiSource {
    sources: Vec<Box<dyn Source>>,
}

impl MultiSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source with lower precedence than those already added.
    pub fn with(mut self, source: impl Source + 'static) -> Self {
        self.push(Box::new(source));
        self
    }

    pub fn push(&mut self, source: Box<dyn Source>) {
        if source.is_process_env() && self.sources.iter().any(|s| s.is_process_env()) {
            log::debug!("ignoring repeated process environment source");
            return;
        }
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Source for MultiSource {
    fn lookup(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.lookup(key))
    }

    fn environ(&self) -> Vec<(String, String)> {
        let mut seen = HashSet::new();
        self.sources
            .iter()
            .flat_map(|source| source.environ())
            .filter(|(key, _)| seen.insert(key.clone()))
            .collect()
    }

    fn is_process_env(&self) -> bool {
        self.sources.iter().any(|s| s.is_process_env())
    }
}

impl FromIterator<Box<dyn Source>> for MultiSource {
    fn from_iter<I: IntoIterator<Item = Box<dyn Source>>>(iter: I) -> Self {
        let mut multi = Self::new();
        for source in iter {
            multi.push(source);
        }
        multi
    }
}

impl std::fmt::Debug for MultiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiSource")
            .field("sources", &self.sources.len())
            .finish()
    }
}
