//! `${NAME}` / `$NAME` substitution in raw values.

use std::collections::{HashMap, HashSet};

use crate::source::Source;

/// Expands variable references against static lookup tables, then a source.
///
/// Tables are consulted in the order they were added. Resolved values are
/// themselves expanded; names that resolve nowhere become the empty string.
#[derive(Debug, Clone, Default)]
pub struct Expander {
    lookups: Vec<HashMap<String, String>>,
}

impl Expander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lookup table, checked before the source and after any table
    /// added earlier.
    pub fn lookup<I, K, V>(mut self, table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.lookups
            .push(table.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn expand(&self, input: &str, source: &dyn Source) -> String {
        let mut active = HashSet::new();
        self.expand_with(input, source, &mut active)
    }

    fn expand_with(
        &self,
        input: &str,
        source: &dyn Source,
        active: &mut HashSet<String>,
    ) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            match reference(after) {
                Reference::Name(name, consumed) => {
                    out.push_str(&self.resolve(name, source, active));
                    rest = &after[consumed..];
                }
                Reference::Malformed(consumed) => rest = &after[consumed..],
                Reference::None => {
                    out.push('$');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn resolve(&self, name: &str, source: &dyn Source, active: &mut HashSet<String>) -> String {
        // A name already being expanded higher up the chain is a cycle.
        if active.contains(name) {
            return String::new();
        }
        let value = self
            .lookups
            .iter()
            .find_map(|table| table.get(name).cloned())
            .or_else(|| source.lookup(name));
        let Some(value) = value else {
            return String::new();
        };
        active.insert(name.to_string());
        let expanded = self.expand_with(&value, source, active);
        active.remove(name);
        expanded
    }
}

enum Reference<'a> {
    /// A name and the number of bytes it occupied after the `$`.
    Name(&'a str, usize),
    /// Bad syntax; skip this many bytes after the `$`.
    Malformed(usize),
    /// `$` not followed by a name: keep it.
    None,
}

/// `$*`, `$1` and friends: always a one-character name.
fn is_shell_special(c: char) -> bool {
    matches!(c, '*' | '#' | '$' | '@' | '!' | '?' | '-') || c.is_ascii_digit()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn reference(after: &str) -> Reference<'_> {
    if let Some(inner) = after.strip_prefix('{') {
        return match inner.find('}') {
            Some(0) => Reference::Malformed(2),
            Some(end) => Reference::Name(&inner[..end], end + 2),
            None => Reference::Malformed(1),
        };
    }
    if after.starts_with(is_shell_special) {
        return Reference::Name(&after[..1], 1);
    }
    let end = after
        .char_indices()
        .find(|(_, c)| !is_name_char(*c))
        .map_or(after.len(), |(i, _)| i);
    if end == 0 {
        Reference::None
    } else {
        Reference::Name(&after[..end], end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MapSource;

    fn source() -> MapSource {
        MapSource::from([
            ("HOME", "/home/me"),
            ("USER", "me"),
            ("GREETING", "hello ${USER}"),
            ("LOOP_A", "a$LOOP_B"),
            ("LOOP_B", "b$LOOP_A"),
        ])
    }

    #[test]
    fn braces_and_bare_names() {
        let expander = Expander::new();
        assert_eq!(expander.expand("${HOME}/bin", &source()), "/home/me/bin");
        assert_eq!(expander.expand("$USER-x", &source()), "me-x");
    }

    #[test]
    fn values_expand_recursively() {
        let expander = Expander::new();
        assert_eq!(expander.expand("$GREETING!", &source()), "hello me!");
    }

    #[test]
    fn unresolved_names_become_empty() {
        let expander = Expander::new();
        assert_eq!(expander.expand("a${NOPE}b", &source()), "ab");
    }

    #[test]
    fn lone_dollar_is_kept_and_unclosed_brace_is_dropped() {
        let expander = Expander::new();
        assert_eq!(expander.expand("cost $ 5", &source()), "cost $ 5");
        assert_eq!(expander.expand("x${HOME", &source()), "xHOME");
        assert_eq!(expander.expand("end$", &source()), "end$");
    }

    #[test]
    fn shell_special_names_are_one_character() {
        let expander = Expander::new().lookup([("1", "first"), ("@", "all")]);
        assert_eq!(expander.expand("$1abc", &source()), "firstabc");
        assert_eq!(expander.expand("$@/$*", &source()), "all/");
        assert_eq!(expander.expand("${1}", &source()), "first");
        assert_eq!(expander.expand("a$$b", &source()), "ab");
    }

    #[test]
    fn lookup_tables_take_precedence_in_order() {
        let expander = Expander::new()
            .lookup([("USER", "first")])
            .lookup([("USER", "second"), ("EXTRA", "x")]);
        assert_eq!(expander.expand("$USER $EXTRA", &source()), "first x");
    }

    #[test]
    fn cycles_terminate() {
        let expander = Expander::new();
        assert_eq!(expander.expand("$LOOP_A", &source()), "ab");
    }

    #[test]
    fn expansion_is_idempotent_once_resolved() {
        let expander = Expander::new();
        let once = expander.expand("${HOME}:$GREETING", &source());
        assert_eq!(expander.expand(&once, &source()), once);
    }
}
