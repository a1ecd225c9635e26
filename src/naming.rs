use std::sync::LazyLock;

use regex::Regex;

use crate::types::FieldDescriptor;

/// Derives the lookup name for a field.
///
/// `override_name` is the directive's `name=` value, if any. Implemented for
/// closures with the same signature.
pub trait NamingStrategy: Send + Sync {
    fn build_name(
        &self,
        prefix: &str,
        separator: &str,
        field: &FieldDescriptor,
        override_name: Option<&str>,
    ) -> String;
}

impl<F> NamingStrategy for F
where
    F: Fn(&str, &str, &FieldDescriptor, Option<&str>) -> String + Send + Sync,
{
    fn build_name(
        &self,
        prefix: &str,
        separator: &str,
        field: &FieldDescriptor,
        override_name: Option<&str>,
    ) -> String {
        self(prefix, separator, field, override_name)
    }
}

/// `db_host` under prefix `APP` becomes `APP_DB_HOST`. Camel-case identifiers
/// (`dbHost`, `HTTPServer`) are split at case boundaries first.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpperSnake;

impl NamingStrategy for UpperSnake {
    fn build_name(
        &self,
        prefix: &str,
        separator: &str,
        field: &FieldDescriptor,
        override_name: Option<&str>,
    ) -> String {
        let name = match override_name {
            Some(name) => name.to_string(),
            None => upper_snake(field.name),
        };
        if prefix.is_empty() {
            name
        } else {
            format!("{prefix}{separator}{name}")
        }
    }
}

static FIRST_CAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(.)([A-Z][a-z]+)").expect("static regex"));
static ALL_CAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([a-z0-9])([A-Z])").expect("static regex"));

pub fn upper_snake(ident: &str) -> String {
    let snake = FIRST_CAP.replace_all(ident, "${1}_${2}");
    let snake = ALL_CAP.replace_all(&snake, "${1}_${2}");
    snake.to_uppercase()
}

/// Join a current prefix and a directive prefix, inserting the separator only
/// when both are non-empty.
pub fn add_prefixes(current: &str, added: &str, separator: &str) -> String {
    match (current.is_empty(), added.is_empty()) {
        (true, _) => added.to_string(),
        (false, true) => current.to_string(),
        (false, false) => format!("{current}{separator}{added}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(name: &'static str) -> FieldDescriptor {
        FieldDescriptor::of::<String>(name, None, false)
    }

    #[test]
    fn snake_identifiers_are_uppercased() {
        assert_eq!(upper_snake("db_host"), "DB_HOST");
        assert_eq!(upper_snake("test"), "TEST");
    }

    #[test]
    fn camel_identifiers_are_split() {
        assert_eq!(upper_snake("dbHost"), "DB_HOST");
        assert_eq!(upper_snake("HTTPServer"), "HTTP_SERVER");
        assert_eq!(upper_snake("Field1Name"), "FIELD1_NAME");
    }

    #[test]
    fn prefix_and_separator_are_prepended() {
        let naming = UpperSnake;
        assert_eq!(naming.build_name("", "_", &desc("port"), None), "PORT");
        assert_eq!(naming.build_name("APP", "_", &desc("port"), None), "APP_PORT");
        assert_eq!(
            naming.build_name("APP", "__", &desc("port"), Some("HTTP_PORT")),
            "APP__HTTP_PORT"
        );
    }

    #[test]
    fn closures_are_strategies() {
        let naming = |_: &str, _: &str, field: &FieldDescriptor, _: Option<&str>| {
            field.name.to_string()
        };
        assert_eq!(naming.build_name("APP", "_", &desc("port"), None), "port");
    }

    #[test]
    fn prefixes_join_with_separator_only_between_non_empty_parts() {
        assert_eq!(add_prefixes("", "SUB", "_"), "SUB");
        assert_eq!(add_prefixes("APP", "", "_"), "APP");
        assert_eq!(add_prefixes("APP", "SUB", "_"), "APP_SUB");
        assert_eq!(add_prefixes("", "", "_"), "");
    }
}
