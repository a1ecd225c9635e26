//! The `#[env("...")]` directive mini-language.
//!
//! A directive is a comma-separated token list. Tokens are `key=value` pairs
//! (`name`, `default`, `prefix`, `match`, `separator`/`sep`,
//! `delimiter`/`delim`, `encoding`) or bare flags (`optional`, `expand`,
//! `no-expand`); any other bare token is shorthand for `name=`. Values may be
//! wrapped in single or double quotes to carry `,` or `=`:
//!
//! ```text
//! #[env("DB_URL,default='postgres://localhost/app?sslmode=disable'")]
//! #[env("prefix=DB")]
//! #[env("match='^FEATURE_[A-Z]+$'")]
//! #[env("sep=|,delim=;,optional")]
//! #[env("encoding=base64,no-expand")]
//! ```

use std::sync::Arc;

use regex::Regex;

use crate::classify::{Binding, Classification};
use crate::custom::CustomSetter;
use crate::decoder::{Decoder, DecoderRegistry};
use crate::error::Error;
use crate::types::{FieldDescriptor, Layout, ScalarKind, Shape};

const VALUE_TOKENS: &[&str] = &[
    "name",
    "default",
    "prefix",
    "match",
    "separator",
    "sep",
    "delimiter",
    "delim",
    "encoding",
];

/// Everything the populator and serializer need to know about one field.
#[derive(Clone)]
pub struct FieldDirective {
    pub name: Option<String>,
    pub optional: bool,
    pub pointer: bool,
    pub default: Option<String>,
    pub prefix: Option<String>,
    pub binding: Binding,
    pub regex: Option<Regex>,
    pub separator: String,
    pub delimiter: String,
    pub decoder: Option<Arc<dyn Decoder>>,
    pub expand: bool,
    pub no_expand: bool,
    pub custom: Option<Arc<dyn CustomSetter>>,
}

impl FieldDirective {
    pub fn layout<'a>(&'a self, name: &'a str) -> Layout<'a> {
        Layout {
            name,
            delimiter: &self.delimiter,
            separator: &self.separator,
        }
    }
}

impl std::fmt::Debug for FieldDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDirective")
            .field("name", &self.name)
            .field("optional", &self.optional)
            .field("pointer", &self.pointer)
            .field("default", &self.default)
            .field("prefix", &self.prefix)
            .field("binding", &self.binding)
            .field("regex", &self.regex.as_ref().map(Regex::as_str))
            .field("separator", &self.separator)
            .field("delimiter", &self.delimiter)
            .field("decoder", &self.decoder.as_ref().map(|d| d.encoding().to_string()))
            .field("expand", &self.expand)
            .field("no_expand", &self.no_expand)
            .finish_non_exhaustive()
    }
}

/// Split on `delim` outside single/double quotes. `None` on an unbalanced
/// quote. Parts are trimmed of spaces; quotes are kept.
fn split_quoted(s: &str, delim: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == delim => {
                parts.push(s[start..i].trim_matches(' '));
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    if quote.is_some() {
        return None;
    }
    parts.push(s[start..].trim_matches(' '));
    Some(parts)
}

/// Strip one pair of matching outer quotes.
pub fn unquoted(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2
            && let Some(inner) = s.strip_prefix(q).and_then(|v| v.strip_suffix(q))
        {
            return inner;
        }
    }
    s
}

/// Parse a field's directive on top of its classification.
pub fn parse(
    field: &FieldDescriptor,
    class: &Classification,
    decoders: &DecoderRegistry,
) -> Result<FieldDirective, Error> {
    let mut directive = FieldDirective {
        name: None,
        optional: class.optional,
        pointer: class.pointer,
        default: None,
        prefix: None,
        binding: class.binding,
        regex: None,
        separator: ":".into(),
        delimiter: ",".into(),
        decoder: None,
        expand: false,
        no_expand: false,
        custom: class.custom.clone(),
    };
    let Some(tag) = field.tag else {
        return Ok(directive);
    };
    let field_name = || field.name.to_string();
    let tokens = split_quoted(tag, ',').ok_or_else(|| Error::InvalidTag {
        tag: tag.to_string(),
        field: field_name(),
    })?;
    // Prefix and match only apply to string maps that are bound directly.
    let string_map = class.binding == Binding::Leaf && class.inner.is_string_map();
    let is_record = class.binding == Binding::Record;

    for token in tokens.into_iter().filter(|t| !t.is_empty()) {
        let invalid = || Error::InvalidTag {
            tag: token.to_string(),
            field: field_name(),
        };
        let parts = split_quoted(token, '=').ok_or_else(invalid)?;
        match parts.as_slice() {
            [key, value] => {
                let value = unquoted(value);
                match *key {
                    "name" => directive.name = Some(value.to_string()),
                    "default" => directive.default = Some(value.to_string()),
                    "prefix" => {
                        if !string_map && !is_record {
                            return Err(Error::PrefixNotAllowed(field_name()));
                        }
                        directive.prefix = Some(value.to_string());
                        if string_map && directive.binding != Binding::MatchedMap {
                            directive.binding = Binding::PrefixedMap;
                        }
                    }
                    "match" => {
                        if !string_map {
                            return Err(Error::MatchNotAllowed(field_name()));
                        }
                        let regex = Regex::new(value).map_err(|source| Error::InvalidMatch {
                            field: field_name(),
                            source,
                        })?;
                        directive.regex = Some(regex);
                        directive.binding = Binding::MatchedMap;
                    }
                    "separator" | "sep" => directive.separator = value.to_string(),
                    "delimiter" | "delim" => directive.delimiter = value.to_string(),
                    "encoding" => {
                        let decoder = decoders.get(value).ok_or_else(|| Error::UnknownEncoding {
                            encoding: value.to_string(),
                            field: field_name(),
                        })?;
                        directive.decoder = Some(decoder);
                    }
                    _ => return Err(invalid()),
                }
            }
            [flag] => match *flag {
                "optional" => directive.optional = true,
                "expand" => {
                    directive.expand = true;
                    directive.no_expand = false;
                }
                "no-expand" => {
                    directive.no_expand = true;
                    directive.expand = false;
                }
                flag if VALUE_TOKENS.contains(&flag) && flag != "name" => {
                    return Err(Error::TagWithoutValue {
                        token: flag.to_string(),
                        field: field_name(),
                    });
                }
                name => directive.name = Some(unquoted(name).to_string()),
            },
            _ => return Err(invalid()),
        }
    }
    Ok(directive)
}

/// Placeholder text for example output, by shape.
pub fn placeholder(shape: &Shape, directive: &FieldDirective) -> String {
    if let Some(default) = &directive.default {
        return default.clone();
    }
    let (d, s) = (&directive.delimiter, &directive.separator);
    match shape {
        Shape::Pointer(inner) | Shape::Optional(inner) => placeholder(inner, directive),
        Shape::Scalar(kind) if kind.is_float() => "0.0".into(),
        Shape::Scalar(kind) if kind.is_integer() => "0".into(),
        Shape::Scalar(ScalarKind::Bool) => "true|false".into(),
        Shape::Scalar(_) | Shape::Bytes => "<string>".into(),
        Shape::Seq(_) => format!("value{d}value{d}..."),
        Shape::Map(..) => format!("key{s}value{d}key{s}value{d}..."),
        Shape::Record | Shape::Custom => "<value>".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Optional;
    use crate::classify::classify;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Nested;

    impl crate::Field for Nested {
        fn shape() -> Shape {
            Shape::Record
        }
    }

    fn parse_for<T: crate::Field>(tag: &'static str) -> Result<FieldDirective, Error> {
        let field = FieldDescriptor::of::<T>("test", Some(tag), false);
        let class = classify(&field, &[])?;
        parse(&field, &class, &DecoderRegistry::default())
    }

    #[test]
    fn no_tag_gives_defaults() {
        let field = FieldDescriptor::of::<Option<String>>("test", None, false);
        let class = classify(&field, &[]).unwrap();
        let d = parse(&field, &class, &DecoderRegistry::default()).unwrap();
        assert_eq!(d.name, None);
        assert!(d.optional && d.pointer);
        assert_eq!(d.separator, ":");
        assert_eq!(d.delimiter, ",");
        assert_eq!(d.binding, Binding::Leaf);
    }

    #[test]
    fn value_tokens() {
        let d = parse_for::<String>("name=FOO, default='a,b', sep=|, delim=;, encoding=base64")
            .unwrap();
        assert_eq!(d.name.as_deref(), Some("FOO"));
        assert_eq!(d.default.as_deref(), Some("a,b"));
        assert_eq!(d.separator, "|");
        assert_eq!(d.delimiter, ";");
        assert_eq!(d.decoder.unwrap().encoding(), "base64");
    }

    #[test]
    fn bare_token_is_name_and_flags_toggle() {
        let d = parse_for::<String>("FOO,optional,expand").unwrap();
        assert_eq!(d.name.as_deref(), Some("FOO"));
        assert!(d.optional);
        assert!(d.expand && !d.no_expand);

        let d = parse_for::<String>("expand,no-expand").unwrap();
        assert!(!d.expand && d.no_expand);
    }

    #[test]
    fn quoted_values_keep_equals_and_commas() {
        let d = parse_for::<String>("default=\"x=1,y=2\"").unwrap();
        assert_eq!(d.default.as_deref(), Some("x=1,y=2"));
        let d = parse_for::<String>(" , default=\"\" ,, ").unwrap();
        assert_eq!(d.default.as_deref(), Some(""));
    }

    #[test]
    fn unbalanced_quote_names_whole_tag() {
        let err = parse_for::<String>("default='oops").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid tag 'default='oops' on field 'test'"
        );
    }

    #[test]
    fn unknown_key_and_extra_equals_are_invalid() {
        let err = parse_for::<String>("colour=red").unwrap_err();
        assert_eq!(err.to_string(), "invalid tag 'colour=red' on field 'test'");
        let err = parse_for::<String>("default=a=b").unwrap_err();
        assert_eq!(err.to_string(), "invalid tag 'default=a=b' on field 'test'");
    }

    #[test]
    fn value_token_without_value() {
        let err = parse_for::<String>("default").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot use env tag 'default' without value on field 'test' (use quotes if necessary)"
        );
        assert!(matches!(
            parse_for::<String>("encoding").unwrap_err(),
            Error::TagWithoutValue { .. }
        ));
    }

    #[test]
    fn prefix_only_on_records_and_string_maps() {
        let d = parse_for::<HashMap<String, String>>("prefix=DB").unwrap();
        assert_eq!(d.binding, Binding::PrefixedMap);
        assert_eq!(d.prefix.as_deref(), Some("DB"));

        let d = parse_for::<Option<Nested>>("prefix=SUB").unwrap();
        assert_eq!(d.binding, Binding::Record);

        let err = parse_for::<String>("prefix=X").unwrap_err();
        assert!(matches!(err, Error::PrefixNotAllowed(_)));
        let err = parse_for::<HashMap<String, i32>>("prefix=X").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot use env tag 'prefix' on field 'test' (only for records or string-to-string maps)"
        );
    }

    #[test]
    fn match_only_on_string_maps() {
        let d = parse_for::<HashMap<String, String>>("match='[0-9]{3}'").unwrap();
        assert_eq!(d.binding, Binding::MatchedMap);
        assert!(d.regex.unwrap().is_match("FOO123"));

        let d = parse_for::<HashMap<String, String>>("match=^A,prefix=APP").unwrap();
        assert_eq!(d.binding, Binding::MatchedMap);
        let d = parse_for::<HashMap<String, String>>("prefix=APP,match=^A").unwrap();
        assert_eq!(d.binding, Binding::MatchedMap);

        assert!(matches!(
            parse_for::<Nested>("match=x").unwrap_err(),
            Error::MatchNotAllowed(_)
        ));
        assert!(matches!(
            parse_for::<HashMap<String, String>>("match='('").unwrap_err(),
            Error::InvalidMatch { .. }
        ));
    }

    #[test]
    fn unknown_encoding() {
        let err = parse_for::<String>("encoding=rot13").unwrap_err();
        assert_eq!(err.to_string(), "unknown encoding 'rot13' on field 'test'");
    }

    #[test]
    fn placeholders_by_shape() {
        let d = parse_for::<String>("sep=|,delim=;").unwrap();
        assert_eq!(placeholder(&<bool as crate::Field>::shape(), &d), "true|false");
        assert_eq!(placeholder(&<u8 as crate::Field>::shape(), &d), "0");
        assert_eq!(placeholder(&<f64 as crate::Field>::shape(), &d), "0.0");
        assert_eq!(placeholder(&<Vec<u8> as crate::Field>::shape(), &d), "<string>");
        assert_eq!(
            placeholder(&<Optional<String> as crate::Field>::shape(), &d),
            "<string>"
        );
        assert_eq!(
            placeholder(&<Vec<i32> as crate::Field>::shape(), &d),
            "value;value;..."
        );
        assert_eq!(
            placeholder(&<HashMap<String, i32> as crate::Field>::shape(), &d),
            "key|value;key|value;..."
        );

        let d = parse_for::<u8>("default=7").unwrap();
        assert_eq!(placeholder(&<u8 as crate::Field>::shape(), &d), "7");
    }
}
