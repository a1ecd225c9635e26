//! The record populator: walks a record's fields and binds each one from the
//! configured source.
//!
//! Every field goes through the same pipeline:
//!
//! 1. Classify the field's shape and parse its directive.
//! 2. Build the lookup name from the current prefix and the naming strategy.
//! 3. Look the name up (or enumerate the source, for `prefix=` and `match=`
//!    maps), fall back to the directive default, expand, decode.
//! 4. Coerce the text into the field.
//!
//! Nested records recurse with an extended prefix; `#[env(flatten)]` records
//! are walked in place. The first error aborts the walk.

use crate::builder::Options;
use crate::classify::{Binding, classify};
use crate::directive::{self, FieldDirective};
use crate::error::{Error, Result};
use crate::expand::Expander;
use crate::naming::add_prefixes;
use crate::source::Source;
use crate::types::{Field, FieldDescriptor, Record, Shape};

pub(crate) struct Populator<'a> {
    options: &'a Options,
}

impl<'a> Populator<'a> {
    pub(crate) fn new(options: &'a Options) -> Self {
        Self { options }
    }

    fn source(&self) -> &dyn Source {
        &*self.options.source
    }

    pub(crate) fn populate(&self, record: &mut dyn Record, prefix: &str) -> Result<()> {
        for (index, desc) in record.descriptors().into_iter().enumerate() {
            let Some(field) = record.field_mut(index) else {
                continue;
            };
            if desc.embedded {
                let inner = field.as_record_mut().ok_or_else(|| not_a_record(&desc))?;
                self.populate(inner, prefix)?;
                continue;
            }
            self.populate_field(&desc, field, prefix)?;
        }
        Ok(())
    }

    fn populate_field(
        &self,
        desc: &FieldDescriptor,
        field: &mut dyn Field,
        prefix: &str,
    ) -> Result<()> {
        let class = classify(desc, &self.options.customs)?;
        let directive = directive::parse(desc, &class, &self.options.decoders)?;
        let separator = self.options.separator.as_str();
        let name = self
            .options
            .naming
            .build_name(prefix, separator, desc, directive.name.as_deref());
        log::debug!("binding field '{}' as {:?} from '{name}'", desc.name, directive.binding);

        match directive.binding {
            Binding::Custom => self.bind_custom(desc, &directive, &name, field),
            Binding::OptionalWrapper => self.bind_optional(&directive, &name, field),
            Binding::MatchedMap => self.bind_matched_map(&directive, &name, field, prefix),
            Binding::PrefixedMap => self.bind_prefixed_map(&directive, &name, field, prefix),
            Binding::Record => {
                let nested = add_prefixes(prefix, directive.prefix.as_deref().unwrap_or(""), separator);
                let record = field.as_record_mut().ok_or_else(|| not_a_record(desc))?;
                self.populate(record, &nested)
            }
            Binding::Leaf => self.bind_leaf(desc, &directive, &name, field),
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        log::trace!("lookup '{name}'");
        self.source().lookup(name)
    }

    fn bind_custom(
        &self,
        desc: &FieldDescriptor,
        directive: &FieldDirective,
        name: &str,
        field: &mut dyn Field,
    ) -> Result<()> {
        let Some(setter) = &directive.custom else {
            return Ok(());
        };
        let (raw, present) = match self.lookup(name) {
            Some(raw) => (self.decode(directive, name, self.expand(directive, raw))?, true),
            None => match &directive.default {
                Some(default) => (default.clone(), false),
                None if directive.optional => return Ok(()),
                None => return Err(Error::Missing(name.to_string())),
            },
        };
        setter
            .set(desc, field.as_any_mut(), &raw, present)
            .map_err(Error::Custom)
    }

    fn bind_optional(
        &self,
        directive: &FieldDirective,
        name: &str,
        field: &mut dyn Field,
    ) -> Result<()> {
        let layout = directive.layout(name);
        if let Some(raw) = self.lookup(name) {
            let raw = self.decode(directive, name, self.expand(directive, raw))?;
            return field.set_optional(&raw, true, &layout);
        }
        match &directive.default {
            Some(default) => field.set_optional(default, false, &layout),
            None => Ok(()),
        }
    }

    fn bind_matched_map(
        &self,
        directive: &FieldDirective,
        name: &str,
        field: &mut dyn Field,
        prefix: &str,
    ) -> Result<()> {
        let Some(regex) = &directive.regex else {
            return Ok(());
        };
        let scope = directive
            .prefix
            .as_deref()
            .map(|added| add_prefixes(prefix, added, &self.options.separator));
        let entries = self
            .source()
            .environ()
            .into_iter()
            .filter_map(|(key, value)| {
                let key = match &scope {
                    Some(scope) => key.strip_prefix(scope.as_str())?.to_string(),
                    None => key,
                };
                regex.is_match(&key).then_some((key, value))
            })
            .map(|(key, value)| (key, self.expand(directive, value)))
            .collect();
        field.assign_entries(entries, &directive.layout(name))
    }

    fn bind_prefixed_map(
        &self,
        directive: &FieldDirective,
        name: &str,
        field: &mut dyn Field,
        prefix: &str,
    ) -> Result<()> {
        let scope = add_prefixes(
            prefix,
            directive.prefix.as_deref().unwrap_or(""),
            &self.options.separator,
        );
        let entries = self
            .source()
            .environ()
            .into_iter()
            .filter_map(|(key, value)| {
                let key = key.strip_prefix(scope.as_str())?.to_string();
                Some((key, self.expand(directive, value)))
            })
            .collect();
        field.assign_entries(entries, &directive.layout(name))
    }

    fn bind_leaf(
        &self,
        desc: &FieldDescriptor,
        directive: &FieldDirective,
        name: &str,
        field: &mut dyn Field,
    ) -> Result<()> {
        let raw = match self.lookup(name) {
            Some(raw) => raw,
            None => match &directive.default {
                Some(default) => default.clone(),
                None if directive.pointer || directive.optional => return Ok(()),
                None => return Err(Error::Missing(name.to_string())),
            },
        };
        let raw = self.expand(directive, raw);
        let layout = directive.layout(name);
        if desc.shape == Shape::Bytes && directive.decoder.is_some() {
            return field.assign_bytes(self.decode_bytes(directive, name, raw)?, &layout);
        }
        field.coerce(&self.decode(directive, name, raw)?, &layout)
    }

    fn expand(&self, directive: &FieldDirective, raw: String) -> String {
        match &self.options.expander {
            Some(expander) if !directive.no_expand => expander.expand(&raw, self.source()),
            None if directive.expand => Expander::default().expand(&raw, self.source()),
            _ => raw,
        }
    }

    fn decode_bytes(&self, directive: &FieldDirective, name: &str, raw: String) -> Result<Vec<u8>> {
        let Some(decoder) = &directive.decoder else {
            return Ok(raw.into_bytes());
        };
        decoder.decode(&raw).map_err(|source| Error::Decode {
            name: name.to_string(),
            encoding: decoder.encoding().to_string(),
            source,
        })
    }

    /// Decode into text; decoded bytes must be UTF-8.
    fn decode(&self, directive: &FieldDirective, name: &str, raw: String) -> Result<String> {
        let Some(decoder) = &directive.decoder else {
            return Ok(raw);
        };
        let bytes = self.decode_bytes(directive, name, raw)?;
        String::from_utf8(bytes).map_err(|err| Error::Decode {
            name: name.to_string(),
            encoding: decoder.encoding().to_string(),
            source: Box::new(err),
        })
    }
}

fn not_a_record(desc: &FieldDescriptor) -> Error {
    Error::UnsupportedType {
        field: desc.name.to_string(),
        type_name: desc.type_name.to_string(),
    }
}
