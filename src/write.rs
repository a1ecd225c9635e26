//! The record serializer: renders a record back into `KEY=VALUE` lines.
//!
//! It classifies and names fields exactly like the populator but never
//! touches a source. In [`Mode::Actual`] each field's current value is
//! rendered; in [`Mode::Example`] a placeholder is written instead, so the
//! output documents which variables a record reads.

use std::collections::HashSet;
use std::io;

use crate::builder::Options;
use crate::classify::{Binding, classify};
use crate::directive::{self, FieldDirective};
use crate::error::Result;
use crate::naming::add_prefixes;
use crate::types::{Field, FieldDescriptor, Record};

const CUSTOM_PLACEHOLDER: &str = "<value>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Actual,
    Example,
}

pub(crate) struct Writer<'a, W> {
    options: &'a Options,
    out: W,
    mode: Mode,
    /// Names already written; the first field to claim a name wins.
    seen: HashSet<String>,
    /// Entries of `prefix=` and `match=` maps, written after everything else.
    added: Vec<(String, String)>,
}

impl<'a, W: io::Write> Writer<'a, W> {
    pub(crate) fn new(options: &'a Options, out: W, mode: Mode) -> Self {
        Self {
            options,
            out,
            mode,
            seen: HashSet::new(),
            added: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self, record: &dyn Record, prefix: &str) -> Result<()> {
        self.write_record(record, prefix)?;
        for (key, value) in std::mem::take(&mut self.added) {
            if self.seen.insert(key.clone()) {
                self.line(&key, &value)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn write_record(&mut self, record: &dyn Record, prefix: &str) -> Result<()> {
        for (index, desc) in record.descriptors().into_iter().enumerate() {
            let Some(field) = record.field(index) else {
                continue;
            };
            if desc.embedded {
                self.write_nested(field, prefix)?;
            } else {
                self.write_field(&desc, field, prefix)?;
            }
        }
        Ok(())
    }

    /// Walk a nested record. A `None` record is skipped when writing values
    /// and replaced by its default when writing an example.
    fn write_nested(&mut self, field: &dyn Field, prefix: &str) -> Result<()> {
        if let Some(record) = field.as_record() {
            return self.write_record(record, prefix);
        }
        if self.mode == Mode::Example
            && let Some(fresh) = field.materialize()
            && let Some(record) = fresh.as_record()
        {
            return self.write_record(record, prefix);
        }
        Ok(())
    }

    fn write_field(&mut self, desc: &FieldDescriptor, field: &dyn Field, prefix: &str) -> Result<()> {
        let class = classify(desc, &self.options.customs)?;
        let directive = directive::parse(desc, &class, &self.options.decoders)?;
        let separator = self.options.separator.as_str();

        if directive.binding == Binding::Record {
            let nested = add_prefixes(prefix, directive.prefix.as_deref().unwrap_or(""), separator);
            return self.write_nested(field, &nested);
        }

        let name = self
            .options
            .naming
            .build_name(prefix, separator, desc, directive.name.as_deref());
        if !self.seen.insert(name.clone()) {
            log::debug!("skipping field '{}': '{name}' already written", desc.name);
            return Ok(());
        }

        let value = match self.mode {
            Mode::Example => self.placeholder(desc, &directive),
            Mode::Actual => self.render(desc, &directive, &name, field),
        };
        match value {
            Some(value) => self.line(&name, &value),
            None => Ok(()),
        }
    }

    fn placeholder(&self, desc: &FieldDescriptor, directive: &FieldDirective) -> Option<String> {
        match directive.binding {
            // Nothing to enumerate without a source.
            Binding::PrefixedMap | Binding::MatchedMap => None,
            Binding::Custom => Some(
                directive
                    .default
                    .clone()
                    .unwrap_or_else(|| CUSTOM_PLACEHOLDER.to_string()),
            ),
            _ => Some(directive::placeholder(&desc.shape, directive)),
        }
    }

    fn render(
        &mut self,
        desc: &FieldDescriptor,
        directive: &FieldDirective,
        name: &str,
        field: &dyn Field,
    ) -> Option<String> {
        if field.is_unset() {
            return None;
        }
        let layout = directive.layout(name);
        match directive.binding {
            Binding::PrefixedMap | Binding::MatchedMap => {
                self.added.extend(field.render_entries(&layout));
                None
            }
            Binding::Custom => Some(
                directive
                    .custom
                    .as_ref()
                    .and_then(|setter| setter.render(desc, field.as_any()))
                    .unwrap_or_else(|| CUSTOM_PLACEHOLDER.to_string()),
            ),
            _ => field.render(&layout),
        }
    }

    fn line(&mut self, name: &str, value: &str) -> Result<()> {
        writeln!(self.out, "{name}={value}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use crate::Cfgenv;
    use crate::custom::DurationSetter;
    use crate::fixtures::test::{App, Database, Server, Tls};
    use crate::optional::Optional;
    use crate::source::{EnvFileSource, MapSource};

    fn written<R: crate::Record>(record: &R, prefix: &str) -> String {
        let mut out = Vec::new();
        Cfgenv::builder().prefix(prefix).write(record, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn example<R: crate::Record + Default>(prefix: &str) -> String {
        let mut out = Vec::new();
        Cfgenv::builder().prefix(prefix).example::<R>(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn app() -> App {
        App {
            name: "demo".into(),
            server: Server {
                host: "h".into(),
                port: 80,
                tls: None,
            },
            database: Database {
                url: "u".into(),
                pool_size: 4,
                timeout: Optional::Absent,
            },
        }
    }

    #[test]
    fn example_uses_defaults_and_placeholders() {
        assert_eq!(
            example::<App>("APP"),
            "APP_NAME=<string>\n\
             APP_HOST=<string>\n\
             APP_PORT=8080\n\
             APP_TLS_CERT=<string>\n\
             APP_DB_URL=<string>\n\
             APP_DB_POOL_SIZE=5\n\
             APP_DB_TIMEOUT=0\n"
        );
    }

    #[test]
    fn actual_skips_none_records_and_absent_wrappers() {
        assert_eq!(
            written(&app(), "APP"),
            "APP_NAME=demo\n\
             APP_HOST=h\n\
             APP_PORT=80\n\
             APP_DB_URL=u\n\
             APP_DB_POOL_SIZE=4\n"
        );
    }

    #[test]
    fn present_nested_records_are_written() {
        let mut app = app();
        app.server.tls = Some(Tls {
            cert: "c.pem".into(),
        });
        app.database.timeout = Optional::Set(30);
        let out = written(&app, "");
        assert!(out.contains("TLS_CERT=c.pem\n"));
        assert!(out.contains("DB_TIMEOUT=30\n"));
    }

    #[derive(crate::Record, Default)]
    struct Mixed {
        ratio: f64,
        tags: Vec<String>,
        #[env("sep=|,delim=;")]
        limits: BTreeMap<String, u32>,
        #[env("prefix=LABEL_")]
        labels: BTreeMap<String, String>,
        #[env("match='^X'")]
        extras: BTreeMap<String, String>,
        #[env("name=RATIO")]
        alias: f64,
        port: Option<u16>,
        flag: bool,
    }

    fn mixed() -> Mixed {
        Mixed {
            ratio: 0.1,
            tags: vec!["a".into(), "b".into()],
            limits: BTreeMap::from([("cpu".into(), 2), ("mem".into(), 512)]),
            labels: BTreeMap::from([("TEAM".into(), "core".into()), ("RATIO".into(), "9".into())]),
            extras: BTreeMap::from([("TEAM".into(), "other".into()), ("XA".into(), "1".into())]),
            alias: 2.5,
            port: None,
            flag: true,
        }
    }

    #[test]
    fn actual_values_use_field_layouts() {
        assert_eq!(
            written(&mixed(), ""),
            "RATIO=0.1\n\
             TAGS=a,b\n\
             LIMITS=cpu|2;mem|512\n\
             FLAG=true\n\
             TEAM=core\n\
             XA=1\n"
        );
    }

    #[test]
    fn example_skips_maps_without_a_source() {
        assert_eq!(
            example::<Mixed>(""),
            "RATIO=0.0\n\
             TAGS=value,value,...\n\
             LIMITS=key|value;key|value;...\n\
             PORT=0\n\
             FLAG=true|false\n"
        );
    }

    #[test]
    fn example_of_ignores_values() {
        let mut out = Vec::new();
        Cfgenv::builder().example_of(&mixed(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), example::<Mixed>(""));
    }

    #[derive(crate::Record, Default)]
    struct Timing {
        interval: Duration,
        jitter: Optional<Duration>,
    }

    #[test]
    fn custom_fields_render_through_their_setter() {
        let timing = Timing {
            interval: Duration::from_secs(90),
            jitter: Optional::Absent,
        };
        let mut out = Vec::new();
        Cfgenv::builder()
            .custom_setter(DurationSetter)
            .write(&timing, &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "INTERVAL=1m30s\n");

        let mut out = Vec::new();
        Cfgenv::builder()
            .custom_setter(DurationSetter)
            .example::<Timing>(&mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "INTERVAL=<value>\nJITTER=<value>\n");
    }

    #[derive(crate::Record, Default)]
    struct Unsupported {
        items: Option<Vec<i32>>,
    }

    #[test]
    fn unsupported_fields_abort_writing() {
        let mut out = Vec::new();
        let err = Cfgenv::builder()
            .write(&Unsupported::default(), &mut out)
            .unwrap_err();
        assert!(err.to_string().starts_with("field 'items' has unsupported type - "));
    }

    #[test]
    fn written_output_loads_back() {
        let mut original = app();
        original.server.tls = Some(Tls {
            cert: "c.pem".into(),
        });
        original.database.timeout = Optional::Set(15);
        let text = written(&original, "APP");

        let loaded: App = Cfgenv::builder()
            .prefix("APP")
            .source(EnvFileSource::from_reader(std::io::Cursor::new(text.into_bytes())))
            .load()
            .unwrap();
        assert_eq!(loaded, original);
    }

    #[derive(crate::Record, Default, Debug, PartialEq)]
    struct Wrapped {
        timeout: Optional<u32>,
        label: Optional<String>,
        #[env("default=3")]
        retries: Optional<u8>,
    }

    #[test]
    fn absent_wrappers_load_back_absent() {
        let original = Wrapped {
            retries: Optional::Set(3),
            ..Wrapped::default()
        };
        let text = written(&original, "");
        assert_eq!(text, "RETRIES=3\n");
        let loaded: Wrapped = Cfgenv::builder()
            .source(EnvFileSource::from_reader(std::io::Cursor::new(text.into_bytes())))
            .load()
            .unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn scalar_round_trip_through_a_map_source() {
        let mixed = mixed();
        let text = written(&mixed, "");
        let vars: MapSource = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .collect();
        let loaded: Mixed = Cfgenv::builder().source(vars).load().unwrap();
        assert_eq!(loaded.ratio, mixed.ratio);
        assert_eq!(loaded.tags, mixed.tags);
        assert_eq!(loaded.limits, mixed.limits);
        assert_eq!(loaded.alias, mixed.ratio);
        assert_eq!(loaded.flag, mixed.flag);
    }
}
