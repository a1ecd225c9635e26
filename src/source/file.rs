//! `.env`-style files.
//!
//! The backing reader is opened and parsed on first access, then dropped; the
//! parsed table is kept for the lifetime of the source. Parsing rules per
//! line, after trimming spaces and tabs:
//!
//! - blank lines and lines starting with `#` are skipped;
//! - `KEY=VALUE` splits on the first `=`; a value wrapped in matching `"` or
//!   `'` has the quotes removed;
//! - a line without `=` defines the whole line as a key with an empty value;
//! - a later definition of the same key replaces the earlier one.

use std::cell::{Cell, OnceCell};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;

use super::Source;

type ErrorHook = Box<dyn Fn(&io::Error)>;

enum Backing {
    Reader(Box<dyn Read>),
    Path(PathBuf),
}

pub struct EnvFileSource {
    backing: Cell<Option<Backing>>,
    vars: OnceCell<Vec<(String, String)>>,
    on_error: ErrorHook,
}

impl EnvFileSource {
    /// Read variables from any reader, e.g. an open file or an in-memory
    /// buffer.
    pub fn from_reader(reader: impl Read + 'static) -> Self {
        Self::with_backing(Backing::Reader(Box::new(reader)))
    }

    /// Read variables from the file at `path`, opened on first access.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::with_backing(Backing::Path(path.into()))
    }

    fn with_backing(backing: Backing) -> Self {
        Self {
            backing: Cell::new(Some(backing)),
            vars: OnceCell::new(),
            on_error: Box::new(|err: &io::Error| log::error!("failed to read env file: {err}")),
        }
    }

    /// Replace the hook called (once) when opening or reading fails. Whatever
    /// was parsed before the failure stays visible.
    pub fn on_error(mut self, hook: impl Fn(&io::Error) + 'static) -> Self {
        self.on_error = Box::new(hook);
        self
    }

    fn vars(&self) -> &[(String, String)] {
        self.vars.get_or_init(|| {
            let mut vars = Vec::new();
            let Some(backing) = self.backing.take() else {
                return vars;
            };
            if let Err(err) = read_into(backing, &mut vars) {
                (self.on_error)(&err);
            }
            log::debug!("env file parsed: {} variable(s)", vars.len());
            vars
        })
    }
}

fn read_into(backing: Backing, vars: &mut Vec<(String, String)>) -> io::Result<()> {
    let reader: Box<dyn Read> = match backing {
        Backing::Reader(reader) => reader,
        Backing::Path(path) => Box::new(File::open(path)?),
    };
    for line in BufReader::new(reader).lines() {
        if let Some((key, value)) = parse_line(&line?) {
            match vars.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => vars.push((key, value)),
            }
        }
    }
    Ok(())
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim_matches(['\t', ' ']);
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let Some((key, value)) = trimmed.split_once('=') else {
        return Some((trimmed.to_string(), String::new()));
    };
    Some((key.to_string(), unquote(value).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

impl Source for EnvFileSource {
    fn lookup(&self, key: &str) -> Option<String> {
        self.vars()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    fn environ(&self) -> Vec<(String, String)> {
        self.vars().to_vec()
    }
}

impl std::fmt::Debug for EnvFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvFileSource")
            .field("parsed", &self.vars.get().map(Vec::len))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::rc::Rc;

    const SAMPLE: &str = "\
# comment
TEST=foo

  SPACED = padded\t
QUOTED=\"a, b\"
SINGLE='x=y'
BARE
TEST=bar
";

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("boom"))
        }
    }

    #[test]
    fn parses_lines() {
        let source = EnvFileSource::from_reader(Cursor::new(SAMPLE));
        assert_eq!(source.lookup("TEST").as_deref(), Some("bar"));
        assert_eq!(source.lookup("SPACED ").as_deref(), Some(" padded"));
        assert_eq!(source.lookup("QUOTED").as_deref(), Some("a, b"));
        assert_eq!(source.lookup("SINGLE").as_deref(), Some("x=y"));
        assert_eq!(source.lookup("BARE").as_deref(), Some(""));
        assert_eq!(source.lookup("# comment"), None);
        assert_eq!(source.lookup("MISSING"), None);
    }

    #[test]
    fn enumerates_in_first_definition_order() {
        let source = EnvFileSource::from_reader(Cursor::new(SAMPLE));
        let keys: Vec<String> = source.environ().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["TEST", "SPACED ", "QUOTED", "SINGLE", "BARE"]);
    }

    #[test]
    fn lone_quote_is_kept() {
        assert_eq!(parse_line("Q=\""), Some(("Q".into(), "\"".into())));
        assert_eq!(parse_line("Q=\"mixed'"), Some(("Q".into(), "\"mixed'".into())));
    }

    #[test]
    fn reads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "PORT=8080\n").unwrap();
        let source = EnvFileSource::from_path(&path);
        assert_eq!(source.lookup("PORT").as_deref(), Some("8080"));
    }

    #[test]
    fn read_failure_reported_once() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let source = EnvFileSource::from_reader(FailingReader)
            .on_error(move |_| seen.set(seen.get() + 1));
        assert_eq!(source.lookup("ANY"), None);
        assert!(source.environ().is_empty());
        assert_eq!(source.lookup("ANY"), None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn missing_path_goes_to_hook() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let source = EnvFileSource::from_path(dir.path().join("absent.env"))
            .on_error(move |err| {
                assert_eq!(err.kind(), io::ErrorKind::NotFound);
                seen.set(seen.get() + 1);
            });
        assert_eq!(source.lookup("PORT"), None);
        assert_eq!(calls.get(), 1);
    }
}
