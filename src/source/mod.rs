//! Where raw values come from.
//!
//! A [`Source`] answers two questions: "what is the value of `KEY`?" and "what
//! are all the `KEY=VALUE` pairs you hold?". The first drives ordinary fields,
//! the second drives `prefix=` and `match=` maps. The process environment is
//! the default; env files, clap flags and in-memory maps can stand in for it
//! or be layered with [`MultiSource`].

mod env;
mod file;
#[cfg(feature = "clap")]
mod flags;
mod map;
mod multi;

pub use env::EnvSource;
pub use file::EnvFileSource;
#[cfg(feature = "clap")]
pub use flags::{FlagNameConverter, FlagSource, KebabCase};
pub use map::MapSource;
pub use multi::MultiSource;

pub trait Source {
    /// The value for `key`, or `None` when the source does not define it.
    fn lookup(&self, key: &str) -> Option<String>;

    /// Every pair the source holds, in the source's own order.
    fn environ(&self) -> Vec<(String, String)>;

    /// True only for [`EnvSource`]; [`MultiSource`] keeps at most one.
    fn is_process_env(&self) -> bool {
        false
    }
}

impl<S: Source + ?Sized> Source for &S {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }

    fn environ(&self) -> Vec<(String, String)> {
        (**self).environ()
    }

    fn is_process_env(&self) -> bool {
        (**self).is_process_env()
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }

    fn environ(&self) -> Vec<(String, String)> {
        (**self).environ()
    }

    fn is_process_env(&self) -> bool {
        (**self).is_process_env()
    }
}
