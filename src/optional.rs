use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::types::{Field, Layout, Shape};

/// A value that remembers where it came from.
///
/// Fields declared as `Optional<T>` are never reported as missing. After a
/// load they are `Absent` when nothing supplied them, `Defaulted` when the
/// directive's `default=` filled them in and `Set` when a source provided the
/// variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Optional<T> {
    #[default]
    Absent,
    Defaulted(T),
    Set(T),
}

impl<T> Optional<T> {
    /// True for both `Set` and `Defaulted`.
    pub fn is_present(&self) -> bool {
        !matches!(self, Optional::Absent)
    }

    /// True only when a source supplied the value.
    pub fn was_set(&self) -> bool {
        matches!(self, Optional::Set(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Optional::Absent => None,
            Optional::Defaulted(value) | Optional::Set(value) => Some(value),
        }
    }

    pub fn as_option(&self) -> Option<&T> {
        self.get()
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Optional::Absent => None,
            Optional::Defaulted(value) | Optional::Set(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for Optional<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Optional::Absent, Optional::Set)
    }
}

impl<T: Serialize> Serialize for Optional<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Optional<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Optional::from)
    }
}

impl<T: Field + Default> Field for Optional<T> {
    fn shape() -> Shape {
        Shape::Optional(Box::new(T::shape()))
    }

    fn set_optional(&mut self, raw: &str, explicit: bool, layout: &Layout<'_>) -> Result<(), Error> {
        let mut value = T::default();
        value.coerce(raw, layout)?;
        *self = if explicit {
            Optional::Set(value)
        } else {
            Optional::Defaulted(value)
        };
        Ok(())
    }

    fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
        self.set_optional(raw, true, layout)
    }

    fn is_unset(&self) -> bool {
        !self.is_present()
    }

    fn render(&self, layout: &Layout<'_>) -> Option<String> {
        self.get().and_then(|value| value.render(layout))
    }
}
