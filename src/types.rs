//! The type-descriptor model shared by loading and writing.
//!
//! Rust has no runtime reflection over struct fields, so every record
//! describes itself instead: [`Record::descriptors`] returns one
//! [`FieldDescriptor`] per field (normally generated by `#[derive(Record)]`),
//! and [`Record::field`] / [`Record::field_mut`] hand out the matching field as
//! a `dyn Field`. Each field type reports its structural [`Shape`], which the
//! classifier inspects, and implements the coercion and rendering hooks of
//! [`Field`].

use std::any::{Any, TypeId};

use crate::error::Error;

/// Native scalar kinds the coercion engine converts text into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Str,
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    /// `std::time::Duration`, bound as a whole number of nanoseconds.
    Duration,
}

impl ScalarKind {
    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            ScalarKind::Str | ScalarKind::Bool | ScalarKind::F32 | ScalarKind::F64
        )
    }
}

/// Structural description of a field type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Scalar(ScalarKind),
    /// `Vec<u8>`: raw text bytes, never split.
    Bytes,
    /// `Vec<T>` of the given item shape.
    Seq(Box<Shape>),
    /// `HashMap<K, V>` / `BTreeMap<K, V>`.
    Map(Box<Shape>, Box<Shape>),
    /// A nested record.
    Record,
    /// `Option<T>`: absent values leave the field `None`.
    Pointer(Box<Shape>),
    /// [`Optional<T>`](crate::Optional): tracks whether the value was set explicitly.
    Optional(Box<Shape>),
    /// A type only a registered custom setter knows how to bind.
    Custom,
}

impl Shape {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Scalar(_))
    }

    /// Scalar, or `Option` of a scalar.
    pub fn is_scalar_item(&self) -> bool {
        match self {
            Shape::Scalar(_) => true,
            Shape::Pointer(inner) => inner.is_scalar(),
            _ => false,
        }
    }

    pub fn is_string_map(&self) -> bool {
        matches!(
            self,
            Shape::Map(key, value)
                if **key == Shape::Scalar(ScalarKind::Str)
                    && **value == Shape::Scalar(ScalarKind::Str)
        )
    }
}

/// Static description of one record field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// The Rust field identifier, e.g. `db_host`.
    pub name: &'static str,
    /// The raw directive string from `#[env("...")]`.
    pub tag: Option<&'static str>,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub shape: Shape,
    /// Set by `#[env(flatten)]`: the record's fields are walked under the
    /// parent's prefix.
    pub embedded: bool,
}

impl FieldDescriptor {
    pub fn of<T: Field>(name: &'static str, tag: Option<&'static str>, embedded: bool) -> Self {
        Self {
            name,
            tag,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            shape: T::shape(),
            embedded,
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

/// Per-field formatting context handed to [`Field`] hooks.
#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    /// The resolved lookup name, used in error messages.
    pub name: &'a str,
    /// Splits sequence items and map pairs.
    pub delimiter: &'a str,
    /// Splits a map pair into key and value.
    pub separator: &'a str,
}

impl<'a> Layout<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            delimiter: ",",
            separator: ":",
        }
    }
}

/// Upcasting helper so `dyn Field` values can be handed to custom setters.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A type that can be bound to a record field.
///
/// Only [`shape`](Field::shape) is required; a type returning
/// [`Shape::Custom`] relies on a registered
/// [`CustomSetter`](crate::CustomSetter) and never reaches the other hooks.
pub trait Field: AsAny + 'static {
    fn shape() -> Shape
    where
        Self: Sized;

    /// Convert raw text into this field.
    fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
        let _ = raw;
        Err(Error::NotCoercible(layout.name.to_string()))
    }

    /// Store decoded bytes. Only byte vectors accept them.
    fn assign_bytes(&mut self, bytes: Vec<u8>, layout: &Layout<'_>) -> Result<(), Error> {
        let _ = bytes;
        Err(Error::NotCoercible(layout.name.to_string()))
    }

    /// True for an optional wrapper that holds no value. The writer omits
    /// such fields, whatever binds them.
    fn is_unset(&self) -> bool {
        false
    }

    /// Render the current value, or `None` to omit the field.
    fn render(&self, layout: &Layout<'_>) -> Option<String> {
        let _ = layout;
        None
    }

    /// Replace the contents of a string-keyed map from harvested entries.
    fn assign_entries(
        &mut self,
        entries: Vec<(String, String)>,
        layout: &Layout<'_>,
    ) -> Result<(), Error> {
        let _ = entries;
        Err(Error::NotCoercible(layout.name.to_string()))
    }

    /// Entries of a string-keyed map, rendered.
    fn render_entries(&self, layout: &Layout<'_>) -> Vec<(String, String)> {
        let _ = layout;
        Vec::new()
    }

    /// Store a value in an optional wrapper; `explicit` is false when the
    /// value came from a default.
    fn set_optional(&mut self, raw: &str, explicit: bool, layout: &Layout<'_>) -> Result<(), Error> {
        let _ = (raw, explicit);
        Err(Error::NotCoercible(layout.name.to_string()))
    }

    fn as_record(&self) -> Option<&dyn Record> {
        None
    }

    /// Mutable record access; `Option<R>` allocates `R::default()` on demand.
    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        None
    }

    /// A fresh default inner value, for materializing `None` records in examples.
    fn materialize(&self) -> Option<Box<dyn Field>> {
        None
    }
}

/// A struct whose fields cfgenv can populate and write.
///
/// Implement it with `#[derive(Record)]`.
pub trait Record {
    fn descriptors(&self) -> Vec<FieldDescriptor>;
    fn field(&self, index: usize) -> Option<&dyn Field>;
    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Field>;
}
