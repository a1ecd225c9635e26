//! Custom serde Serializer that flattens any `Serialize` value into
//! `KEY=VALUE` string pairs, the shape a [`MapSource`](crate::MapSource)
//! holds.
//!
//! Struct and map keys are upper-cased and joined with the caller's
//! separator, sequences are joined with `,`, and `None` values are skipped:
//! `Outer { database: Inner { url: "pg://" } }` with separator `_` becomes
//! `[("DATABASE_URL", "pg://")]`.

use serde::ser::{self, Impossible, Serialize};
use thiserror::Error;

pub fn flatten<S: Serialize + ?Sized>(
    source: &S,
    separator: &str,
) -> Result<Vec<(String, String)>, FlattenError> {
    let mut out = Vec::new();
    source.serialize(Flattener {
        key: String::new(),
        separator,
        out: &mut out,
    })?;
    Ok(out)
}

#[derive(Debug, Error)]
#[error("flatten error: {0}")]
pub struct FlattenError(String);

impl ser::Error for FlattenError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        FlattenError(msg.to_string())
    }
}

fn top_level() -> FlattenError {
    FlattenError("top-level value must be a struct or map".into())
}

/// Every primitive becomes its `Display` text.
macro_rules! display_scalars {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> Result<Self::Ok, Self::Error> {
                self.text(v.to_string())
            }
        )*
    };
}

/// Serializer for the value found at `key`.
struct Flattener<'a> {
    key: String,
    separator: &'a str,
    out: &'a mut Vec<(String, String)>,
}

impl<'a> Flattener<'a> {
    fn text(self, value: String) -> Result<(), FlattenError> {
        if self.key.is_empty() {
            return Err(top_level());
        }
        self.out.push((self.key, value));
        Ok(())
    }

    /// A serializer for the entry `name` below this one.
    fn nested(&mut self, name: &str) -> Flattener<'_> {
        let name = name.to_uppercase();
        let key = if self.key.is_empty() {
            name
        } else {
            format!("{}{}{name}", self.key, self.separator)
        };
        Flattener {
            key,
            separator: self.separator,
            out: self.out,
        }
    }

    fn items(self) -> Items<'a> {
        Items {
            key: self.key,
            out: self.out,
            joined: Vec::new(),
        }
    }
}

impl<'a> ser::Serializer for Flattener<'a> {
    type Ok = ();
    type Error = FlattenError;
    type SerializeSeq = Items<'a>;
    type SerializeTuple = Items<'a>;
    type SerializeTupleStruct = Items<'a>;
    type SerializeTupleVariant = Items<'a>;
    type SerializeMap = Entries<'a>;
    type SerializeStruct = Entries<'a>;
    type SerializeStructVariant = Entries<'a>;

    display_scalars!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
    );

    fn serialize_bytes(self, v: &[u8]) -> Result<(), FlattenError> {
        self.text(String::from_utf8_lossy(v).into_owned())
    }

    fn serialize_none(self) -> Result<(), FlattenError> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), FlattenError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), FlattenError> {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<(), FlattenError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<(), FlattenError> {
        self.text(variant.to_string())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Items<'a>, FlattenError> {
        Ok(self.items())
    }

    fn serialize_tuple(self, _: usize) -> Result<Items<'a>, FlattenError> {
        Ok(self.items())
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Items<'a>, FlattenError> {
        Ok(self.items())
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Items<'a>, FlattenError> {
        Ok(self.items())
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Entries<'a>, FlattenError> {
        Ok(Entries {
            parent: self,
            pending: None,
        })
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Entries<'a>, FlattenError> {
        self.serialize_map(None)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Entries<'a>, FlattenError> {
        self.serialize_map(None)
    }
}

/// Struct fields and map entries, each flattened under its own key.
struct Entries<'a> {
    parent: Flattener<'a>,
    pending: Option<String>,
}

impl Entries<'_> {
    fn entry<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), FlattenError> {
        value.serialize(self.parent.nested(name))
    }
}

impl ser::SerializeMap for Entries<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), FlattenError> {
        self.pending = Some(key.serialize(Text)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        let key = self
            .pending
            .take()
            .ok_or_else(|| FlattenError("map value without a key".into()))?;
        self.entry(&key, value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

impl ser::SerializeStruct for Entries<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        self.entry(name, value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Entries<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        self.entry(name, value)
    }

    fn end(self) -> Result<(), FlattenError> {
        Ok(())
    }
}

/// Sequence items, joined with `,` into one value.
struct Items<'a> {
    key: String,
    out: &'a mut Vec<(String, String)>,
    joined: Vec<String>,
}

impl Items<'_> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        let item = value
            .serialize(Text)
            .map_err(|e| FlattenError(format!("sequence item: {}", e.0)))?;
        self.joined.push(item);
        Ok(())
    }

    fn finish(self) -> Result<(), FlattenError> {
        if self.key.is_empty() {
            return Err(top_level());
        }
        self.out.push((self.key, self.joined.join(",")));
        Ok(())
    }
}

macro_rules! items_impl {
    ($($trait:ident::$method:ident),* $(,)?) => {
        $(
            impl ser::$trait for Items<'_> {
                type Ok = ();
                type Error = FlattenError;

                fn $method<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
                    self.push(value)
                }

                fn end(self) -> Result<(), FlattenError> {
                    self.finish()
                }
            }
        )*
    };
}

items_impl!(
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field,
);

/// Renders map keys and sequence items; anything compound is rejected.
struct Text;

impl Text {
    fn text(self, value: String) -> Result<String, FlattenError> {
        Ok(value)
    }
}

fn not_scalar<T>() -> Result<T, FlattenError> {
    Err(FlattenError("expected a scalar value".into()))
}

impl ser::Serializer for Text {
    type Ok = String;
    type Error = FlattenError;
    type SerializeSeq = Impossible<String, FlattenError>;
    type SerializeTuple = Impossible<String, FlattenError>;
    type SerializeTupleStruct = Impossible<String, FlattenError>;
    type SerializeTupleVariant = Impossible<String, FlattenError>;
    type SerializeMap = Impossible<String, FlattenError>;
    type SerializeStruct = Impossible<String, FlattenError>;
    type SerializeStructVariant = Impossible<String, FlattenError>;

    display_scalars!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
    );

    fn serialize_bytes(self, v: &[u8]) -> Result<String, FlattenError> {
        Ok(String::from_utf8_lossy(v).into_owned())
    }

    fn serialize_none(self) -> Result<String, FlattenError> {
        Ok(String::new())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<String, FlattenError> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<String, FlattenError> {
        Ok(String::new())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<String, FlattenError> {
        Ok(String::new())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<String, FlattenError> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        v: &T,
    ) -> Result<String, FlattenError> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        v: &T,
    ) -> Result<String, FlattenError> {
        v.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, FlattenError> {
        not_scalar()
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, FlattenError> {
        not_scalar()
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, FlattenError> {
        not_scalar()
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, FlattenError> {
        not_scalar()
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, FlattenError> {
        not_scalar()
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self::SerializeStruct, FlattenError> {
        not_scalar()
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, FlattenError> {
        not_scalar()
    }
}
