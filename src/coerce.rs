//! Value coercion: `Field` implementations for the natively supported types.
//!
//! Scalars parse strictly and report the lookup name on failure. Collections
//! split on the field's delimiter (and maps on its separator) and coerce each
//! part through the item type's own `Field` impl, so `Vec<Option<u16>>` or
//! `BTreeMap<String, f64>` need no extra code.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::time::Duration;

use crate::error::{Error, Expected};
use crate::types::{Field, Layout, Record, ScalarKind, Shape};

/// Strict boolean parse: `1 t T TRUE true True` / `0 f F FALSE false False`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Split a literal into (negative, radix, digits), honouring `0x`, `0o`,
/// `0b` and legacy leading-zero octal. Underscores are only accepted between
/// digits.
fn split_radix(raw: &str) -> Option<(bool, u32, String)> {
    let (negative, body) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    let digits = digits.strip_prefix('_').filter(|_| radix != 10).unwrap_or(digits);
    if digits.is_empty()
        || digits.starts_with(['_', '+', '-'])
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return None;
    }
    Some((negative, radix, digits.replace('_', "")))
}

pub fn parse_signed(raw: &str) -> Option<i128> {
    let (negative, radix, digits) = split_radix(raw)?;
    let magnitude = u128::from_str_radix(&digits, radix).ok()?;
    let magnitude = i128::try_from(magnitude).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

pub fn parse_unsigned(raw: &str) -> Option<u128> {
    let (negative, radix, digits) = split_radix(raw)?;
    if negative {
        return None;
    }
    u128::from_str_radix(&digits, radix).ok()
}

macro_rules! signed_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Field for $ty {
            fn shape() -> Shape {
                Shape::Scalar(ScalarKind::$kind)
            }

            fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
                *self = parse_signed(raw)
                    .and_then(|v| <$ty>::try_from(v).ok())
                    .ok_or_else(|| Error::not_a(layout.name, Expected::Int))?;
                Ok(())
            }

            fn render(&self, _layout: &Layout<'_>) -> Option<String> {
                Some(self.to_string())
            }
        }
    )*};
}

macro_rules! unsigned_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Field for $ty {
            fn shape() -> Shape {
                Shape::Scalar(ScalarKind::$kind)
            }

            fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
                *self = parse_unsigned(raw)
                    .and_then(|v| <$ty>::try_from(v).ok())
                    .ok_or_else(|| Error::not_a(layout.name, Expected::Uint))?;
                Ok(())
            }

            fn render(&self, _layout: &Layout<'_>) -> Option<String> {
                Some(self.to_string())
            }
        }
    )*};
}

/// `inf`, `infinity` or `nan` in any case, optionally signed. Anything else
/// that parses to a non-finite value overflowed the target width.
fn spells_non_finite(raw: &str) -> bool {
    let body = raw.trim_start_matches(['+', '-']).to_ascii_lowercase();
    matches!(body.as_str(), "inf" | "infinity" | "nan")
}

macro_rules! float_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Field for $ty {
            fn shape() -> Shape {
                Shape::Scalar(ScalarKind::$kind)
            }

            fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
                *self = raw
                    .parse::<$ty>()
                    .ok()
                    .filter(|v| v.is_finite() || spells_non_finite(raw))
                    .ok_or_else(|| Error::not_a(layout.name, Expected::Float))?;
                Ok(())
            }

            // Display is the shortest text that parses back to the same value.
            fn render(&self, _layout: &Layout<'_>) -> Option<String> {
                Some(self.to_string())
            }
        }
    )*};
}

signed_field!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize);
unsigned_field!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize);
float_field!(f32 => F32, f64 => F64);

impl Field for String {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Str)
    }

    fn coerce(&mut self, raw: &str, _layout: &Layout<'_>) -> Result<(), Error> {
        raw.clone_into(self);
        Ok(())
    }

    fn render(&self, _layout: &Layout<'_>) -> Option<String> {
        Some(self.clone())
    }
}

impl Field for bool {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Bool)
    }

    fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
        *self = parse_bool(raw).ok_or_else(|| Error::not_a(layout.name, Expected::Bool))?;
        Ok(())
    }

    fn render(&self, _layout: &Layout<'_>) -> Option<String> {
        Some(self.to_string())
    }
}

impl Field for Duration {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Duration)
    }

    fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
        let nanos = parse_signed(raw)
            .and_then(|v| i64::try_from(v).ok())
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| Error::not_a(layout.name, Expected::Int))?;
        *self = Duration::from_nanos(nanos);
        Ok(())
    }

    fn render(&self, _layout: &Layout<'_>) -> Option<String> {
        Some(self.as_nanos().to_string())
    }
}

impl<T: Field + Default> Field for Option<T> {
    fn shape() -> Shape {
        Shape::Pointer(Box::new(T::shape()))
    }

    fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
        let mut value = T::default();
        value.coerce(raw, layout)?;
        *self = Some(value);
        Ok(())
    }

    fn render(&self, layout: &Layout<'_>) -> Option<String> {
        self.as_ref().and_then(|value| value.render(layout))
    }

    fn as_record(&self) -> Option<&dyn Record> {
        self.as_ref().and_then(|value| value.as_record())
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        self.get_or_insert_with(T::default).as_record_mut()
    }

    fn materialize(&self) -> Option<Box<dyn Field>> {
        Some(Box::new(T::default()))
    }
}

impl<T: Field + Default> Field for Vec<T> {
    fn shape() -> Shape {
        match T::shape() {
            Shape::Scalar(ScalarKind::U8) => Shape::Bytes,
            item => Shape::Seq(Box::new(item)),
        }
    }

    fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
        let any: &mut dyn Any = &mut *self;
        if let Some(bytes) = any.downcast_mut::<Vec<u8>>() {
            *bytes = raw.as_bytes().to_vec();
            return Ok(());
        }
        // Empty text means "not set", not "set to an empty list".
        if raw.is_empty() {
            return Ok(());
        }
        *self = raw
            .split(layout.delimiter)
            .map(|item| {
                let mut value = T::default();
                value.coerce(item, layout)?;
                Ok(value)
            })
            .collect::<Result<_, Error>>()?;
        Ok(())
    }

    fn assign_bytes(&mut self, bytes: Vec<u8>, layout: &Layout<'_>) -> Result<(), Error> {
        let any: &mut dyn Any = &mut *self;
        let slot = any
            .downcast_mut::<Vec<u8>>()
            .ok_or_else(|| Error::NotCoercible(layout.name.to_string()))?;
        *slot = bytes;
        Ok(())
    }

    fn render(&self, layout: &Layout<'_>) -> Option<String> {
        let any: &dyn Any = self;
        if let Some(bytes) = any.downcast_ref::<Vec<u8>>() {
            return Some(String::from_utf8_lossy(bytes).into_owned());
        }
        let items: Vec<String> = self
            .iter()
            .map(|item| item.render(layout).unwrap_or_default())
            .collect();
        Some(items.join(layout.delimiter))
    }
}

/// Split `raw` into coerced key/value pairs per the field's delimiter and
/// separator.
fn parse_pairs<K, V>(raw: &str, layout: &Layout<'_>) -> Result<Vec<(K, V)>, Error>
where
    K: Field + Default,
    V: Field + Default,
{
    raw.split(layout.delimiter)
        .map(|pair| {
            let parts: Vec<&str> = pair.split(layout.separator).collect();
            let [key_raw, value_raw] = parts.as_slice() else {
                return Err(Error::InvalidPair {
                    name: layout.name.to_string(),
                    pair: pair.to_string(),
                });
            };
            let mut key = K::default();
            key.coerce(key_raw, layout)?;
            let mut value = V::default();
            value.coerce(value_raw, layout)?;
            Ok((key, value))
        })
        .collect()
}

fn coerce_entries<K, V>(
    entries: Vec<(String, String)>,
    layout: &Layout<'_>,
) -> Result<Vec<(K, V)>, Error>
where
    K: Field + Default,
    V: Field + Default,
{
    entries
        .into_iter()
        .map(|(key_raw, value_raw)| {
            let mut key = K::default();
            key.coerce(&key_raw, layout)?;
            let mut value = V::default();
            value.coerce(&value_raw, layout)?;
            Ok((key, value))
        })
        .collect()
}

fn render_pair<K: Field, V: Field>(key: &K, value: &V, layout: &Layout<'_>) -> (String, String) {
    (
        key.render(layout).unwrap_or_default(),
        value.render(layout).unwrap_or_default(),
    )
}

fn join_pairs(pairs: Vec<(String, String)>, layout: &Layout<'_>) -> String {
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}{}{value}", layout.separator))
        .collect::<Vec<_>>()
        .join(layout.delimiter)
}

impl<K, V, S> Field for HashMap<K, V, S>
where
    K: Field + Default + Eq + Hash,
    V: Field + Default,
    S: BuildHasher + Default + 'static,
{
    fn shape() -> Shape {
        Shape::Map(Box::new(K::shape()), Box::new(V::shape()))
    }

    fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
        if raw.is_empty() {
            return Ok(());
        }
        *self = parse_pairs(raw, layout)?.into_iter().collect();
        Ok(())
    }

    fn render(&self, layout: &Layout<'_>) -> Option<String> {
        Some(join_pairs(self.render_entries(layout), layout))
    }

    fn assign_entries(
        &mut self,
        entries: Vec<(String, String)>,
        layout: &Layout<'_>,
    ) -> Result<(), Error> {
        *self = coerce_entries(entries, layout)?.into_iter().collect();
        Ok(())
    }

    fn render_entries(&self, layout: &Layout<'_>) -> Vec<(String, String)> {
        self.iter()
            .map(|(key, value)| render_pair(key, value, layout))
            .collect()
    }
}

impl<K, V> Field for BTreeMap<K, V>
where
    K: Field + Default + Ord,
    V: Field + Default,
{
    fn shape() -> Shape {
        Shape::Map(Box::new(K::shape()), Box::new(V::shape()))
    }

    fn coerce(&mut self, raw: &str, layout: &Layout<'_>) -> Result<(), Error> {
        if raw.is_empty() {
            return Ok(());
        }
        *self = parse_pairs(raw, layout)?.into_iter().collect();
        Ok(())
    }

    fn render(&self, layout: &Layout<'_>) -> Option<String> {
        Some(join_pairs(self.render_entries(layout), layout))
    }

    fn assign_entries(
        &mut self,
        entries: Vec<(String, String)>,
        layout: &Layout<'_>,
    ) -> Result<(), Error> {
        *self = coerce_entries(entries, layout)?.into_iter().collect();
        Ok(())
    }

    fn render_entries(&self, layout: &Layout<'_>) -> Vec<(String, String)> {
        self.iter()
            .map(|(key, value)| render_pair(key, value, layout))
            .collect()
    }
}
