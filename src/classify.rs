//! Field classification: how a field gets its value.
//!
//! Classification looks only at the field's [`Shape`], its type identity and
//! the registered custom setters, so the same field always classifies the same
//! way. Directive tokens can refine a classification afterwards (`prefix=` on a
//! string map makes it a prefixed map), but never override a rejection.

use std::sync::Arc;

use crate::custom::CustomSetter;
use crate::error::Error;
use crate::types::{FieldDescriptor, Shape};

/// The binding strategy chosen for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Handled by a registered custom setter.
    Custom,
    /// An [`Optional`](crate::Optional) wrapper around a scalar.
    OptionalWrapper,
    /// Scalars, byte vectors, sequences and maps bound from one variable.
    Leaf,
    /// A nested record, walked field by field.
    Record,
    /// A string map filled from every variable under a prefix.
    PrefixedMap,
    /// A string map filled from every variable whose name matches a regex.
    MatchedMap,
}

#[derive(Clone)]
pub struct Classification {
    pub binding: Binding,
    /// The field is an `Option<T>`.
    pub pointer: bool,
    /// Absence is not an error.
    pub optional: bool,
    pub custom: Option<Arc<dyn CustomSetter>>,
    /// The shape under any `Option`.
    pub inner: Shape,
}

impl std::fmt::Debug for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classification")
            .field("binding", &self.binding)
            .field("pointer", &self.pointer)
            .field("optional", &self.optional)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

fn unsupported(field: &FieldDescriptor) -> Error {
    Error::UnsupportedType {
        field: field.name.to_string(),
        type_name: field.type_name.to_string(),
    }
}

fn unsupported_part(field: &FieldDescriptor, part: &'static str) -> Error {
    Error::UnsupportedPart {
        field: field.name.to_string(),
        part,
    }
}

pub fn classify(
    field: &FieldDescriptor,
    customs: &[Arc<dyn CustomSetter>],
) -> Result<Classification, Error> {
    let (pointer, inner) = match &field.shape {
        Shape::Pointer(inner) => (true, (**inner).clone()),
        other => (false, other.clone()),
    };
    let classified = |binding| Classification {
        binding,
        pointer,
        optional: pointer,
        custom: None,
        inner: inner.clone(),
    };

    if let Some(setter) = customs.iter().find(|s| s.is_applicable(field)) {
        return Ok(Classification {
            custom: Some(Arc::clone(setter)),
            ..classified(Binding::Custom)
        });
    }

    if let Shape::Optional(wrapped) = &field.shape
        && wrapped.is_scalar()
    {
        return Ok(Classification {
            optional: true,
            ..classified(Binding::OptionalWrapper)
        });
    }

    match &inner {
        Shape::Scalar(_) => Ok(classified(Binding::Leaf)),
        Shape::Record => Ok(classified(Binding::Record)),
        Shape::Bytes | Shape::Seq(_) | Shape::Map(..) if pointer => Err(unsupported(field)),
        Shape::Bytes => Ok(classified(Binding::Leaf)),
        Shape::Seq(item) if item.is_scalar_item() => Ok(classified(Binding::Leaf)),
        Shape::Seq(_) => Err(unsupported_part(field, "slice item")),
        Shape::Map(_, value) if !value.is_scalar_item() => Err(unsupported_part(field, "map item")),
        Shape::Map(key, _) if !key.is_scalar() => Err(unsupported_part(field, "map key")),
        Shape::Map(..) => Ok(classified(Binding::Leaf)),
        Shape::Pointer(_) | Shape::Optional(_) | Shape::Custom => Err(unsupported(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Optional;
    use crate::custom::DurationSetter;
    use std::collections::HashMap;
    use std::time::Duration;

    fn of<T: crate::Field>() -> FieldDescriptor {
        FieldDescriptor::of::<T>("test", None, false)
    }

    fn binding<T: crate::Field>() -> Result<Binding, Error> {
        classify(&of::<T>(), &[]).map(|c| c.binding)
    }

    #[test]
    fn scalars_and_collections_are_leaves() {
        assert_eq!(binding::<String>().unwrap(), Binding::Leaf);
        assert_eq!(binding::<f32>().unwrap(), Binding::Leaf);
        assert_eq!(binding::<Vec<u8>>().unwrap(), Binding::Leaf);
        assert_eq!(binding::<Vec<Option<i64>>>().unwrap(), Binding::Leaf);
        assert_eq!(binding::<HashMap<i32, Option<bool>>>().unwrap(), Binding::Leaf);
    }

    #[test]
    fn pointers_are_optional() {
        let c = classify(&of::<Option<u16>>(), &[]).unwrap();
        assert_eq!(c.binding, Binding::Leaf);
        assert!(c.pointer);
        assert!(c.optional);

        let c = classify(&of::<u16>(), &[]).unwrap();
        assert!(!c.pointer);
        assert!(!c.optional);
    }

    #[test]
    fn optional_wrapper_of_scalar() {
        let c = classify(&of::<Optional<String>>(), &[]).unwrap();
        assert_eq!(c.binding, Binding::OptionalWrapper);
        assert!(c.optional);
        assert!(!c.pointer);
    }

    #[test]
    fn pointer_to_collection_is_unsupported() {
        let err = binding::<Option<Vec<i32>>>().unwrap_err();
        assert!(err.to_string().starts_with("field 'test' has unsupported type - "));
        assert!(binding::<Option<HashMap<String, String>>>().is_err());
        assert!(binding::<Option<Vec<u8>>>().is_err());
        assert!(binding::<Option<Option<u8>>>().is_err());
    }

    #[test]
    fn bad_parts_are_named() {
        assert_eq!(
            binding::<Vec<Vec<i32>>>().unwrap_err().to_string(),
            "field 'test' has unsupported slice item type"
        );
        assert_eq!(
            binding::<HashMap<String, Vec<i32>>>().unwrap_err().to_string(),
            "field 'test' has unsupported map item type"
        );
        assert_eq!(
            binding::<HashMap<Option<String>, String>>().unwrap_err().to_string(),
            "field 'test' has unsupported map key type"
        );
    }

    #[test]
    fn custom_setter_wins_first() {
        let customs: Vec<Arc<dyn CustomSetter>> = vec![Arc::new(DurationSetter)];
        let c = classify(&of::<Duration>(), &customs).unwrap();
        assert_eq!(c.binding, Binding::Custom);
        assert!(c.custom.is_some());

        let c = classify(&of::<Duration>(), &[]).unwrap();
        assert_eq!(c.binding, Binding::Leaf);
    }

    #[test]
    fn optional_of_custom_needs_a_setter() {
        assert!(binding::<Optional<chrono::DateTime<chrono::Utc>>>().is_err());
        assert!(binding::<chrono::DateTime<chrono::Utc>>().is_err());
    }
}
