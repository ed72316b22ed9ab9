//! Structural types carried by data sockets.
//!
//! A `StructuralType` describes the shape of the values flowing through a data
//! port. Compatibility between two ports is decided by [`StructuralType::is_subtype_of`],
//! a pure structural check with no side effects.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar value kinds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Number,
    /// Whole numbers. Accepted wherever a `Number` is expected.
    Integer,
    Boolean,
    Null,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Null => "null",
        };
        write!(f, "{}", s)
    }
}

/// Tagged structural type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StructuralType {
    /// The universal type. Every schema satisfies it.
    #[default]
    Any,
    Primitive { of: PrimitiveType },
    Object { fields: BTreeMap<String, StructuralType> },
    Array { items: Box<StructuralType> },
    Union { members: Vec<StructuralType> },
    /// A named type. Two refs with the same name are interchangeable; otherwise
    /// the ref is compared through its body.
    Ref { name: String, schema: Box<StructuralType> },
}

impl StructuralType {
    pub fn string() -> Self {
        StructuralType::Primitive {
            of: PrimitiveType::String,
        }
    }

    pub fn number() -> Self {
        StructuralType::Primitive {
            of: PrimitiveType::Number,
        }
    }

    pub fn integer() -> Self {
        StructuralType::Primitive {
            of: PrimitiveType::Integer,
        }
    }

    pub fn boolean() -> Self {
        StructuralType::Primitive {
            of: PrimitiveType::Boolean,
        }
    }

    pub fn null() -> Self {
        StructuralType::Primitive {
            of: PrimitiveType::Null,
        }
    }

    pub fn array(items: StructuralType) -> Self {
        StructuralType::Array {
            items: Box::new(items),
        }
    }

    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, StructuralType)>,
    {
        StructuralType::Object {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn named(name: &str, schema: StructuralType) -> Self {
        StructuralType::Ref {
            name: name.to_string(),
            schema: Box::new(schema),
        }
    }

    /// Build a union from the given members, flattening nested unions and
    /// dropping duplicates. A single member collapses to itself, and any
    /// member equal to `Any` makes the whole union `Any`.
    pub fn union(members: impl IntoIterator<Item = StructuralType>) -> Self {
        let mut flat: Vec<StructuralType> = Vec::new();
        for member in members {
            let nested = match member {
                StructuralType::Union { members } => members,
                other => vec![other],
            };
            for m in nested {
                if m.is_any() {
                    return StructuralType::Any;
                }
                if !flat.contains(&m) {
                    flat.push(m);
                }
            }
        }
        match flat.len() {
            0 => StructuralType::Any,
            1 => flat.remove(0),
            _ => StructuralType::Union { members: flat },
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, StructuralType::Any)
    }

    /// Strip named wrappers.
    pub fn resolved(&self) -> &StructuralType {
        match self {
            StructuralType::Ref { schema, .. } => schema.resolved(),
            other => other,
        }
    }

    /// Property map of an object schema (looking through refs).
    pub fn object_fields(&self) -> Option<&BTreeMap<String, StructuralType>> {
        match self.resolved() {
            StructuralType::Object { fields } => Some(fields),
            _ => None,
        }
    }

    /// Item schema of an array schema (looking through refs).
    pub fn array_items(&self) -> Option<&StructuralType> {
        match self.resolved() {
            StructuralType::Array { items } => Some(items),
            _ => None,
        }
    }

    /// Whether a value of this schema can be used where `target` is expected.
    pub fn is_subtype_of(&self, target: &StructuralType) -> bool {
        use StructuralType::*;

        match (self, target) {
            (_, Any) => true,
            (Ref { name: a, .. }, Ref { name: b, .. }) if a == b => true,
            (Ref { schema, .. }, _) => schema.is_subtype_of(target),
            (_, Ref { schema, .. }) => self.is_subtype_of(schema),
            (Union { members }, _) => members.iter().all(|m| m.is_subtype_of(target)),
            (_, Union { members }) => members.iter().any(|m| self.is_subtype_of(m)),
            (Any, _) => false,
            (Primitive { of: a }, Primitive { of: b }) => {
                a == b || (*a == PrimitiveType::Integer && *b == PrimitiveType::Number)
            }
            (Object { fields: source }, Object { fields: wanted }) => {
                wanted.iter().all(|(key, schema)| {
                    source
                        .get(key)
                        .is_some_and(|field| field.is_subtype_of(schema))
                })
            }
            (Array { items: a }, Array { items: b }) => a.is_subtype_of(b),
            _ => false,
        }
    }
}

impl fmt::Display for StructuralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralType::Any => write!(f, "any"),
            StructuralType::Primitive { of } => write!(f, "{}", of),
            StructuralType::Object { fields } => {
                write!(f, "{{")?;
                for (i, (key, schema)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, schema)?;
                }
                write!(f, "}}")
            }
            StructuralType::Array { items } => write!(f, "Array<{}>", items),
            StructuralType::Union { members } => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            StructuralType::Ref { name, .. } => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> StructuralType {
        StructuralType::object([
            ("x", StructuralType::number()),
            ("y", StructuralType::number()),
        ])
    }

    #[test]
    fn test_any_accepts_everything() {
        assert!(StructuralType::string().is_subtype_of(&StructuralType::Any));
        assert!(point().is_subtype_of(&StructuralType::Any));
        assert!(StructuralType::Any.is_subtype_of(&StructuralType::Any));
    }

    #[test]
    fn test_any_source_does_not_satisfy_concrete_target() {
        assert!(!StructuralType::Any.is_subtype_of(&StructuralType::string()));
    }

    #[test]
    fn test_integer_widens_to_number() {
        assert!(StructuralType::integer().is_subtype_of(&StructuralType::number()));
        assert!(!StructuralType::number().is_subtype_of(&StructuralType::integer()));
    }

    #[test]
    fn test_object_width_subtyping() {
        let point3 = StructuralType::object([
            ("x", StructuralType::number()),
            ("y", StructuralType::number()),
            ("z", StructuralType::integer()),
        ]);
        assert!(point3.is_subtype_of(&point()));
        assert!(!point().is_subtype_of(&point3));
    }

    #[test]
    fn test_array_is_covariant() {
        let ints = StructuralType::array(StructuralType::integer());
        let nums = StructuralType::array(StructuralType::number());
        assert!(ints.is_subtype_of(&nums));
        assert!(!nums.is_subtype_of(&ints));
    }

    #[test]
    fn test_union_rules() {
        let text_or_num = StructuralType::union([StructuralType::string(), StructuralType::number()]);
        assert!(StructuralType::string().is_subtype_of(&text_or_num));
        assert!(!text_or_num.is_subtype_of(&StructuralType::string()));
        assert!(StructuralType::integer().is_subtype_of(&text_or_num));
    }

    #[test]
    fn test_union_constructor_flattens() {
        let u = StructuralType::union([
            StructuralType::string(),
            StructuralType::union([StructuralType::string(), StructuralType::boolean()]),
        ]);
        assert_eq!(
            u,
            StructuralType::Union {
                members: vec![StructuralType::string(), StructuralType::boolean()]
            }
        );
        assert_eq!(
            StructuralType::union([StructuralType::number()]),
            StructuralType::number()
        );
        assert!(StructuralType::union([StructuralType::Any, StructuralType::number()]).is_any());
    }

    #[test]
    fn test_refs_compare_by_name_then_body() {
        let a = StructuralType::named("Point", point());
        let b = StructuralType::named("Point", StructuralType::string());
        assert!(a.is_subtype_of(&b));
        assert!(a.is_subtype_of(&point()));
        assert!(point().is_subtype_of(&a));
        assert!(!StructuralType::string().is_subtype_of(&a));
    }

    #[test]
    fn test_display() {
        assert_eq!(point().to_string(), "{x: number, y: number}");
        assert_eq!(
            StructuralType::array(StructuralType::string()).to_string(),
            "Array<string>"
        );
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(StructuralType::array(StructuralType::string())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "array", "items": {"kind": "primitive", "of": "string"}})
        );
        let back: StructuralType = serde_json::from_value(json).unwrap();
        assert_eq!(back, StructuralType::array(StructuralType::string()));
    }
}
