// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A `(key, value)` attribute pair that survives serialization unchanged
/// (§3.1).
pub type Attribute = (String, String);

/// An ordered-on-write, order-independent-for-equality set of attributes.
/// Two types are equal iff their attribute sets match regardless of the
/// order attributes were added, since nothing in §3.1 requires attribute
/// order to be part of schema identity (unlike record field order, which
/// explicitly is).
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: Vec<Attribute>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn as_sorted_map(&self) -> BTreeMap<&str, &str> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.as_sorted_map() == other.as_sorted_map()
    }
}
impl Eq for Attributes {}

/// A named field of a `record` type. Field order is part of the schema
/// (§3.1) and field names must be unique within one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

/// An ordered, name-unique list of record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFields(Arc<Vec<Field>>);

/// A record was constructed with two fields sharing the same name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("duplicate field name `{0}` in record")]
pub struct DuplicateFieldError(pub String);

impl RecordFields {
    /// Builds a field list, rejecting duplicate names (§3.1: "field names
    /// within one record are unique").
    pub fn new(fields: Vec<Field>) -> Result<Self, DuplicateFieldError> {
        let mut seen = std::collections::HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(DuplicateFieldError(field.name.clone()));
            }
        }
        Ok(Self(Arc::new(fields)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Field> {
        self.0.get(index)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.0.iter()
    }
}

/// The closed set of structural kinds a `Type` may carry (§3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int64,
    Uint64,
    Double,
    Duration,
    Time,
    String,
    Blob,
    Ip,
    Subnet,
    /// Ordinal-to-name bijection for an enum type.
    Enum(Arc<Vec<String>>),
    Secret,
    List(Box<Type>),
    Record(RecordFields),
    Map(Box<Type>, Box<Type>),
}

impl Kind {
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int64 => "int64",
            Kind::Uint64 => "uint64",
            Kind::Double => "double",
            Kind::Duration => "duration",
            Kind::Time => "time",
            Kind::String => "string",
            Kind::Blob => "blob",
            Kind::Ip => "ip",
            Kind::Subnet => "subnet",
            Kind::Enum(_) => "enum",
            Kind::Secret => "secret",
            Kind::List(_) => "list",
            Kind::Record(_) => "record",
            Kind::Map(_, _) => "map",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TypeData {
    kind: Kind,
    name: Option<String>,
    attributes: Attributes,
}

/// The engine's universal schema type: a closed tagged union with an
/// optional nominal name and a bag of attributes, both of which participate
/// in equality (§3.1). Cheaply cloneable — types are shared by handle, never
/// deep-copied, matching the "smart-pointer-shared schemas" guidance of §9.
#[derive(Debug, Clone)]
pub struct Type(Arc<TypeData>);

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}
impl Eq for Type {}

impl Type {
    #[must_use]
    pub fn new(kind: Kind) -> Self {
        Self(Arc::new(TypeData {
            kind,
            name: None,
            attributes: Attributes::new(),
        }))
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let data = Arc::make_mut(&mut self.0);
        data.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        let data = Arc::make_mut(&mut self.0);
        data.attributes = attributes;
        self
    }

    #[must_use]
    pub fn null() -> Self {
        Self::new(Kind::Null)
    }
    #[must_use]
    pub fn bool() -> Self {
        Self::new(Kind::Bool)
    }
    #[must_use]
    pub fn int64() -> Self {
        Self::new(Kind::Int64)
    }
    #[must_use]
    pub fn uint64() -> Self {
        Self::new(Kind::Uint64)
    }
    #[must_use]
    pub fn double() -> Self {
        Self::new(Kind::Double)
    }
    #[must_use]
    pub fn duration() -> Self {
        Self::new(Kind::Duration)
    }
    #[must_use]
    pub fn time() -> Self {
        Self::new(Kind::Time)
    }
    #[must_use]
    pub fn string() -> Self {
        Self::new(Kind::String)
    }
    #[must_use]
    pub fn blob() -> Self {
        Self::new(Kind::Blob)
    }
    #[must_use]
    pub fn ip() -> Self {
        Self::new(Kind::Ip)
    }
    #[must_use]
    pub fn subnet() -> Self {
        Self::new(Kind::Subnet)
    }
    #[must_use]
    pub fn secret() -> Self {
        Self::new(Kind::Secret)
    }
    #[must_use]
    pub fn enumeration(names: Vec<String>) -> Self {
        Self::new(Kind::Enum(Arc::new(names)))
    }
    #[must_use]
    pub fn list(element: Type) -> Self {
        Self::new(Kind::List(Box::new(element)))
    }
    #[must_use]
    pub fn map(key: Type, value: Type) -> Self {
        Self::new(Kind::Map(Box::new(key), Box::new(value)))
    }
    #[must_use]
    pub fn record(fields: RecordFields) -> Self {
        Self::new(Kind::Record(fields))
    }

    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.0.kind
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.0.attributes
    }

    /// Returns the record's fields, or `None` if this type is not `record`.
    #[must_use]
    pub fn fields(&self) -> Option<&RecordFields> {
        match &self.0.kind {
            Kind::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Ordinal -> name lookup for `enum` types.
    #[must_use]
    pub fn enum_name(&self, ordinal: u32) -> Option<&str> {
        match &self.0.kind {
            Kind::Enum(names) => names.get(ordinal as usize).map(String::as_str),
            _ => None,
        }
    }

    /// Name -> ordinal lookup for `enum` types.
    #[must_use]
    pub fn enum_ordinal(&self, name: &str) -> Option<u32> {
        match &self.0.kind {
            Kind::Enum(names) => names.iter().position(|n| n == name).map(|i| i as u32),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            write!(f, "{name}")
        } else {
            write!(f, "{}", self.0.kind.tag())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_field_names_are_rejected() {
        let err = RecordFields::new(vec![
            Field::new("a", Type::int64()),
            Field::new("a", Type::string()),
        ])
        .unwrap_err();
        assert_eq!(err.0, "a");
    }

    #[test]
    fn equality_considers_name_and_attributes() {
        let plain = Type::int64();
        let named = Type::int64().named("port");
        assert_ne!(plain, named);

        let attrd_a = Type::string().with_attributes(Attributes::new().with("pii", "true"));
        let attrd_b = Type::string().with_attributes(Attributes::new().with("pii", "true"));
        assert_eq!(attrd_a, attrd_b);

        let attrd_c = Type::string().with_attributes(Attributes::new().with("pii", "false"));
        assert_ne!(attrd_a, attrd_c);
    }

    #[test]
    fn attribute_equality_is_order_independent() {
        let a = Attributes::new().with("x", "1").with("y", "2");
        let b = Attributes::new().with("y", "2").with("x", "1");
        assert_eq!(a, b);
    }

    #[test]
    fn record_field_order_is_significant_for_equality() {
        let a = Type::record(
            RecordFields::new(vec![Field::new("a", Type::int64()), Field::new("b", Type::string())])
                .unwrap(),
        );
        let b = Type::record(
            RecordFields::new(vec![Field::new("b", Type::string()), Field::new("a", Type::int64())])
                .unwrap(),
        );
        assert_ne!(a, b);
    }
}
