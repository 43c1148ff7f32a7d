//! The abstract syntax tree of a schema document.
//!
//! Every value here is plain data: readers build it, writers serialize it and
//! the schema system resolves references between documents. Equality is
//! structural, with open content and order-independent constraint payloads
//! compared as multisets.

mod constraint;
mod regex;

use std::collections::BTreeSet;

pub use constraint::{
    AnnotationV1, AnnotationsModifier, AnnotationsV2, Constraint, DiscreteRangeConstraint,
    DiscreteRangeKind, Ieee754Format, RegexConstraint, TimestampOffsetValue, ValidValue,
};
pub use self::regex::translate_regex;

use crate::bag::Bag;
use crate::element::Element;
use crate::range::IntRange;
use crate::vocabulary::IslVersion;

/// Fields that were preserved verbatim because they are not part of the
/// vocabulary.
pub type OpenContent = Bag<(String, Element)>;

/// A whole schema document, items in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    pub id: Option<String>,
    pub version: IslVersion,
    pub items: Vec<SchemaItem>,
}

impl SchemaDocument {
    pub fn new(version: IslVersion) -> Self {
        Self {
            id: None,
            version,
            items: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn header(&self) -> Option<&SchemaHeader> {
        self.items.iter().find_map(|item| match item {
            SchemaItem::Header(header) => Some(header),
            _ => None,
        })
    }

    pub fn footer(&self) -> Option<&SchemaFooter> {
        self.items.iter().find_map(|item| match item {
            SchemaItem::Footer(footer) => Some(footer),
            _ => None,
        })
    }

    pub fn declared_types(&self) -> impl Iterator<Item = &NamedTypeDefinition> {
        self.items.iter().filter_map(|item| match item {
            SchemaItem::Type(definition) => Some(definition),
            _ => None,
        })
    }

    /// Top-level values that are neither header, footer nor type.
    pub fn open_content(&self) -> impl Iterator<Item = &Element> {
        self.items.iter().filter_map(|item| match item {
            SchemaItem::OpenContent(value) => Some(value),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaItem {
    Header(SchemaHeader),
    Type(NamedTypeDefinition),
    Footer(SchemaFooter),
    OpenContent(Element),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaHeader {
    pub imports: Vec<HeaderImport>,
    pub user_reserved_fields: UserReservedFields,
    pub open_content: OpenContent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaFooter {
    pub open_content: OpenContent,
}

/// One entry of the header's `imports` list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeaderImport {
    /// Every type declared by another schema.
    Wildcard { id: String },
    /// A single type, optionally renamed locally.
    Type {
        id: String,
        type_name: String,
        alias: Option<String>,
    },
}

impl HeaderImport {
    pub fn schema_id(&self) -> &str {
        match self {
            HeaderImport::Wildcard { id } | HeaderImport::Type { id, .. } => id,
        }
    }

    /// The name the imported type is known by in the importing schema.
    pub fn local_name(&self) -> Option<&str> {
        match self {
            HeaderImport::Wildcard { .. } => None,
            HeaderImport::Type {
                type_name, alias, ..
            } => Some(alias.as_deref().unwrap_or(type_name)),
        }
    }
}

/// Field names a schema author declares as legal open content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserReservedFields {
    pub header: BTreeSet<String>,
    pub type_definition: BTreeSet<String>,
    pub footer: BTreeSet<String>,
}

impl UserReservedFields {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.type_definition.is_empty() && self.footer.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedTypeDefinition {
    pub name: String,
    pub definition: TypeDefinition,
}

impl NamedTypeDefinition {
    pub fn new(name: impl Into<String>, definition: TypeDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }
}

/// A bag of constraints plus any open content found beside them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeDefinition {
    pub constraints: Bag<Constraint>,
    pub open_content: OpenContent,
}

impl TypeDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_open_content(mut self, name: impl Into<String>, value: Element) -> Self {
        self.open_content.push((name.into(), value));
        self
    }
}

/// How a type argument treats null values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Nullability {
    #[default]
    None,
    /// ISL 1.0 `nullable::`: any null, or a typed null of the argument's type.
    Nullable,
    /// ISL 2.0 `$null_or::`: the argument or any null.
    OrNull,
}

impl Nullability {
    pub fn annotation(&self) -> Option<&'static str> {
        match self {
            Nullability::None => None,
            Nullability::Nullable => Some("nullable"),
            Nullability::OrNull => Some("$null_or"),
        }
    }
}

/// A reference to a type wherever a constraint takes one.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeArgument {
    /// A built-in type or one declared or imported by name.
    Reference { name: String, nullability: Nullability },
    /// `{ id: "schema", type: name }`, resolved against another schema.
    Import {
        schema_id: String,
        type_name: String,
        nullability: Nullability,
    },
    InlineType {
        definition: Box<TypeDefinition>,
        nullability: Nullability,
    },
}

impl TypeArgument {
    pub fn reference(name: impl Into<String>) -> Self {
        TypeArgument::Reference {
            name: name.into(),
            nullability: Nullability::None,
        }
    }

    pub fn inline(definition: TypeDefinition) -> Self {
        TypeArgument::InlineType {
            definition: Box::new(definition),
            nullability: Nullability::None,
        }
    }

    pub fn nullability(&self) -> Nullability {
        match self {
            TypeArgument::Reference { nullability, .. }
            | TypeArgument::Import { nullability, .. }
            | TypeArgument::InlineType { nullability, .. } => *nullability,
        }
    }

    pub fn with_nullability(mut self, value: Nullability) -> Self {
        match &mut self {
            TypeArgument::Reference { nullability, .. }
            | TypeArgument::Import { nullability, .. }
            | TypeArgument::InlineType { nullability, .. } => *nullability = value,
        }
        self
    }
}

/// A type argument paired with how many times it may occur.
#[derive(Debug, Clone, PartialEq)]
pub struct VariablyOccurringTypeArgument {
    pub occurs: IntRange,
    pub type_argument: TypeArgument,
}

impl VariablyOccurringTypeArgument {
    pub fn new(occurs: IntRange, type_argument: TypeArgument) -> Self {
        Self {
            occurs,
            type_argument,
        }
    }

    /// Default for `fields` values.
    pub fn optional(type_argument: TypeArgument) -> Self {
        Self::new(IntRange::optional(), type_argument)
    }

    /// Default for `ordered_elements` entries.
    pub fn required(type_argument: TypeArgument) -> Self {
        Self::new(IntRange::required(), type_argument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_import_local_name() {
        let import = HeaderImport::Type {
            id: "a.isl".to_string(),
            type_name: "t".to_string(),
            alias: Some("u".to_string()),
        };
        assert_eq!(import.local_name(), Some("u"));
        assert_eq!(import.schema_id(), "a.isl");

        let wildcard = HeaderImport::Wildcard {
            id: "a.isl".to_string(),
        };
        assert_eq!(wildcard.local_name(), None);
    }

    #[test]
    fn type_definitions_compare_as_bags() {
        let a = TypeDefinition::new()
            .with_constraint(Constraint::Type(TypeArgument::reference("int")))
            .with_constraint(Constraint::Not(TypeArgument::reference("string")))
            .with_open_content("_x", Element::int(1));
        let b = TypeDefinition::new()
            .with_open_content("_x", Element::int(1))
            .with_constraint(Constraint::Not(TypeArgument::reference("string")))
            .with_constraint(Constraint::Type(TypeArgument::reference("int")));
        assert_eq!(a, b);
    }

    #[test]
    fn document_accessors() {
        let mut document = SchemaDocument::new(IslVersion::V2_0);
        document.items.push(SchemaItem::Header(SchemaHeader::default()));
        document.items.push(SchemaItem::Type(NamedTypeDefinition::new(
            "t",
            TypeDefinition::new(),
        )));
        document.items.push(SchemaItem::OpenContent(Element::int(3)));
        document.items.push(SchemaItem::Footer(SchemaFooter::default()));

        assert!(document.header().is_some());
        assert!(document.footer().is_some());
        assert_eq!(document.declared_types().count(), 1);
        assert_eq!(document.open_content().count(), 1);
    }
}
