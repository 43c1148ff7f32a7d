//! Compiled schemas.
//!
//! A [`Schema`] is a [`SchemaDocument`] whose imports have been loaded and
//! whose type references have all been checked. Schemas are built by
//! [`crate::system::IonSchemaSystem`].

use std::collections::BTreeMap;

use crate::model::{NamedTypeDefinition, SchemaDocument, TypeDefinition};
use crate::vocabulary::IslVersion;

/// What a schema takes from one imported schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaImport {
    pub(crate) wildcard: bool,
    /// Local name to the name in the imported schema.
    pub(crate) types: BTreeMap<String, String>,
}

impl SchemaImport {
    /// True if every type declared by the imported schema is visible.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Imported types as `(local name, name in the imported schema)`.
    pub fn types(&self) -> impl Iterator<Item = (&str, &str)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A type made visible by an import, with the id of the schema declaring it.
#[derive(Debug, Clone)]
pub(crate) struct ImportedType {
    pub(crate) schema_id: String,
    pub(crate) definition: NamedTypeDefinition,
}

/// Where a type visible in a schema is declared.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Origin<'a> {
    pub(crate) schema_id: &'a str,
    pub(crate) definition: &'a NamedTypeDefinition,
    /// False when the schema declares the type itself.
    pub(crate) transitive: bool,
}

/// How a schema makes a type name available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Visibility<'a> {
    /// Declared by the schema itself.
    Declared(&'a TypeDefinition),
    /// Visible only through one of the schema's own imports.
    Transitive(&'a TypeDefinition),
    NotVisible,
}

impl Visibility<'_> {
    pub fn is_visible(&self) -> bool {
        !matches!(self, Visibility::NotVisible)
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) id: Option<String>,
    pub(crate) document: SchemaDocument,
    pub(crate) imports: BTreeMap<String, SchemaImport>,
    /// Local names bound by imports.
    pub(crate) in_scope: BTreeMap<String, ImportedType>,
}

impl Schema {
    /// `None` for schemas that were not loaded through an authority.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn version(&self) -> IslVersion {
        self.document.version
    }

    pub fn document(&self) -> &SchemaDocument {
        &self.document
    }

    /// Imported schemas by schema id.
    pub fn imports(&self) -> impl Iterator<Item = (&str, &SchemaImport)> {
        self.imports.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_import(&self, id: &str) -> Option<&SchemaImport> {
        self.imports.get(id)
    }

    pub fn declared_types(&self) -> impl Iterator<Item = &NamedTypeDefinition> {
        self.document.declared_types()
    }

    /// Returns a type declared by this schema.
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.declared_types()
            .find(|t| t.name == name)
            .map(|t| &t.definition)
    }

    /// Returns a type declared or imported by this schema under `name`.
    pub fn resolve_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.origin(name).map(|origin| &origin.definition.definition)
    }

    /// Id of the schema that declares the type known here as `name`.
    pub fn type_origin(&self, name: &str) -> Option<&str> {
        self.origin(name).map(|origin| origin.schema_id)
    }

    /// Whether `name` is declared here or bound by one of the imports.
    pub fn visibility(&self, name: &str) -> Visibility<'_> {
        match self.origin(name) {
            Some(origin) if !origin.transitive => Visibility::Declared(&origin.definition.definition),
            Some(origin) => Visibility::Transitive(&origin.definition.definition),
            None => Visibility::NotVisible,
        }
    }

    pub(crate) fn origin(&self, name: &str) -> Option<Origin<'_>> {
        if let Some(definition) = self.declared_types().find(|t| t.name == name) {
            return Some(Origin {
                schema_id: self.id.as_deref().unwrap_or_default(),
                definition,
                transitive: false,
            });
        }
        self.in_scope.get(name).map(|imported| Origin {
            schema_id: &imported.schema_id,
            definition: &imported.definition,
            transitive: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaItem;

    fn schema(id: &str, types: &[&str]) -> Schema {
        let mut document = SchemaDocument::new(IslVersion::V2_0).with_id(id);
        for name in types {
            document.items.push(SchemaItem::Type(NamedTypeDefinition::new(
                *name,
                TypeDefinition::new(),
            )));
        }
        Schema {
            id: Some(id.to_string()),
            document,
            imports: BTreeMap::new(),
            in_scope: BTreeMap::new(),
        }
    }

    #[test]
    fn declared_types_are_found() {
        let s = schema("a.isl", &["x", "y"]);
        assert!(s.get_type("x").is_some());
        assert!(s.get_type("z").is_none());
        assert_eq!(s.declared_types().count(), 2);
        assert!(matches!(s.visibility("y"), Visibility::Declared(_)));
        assert_eq!(s.type_origin("x"), Some("a.isl"));
    }

    #[test]
    fn imported_types_are_transitive() {
        let mut s = schema("a.isl", &[]);
        s.in_scope.insert(
            "alias".to_string(),
            ImportedType {
                schema_id: "base.isl".to_string(),
                definition: NamedTypeDefinition::new("t", TypeDefinition::new()),
            },
        );
        assert!(matches!(s.visibility("alias"), Visibility::Transitive(_)));
        assert_eq!(s.visibility("t"), Visibility::NotVisible);
        assert!(s.get_type("alias").is_none());
        assert!(s.resolve_type("alias").is_some());
        assert_eq!(s.type_origin("alias"), Some("base.isl"));
    }
}
