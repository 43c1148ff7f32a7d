//! Writes the [`crate::model`] AST back to value trees.
//!
//! Writing is the inverse of [`crate::reader`]: reading what was written
//! yields an equal model. Default `occurs` values, empty reserved-field sets
//! and single-value integer ranges are written in their shortest form.

mod types;

use std::io::Write;

use crate::element::Element;
use crate::error::IonSchemaError;
use crate::model::{NamedTypeDefinition, SchemaDocument, SchemaItem, TypeDefinition};
use crate::vocabulary::IslVersion;

/// Destination for written top-level values.
pub trait ElementSink {
    fn write_element(&mut self, element: Element) -> Result<(), IonSchemaError>;
}

impl ElementSink for Vec<Element> {
    fn write_element(&mut self, element: Element) -> Result<(), IonSchemaError> {
        self.push(element);
        Ok(())
    }
}

/// Writes each value as a line of Ion text.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ElementSink for TextSink<W> {
    fn write_element(&mut self, element: Element) -> Result<(), IonSchemaError> {
        writeln!(self.out, "{}", element).map_err(|source| IonSchemaError::Output { source })
    }
}

/// Writes schemas, types and named types.
#[derive(Debug, Clone, Copy)]
pub struct IonSchemaWriter {
    version: IslVersion,
}

impl Default for IonSchemaWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl IonSchemaWriter {
    pub fn new() -> Self {
        Self {
            version: IslVersion::V2_0,
        }
    }

    /// Version used for types written outside of a document.
    pub fn with_version(mut self, version: IslVersion) -> Self {
        self.version = version;
        self
    }

    /// Writes the version marker followed by every item.
    pub fn write_schema(
        &self,
        sink: &mut impl ElementSink,
        document: &SchemaDocument,
    ) -> Result<(), IonSchemaError> {
        let version = document.version;
        sink.write_element(Element::symbol(version.version_marker()))?;
        for item in &document.items {
            let element = match item {
                SchemaItem::Header(header) => types::header_element(header, version),
                SchemaItem::Type(definition) => types::named_type_element(definition, version),
                SchemaItem::Footer(footer) => types::footer_element(footer),
                SchemaItem::OpenContent(value) => value.clone(),
            };
            sink.write_element(element)?;
        }
        Ok(())
    }

    pub fn write_type(
        &self,
        sink: &mut impl ElementSink,
        definition: &TypeDefinition,
    ) -> Result<(), IonSchemaError> {
        sink.write_element(types::type_element(definition, self.version))
    }

    pub fn write_named_type(
        &self,
        sink: &mut impl ElementSink,
        definition: &NamedTypeDefinition,
    ) -> Result<(), IonSchemaError> {
        sink.write_element(types::named_type_element(definition, self.version))
    }
}
