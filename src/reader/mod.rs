//! Reads schema documents from value trees into the [`crate::model`] AST.
//!
//! Every entry point takes a `fail_fast` flag. When it is off the reader
//! keeps going after an invalid value and returns every problem it found;
//! when it is on it stops at the first one. Either way the result is a
//! [`ReadResult`] whose errors are located by [`TreePath`].
//!
//! ```
//! use ion_schema::element::parse;
//! use ion_schema::reader::IonSchemaReader;
//!
//! let values = parse("$ion_schema_2_0 type::{ name: positive, type: int, valid_values: range::[1, max] }")?;
//! let document = IonSchemaReader::new().read_schema(&values, false).unwrap();
//! assert_eq!(document.declared_types().count(), 1);
//! # Ok::<(), ion_schema::IonSchemaError>(())
//! ```

mod constraints;
mod context;
mod footer;
mod header;
mod ranges;
mod types;

use crate::element::Element;
use crate::error::{IonSchemaError, ReadResult, ReadResultExt};
use crate::model::{
    NamedTypeDefinition, SchemaDocument, SchemaFooter, SchemaHeader, SchemaItem, TypeDefinition,
};
use crate::path::TreePath;
use crate::vocabulary::{IslVersion, Vocabulary};

use context::{ReaderContext, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeVersionMarker,
    BeforeHeader,
    ReadingTypes,
    AfterFooter,
}

impl State {
    fn location(&self) -> &'static str {
        match self {
            State::BeforeVersionMarker => "before version marker",
            State::BeforeHeader => "before schema header",
            State::ReadingTypes => "while reading types",
            State::AfterFooter => "after schema footer",
        }
    }
}

fn is_version_marker(value: &Element) -> bool {
    value.annotations().is_empty()
        && value
            .as_symbol()
            .is_some_and(IslVersion::is_version_marker_like)
}

fn is_annotated_struct(value: &Element, annotation: &str) -> bool {
    value.as_struct().is_some() && value.annotations() == [annotation]
}

/// Reads schemas, types, headers and footers.
///
/// Documents pick their vocabulary by version marker. A document without a
/// version marker is ISL 1.0. Values read on their own use the default
/// version, ISL 2.0 unless configured otherwise.
#[derive(Debug, Clone)]
pub struct IonSchemaReader {
    isl_1_0: Vocabulary,
    isl_2_0: Vocabulary,
    default_version: IslVersion,
}

impl Default for IonSchemaReader {
    fn default() -> Self {
        Self::new()
    }
}

impl IonSchemaReader {
    pub fn new() -> Self {
        Self {
            isl_1_0: Vocabulary::isl_1_0(),
            isl_2_0: Vocabulary::isl_2_0(),
            default_version: IslVersion::V2_0,
        }
    }

    /// Replaces the vocabulary used for documents of its version.
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        match vocabulary.version() {
            IslVersion::V1_0 => self.isl_1_0 = vocabulary,
            IslVersion::V2_0 => self.isl_2_0 = vocabulary,
        }
        self
    }

    /// Version for values read outside of a document.
    pub fn with_default_version(mut self, version: IslVersion) -> Self {
        self.default_version = version;
        self
    }

    pub fn vocabulary(&self, version: IslVersion) -> &Vocabulary {
        match version {
            IslVersion::V1_0 => &self.isl_1_0,
            IslVersion::V2_0 => &self.isl_2_0,
        }
    }

    fn context(&self, fail_fast: bool) -> ReaderContext<'_> {
        ReaderContext::new(self.vocabulary(self.default_version), fail_fast)
    }

    /// Reads the top-level values of a schema document.
    pub fn read_schema(&self, values: &[Element], fail_fast: bool) -> ReadResult<SchemaDocument> {
        let has_marker = values.iter().any(is_version_marker);
        let (version, state) = if has_marker {
            (IslVersion::V2_0, State::BeforeVersionMarker)
        } else {
            (IslVersion::V1_0, State::BeforeHeader)
        };
        let mut ctx = ReaderContext::new(self.vocabulary(version), fail_fast);
        let mut document = SchemaDocument::new(version);
        let outcome = self.read_items(&mut ctx, values, state, &mut document);
        ctx.finish(&TreePath::root(), outcome).map(|_| document)
    }

    fn read_items<'r>(
        &'r self,
        ctx: &mut ReaderContext<'r>,
        values: &[Element],
        mut state: State,
        document: &mut SchemaDocument,
    ) -> Step<()> {
        for (i, value) in values.iter().enumerate() {
            let path = TreePath::root().index(i);
            if is_version_marker(value) {
                if state != State::BeforeVersionMarker {
                    ctx.report(
                        &path,
                        format!("unexpected version marker {}", state.location()),
                    )?;
                    continue;
                }
                let marker = value.as_symbol().unwrap_or_default();
                match IslVersion::from_version_marker(marker) {
                    Some(version) => {
                        document.version = version;
                        ctx.vocabulary = self.vocabulary(version);
                        state = State::BeforeHeader;
                    }
                    None => {
                        ctx.report(&path, format!("unsupported Ion Schema version: {}", marker))?;
                        return Ok(());
                    }
                }
                continue;
            }
            match state {
                // Anything ahead of the version marker belongs to no schema
                State::BeforeVersionMarker => continue,
                State::AfterFooter => {
                    ctx.report(
                        &path,
                        format!("value encountered {}: {}", state.location(), value),
                    )?;
                    continue;
                }
                State::BeforeHeader | State::ReadingTypes => {}
            }

            if is_annotated_struct(value, "schema_header") {
                if state == State::BeforeHeader {
                    let header = ctx.catching(&path, |ctx| header::read_header(ctx, value, &path))?;
                    document.items.extend(header.map(SchemaItem::Header));
                } else {
                    ctx.report(
                        &path,
                        format!("schema header encountered {}", state.location()),
                    )?;
                }
                state = State::ReadingTypes;
            } else if is_annotated_struct(value, "type") {
                let definition =
                    ctx.catching(&path, |ctx| types::read_named_type(ctx, value, &path))?;
                document.items.extend(definition.map(SchemaItem::Type));
                ctx.found_any_type = true;
                state = State::ReadingTypes;
            } else if is_annotated_struct(value, "schema_footer") {
                let footer = ctx.catching(&path, |ctx| footer::read_footer(ctx, value))?;
                document.items.extend(footer.map(SchemaItem::Footer));
                state = State::AfterFooter;
            } else if value
                .annotations()
                .iter()
                .any(|a| ctx.vocabulary.is_reserved_word(a))
            {
                ctx.report(
                    &path,
                    format!("invalid top level value {}: {}", state.location(), value),
                )?;
            } else {
                document.items.push(SchemaItem::OpenContent(value.clone()));
            }
        }
        Ok(())
    }

    /// Reads a type definition that has no name.
    pub fn read_type(&self, value: &Element, fail_fast: bool) -> ReadResult<TypeDefinition> {
        let mut ctx = self.context(fail_fast);
        let root = TreePath::root();
        let outcome = types::read_orphaned_type(&mut ctx, value, &root);
        ctx.finish(&root, outcome)
    }

    /// Reads a `type::{ name: ... }` definition.
    pub fn read_named_type(
        &self,
        value: &Element,
        fail_fast: bool,
    ) -> ReadResult<NamedTypeDefinition> {
        let mut ctx = self.context(fail_fast);
        let root = TreePath::root();
        let outcome = types::read_named_type(&mut ctx, value, &root);
        ctx.finish(&root, outcome)
    }

    pub fn read_header(&self, value: &Element, fail_fast: bool) -> ReadResult<SchemaHeader> {
        let mut ctx = self.context(fail_fast);
        let root = TreePath::root();
        let outcome = header::read_header(&mut ctx, value, &root);
        ctx.finish(&root, outcome)
    }

    /// Reads a footer on its own, so no field name is declared reserved.
    pub fn read_footer(&self, value: &Element, fail_fast: bool) -> ReadResult<SchemaFooter> {
        let mut ctx = self.context(fail_fast);
        let outcome = footer::read_footer(&mut ctx, value);
        ctx.finish(&TreePath::root(), outcome)
    }

    pub fn read_schema_or_throw(&self, values: &[Element]) -> Result<SchemaDocument, IonSchemaError> {
        self.read_schema(values, true).or_throw()
    }

    pub fn read_type_or_throw(&self, value: &Element) -> Result<TypeDefinition, IonSchemaError> {
        self.read_type(value, true).or_throw()
    }

    pub fn read_named_type_or_throw(
        &self,
        value: &Element,
    ) -> Result<NamedTypeDefinition, IonSchemaError> {
        self.read_named_type(value, true).or_throw()
    }
}
