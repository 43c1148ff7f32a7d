//! The schema system: loads schemas through authorities, compiles them and
//! caches the result.
//!
//! ```
//! use ion_schema::authority::InMemoryAuthority;
//! use ion_schema::system::IonSchemaSystem;
//!
//! let authority = InMemoryAuthority::new()
//!     .with_text("base.isl", "$ion_schema_2_0 type::{ name: positive, valid_values: range::[1, max] }")
//!     .with_text("app.isl", r#"
//!         $ion_schema_2_0
//!         schema_header::{ imports: [{ id: "base.isl", type: positive }] }
//!         type::{ name: count, type: positive }
//!         schema_footer::{}
//!     "#);
//! let system = IonSchemaSystem::builder().with_authority(authority).build();
//!
//! let schema = system.load_schema("app.isl")?;
//! assert!(schema.get_type("count").is_some());
//! assert!(schema.resolve_type("positive").is_some());
//! # Ok::<(), ion_schema::IonSchemaError>(())
//! ```
//!
//! Loading a schema first reads every schema reachable through its imports
//! that is not cached yet, then compiles them together. Names are resolved
//! against the documents, so schemas may import each other in a cycle.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::authority::Authority;
use crate::cache::{DefaultSchemaCache, SchemaCache};
use crate::element::{parse, Element};
use crate::error::{IonSchemaError, ReadResultExt};
use crate::model::{HeaderImport, NamedTypeDefinition, SchemaDocument, TypeArgument, TypeDefinition};
use crate::reader::IonSchemaReader;
use crate::schema::{ImportedType, Origin, Schema, SchemaImport};
use crate::vocabulary::{IslVersion, Vocabulary};

/// Configures an [`IonSchemaSystem`].
pub struct IonSchemaSystemBuilder {
    authorities: Vec<Arc<dyn Authority>>,
    cache: Option<Arc<dyn SchemaCache>>,
    allow_transitive_imports: bool,
    fail_fast: bool,
    reader: IonSchemaReader,
}

impl Default for IonSchemaSystemBuilder {
    fn default() -> Self {
        Self {
            authorities: Vec::new(),
            cache: None,
            allow_transitive_imports: false,
            fail_fast: false,
            reader: IonSchemaReader::new(),
        }
    }
}

impl IonSchemaSystemBuilder {
    /// Replaces all authorities with `authority`.
    pub fn with_authority(mut self, authority: impl Authority + 'static) -> Self {
        self.authorities = vec![Arc::new(authority)];
        self
    }

    /// Appends an authority. Authorities are consulted in the order added.
    pub fn add_authority(mut self, authority: impl Authority + 'static) -> Self {
        self.authorities.push(Arc::new(authority));
        self
    }

    pub fn with_authorities(mut self, authorities: Vec<Arc<dyn Authority>>) -> Self {
        self.authorities = authorities;
        self
    }

    pub fn with_schema_cache(mut self, cache: Arc<dyn SchemaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Whether types may be imported from a schema that only imports them
    /// itself. Off by default.
    pub fn allow_transitive_imports(mut self, allow: bool) -> Self {
        self.allow_transitive_imports = allow;
        self
    }

    /// Stop reading a document at its first error.
    pub fn fail_fast_reading(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.reader = self.reader.with_vocabulary(vocabulary);
        self
    }

    pub fn build(self) -> IonSchemaSystem {
        IonSchemaSystem {
            authorities: self.authorities,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(DefaultSchemaCache::<Schema>::new())),
            allow_transitive_imports: self.allow_transitive_imports,
            fail_fast: self.fail_fast,
            reader: self.reader,
        }
    }
}

/// Loads, compiles and caches schemas.
///
/// Safe to share between threads. Each schema id is built at most once at a
/// time, however many threads ask for it.
pub struct IonSchemaSystem {
    authorities: Vec<Arc<dyn Authority>>,
    cache: Arc<dyn SchemaCache>,
    allow_transitive_imports: bool,
    fail_fast: bool,
    reader: IonSchemaReader,
}

impl IonSchemaSystem {
    pub fn builder() -> IonSchemaSystemBuilder {
        IonSchemaSystemBuilder::default()
    }

    pub fn reader(&self) -> &IonSchemaReader {
        &self.reader
    }

    /// Loads the schema with the given id, using the cache when possible.
    ///
    /// Imported schemas that were compiled along the way are cached too.
    ///
    /// # Errors
    ///
    /// Returns `IonSchemaError::SchemaNotFound` if no authority knows the id,
    /// `IonSchemaError::InvalidIsl` if the document cannot be read, or any of
    /// the import and reference errors found while compiling.
    pub fn load_schema(&self, id: &str) -> Result<Arc<Schema>, IonSchemaError> {
        let mut imported = Vec::new();
        let schema = self.cache.get_or_put(id, &mut || {
            let document = self.read(id)?;
            let (schema, members) = self.compile_with_imports(&document)?;
            imported = members;
            Ok(Arc::new(schema))
        })?;
        // Offered after the build above is published, so no build ever
        // waits on another one.
        self.offer(imported);
        Ok(schema)
    }

    /// Compiles a schema from text. The result has no id and is not cached.
    pub fn new_schema(&self, text: &str) -> Result<Schema, IonSchemaError> {
        self.new_schema_from_elements(&parse(text)?)
    }

    pub fn new_schema_from_elements(&self, values: &[Element]) -> Result<Schema, IonSchemaError> {
        let document = self.reader.read_schema(values, self.fail_fast).or_throw()?;
        let (schema, members) = self.compile_with_imports(&document)?;
        self.offer(members);
        Ok(schema)
    }

    /// Drops the cached schema for `id`. Schemas that imported it keep the
    /// types they were compiled with.
    pub fn invalidate(&self, id: &str) {
        self.cache.invalidate(id);
    }

    fn read(&self, id: &str) -> Result<SchemaDocument, IonSchemaError> {
        let values = self.fetch(id)?;
        let mut document = self.reader.read_schema(&values, self.fail_fast).or_throw()?;
        document.id = Some(id.to_string());
        Ok(document)
    }

    /// Asks each authority in turn; the first non-empty document wins.
    fn fetch(&self, id: &str) -> Result<Vec<Element>, IonSchemaError> {
        let mut causes = Vec::new();
        for authority in &self.authorities {
            let values = authority
                .elements(id)
                .and_then(|stream| stream.collect::<Result<Vec<_>, _>>());
            match values {
                Ok(values) if !values.is_empty() => return Ok(values),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(id, error = %e, "authority failed to provide schema");
                    causes.push(e.to_string());
                }
            }
        }
        Err(IonSchemaError::SchemaNotFound {
            id: id.to_string(),
            causes,
        })
    }

    fn offer(&self, schemas: Vec<Schema>) {
        for schema in schemas {
            let Some(id) = schema.id.clone() else {
                continue;
            };
            let schema = Arc::new(schema);
            if let Err(e) = self
                .cache
                .get_or_put(&id, &mut || Ok::<_, IonSchemaError>(Arc::clone(&schema)))
            {
                tracing::debug!(id, error = %e, "imported schema was not cached");
            }
        }
    }

    /// Compiles `document` and every uncached schema it reaches. Returns the
    /// compiled document and the imported schemas compiled with it.
    fn compile_with_imports(
        &self,
        document: &SchemaDocument,
    ) -> Result<(Schema, Vec<Schema>), IonSchemaError> {
        let universe = self.gather(document)?;

        // Deepest first. A member's error is wrapped with its import path.
        let mut ids: Vec<&String> = universe
            .pending
            .keys()
            .filter(|id| document.id.as_ref() != Some(*id))
            .collect();
        ids.sort_by_key(|id| Reverse(universe.chains.get(*id).map_or(0, Vec::len)));

        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            let member = &universe.pending[id];
            let schema = self
                .compile(&universe, member)
                .map_err(|e| import_failed(universe.chains.get(id).map_or(&[][..], Vec::as_slice), e))?;
            members.push(schema);
        }
        let schema = self.compile(&universe, document)?;
        Ok((schema, members))
    }

    /// Reads every schema reachable from `root` that is not cached yet.
    fn gather(&self, root: &SchemaDocument) -> Result<Universe, IonSchemaError> {
        let mut universe = Universe::default();
        if let Some(id) = &root.id {
            universe.pending.insert(id.clone(), root.clone());
        }
        let mut queue: Vec<(String, Vec<String>)> = import_ids(root)
            .into_iter()
            .map(|id| (id.clone(), vec![id]))
            .collect();

        while let Some((id, chain)) = queue.pop() {
            if universe.contains(&id) {
                continue;
            }
            if let Some(schema) = self.cache.get(&id) {
                universe.loaded.insert(id, schema);
                continue;
            }
            let document = self.read(&id).map_err(|e| import_failed(&chain, e))?;
            for next in import_ids(&document) {
                let mut next_chain = chain.clone();
                next_chain.push(next.clone());
                queue.push((next, next_chain));
            }
            universe.chains.insert(id.clone(), chain);
            universe.pending.insert(id, document);
        }
        Ok(universe)
    }

    fn compile(
        &self,
        universe: &Universe,
        document: &SchemaDocument,
    ) -> Result<Schema, IonSchemaError> {
        let id = document.id.as_deref();
        let mut declared = BTreeSet::new();
        for definition in document.declared_types() {
            if !declared.insert(definition.name.clone()) {
                return Err(IonSchemaError::DuplicateType {
                    name: definition.name.clone(),
                });
            }
        }

        if document.version == IslVersion::V2_0 {
            match (document.header().is_some(), document.footer().is_some()) {
                (true, false) => {
                    return Err(IonSchemaError::invalid(
                        "a schema with a schema_header must also have a schema_footer",
                    ))
                }
                (false, true) => {
                    return Err(IonSchemaError::invalid(
                        "a schema with a schema_footer must also have a schema_header",
                    ))
                }
                _ => {}
            }
        }

        let mut compiler = Compiler {
            system: self,
            universe,
            id,
            declared,
            imports: BTreeMap::new(),
            in_scope: BTreeMap::new(),
        };
        if let Some(header) = document.header() {
            for import in &header.imports {
                compiler.import(import)?;
            }
        }
        let vocabulary = self.reader.vocabulary(document.version);
        let mut unresolved = BTreeSet::new();
        for definition in document.declared_types() {
            compiler.check_references(vocabulary, &definition.definition, &mut unresolved)?;
        }
        if !unresolved.is_empty() {
            return Err(IonSchemaError::UnresolvedReferences {
                names: unresolved.into_iter().collect(),
            });
        }

        tracing::debug!(
            id = id.unwrap_or("<anonymous>"),
            types = document.declared_types().count(),
            imports = compiler.imports.len(),
            "compiled schema"
        );
        Ok(Schema {
            id: id.map(str::to_string),
            document: document.clone(),
            imports: compiler.imports,
            in_scope: compiler.in_scope,
        })
    }
}

/// Wraps `error` once per schema on the import path that led to it.
fn import_failed(chain: &[String], error: IonSchemaError) -> IonSchemaError {
    chain
        .iter()
        .rev()
        .fold(error, |source, id| IonSchemaError::ImportFailed {
            id: id.clone(),
            source: Box::new(source),
        })
}

/// Ids of every schema `document` imports, in the header or inline.
fn import_ids(document: &SchemaDocument) -> Vec<String> {
    let mut ids: Vec<String> = document
        .header()
        .map(|header| {
            header
                .imports
                .iter()
                .map(|import| import.schema_id().to_string())
                .collect()
        })
        .unwrap_or_default();
    let mut pending: Vec<&TypeDefinition> = document
        .declared_types()
        .map(|t| &t.definition)
        .collect();
    while let Some(definition) = pending.pop() {
        for constraint in &definition.constraints {
            for argument in constraint.type_arguments() {
                match argument {
                    TypeArgument::Import { schema_id, .. } => ids.push(schema_id.clone()),
                    TypeArgument::InlineType { definition, .. } => pending.push(definition),
                    TypeArgument::Reference { .. } => {}
                }
            }
        }
    }
    ids
}

/// The schemas taking part in one load, by id.
#[derive(Default)]
struct Universe {
    /// Read for this load and not compiled yet.
    pending: BTreeMap<String, SchemaDocument>,
    /// Already in the cache.
    loaded: BTreeMap<String, Arc<Schema>>,
    /// Import path from the root to each pending schema.
    chains: BTreeMap<String, Vec<String>>,
}

impl Universe {
    fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id) || self.loaded.contains_key(id)
    }

    fn declared_types(&self, id: &str) -> Vec<&NamedTypeDefinition> {
        if let Some(schema) = self.loaded.get(id) {
            return schema.declared_types().collect();
        }
        self.pending
            .get(id)
            .map(|document| document.declared_types().collect())
            .unwrap_or_default()
    }

    /// Finds the declaration of the type that schema `id` knows as `name`.
    fn origin(&self, id: &str, name: &str) -> Option<Origin<'_>> {
        self.origin_within(id, name, &mut BTreeSet::new())
    }

    fn origin_within<'u>(
        &'u self,
        id: &str,
        name: &str,
        visiting: &mut BTreeSet<(String, String)>,
    ) -> Option<Origin<'u>> {
        let key = (id.to_string(), name.to_string());
        // A name that leads back to itself through a cycle of imports is
        // never declared anywhere.
        if !visiting.insert(key.clone()) {
            return None;
        }
        let found = self.find_origin(id, name, visiting);
        visiting.remove(&key);
        found
    }

    fn find_origin<'u>(
        &'u self,
        id: &str,
        name: &str,
        visiting: &mut BTreeSet<(String, String)>,
    ) -> Option<Origin<'u>> {
        if let Some(schema) = self.loaded.get(id) {
            return schema.origin(name);
        }
        let (id, document) = self.pending.get_key_value(id)?;
        if let Some(definition) = document.declared_types().find(|t| t.name == name) {
            return Some(Origin {
                schema_id: id.as_str(),
                definition,
                transitive: false,
            });
        }
        for import in &document.header()?.imports {
            let found = match import {
                HeaderImport::Wildcard { id } => self
                    .origin_within(id, name, visiting)
                    .filter(|origin| !origin.transitive),
                HeaderImport::Type { id, type_name, .. } if import.local_name() == Some(name) => {
                    self.origin_within(id, type_name, visiting)
                }
                HeaderImport::Type { .. } => None,
            };
            if let Some(origin) = found {
                return Some(Origin {
                    transitive: true,
                    ..origin
                });
            }
        }
        None
    }
}

/// Import and reference checking for one schema.
struct Compiler<'s> {
    system: &'s IonSchemaSystem,
    universe: &'s Universe,
    id: Option<&'s str>,
    declared: BTreeSet<String>,
    imports: BTreeMap<String, SchemaImport>,
    in_scope: BTreeMap<String, ImportedType>,
}

impl<'s> Compiler<'s> {
    fn check_not_self(&self, schema_id: &str) -> Result<(), IonSchemaError> {
        if self.id == Some(schema_id) {
            return Err(IonSchemaError::SelfImport {
                id: schema_id.to_string(),
            });
        }
        Ok(())
    }

    /// Checks that schema `schema_id` makes `type_name` available to
    /// importers.
    fn require_exported(
        &self,
        schema_id: &str,
        type_name: &str,
    ) -> Result<Origin<'s>, IonSchemaError> {
        match self.universe.origin(schema_id, type_name) {
            Some(origin) if !origin.transitive => Ok(origin),
            Some(origin) if self.system.allow_transitive_imports => {
                tracing::warn!(
                    schema = self.id.unwrap_or("<anonymous>"),
                    type_name,
                    via = schema_id,
                    declared_in = origin.schema_id,
                    "type is only visible through a transitive import"
                );
                Ok(origin)
            }
            Some(_) => Err(IonSchemaError::TransitiveImport {
                schema_id: schema_id.to_string(),
                type_name: type_name.to_string(),
            }),
            None => Err(IonSchemaError::TypeNotFound {
                schema_id: schema_id.to_string(),
                type_name: type_name.to_string(),
            }),
        }
    }

    fn bind_local_name(&mut self, name: &str, origin: Origin<'_>) -> Result<(), IonSchemaError> {
        if self.declared.contains(name) {
            return Err(IonSchemaError::DuplicateType {
                name: name.to_string(),
            });
        }
        match self.in_scope.get(name) {
            Some(first)
                if first.schema_id != origin.schema_id
                    || first.definition.name != origin.definition.name =>
            {
                Err(IonSchemaError::DuplicateImport {
                    name: name.to_string(),
                    first: first.schema_id.clone(),
                    second: origin.schema_id.to_string(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.in_scope.insert(
                    name.to_string(),
                    ImportedType {
                        schema_id: origin.schema_id.to_string(),
                        definition: origin.definition.clone(),
                    },
                );
                Ok(())
            }
        }
    }

    fn import(&mut self, import: &HeaderImport) -> Result<(), IonSchemaError> {
        let schema_id = import.schema_id();
        self.check_not_self(schema_id)?;
        match import {
            HeaderImport::Wildcard { .. } => {
                let universe = self.universe;
                for definition in universe.declared_types(schema_id) {
                    let origin = Origin {
                        schema_id,
                        definition,
                        transitive: false,
                    };
                    self.bind_local_name(&definition.name, origin)?;
                }
                self.imports.entry(schema_id.to_string()).or_default().wildcard = true;
            }
            HeaderImport::Type { type_name, .. } => {
                let origin = self.require_exported(schema_id, type_name)?;
                let local = import.local_name().unwrap_or(type_name);
                self.bind_local_name(local, origin)?;
                self.imports
                    .entry(schema_id.to_string())
                    .or_default()
                    .types
                    .insert(local.to_string(), type_name.clone());
            }
        }
        Ok(())
    }

    /// Finds a wildcard-imported schema that can reach `name` through its
    /// own imports.
    fn transitive_source(&self, name: &str) -> Option<String> {
        self.imports
            .iter()
            .filter(|(_, import)| import.wildcard)
            .map(|(id, _)| id)
            .find(|id| matches!(self.universe.origin(id, name), Some(origin) if origin.transitive))
            .cloned()
    }

    fn check_references(
        &mut self,
        vocabulary: &Vocabulary,
        definition: &TypeDefinition,
        unresolved: &mut BTreeSet<String>,
    ) -> Result<(), IonSchemaError> {
        // Nesting is bounded by the reader's depth limit.
        for constraint in &definition.constraints {
            for argument in constraint.type_arguments() {
                self.check_argument(vocabulary, argument, unresolved)?;
            }
        }
        Ok(())
    }

    fn check_argument(
        &mut self,
        vocabulary: &Vocabulary,
        argument: &TypeArgument,
        unresolved: &mut BTreeSet<String>,
    ) -> Result<(), IonSchemaError> {
        match argument {
            TypeArgument::Reference { name, .. } => {
                if vocabulary.is_builtin_type(name)
                    || self.declared.contains(name)
                    || self.in_scope.contains_key(name)
                {
                    return Ok(());
                }
                match self.transitive_source(name) {
                    Some(schema_id) => {
                        let origin = self.require_exported(&schema_id, name)?;
                        self.bind_local_name(name, origin)
                    }
                    None => {
                        unresolved.insert(name.clone());
                        Ok(())
                    }
                }
            }
            TypeArgument::Import {
                schema_id,
                type_name,
                ..
            } => {
                self.check_not_self(schema_id)?;
                self.require_exported(schema_id, type_name)?;
                self.imports.entry(schema_id.clone()).or_default();
                Ok(())
            }
            TypeArgument::InlineType { definition, .. } => {
                self.check_references(vocabulary, definition, unresolved)
            }
        }
    }
}
