//! Ion Schema
//!
//! Reading, writing and resolving of Ion Schema Language (ISL 1.0 and 2.0)
//! documents.
//!
//! This library turns the top-level values of a schema document into a typed
//! model ([`model::SchemaDocument`]), writes that model back out, and loads
//! schemas with their imports through pluggable [`authority::Authority`]
//! backends and a thread-safe [`cache::SchemaCache`].
//!
//! # Example
//!
//! ```
//! use ion_schema::element::parse;
//! use ion_schema::model::Constraint;
//! use ion_schema::reader::IonSchemaReader;
//!
//! let values = parse(r#"
//!     $ion_schema_2_0
//!     type::{
//!         name: short_string,
//!         type: string,
//!         codepoint_length: range::[1, 16],
//!     }
//! "#)?;
//!
//! let document = IonSchemaReader::new().read_schema(&values, false).unwrap();
//! let short_string = document.declared_types().next().unwrap();
//! assert_eq!(short_string.name, "short_string");
//! assert!(short_string
//!     .definition
//!     .constraints
//!     .iter()
//!     .any(|c| matches!(c, Constraint::DiscreteRange(_))));
//! # Ok::<(), ion_schema::IonSchemaError>(())
//! ```
//!
//! # Reading modes
//!
//! | `fail_fast` | Behavior |
//! |-------------|----------|
//! | `false` | Keep reading after an error; report every problem found |
//! | `true` | Stop at the first problem; report exactly one error |
//!
//! # Imports
//!
//! By default a schema may only use types it imports directly. A type that an
//! imported schema itself only imports is rejected unless the system is
//! built with `allow_transitive_imports(true)`.

pub mod authority;
pub mod bag;
pub mod cache;
pub mod element;
mod error;
mod linter;
pub mod model;
pub mod path;
pub mod range;
pub mod reader;
pub mod schema;
pub mod system;
pub mod vocabulary;
pub mod writer;

pub use error::{IonSchemaError, ReadError, ReadResult, ReadResultExt};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use reader::IonSchemaReader;
pub use schema::Schema;
pub use system::{IonSchemaSystem, IonSchemaSystemBuilder};
pub use writer::IonSchemaWriter;
