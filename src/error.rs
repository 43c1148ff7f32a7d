//! Error types for reading, compiling and resolving schemas.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::path::TreePath;

/// Outcome of reading a schema document or one of its parts.
///
/// Reading never stops at the first problem unless asked to, so the error side
/// is a list of every located problem that was found.
pub type ReadResult<T> = Result<T, Vec<ReadError>>;

/// Everything that can go wrong while working with schemas.
#[derive(Debug, Error)]
pub enum IonSchemaError {
    // Parse errors (exit code 2)
    #[error("invalid Ion text at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("invalid schema: {}", join_read_errors(errors))]
    InvalidIsl { errors: Vec<ReadError> },

    /// A model value that is well formed but cannot mean anything, such as an
    /// empty range or a malformed regex.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    // Resolution errors (exit code 2)
    #[error("unable to resolve schema id '{id}'{}", join_causes(causes))]
    SchemaNotFound { id: String, causes: Vec<String> },

    #[error("schema '{schema_id}' doesn't contain a type named '{type_name}'")]
    TypeNotFound { schema_id: String, type_name: String },

    #[error(
        "type '{type_name}' is only visible in schema '{schema_id}' through a transitive import"
    )]
    TransitiveImport { schema_id: String, type_name: String },

    #[error("duplicate imported type name/alias '{name}' (from '{first}' and '{second}')")]
    DuplicateImport {
        name: String,
        first: String,
        second: String,
    },

    #[error("duplicate type name '{name}'")]
    DuplicateType { name: String },

    #[error("schema '{id}' imports itself")]
    SelfImport { id: String },

    #[error("unable to resolve type reference(s): {}", names.join(", "))]
    UnresolvedReferences { names: Vec<String> },

    #[error("failed to load schema '{id}': {source}")]
    ImportFailed {
        id: String,
        #[source]
        source: Box<IonSchemaError>,
    },

    #[error("access denied for schema id '{id}': {reason}")]
    AccessDenied { id: String, reason: String },

    /// Reported to every caller that waited while another thread tried and
    /// failed to build the same schema.
    #[error("schema '{key}' failed to build: {source}")]
    SharedFailure {
        key: String,
        #[source]
        source: Arc<IonSchemaError>,
    },

    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write output: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl IonSchemaError {
    /// Shorthand for a schema-definition error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } | Self::Io { .. } | Self::Output { .. } => 3,
            #[cfg(feature = "remote")]
            Self::Network { .. } => 3,
            Self::ImportFailed { source, .. } => source.exit_code(),
            Self::SharedFailure { source, .. } => source.exit_code(),
            _ => 2,
        }
    }
}

impl From<Vec<ReadError>> for IonSchemaError {
    fn from(errors: Vec<ReadError>) -> Self {
        Self::InvalidIsl { errors }
    }
}

/// Converts the error list of a [`ReadResult`] into a single error.
pub trait ReadResultExt<T> {
    /// Unwraps the success value or collapses all read errors into one
    /// [`IonSchemaError::InvalidIsl`].
    fn or_throw(self) -> Result<T, IonSchemaError>;
}

impl<T> ReadResultExt<T> for ReadResult<T> {
    fn or_throw(self) -> Result<T, IonSchemaError> {
        self.map_err(IonSchemaError::from)
    }
}

/// A problem found while reading, located within its document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReadError {
    /// Location of the offending value.
    pub path: TreePath,
    /// Human-readable error message.
    pub message: String,
}

impl ReadError {
    pub fn new(path: TreePath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn join_read_errors(errors: &[ReadError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_causes(causes: &[String]) -> String {
    if causes.is_empty() {
        String::new()
    } else {
        format!(" ({})", causes.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let err = IonSchemaError::FileNotFound {
            path: PathBuf::from("missing.isl"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = IonSchemaError::SchemaNotFound {
            id: "a.isl".into(),
            causes: vec![],
        };
        assert_eq!(err.exit_code(), 2);

        let err = IonSchemaError::ImportFailed {
            id: "a.isl".into(),
            source: Box::new(IonSchemaError::FileNotFound {
                path: PathBuf::from("b.isl"),
            }),
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn read_error_display() {
        let err = ReadError::new(TreePath::root().field("type").index(2), "not a struct");
        assert_eq!(err.to_string(), "/type/2: not a struct");
    }

    #[test]
    fn or_throw_collects_errors() {
        let result: ReadResult<()> = Err(vec![
            ReadError::new(TreePath::root().index(0), "first"),
            ReadError::new(TreePath::root().index(1), "second"),
        ]);
        let err = result.or_throw().unwrap_err();
        assert_eq!(err.to_string(), "invalid schema: /0: first; /1: second");
    }

    #[test]
    fn not_found_lists_causes() {
        let err = IonSchemaError::SchemaNotFound {
            id: "x.isl".into(),
            causes: vec!["permission denied".into()],
        };
        assert_eq!(
            err.to_string(),
            "unable to resolve schema id 'x.isl' (permission denied)"
        );
    }
}
