//! Schema linting - static analysis of Ion Schema files.
//!
//! Validates `.isl` files for:
//! - Ion text syntax errors
//! - Schema read errors (malformed types, constraints, headers)
//! - Imports and type references that do not resolve
//! - Missing version markers and top-level content the reader ignores

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::authority::FilesystemAuthority;
use crate::element::{parse, Element};
use crate::error::IonSchemaError;
use crate::path::TreePath;
use crate::system::IonSchemaSystem;
use crate::vocabulary::IslVersion;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// Tree path to the issue (e.g., "/2/fields/id")
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(code: &str, file: &Path, path: &TreePath, message: String) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            file: file.to_path_buf(),
            path: path.to_string(),
            message,
        }
    }

    fn warning(code: &str, file: &Path, path: &TreePath, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, file, path, message)
        }
    }
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .isl files. Imports are
/// resolved relative to the directory (or the file's parent directory).
/// If `strict` is true, warnings are treated as errors.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_schema_files(path);
    let base = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(Path::new("."))
    };
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, base);
        total_errors += count(&file_result, Severity::Error);
        total_warnings += count(&file_result, Severity::Warning);
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

fn count(result: &FileResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

/// Lint a single schema file, resolving imports against `base_path`.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let relative = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();
    let diagnostics = check_file(file, base_path);

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: relative,
        status,
        diagnostics,
    }
}

fn check_file(file: &Path, base_path: &Path) -> Vec<Diagnostic> {
    let root = TreePath::root();
    let elements = match std::fs::read_to_string(file)
        .map_err(|source| IonSchemaError::Io {
            path: file.to_path_buf(),
            source,
        })
        .and_then(|content| parse(&content))
    {
        Ok(elements) => elements,
        Err(e) => {
            return vec![Diagnostic::error(
                "E001",
                file,
                &root,
                format!("syntax error: {}", e),
            )]
        }
    };

    let mut diagnostics = Vec::new();
    check_top_level(&elements, file, &mut diagnostics);

    let system = match FilesystemAuthority::new(base_path) {
        Ok(authority) => IonSchemaSystem::builder().with_authority(authority).build(),
        Err(_) => IonSchemaSystem::builder().build(),
    };
    match system.new_schema_from_elements(&elements) {
        Ok(schema) => {
            if schema.declared_types().next().is_none() {
                diagnostics.push(Diagnostic::warning(
                    "W002",
                    file,
                    &root,
                    "schema declares no types".to_string(),
                ));
            }
        }
        Err(IonSchemaError::InvalidIsl { errors }) => {
            for error in errors {
                diagnostics.push(Diagnostic::error("E002", file, &error.path, error.message));
            }
        }
        Err(e) => {
            diagnostics.push(Diagnostic::error("E003", file, &root, e.to_string()));
        }
    }
    diagnostics
}

/// Flags a missing version marker and top-level values that are neither
/// headers, footers, types nor version markers.
fn check_top_level(elements: &[Element], file: &Path, diagnostics: &mut Vec<Diagnostic>) {
    let has_marker = elements
        .iter()
        .filter_map(Element::as_symbol)
        .any(|s| IslVersion::from_version_marker(s).is_some());
    if !has_marker {
        diagnostics.push(Diagnostic::warning(
            "W001",
            file,
            &TreePath::root(),
            "missing version marker; reading as Ion Schema 1.0".to_string(),
        ));
    }

    for (i, element) in elements.iter().enumerate() {
        let is_schema_item = match element.as_symbol() {
            Some(symbol) => IslVersion::is_version_marker_like(symbol),
            None => {
                element.as_struct().is_some()
                    && matches!(
                        element.annotations(),
                        [a] if matches!(a.as_str(), "type" | "schema_header" | "schema_footer")
                    )
            }
        };
        if !is_schema_item {
            diagnostics.push(Diagnostic::warning(
                "W003",
                file,
                &TreePath::root().index(i),
                format!("top-level open content is not part of any type: {}", element),
            ));
        }
    }
}

/// Collect all .isl files in a path (file or directory).
fn collect_schema_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_schema_file(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn is_schema_file(path: &Path) -> bool {
    path.extension().map(|e| e == "isl").unwrap_or(false)
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_schema_file(&path) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lint_text(text: &str) -> FileResult {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.isl");
        std::fs::write(&path, text).unwrap();
        lint_file(&path, dir.path())
    }

    #[test]
    fn lint_valid_schema() {
        let result = lint_text(
            r#"$ion_schema_2_0
            type::{ name: id, type: string, regex: "[a-z]+" }"#,
        );
        assert_eq!(result.status, FileStatus::Ok);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.file, PathBuf::from("test.isl"));
    }

    #[test]
    fn lint_syntax_error() {
        let result = lint_text("$ion_schema_2_0 type::{ name: ");
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "E001");
    }

    #[test]
    fn lint_read_errors_are_located() {
        let result = lint_text(
            "$ion_schema_2_0 type::{ name: a, fields: { x: 5, y: { occurs: -1 } } }",
        );
        assert_eq!(result.status, FileStatus::Error);
        let paths: Vec<&str> = result
            .diagnostics
            .iter()
            .filter(|d| d.code == "E002")
            .map(|d| d.path.as_str())
            .collect();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].starts_with("/1/fields/x"));
        assert!(paths[1].starts_with("/1/fields/y"));
    }

    #[test]
    fn lint_unresolved_reference() {
        let result = lint_text("$ion_schema_2_0 type::{ name: a, type: missing }");
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics[0].code, "E003");
        assert!(result.diagnostics[0].message.contains("missing"));
    }

    #[test]
    fn lint_missing_marker_warning() {
        let result = lint_text("type::{ name: a, type: int }");
        assert_eq!(result.status, FileStatus::Warning);
        assert!(result.diagnostics.iter().any(|d| d.code == "W001"));
    }

    #[test]
    fn lint_open_content_warning() {
        let result = lint_text("$ion_schema_2_0 _foo::{ a: 1 } type::{ name: a }");
        let warning = result
            .diagnostics
            .iter()
            .find(|d| d.code == "W003")
            .unwrap();
        assert_eq!(warning.path, "/1");
    }

    #[test]
    fn lint_resolves_imports_in_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.isl"),
            "$ion_schema_2_0 type::{ name: t, type: int }",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("app.isl"),
            r#"$ion_schema_2_0
            schema_header::{ imports: [{ id: "base.isl", type: t }] }
            type::{ name: u, type: t }
            schema_footer::{}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("broken.isl"),
            r#"$ion_schema_2_0
            schema_header::{ imports: [{ id: "nowhere.isl" }] }
            schema_footer::{}"#,
        )
        .unwrap();

        let result = lint(dir.path(), false);
        assert_eq!(result.files_checked, 3);
        assert_eq!(result.passed, 2);
        assert_eq!(result.failed, 1);
        assert!(!result.is_ok());
    }

    #[test]
    fn lint_strict_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.isl");
        // Schema with warning only (missing version marker)
        std::fs::write(&file_path, "type::{ name: a }").unwrap();

        // Non-strict: warnings don't cause failure
        let result = lint(&file_path, false);
        assert_eq!(result.files_checked, 1);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 0);

        // Strict: warnings cause failure
        let result = lint(&file_path, true);
        assert_eq!(result.passed, 0);
        assert_eq!(result.failed, 1);
    }

    #[test]
    fn lint_ignores_other_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a schema").unwrap();
        let result = lint(dir.path(), false);
        assert_eq!(result.files_checked, 0);
        assert!(result.is_ok());
    }
}
