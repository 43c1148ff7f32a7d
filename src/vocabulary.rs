//! Keywords and reserved words of each Ion Schema Language version.
//!
//! Readers take a [`Vocabulary`] instead of hard-coding these tables, so the
//! reserved-word pattern and keyword sets can be swapped for another version
//! or a custom dialect.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

/// Ion Schema Language version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IslVersion {
    V1_0,
    V2_0,
}

impl IslVersion {
    /// Symbol that opens a schema document of this version.
    pub fn version_marker(&self) -> &'static str {
        match self {
            IslVersion::V1_0 => "$ion_schema_1_0",
            IslVersion::V2_0 => "$ion_schema_2_0",
        }
    }

    pub fn from_version_marker(marker: &str) -> Option<Self> {
        match marker {
            "$ion_schema_1_0" => Some(IslVersion::V1_0),
            "$ion_schema_2_0" => Some(IslVersion::V2_0),
            _ => None,
        }
    }

    /// Whether a symbol looks like a version marker of any version.
    pub fn is_version_marker_like(text: &str) -> bool {
        text.starts_with("$ion_schema_")
            && text["$ion_schema_".len()..]
                .split('_')
                .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
    }
}

impl fmt::Display for IslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IslVersion::V1_0 => f.write_str("ISL 1.0"),
            IslVersion::V2_0 => f.write_str("ISL 2.0"),
        }
    }
}

/// Pattern of field names reserved for future ISL versions.
pub const RESERVED_WORD_PATTERN: &str = r"^(\$ion_schema(_.*)?|[a-z][a-z0-9]*(_[a-z0-9]+)*)$";

const CONSTRAINTS_V1_0: &[&str] = &[
    "all_of",
    "annotations",
    "any_of",
    "byte_length",
    "codepoint_length",
    "container_length",
    "contains",
    "content",
    "element",
    "fields",
    "not",
    "occurs",
    "one_of",
    "ordered_elements",
    "precision",
    "regex",
    "scale",
    "timestamp_offset",
    "timestamp_precision",
    "type",
    "utf8_byte_length",
    "valid_values",
];

const CONSTRAINTS_V2_0: &[&str] = &[
    "all_of",
    "annotations",
    "any_of",
    "byte_length",
    "codepoint_length",
    "container_length",
    "contains",
    "element",
    "exponent",
    "field_names",
    "fields",
    "ieee754_float",
    "not",
    "one_of",
    "ordered_elements",
    "precision",
    "regex",
    "timestamp_offset",
    "timestamp_precision",
    "type",
    "utf8_byte_length",
    "valid_values",
];

const BUILTIN_TYPES: &[&str] = &[
    "blob", "bool", "clob", "decimal", "document", "float", "int", "string", "symbol",
    "timestamp", "list", "sexp", "struct", "lob", "number", "text", "any", "nothing", "$blob",
    "$bool", "$clob", "$decimal", "$float", "$int", "$string", "$symbol", "$timestamp", "$list",
    "$sexp", "$struct", "$null", "$lob", "$number", "$text", "$any",
];

fn set(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// The recognized words of one ISL version.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    version: IslVersion,
    constraints: BTreeSet<String>,
    header_keywords: BTreeSet<String>,
    footer_keywords: BTreeSet<String>,
    import_keywords: BTreeSet<String>,
    top_level_annotations: BTreeSet<String>,
    builtin_types: BTreeSet<String>,
    reserved_words: Option<Regex>,
}

impl Vocabulary {
    pub fn for_version(version: IslVersion) -> Self {
        match version {
            IslVersion::V1_0 => Self::isl_1_0(),
            IslVersion::V2_0 => Self::isl_2_0(),
        }
    }

    /// ISL 1.0 has no reserved words; every unknown field is open content.
    pub fn isl_1_0() -> Self {
        Self {
            version: IslVersion::V1_0,
            constraints: set(CONSTRAINTS_V1_0),
            header_keywords: set(&["imports"]),
            footer_keywords: BTreeSet::new(),
            import_keywords: set(&["id", "type", "as"]),
            top_level_annotations: set(&["schema_header", "schema_footer", "type"]),
            builtin_types: set(BUILTIN_TYPES),
            reserved_words: None,
        }
    }

    pub fn isl_2_0() -> Self {
        Self {
            version: IslVersion::V2_0,
            constraints: set(CONSTRAINTS_V2_0),
            header_keywords: set(&["imports", "user_reserved_fields"]),
            footer_keywords: BTreeSet::new(),
            import_keywords: set(&["id", "type", "as"]),
            top_level_annotations: set(&["schema_header", "schema_footer", "type"]),
            builtin_types: set(BUILTIN_TYPES),
            reserved_words: Regex::new(RESERVED_WORD_PATTERN).ok(),
        }
    }

    /// Replaces the reserved-word pattern; `None` reserves nothing.
    pub fn with_reserved_words(mut self, pattern: Option<Regex>) -> Self {
        self.reserved_words = pattern;
        self
    }

    pub fn version(&self) -> IslVersion {
        self.version
    }

    pub fn is_constraint(&self, name: &str) -> bool {
        self.constraints.contains(name)
    }

    pub fn constraints(&self) -> impl Iterator<Item = &str> {
        self.constraints.iter().map(String::as_str)
    }

    pub fn is_header_keyword(&self, name: &str) -> bool {
        self.header_keywords.contains(name)
    }

    pub fn is_footer_keyword(&self, name: &str) -> bool {
        self.footer_keywords.contains(name)
    }

    pub fn is_import_keyword(&self, name: &str) -> bool {
        self.import_keywords.contains(name)
    }

    /// Constraint names plus `name` and `occurs`.
    pub fn is_type_keyword(&self, name: &str) -> bool {
        self.is_constraint(name) || name == "name" || name == "occurs"
    }

    pub fn is_top_level_annotation(&self, name: &str) -> bool {
        self.top_level_annotations.contains(name)
    }

    pub fn is_builtin_type(&self, name: &str) -> bool {
        self.builtin_types.contains(name)
    }

    /// Whether `name` is reserved for future use unless a schema declares it.
    pub fn is_reserved_word(&self, name: &str) -> bool {
        self.reserved_words
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(name))
    }

    /// Whether this version understands `user_reserved_fields`.
    pub fn supports_user_reserved_fields(&self) -> bool {
        self.is_header_keyword("user_reserved_fields")
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::isl_2_0()
    }
}
