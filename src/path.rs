//! Locations of values within a schema document.

use std::fmt;

use serde::{Serialize, Serializer};

/// One step from a container to one of its children.
///
/// Index steps order before field steps; indexes compare numerically and field
/// names lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathStep {
    Index(usize),
    Field(String),
}

/// Path from the top of a document down to a single value.
///
/// The first step is the position of a top-level value in the document. Paths
/// order step by step, and a path orders before every path it is a prefix of,
/// so the empty path is the smallest of all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    steps: Vec<PathStep>,
}

impl TreePath {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// Path of the value at `index` within this container.
    pub fn index(&self, index: usize) -> Self {
        self.child(PathStep::Index(index))
    }

    /// Path of the field `name` within this struct.
    pub fn field(&self, name: &str) -> Self {
        self.child(PathStep::Field(name.to_string()))
    }

    fn child(&self, step: PathStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Slash separated, with `~` and `/` in field names escaped as `~0` and `~1`.
impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            match step {
                PathStep::Index(i) => write!(f, "/{}", i)?,
                PathStep::Field(name) => {
                    write!(f, "/{}", name.replace('~', "~0").replace('/', "~1"))?
                }
            }
        }
        Ok(())
    }
}

impl Serialize for TreePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_sorts_before_field() {
        let by_index = TreePath::root().index(1);
        let by_field = TreePath::root().field("1");
        assert!(by_index < by_field);
    }

    #[test]
    fn fields_sort_lexically() {
        assert!(TreePath::root().field("a") < TreePath::root().field("b"));
        assert!(TreePath::root().index(2) < TreePath::root().index(10));
    }

    #[test]
    fn empty_path_sorts_first() {
        let root = TreePath::root();
        assert!(root < TreePath::root().index(0));
        assert!(root < TreePath::root().field(""));
    }

    #[test]
    fn prefix_sorts_before_extension() {
        let parent = TreePath::root().index(3).field("fields");
        let child = parent.field("a");
        assert!(parent < child);
        assert!(child < TreePath::root().index(4));
    }

    #[test]
    fn display_escapes_field_names() {
        let path = TreePath::root().index(0).field("a/b~c");
        assert_eq!(path.to_string(), "/0/a~1b~0c");
        assert_eq!(TreePath::root().to_string(), "/");
    }

    #[test]
    fn serializes_as_string() {
        let path = TreePath::root().index(2).field("type");
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"/2/type\"");
    }
}
