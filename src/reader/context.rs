//! Per-read state and the helpers every sub-reader shares.

use crate::element::{Element, IonType, Struct};
use crate::error::{IonSchemaError, ReadError, ReadResult};
use crate::model::UserReservedFields;
use crate::path::TreePath;
use crate::vocabulary::Vocabulary;

/// Why a read step stopped early.
#[derive(Debug)]
pub(crate) enum Halt {
    /// The value is invalid. The nearest [`ReaderContext::catching`] boundary
    /// records the message at its path.
    Invalid(String),
    /// Reading fails fast and the first error is already recorded.
    Abort,
}

pub(crate) type Step<T> = Result<T, Halt>;

impl From<IonSchemaError> for Halt {
    fn from(err: IonSchemaError) -> Self {
        match err {
            IonSchemaError::InvalidSchema { message } => Halt::Invalid(message),
            other => Halt::Invalid(other.to_string()),
        }
    }
}

pub(crate) fn invalid<T>(message: impl Into<String>) -> Step<T> {
    Err(Halt::Invalid(message.into()))
}

pub(crate) fn require(condition: bool, message: impl FnOnce() -> String) -> Step<()> {
    if condition {
        Ok(())
    } else {
        invalid(message())
    }
}

/// `Illegal argument for '<constraint>' constraint; <reason>: <value>`
pub(crate) fn invalid_constraint(constraint: &str, reason: &str, value: &Element) -> String {
    format!(
        "Illegal argument for '{}' constraint; {}: {}",
        constraint, reason, value
    )
}

/// Mutable state of one read call. Never shared between reads.
pub(crate) struct ReaderContext<'v> {
    pub vocabulary: &'v Vocabulary,
    pub fail_fast: bool,
    pub user_reserved_fields: UserReservedFields,
    pub found_header: bool,
    pub found_any_type: bool,
    errors: Vec<ReadError>,
}

impl<'v> ReaderContext<'v> {
    pub fn new(vocabulary: &'v Vocabulary, fail_fast: bool) -> Self {
        Self {
            vocabulary,
            fail_fast,
            user_reserved_fields: UserReservedFields::default(),
            found_header: false,
            found_any_type: false,
            errors: Vec::new(),
        }
    }

    /// Records an error, then aborts when failing fast.
    pub fn report(&mut self, path: &TreePath, message: impl Into<String>) -> Step<()> {
        self.errors.push(ReadError::new(path.clone(), message));
        if self.fail_fast {
            Err(Halt::Abort)
        } else {
            Ok(())
        }
    }

    /// Runs one independent read step. An invalid value is recorded at
    /// `path` and yields `None`, so the caller can carry on with its siblings.
    pub fn catching<T>(
        &mut self,
        path: &TreePath,
        read: impl FnOnce(&mut Self) -> Step<T>,
    ) -> Step<Option<T>> {
        match read(self) {
            Ok(value) => Ok(Some(value)),
            Err(Halt::Invalid(message)) => {
                self.report(path, message)?;
                Ok(None)
            }
            Err(Halt::Abort) => Err(Halt::Abort),
        }
    }

    /// Turns the outcome of a whole read into a [`ReadResult`]. Any recorded
    /// error fails the read even if a value was produced.
    pub fn finish<T>(mut self, path: &TreePath, outcome: Step<T>) -> ReadResult<T> {
        match outcome {
            Ok(value) if self.errors.is_empty() => Ok(value),
            Ok(_) | Err(Halt::Abort) => Err(self.errors),
            Err(Halt::Invalid(message)) => {
                self.errors.push(ReadError::new(path.clone(), message));
                Err(self.errors)
            }
        }
    }

    /// Whether a field name is reserved for future use in this version and
    /// not claimed by the schema author.
    pub fn is_reserved(&self, name: &str, declared: impl FnOnce(&UserReservedFields) -> bool) -> bool {
        self.vocabulary.is_reserved_word(name) && !declared(&self.user_reserved_fields)
    }
}

/// Shape a field's value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expect {
    Symbol,
    /// A string or a symbol.
    Text,
    List,
    Struct,
}

impl Expect {
    fn describe(&self) -> &'static str {
        match self {
            Expect::Symbol => "a non-null symbol",
            Expect::Text => "a non-null string or symbol",
            Expect::List => "a non-null list",
            Expect::Struct => "a non-null struct",
        }
    }

    fn accepts(&self, value: &Element) -> bool {
        if value.is_null() {
            return false;
        }
        match self {
            Expect::Symbol => value.ion_type() == IonType::Symbol,
            Expect::Text => value.as_text().is_some(),
            Expect::List => value.ion_type() == IonType::List,
            Expect::Struct => value.ion_type() == IonType::Struct,
        }
    }
}

/// The single value of an optional field, checked against `expect`.
pub(crate) fn optional_field<'e>(
    container: &'e Struct,
    name: &str,
    expect: Expect,
) -> Step<Option<&'e Element>> {
    let mut values = container.get_all(name).into_iter();
    let Some(value) = values.next() else {
        return Ok(None);
    };
    require(values.next().is_none(), || {
        format!("'{}' must only appear 0 or 1 times", name)
    })?;
    require(expect.accepts(value), || {
        format!("'{}' must be {}; was: {}", name, expect.describe(), value)
    })?;
    Ok(Some(value))
}

pub(crate) fn required_field<'e>(
    container: &'e Struct,
    name: &str,
    expect: Expect,
    owner: &Element,
) -> Step<&'e Element> {
    match optional_field(container, name, expect)? {
        Some(value) => Ok(value),
        None => invalid(format!("missing required field '{}': {}", name, owner)),
    }
}

/// Symbol or string text of a field value already checked by [`Expect`].
pub(crate) fn text_of(value: &Element) -> String {
    value.as_text().unwrap_or_default().to_string()
}

/// Requires a value to carry only annotations from `allowed`.
pub(crate) fn require_annotations_in(value: &Element, allowed: &[&str], message: impl FnOnce() -> String) -> Step<()> {
    require(
        value.annotations().iter().all(|a| allowed.contains(&a.as_str())),
        message,
    )
}

pub(crate) fn require_no_annotations(value: &Element, message: impl FnOnce() -> String) -> Step<()> {
    require(value.annotations().is_empty(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary() -> Vocabulary {
        Vocabulary::isl_2_0()
    }

    #[test]
    fn catching_records_and_continues() {
        let vocabulary = vocabulary();
        let mut ctx = ReaderContext::new(&vocabulary, false);
        let path = TreePath::root().field("a");
        let first: Step<Option<i32>> = ctx.catching(&path, |_| invalid("bad a"));
        assert!(matches!(first, Ok(None)));
        let second = ctx.catching(&path, |_| Ok(2));
        assert!(matches!(second, Ok(Some(2))));

        let errors = ctx.finish(&TreePath::root(), Ok(())).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "/a: bad a");
    }

    #[test]
    fn fail_fast_aborts_after_first_error() {
        let vocabulary = vocabulary();
        let mut ctx = ReaderContext::new(&vocabulary, true);
        let path = TreePath::root();
        let outcome: Step<Option<()>> = ctx.catching(&path, |_| invalid("first"));
        assert!(matches!(outcome, Err(Halt::Abort)));
        let errors = ctx.finish::<()>(&path, Err(Halt::Abort)).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn uncaught_invalid_is_located_at_the_read_root() {
        let vocabulary = vocabulary();
        let ctx = ReaderContext::new(&vocabulary, false);
        let errors = ctx
            .finish::<()>(&TreePath::root().index(2), invalid("nope"))
            .unwrap_err();
        assert_eq!(errors[0].to_string(), "/2: nope");
    }

    #[test]
    fn optional_field_checks_shape_and_count() {
        let s = Struct::new()
            .with_field("a", Element::symbol("x"))
            .with_field("b", Element::string("y"))
            .with_field("b", Element::string("z"));
        assert!(optional_field(&s, "a", Expect::Symbol).unwrap().is_some());
        assert!(optional_field(&s, "missing", Expect::Symbol).unwrap().is_none());
        assert!(matches!(
            optional_field(&s, "b", Expect::Text),
            Err(Halt::Invalid(m)) if m.contains("0 or 1 times")
        ));
        let s = Struct::new().with_field("a", Element::typed_null(IonType::Symbol));
        assert!(optional_field(&s, "a", Expect::Symbol).is_err());
    }
}
