//! Checks `regex` patterns against the portable subset ISL allows and
//! rewrites them for the `regex` crate.
//!
//! The portable subset is a small slice of ECMA 262: no `(?` groups, no
//! lazy or possessive quantifiers, and a fixed set of escapes. Character
//! class escapes are rewritten to explicit ASCII classes because the `regex`
//! crate would otherwise give them Unicode meaning.

use crate::error::IonSchemaError;
use crate::vocabulary::IslVersion;

const DIGIT: &str = "0-9";
const WORD: &str = "0-9A-Za-z_";
const SPACE: &str = " \\f\\n\\r\\t";

struct Scanner<'a> {
    pattern: &'a str,
    chars: Vec<char>,
    /// Index of the next character to read.
    pos: usize,
    out: String,
}

impl<'a> Scanner<'a> {
    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, message: impl std::fmt::Display) -> IonSchemaError {
        IonSchemaError::invalid(format!(
            "{} in regex '{}' at offset {}",
            message,
            self.pattern,
            self.pos.saturating_sub(1)
        ))
    }
}

/// Validates `pattern` and returns the equivalent `regex` crate syntax.
///
/// # Errors
///
/// Returns `IonSchemaError::InvalidSchema` naming the offending offset.
pub fn translate_regex(pattern: &str, version: IslVersion) -> Result<String, IonSchemaError> {
    let mut s = Scanner {
        pattern,
        chars: pattern.chars().collect(),
        pos: 0,
        out: String::with_capacity(pattern.len()),
    };
    while let Some(c) = s.next() {
        match c {
            '[' => {
                s.out.push('[');
                character_class(&mut s, version)?;
            }
            '(' => {
                s.out.push('(');
                if s.peek() == Some('?') {
                    s.next();
                    return Err(s.error("invalid character '?'"));
                }
            }
            '\\' => match s.next() {
                Some(e @ ('.' | '^' | '$' | '|' | '?' | '*' | '+' | '\\' | '[' | ']' | '('
                | ')' | '{' | '}')) => {
                    s.out.push('\\');
                    s.out.push(e);
                }
                Some('d') => s.out.push_str(&format!("[{}]", DIGIT)),
                Some('D') => s.out.push_str(&format!("[^{}]", DIGIT)),
                Some('w') => s.out.push_str(&format!("[{}]", WORD)),
                Some('W') => s.out.push_str(&format!("[^{}]", WORD)),
                Some('s') => s.out.push_str(&format!("[{}]", SPACE)),
                Some('S') => s.out.push_str(&format!("[^{}]", SPACE)),
                Some(e) => return Err(s.error(format!("invalid escape character '{}'", e))),
                None => return Err(s.error("invalid escape character at end of pattern")),
            },
            c => s.out.push(c),
        }
        quantifier(&mut s)?;
    }
    Ok(s.out)
}

/// Reads the rest of a class after its opening `[`.
fn character_class(s: &mut Scanner<'_>, version: IslVersion) -> Result<(), IonSchemaError> {
    while let Some(c) = s.next() {
        match c {
            '&' if s.peek() == Some('&') => {
                return Err(s.error("'&&' is not supported in a character class"))
            }
            '[' => return Err(s.error("'[' must be escaped within a character class")),
            '\\' => {
                let escaped = s.next();
                match escaped {
                    Some(e @ ('[' | ']' | '\\')) => {
                        s.out.push('\\');
                        s.out.push(e);
                    }
                    Some(e @ ('d' | 's' | 'w' | 'D' | 'S' | 'W')) if version == IslVersion::V2_0 => {
                        let class = match e.to_ascii_lowercase() {
                            'd' => DIGIT,
                            'w' => WORD,
                            _ => SPACE,
                        };
                        if e.is_ascii_uppercase() {
                            s.out.push_str(&format!("[^{}]", class));
                        } else {
                            s.out.push_str(class);
                        }
                    }
                    Some(e) => {
                        return Err(s.error(format!("invalid sequence '\\{}' in character class", e)))
                    }
                    None => break,
                }
            }
            ']' => {
                s.out.push(']');
                return Ok(());
            }
            // Set operators of the regex crate
            '~' => s.out.push_str("\\~"),
            c => s.out.push(c),
        }
    }
    Err(s.error("character class missing ']'"))
}

/// Copies a quantifier following an atom, if there is one.
fn quantifier(s: &mut Scanner<'_>) -> Result<(), IonSchemaError> {
    match s.peek() {
        Some(q @ ('?' | '*' | '+')) => {
            s.next();
            s.out.push(q);
        }
        Some('{') => {
            s.next();
            s.out.push('{');
            let mut found_digit = false;
            loop {
                match s.next() {
                    Some(d) if d.is_ascii_digit() => {
                        s.out.push(d);
                        found_digit = true;
                    }
                    Some(',') if found_digit => s.out.push(','),
                    Some(',') => return Err(s.error("range quantifier is missing lower bound")),
                    Some('}') => {
                        s.out.push('}');
                        break;
                    }
                    Some(c) => return Err(s.error(format!("invalid character '{}'", c))),
                    None => return Err(s.error("range quantifier missing '}'")),
                }
            }
        }
        _ => return Ok(()),
    }
    match s.peek() {
        Some(c @ ('?' | '+')) => {
            s.next();
            Err(s.error(format!("invalid character '{}'", c)))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2(pattern: &str) -> Result<String, IonSchemaError> {
        translate_regex(pattern, IslVersion::V2_0)
    }

    #[test]
    fn rewrites_class_escapes_to_ascii() {
        assert_eq!(v2(r"\d+").unwrap(), "[0-9]+");
        assert_eq!(v2(r"\s").unwrap(), r"[ \f\n\r\t]");
        assert_eq!(v2(r"[\w.]").unwrap(), "[0-9A-Za-z_.]");
        assert_eq!(v2(r"[a\D]").unwrap(), "[a[^0-9]]");
        assert_eq!(v2(r"a{2,3}b").unwrap(), "a{2,3}b");
    }

    #[test]
    fn rejects_non_portable_syntax() {
        for (pattern, message) in [
            ("(?i)abc", "invalid character '?'"),
            (r"\Q", "invalid escape character 'Q'"),
            ("[a&&b]", "'&&' is not supported"),
            ("[a[b]]", "'[' must be escaped"),
            ("[abc", "character class missing ']'"),
            ("a{,3}", "range quantifier is missing lower bound"),
            ("a{2", "range quantifier missing '}'"),
            ("a*?", "invalid character '?'"),
            ("a++", "invalid character '+'"),
        ] {
            let err = v2(pattern).unwrap_err().to_string();
            assert!(err.contains(message), "{}: {}", pattern, err);
            assert!(err.contains(&format!("in regex '{}'", pattern)), "{}", err);
        }
    }

    #[test]
    fn class_escapes_in_classes_need_isl_2_0() {
        assert!(translate_regex(r"[\d]", IslVersion::V1_0).is_err());
        assert!(translate_regex(r"\d", IslVersion::V1_0).is_ok());
    }

    #[test]
    fn reports_offset() {
        let err = v2("ab(?x)").unwrap_err().to_string();
        assert!(err.ends_with("at offset 3"), "{}", err);
    }
}
