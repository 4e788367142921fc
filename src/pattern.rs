//! Path patterns and the segment matcher behind the router.
//!
//! A pattern such as `/users/{id}/posts` is split on `/` into literal and
//! placeholder segments. Matching a request path walks both segment lists in
//! lockstep: literals compare exactly, placeholders capture the request
//! segment verbatim. Placeholders never match an empty segment, so
//! `/users/` does not match `/users/{id}`.
//!
//! Matching works on already split segments, so a caller can percent-decode
//! each one without `%2F` turning into a separator.

use std::fmt;

use crate::error::RegistrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

/// Shape of a pattern: literals by value, placeholders by position only.
/// Two patterns with equal shapes match exactly the same set of paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Shape(Vec<Option<String>>);

impl PathPattern {
    /// Compiles `source`, rejecting anything the matcher could not honour.
    pub(crate) fn parse(source: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidPattern {
            path: source.to_owned(),
            reason: reason.to_owned(),
        };

        let rest = source
            .strip_prefix('/')
            .ok_or_else(|| invalid("pattern must start with '/'"))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for raw in rest.split('/') {
                if raw.is_empty() {
                    return Err(invalid("empty path segment"));
                }
                segments.push(parse_segment(raw).map_err(|reason| invalid(&reason))?);
            }
        }

        let mut names: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Placeholder(name) = segment {
                if names.contains(&name.as_str()) {
                    return Err(invalid(&format!("placeholder {{{name}}} appears twice")));
                }
                names.push(name);
            }
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub(crate) fn shape(&self) -> Shape {
        Shape(
            self.segments
                .iter()
                .map(|segment| match segment {
                    Segment::Literal(value) => Some(value.clone()),
                    Segment::Placeholder(_) => None,
                })
                .collect(),
        )
    }

    /// Number of literal segments; higher wins when several patterns match.
    pub(crate) fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Literal(_)))
            .count()
    }

    /// Matches a request path split with [`split_path`], returning the
    /// captured placeholder values in pattern order.
    pub(crate) fn captures<'p, S>(&self, parts: &'p [S]) -> Option<Vec<(&str, &'p str)>>
    where
        S: AsRef<str>,
    {
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captured = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            let part = part.as_ref();
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Placeholder(_) if part.is_empty() => return None,
                Segment::Placeholder(name) => captured.push((name.as_str(), part)),
            }
        }
        Some(captured)
    }
}

/// Splits a request path into segments. `/` has none; a path without the
/// leading slash matches nothing.
pub(crate) fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        Some(Vec::new())
    } else {
        Some(rest.split('/').collect())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_segment(raw: &str) -> Result<Segment, String> {
    match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(name) => {
            if is_identifier(name) {
                Ok(Segment::Placeholder(name.to_owned()))
            } else {
                Err(format!("invalid placeholder name {name:?}"))
            }
        }
        None if raw.contains(['{', '}']) => Err(format!(
            "segment {raw:?} mixes literal text with a placeholder"
        )),
        None => Ok(Segment::Literal(raw.to_owned())),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
