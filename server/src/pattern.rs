//! Path pattern compiler
//!
//! Patterns are compiled once into segment matchers. `:name` segments bind
//! the corresponding request segment, a trailing `*` swallows the rest of the
//! path, every other segment must match literally.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PatternError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A compiled path pattern such as `/api/users/:id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::NotAbsolute(raw.to_string()));
        }

        let parts = split_path(raw);
        let mut segments = Vec::with_capacity(parts.len());

        for (index, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(PatternError::EmptyParam(raw.to_string()));
                }
                if segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(existing) if existing == name))
                {
                    return Err(PatternError::DuplicateParam {
                        pattern: raw.to_string(),
                        name: name.to_string(),
                    });
                }
                Segment::Param(name.to_string())
            } else if *part == "*" {
                if index + 1 != parts.len() {
                    return Err(PatternError::MisplacedWildcard(raw.to_string()));
                }
                Segment::Wildcard
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the parameters this pattern binds, in order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Match a request path, returning the bound parameters on success.
    ///
    /// The query string and a trailing slash are ignored.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let parts = split_path(path);
        let mut params = PathParams::default();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => return Some(params),
                Segment::Literal(literal) => {
                    if parts.get(index) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(index)?;
                    let decoded = urlencoding::decode(value)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| value.to_string());
                    params.0.insert(name.clone(), decoded);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Named parameters extracted from a matched path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parse a parameter into any `FromStr` type
    pub fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
