use regex::Regex;
use std::fmt;

use super::RouteError;

/// A compiled route pattern such as `/users/{id}/posts`.
///
/// `{name}` matches one non-empty path segment and is captured under `name`.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    shape: String,
    params: Vec<String>,
    regex: Regex,
}

/// Path parameters captured by a pattern, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

/// Leading slash added, trailing slash removed (except for the root).
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut normalized = String::with_capacity(trimmed.len() + 1);
    normalized.push('/');
    normalized.push_str(trimmed);
    normalized
}

fn parse_segment<'a>(pattern: &str, segment: &'a str) -> Result<Segment<'a>, RouteError> {
    let invalid = |reason: &str| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    match (segment.strip_prefix('{'), segment.contains(['{', '}'])) {
        (Some(rest), _) => {
            let name = rest
                .strip_suffix('}')
                .ok_or_else(|| invalid("unclosed parameter"))?;
            let mut chars = name.chars();
            let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
            if valid {
                Ok(Segment::Param(name))
            } else {
                Err(invalid("parameter names must be identifiers"))
            }
        }
        (None, true) => Err(invalid("parameters must span a whole segment")),
        (None, false) => Ok(Segment::Literal(segment)),
    }
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let source = normalize(pattern);
        let mut regex = String::from("^");
        let mut shape = String::new();
        let mut params: Vec<String> = Vec::new();

        if source == "/" {
            regex.push('/');
            shape.push('/');
        }

        for segment in source.split('/').skip(1).filter(|s| !s.is_empty()) {
            regex.push('/');
            shape.push('/');
            match parse_segment(&source, segment)? {
                Segment::Literal(text) => {
                    regex.push_str(&regex::escape(text));
                    shape.push_str(text);
                }
                Segment::Param(name) => {
                    if params.iter().any(|p| p == name) {
                        return Err(RouteError::InvalidPattern {
                            pattern: source.clone(),
                            reason: format!("parameter `{}` appears twice", name),
                        });
                    }
                    regex.push_str(&format!("(?P<{}>[^/]+)", name));
                    shape.push_str("{}");
                    params.push(name.to_string());
                }
            }
        }
        regex.push('$');

        let regex = Regex::new(&regex).map_err(|e| RouteError::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source,
            shape,
            params,
            regex,
        })
    }

    /// Matches a request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let path = normalize(path);
        let captures = self.regex.captures(&path)?;
        let params = self
            .params
            .iter()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect();
        Some(PathParams(params))
    }

    /// Renders the pattern with `values` substituted for its parameters.
    pub fn render(&self, values: &[(&str, &str)]) -> Option<String> {
        if self.params.is_empty() {
            return Some(self.source.clone());
        }
        let mut rendered = String::new();
        for segment in self.source.split('/').skip(1) {
            rendered.push('/');
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => {
                    let (_, value) = values.iter().find(|(key, _)| *key == name)?;
                    rendered.push_str(value);
                }
                None => rendered.push_str(segment),
            }
        }
        Some(rendered)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The pattern with parameter names erased; two patterns with the same
    /// shape match exactly the same paths.
    pub fn shape(&self) -> &str {
        &self.shape
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.source)
    }
}
