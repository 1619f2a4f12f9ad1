//! Route pattern compilation and matching.

use std::sync::Arc;

use regex::Regex;
use smallvec::SmallVec;

use crate::error::Error;

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 named segments; SmallVec keeps the hot path on the
/// stack for the common case.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Named captures extracted from a matched path, in pattern order.
///
/// A capture is `None` when the segment was empty or omitted; an empty
/// capture never surfaces as an empty string.
pub type PathParams = SmallVec<[(Arc<str>, Option<String>); MAX_INLINE_PARAMS]>;

/// Look up a parameter by name. Last write wins for duplicate names.
#[must_use]
pub fn param<'a>(params: &'a PathParams, name: &str) -> Option<&'a str> {
    params
        .iter()
        .rfind(|(k, _)| k.as_ref() == name)
        .and_then(|(_, v)| v.as_deref())
}

/// A compiled path template with named segments.
///
/// `/users/:id` matches `/users/42` binding `id = "42"`. A trailing named
/// segment is optional, so the normalized `/users` still matches with the
/// capture absent.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
    params: Vec<Arc<str>>,
}

impl PathPattern {
    /// Compile a template. Fails only on a malformed pattern, which is a
    /// configuration error at registration time.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let raw = normalize(pattern);

        if raw == "/" {
            let regex = Regex::new("^/$")
                .map_err(|e| Error::configuration(format!("invalid route pattern '/': {e}")))?;
            return Ok(Self {
                raw,
                regex,
                params: Vec::new(),
            });
        }

        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut source = String::with_capacity(raw.len() + 8);
        source.push('^');
        let mut params: Vec<Arc<str>> = Vec::new();

        for (index, segment) in segments.iter().enumerate() {
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(Error::configuration(format!(
                        "invalid route pattern '{raw}': unnamed segment"
                    )));
                }
                params.push(Arc::from(name));
                if index == segments.len() - 1 {
                    source.push_str("(?:/([^/]*))?");
                } else {
                    source.push_str("/([^/]*)");
                }
            } else {
                source.push('/');
                source.push_str(&regex::escape(segment));
            }
        }
        source.push('$');

        let regex = Regex::new(&source)
            .map_err(|e| Error::configuration(format!("invalid route pattern '{raw}': {e}")))?;
        Ok(Self { raw, regex, params })
    }

    /// The normalized template this pattern was compiled from.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Test without extracting captures.
    #[must_use]
    pub fn test(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a path, binding named captures. Empty captures normalize to
    /// absent rather than empty string.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;
        let mut params = PathParams::new();
        for (index, name) in self.params.iter().enumerate() {
            let value = captures
                .get(index + 1)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            params.push((Arc::clone(name), value));
        }
        Some(params)
    }
}

/// Leading slash enforced, trailing slash stripped except root.
fn normalize(pattern: &str) -> String {
    let with_slash = if pattern.starts_with('/') {
        pattern.to_string()
    } else {
        format!("/{pattern}")
    };
    if with_slash.len() > 1 && with_slash.ends_with('/') {
        with_slash.trim_end_matches('/').to_string()
    } else {
        with_slash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_exactly() {
        let pattern = PathPattern::compile("/users").expect("compile");
        assert!(pattern.test("/users"));
        assert!(!pattern.test("/users/42"));
        assert!(!pattern.test("/user"));
    }

    #[test]
    fn root_pattern() {
        let pattern = PathPattern::compile("/").expect("compile");
        assert!(pattern.test("/"));
        assert!(!pattern.test("/x"));
    }

    #[test]
    fn named_segment_binds_value() {
        let pattern = PathPattern::compile("/users/:id").expect("compile");
        let params = pattern.matches("/users/42").expect("match");
        assert_eq!(param(&params, "id"), Some("42"));
    }

    #[test]
    fn missing_trailing_segment_is_absent() {
        let pattern = PathPattern::compile("/users/:id").expect("compile");
        // "/users/" normalizes to "/users" before matching.
        let params = pattern.matches("/users").expect("match");
        assert_eq!(param(&params, "id"), None);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn empty_interior_segment_is_absent() {
        let pattern = PathPattern::compile("/users/:id/posts").expect("compile");
        let params = pattern.matches("/users//posts").expect("match");
        assert_eq!(param(&params, "id"), None);
    }

    #[test]
    fn multiple_params_bind_in_order() {
        let pattern = PathPattern::compile("/users/:user/posts/:post").expect("compile");
        let params = pattern.matches("/users/7/posts/99").expect("match");
        assert_eq!(param(&params, "user"), Some("7"));
        assert_eq!(param(&params, "post"), Some("99"));
    }

    #[test]
    fn pattern_without_leading_slash_is_normalized() {
        let pattern = PathPattern::compile("rooms/:id").expect("compile");
        assert_eq!(pattern.raw(), "/rooms/:id");
        assert!(pattern.test("/rooms/3"));
    }

    #[test]
    fn literal_dots_are_escaped() {
        let pattern = PathPattern::compile("/feed.xml").expect("compile");
        assert!(pattern.test("/feed.xml"));
        assert!(!pattern.test("/feedXxml"));
    }

    #[test]
    fn unnamed_segment_is_rejected() {
        assert!(PathPattern::compile("/users/:").is_err());
    }
}
