//! URI template compilation and matching
//!
//! Resource templates use `{var}` placeholders in otherwise literal URIs,
//! e.g. `github://repos/{owner}/{repo}`. Compilation produces a regex
//! anchored at both ends plus the variable names in order of appearance;
//! matching yields a map from variable name to the percent-decoded value.
//!
//! A variable matches a single segment: it stops at `/`, `?`, `#`, or the
//! end of the URI. Strings without `{` are static URIs and are never
//! compiled.

use std::collections::HashMap;
use std::fmt::Write as _;

use regex::Regex;

/// Error compiling or expanding a URI template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("duplicate template variable '{0}'")]
    DuplicateVariable(String),
    #[error("unterminated '{{' in template '{0}'")]
    UnterminatedVariable(String),
    #[error("empty variable name in template '{0}'")]
    EmptyVariable(String),
    #[error("missing value for template variable '{0}'")]
    MissingVariable(String),
    #[error("invalid template '{template}': {source}")]
    Pattern {
        template: String,
        source: regex::Error,
    },
}

/// A compiled URI template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    template: String,
    pattern: Regex,
    variables: Vec<String>,
}

impl UriTemplate {
    /// Compile a template into an anchored matcher.
    ///
    /// Fails on duplicate variable names, empty `{}` groups, and
    /// unterminated braces.
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        let mut pattern = String::from("^");
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();

        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }

            pattern.push_str(&regex::escape(&literal));
            literal.clear();

            let mut name = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == '}' {
                    closed = true;
                    break;
                }
                name.push(next);
            }
            if !closed {
                return Err(TemplateError::UnterminatedVariable(template.to_string()));
            }
            if name.is_empty() {
                return Err(TemplateError::EmptyVariable(template.to_string()));
            }
            if variables.iter().any(|v| v == &name) {
                return Err(TemplateError::DuplicateVariable(name));
            }
            variables.push(name);

            // One segment: bounded by '/', '?', '#', or end of input.
            pattern.push_str("([^/?#]+)");
        }
        pattern.push_str(&regex::escape(&literal));
        pattern.push('$');

        let pattern = Regex::new(&pattern).map_err(|source| TemplateError::Pattern {
            template: template.to_string(),
            source,
        })?;

        Ok(Self {
            template: template.to_string(),
            pattern,
            variables,
        })
    }

    /// True when the string contains a `{var}` placeholder and therefore
    /// needs compilation; plain strings are static URIs.
    pub fn is_template(s: &str) -> bool {
        s.contains('{')
    }

    /// The original template string.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Variable names in order of appearance.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Match a URI against this template.
    ///
    /// Returns the variable map with percent-decoded values, or `None` when
    /// the URI does not match.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        let caps = self.pattern.captures(uri)?;
        let vars = self
            .variables
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                caps.get(i + 1)
                    .map(|m| (name.clone(), percent_decode(m.as_str())))
            })
            .collect();
        Some(vars)
    }

    /// Render a concrete URI from variable values, percent-encoding each
    /// value. The inverse of [`match_uri`](Self::match_uri) for values
    /// without path separators.
    pub fn expand(&self, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut uri = self.template.clone();
        for name in &self.variables {
            let value = vars
                .get(name)
                .ok_or_else(|| TemplateError::MissingVariable(name.clone()))?;
            uri = uri.replace(&format!("{{{}}}", name), &percent_encode(value));
        }
        Ok(uri)
    }
}

/// Decode `%XX` escapes. Malformed escapes pass through untouched.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).copied().and_then(hex_value),
                bytes.get(i + 2).copied().and_then(hex_value),
            ) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Encode everything outside the RFC 3986 unreserved set.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_classification() {
        assert!(!UriTemplate::is_template("file:///config.json"));
        assert!(UriTemplate::is_template("file:///{path}"));
    }

    #[test]
    fn test_single_variable() {
        let t = UriTemplate::compile("file:///{path}").unwrap();
        assert_eq!(t.variables(), &["path"]);

        let vars = t.match_uri("file:///README.md").unwrap();
        assert_eq!(vars.get("path").map(String::as_str), Some("README.md"));

        // A variable never crosses a path separator.
        assert!(t.match_uri("file:///a/b").is_none());
    }

    #[test]
    fn test_multiple_variables() {
        let t = UriTemplate::compile("github://repos/{owner}/{repo}").unwrap();
        assert_eq!(t.variables(), &["owner", "repo"]);

        let vars = t.match_uri("github://repos/a/b").unwrap();
        assert_eq!(vars.get("owner").map(String::as_str), Some("a"));
        assert_eq!(vars.get("repo").map(String::as_str), Some("b"));

        assert!(t.match_uri("github://repos/a").is_none());
        assert!(t.match_uri("github://repos/a/b/c").is_none());
    }

    #[test]
    fn test_adjacent_variables_with_literal() {
        let t = UriTemplate::compile("api://{version}-{channel}/info").unwrap();
        let vars = t.match_uri("api://v2-beta-stable/info").unwrap();
        // Greedy segment matching puts the split at the last '-'.
        assert_eq!(vars.get("version").map(String::as_str), Some("v2-beta"));
        assert_eq!(vars.get("channel").map(String::as_str), Some("stable"));
    }

    #[test]
    fn test_trailing_slash_is_literal() {
        let t = UriTemplate::compile("app://items/{id}/").unwrap();
        assert!(t.match_uri("app://items/1").is_none());
        assert!(t.match_uri("app://items/1/").is_some());
    }

    #[test]
    fn test_variable_stops_at_query_and_fragment() {
        let t = UriTemplate::compile("web://page/{name}?lang=en").unwrap();
        let vars = t.match_uri("web://page/home?lang=en").unwrap();
        assert_eq!(vars.get("name").map(String::as_str), Some("home"));
        assert!(t.match_uri("web://page/home#top?lang=en").is_none());
    }

    #[test]
    fn test_literal_regex_metacharacters_are_escaped() {
        let t = UriTemplate::compile("file:///{name}.json").unwrap();
        assert!(t.match_uri("file:///data.json").is_some());
        assert!(t.match_uri("file:///dataXjson").is_none());
    }

    #[test]
    fn test_percent_decoding() {
        let t = UriTemplate::compile("file:///{path}").unwrap();
        let vars = t.match_uri("file:///hello%20world").unwrap();
        assert_eq!(vars.get("path").map(String::as_str), Some("hello world"));
    }

    #[test]
    fn test_malformed_escape_passes_through() {
        assert_eq!(percent_decode("a%zz"), "a%zz");
        assert_eq!(percent_decode("a%2"), "a%2");
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let err = UriTemplate::compile("x://{a}/{a}").unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateVariable(name) if name == "a"));
    }

    #[test]
    fn test_unterminated_brace_rejected() {
        assert!(matches!(
            UriTemplate::compile("x://{a"),
            Err(TemplateError::UnterminatedVariable(_))
        ));
    }

    #[test]
    fn test_empty_variable_rejected() {
        assert!(matches!(
            UriTemplate::compile("x://{}"),
            Err(TemplateError::EmptyVariable(_))
        ));
    }

    #[test]
    fn test_expand_match_round_trip() {
        let t = UriTemplate::compile("github://repos/{owner}/{repo}").unwrap();
        let mut vars = HashMap::new();
        vars.insert("owner".to_string(), "rust lang".to_string());
        vars.insert("repo".to_string(), "regex".to_string());

        let uri = t.expand(&vars).unwrap();
        assert_eq!(uri, "github://repos/rust%20lang/regex");
        assert_eq!(t.match_uri(&uri).unwrap(), vars);
    }

    #[test]
    fn test_expand_missing_variable() {
        let t = UriTemplate::compile("x://{a}").unwrap();
        assert!(matches!(
            t.expand(&HashMap::new()),
            Err(TemplateError::MissingVariable(name)) if name == "a"
        ));
    }
}
