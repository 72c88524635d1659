//! URL pattern matching.
//!
//! Three pattern kinds with different origin scoping:
//!
//! - **Path templates** (`/users/:id`, `/api/*`) match the request path on
//!   any origin.
//! - **Full-URL templates** (`https://api.example.com/users/:id`) require
//!   the request hostname to equal the pattern hostname, then match the
//!   path with the same template rules.
//! - **Regex patterns** search the full request URL; any substring match
//!   counts.
//!
//! Template syntax: `:name` (one segment), `:name?` (optional), `:name+`
//! (one or more segments), `:name*` (zero or more), `:name(\d+)` (custom
//! pattern), `(...)` (unnamed custom group) and bare `*` (anything).
//! Matching is case-insensitive and tolerates a trailing slash. Query
//! strings and fragments are never part of the matched path.

use percent_encoding::percent_decode_str;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use thiserror::Error;

use scenarist_core::config::schema::UrlPattern;

use super::context::parse_request_url;

/// Regex size limit for compiled templates.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Default pattern for a single path segment.
const SEGMENT_PATTERN: &str = "[^/]+?";

/// Reasons a URL pattern fails to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlPatternError {
    /// `:` not followed by a parameter name
    #[error("missing parameter name at offset {0}")]
    MissingName(usize),

    /// `(` without a matching `)`
    #[error("unbalanced group starting at offset {0}")]
    UnbalancedGroup(usize),

    /// `()` with nothing inside
    #[error("empty group at offset {0}")]
    EmptyGroup(usize),

    /// The same parameter name appears twice
    #[error("duplicate parameter ':{0}'")]
    DuplicateParam(String),

    /// Full-URL pattern without a hostname
    #[error("pattern '{0}' has no hostname")]
    MissingHost(String),

    /// The generated or supplied regex did not compile
    #[error("invalid regex: {0}")]
    Regex(String),
}

// ============================================================================
// Path Templates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    One,
    Optional,
    OneOrMore,
    ZeroOrMore,
}

#[derive(Debug, Clone)]
struct ParamSpec {
    name: String,
    repeat: bool,
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    regex: Regex,
    params: Vec<ParamSpec>,
}

impl PathTemplate {
    /// Compiles a path template.
    ///
    /// # Errors
    ///
    /// Returns a [`UrlPatternError`] for malformed parameter syntax or an
    /// invalid custom pattern.
    pub fn compile(template: &str) -> Result<Self, UrlPatternError> {
        let mut builder = TemplateBuilder::default();
        builder.parse(template)?;
        let source = builder.finish();
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| UrlPatternError::Regex(e.to_string()))?;
        Ok(Self {
            regex,
            params: builder.params,
        })
    }

    /// Matches a request path, returning decoded parameters.
    ///
    /// Repeating parameters (`+`, `*`) yield arrays of segments; optional
    /// parameters that did not participate are omitted.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Map<String, Value>> {
        let captures = self.regex.captures(path)?;
        let mut params = Map::new();
        for (i, spec) in self.params.iter().enumerate() {
            let Some(raw) = captures.name(&group_name(i)) else {
                continue;
            };
            let value = if spec.repeat {
                Value::Array(
                    raw.as_str()
                        .split('/')
                        .filter(|s| !s.is_empty())
                        .map(|s| Value::String(decode(s)))
                        .collect(),
                )
            } else {
                Value::String(decode(raw.as_str()))
            };
            params.insert(spec.name.clone(), value);
        }
        Some(params)
    }
}

fn group_name(index: usize) -> String {
    format!("p{index}")
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Incremental template → regex translation.
#[derive(Default)]
struct TemplateBuilder {
    source: String,
    literal: String,
    params: Vec<ParamSpec>,
}

impl TemplateBuilder {
    fn parse(&mut self, template: &str) -> Result<(), UrlPatternError> {
        let chars: Vec<char> = template.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    if let Some(&next) = chars.get(i + 1) {
                        self.literal.push(next);
                        i += 2;
                    } else {
                        self.literal.push('\\');
                        i += 1;
                    }
                }
                ':' => {
                    let start = i;
                    i += 1;
                    let name_start = i;
                    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    if i == name_start {
                        return Err(UrlPatternError::MissingName(start));
                    }
                    let name: String = chars[name_start..i].iter().collect();
                    let pattern = if chars.get(i) == Some(&'(') {
                        let (inner, next) = read_group(&chars, i)?;
                        i = next;
                        Some(inner)
                    } else {
                        None
                    };
                    let modifier = read_modifier(&chars, &mut i);
                    self.param(name, pattern, modifier)?;
                }
                '(' => {
                    let (inner, next) = read_group(&chars, i)?;
                    i = next;
                    let modifier = read_modifier(&chars, &mut i);
                    let name = self.params.len().to_string();
                    self.param(name, Some(inner), modifier)?;
                }
                '*' => {
                    i += 1;
                    let name = self.params.len().to_string();
                    self.param(name, Some(".*".to_string()), Modifier::One)?;
                }
                c => {
                    self.literal.push(c);
                    i += 1;
                }
            }
        }
        Ok(())
    }

    fn param(
        &mut self,
        name: String,
        pattern: Option<String>,
        modifier: Modifier,
    ) -> Result<(), UrlPatternError> {
        if self.params.iter().any(|p| p.name == name) {
            return Err(UrlPatternError::DuplicateParam(name));
        }

        let prefix = if self.literal.ends_with('/') {
            self.literal.pop();
            "/"
        } else {
            ""
        };
        self.flush_literal();

        let inner = pattern.unwrap_or_else(|| SEGMENT_PATTERN.to_string());
        let group = group_name(self.params.len());
        let repeat = matches!(modifier, Modifier::OneOrMore | Modifier::ZeroOrMore);
        let capture = if repeat {
            format!("(?P<{group}>(?:{inner})(?:/(?:{inner}))*)")
        } else {
            format!("(?P<{group}>{inner})")
        };
        match modifier {
            Modifier::One | Modifier::OneOrMore => {
                self.source.push_str(prefix);
                self.source.push_str(&capture);
            }
            Modifier::Optional | Modifier::ZeroOrMore => {
                self.source.push_str("(?:");
                self.source.push_str(prefix);
                self.source.push_str(&capture);
                self.source.push_str(")?");
            }
        }
        self.params.push(ParamSpec { name, repeat });
        Ok(())
    }

    fn flush_literal(&mut self) {
        self.source.push_str(&regex::escape(&self.literal));
        self.literal.clear();
    }

    fn finish(&mut self) -> String {
        if self.literal.len() > 1 && self.literal.ends_with('/') {
            self.literal.pop();
        }
        self.flush_literal();
        let body = std::mem::take(&mut self.source);
        if body.ends_with('/') {
            format!("^{body}$")
        } else {
            format!("^{body}/?$")
        }
    }
}

/// Reads a balanced `(...)` group starting at `start`; returns its inner
/// text and the index after the closing paren.
fn read_group(chars: &[char], start: usize) -> Result<(String, usize), UrlPatternError> {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let inner: String = chars[start + 1..i].iter().collect();
                    if inner.is_empty() {
                        return Err(UrlPatternError::EmptyGroup(start));
                    }
                    return Ok((inner, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(UrlPatternError::UnbalancedGroup(start))
}

fn read_modifier(chars: &[char], i: &mut usize) -> Modifier {
    let modifier = match chars.get(*i) {
        Some('?') => Modifier::Optional,
        Some('+') => Modifier::OneOrMore,
        Some('*') => Modifier::ZeroOrMore,
        _ => return Modifier::One,
    };
    *i += 1;
    modifier
}

// ============================================================================
// URL Matcher
// ============================================================================

/// A compiled mock URL pattern.
#[derive(Debug, Clone)]
pub enum UrlMatcher {
    /// Origin-agnostic path template
    Path(PathTemplate),
    /// Hostname-scoped template
    Host {
        /// Lower-case hostname the request must carry
        host: String,
        /// Template for the path below the host
        path: PathTemplate,
    },
    /// Substring regex over the full URL
    Regex(Regex),
}

impl UrlMatcher {
    /// Compiles a URL pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`UrlPatternError`] if the template or regex is invalid.
    pub fn compile(pattern: &UrlPattern) -> Result<Self, UrlPatternError> {
        match pattern {
            UrlPattern::Regex(re) => re.compile().map(Self::Regex).map_err(UrlPatternError::Regex),
            UrlPattern::Template(template) if pattern.is_full_url() => {
                let (host, path) = split_full_url(template)?;
                Ok(Self::Host {
                    host,
                    path: PathTemplate::compile(path)?,
                })
            }
            UrlPattern::Template(template) => Ok(Self::Path(PathTemplate::compile(template)?)),
        }
    }

    /// Matches a request URL, returning extracted path parameters.
    ///
    /// Regex patterns expose their named capture groups as parameters.
    #[must_use]
    pub fn match_url(&self, url: &str) -> Option<Map<String, Value>> {
        match self {
            Self::Path(template) => {
                let parsed = parse_request_url(url)?;
                template.match_path(parsed.path())
            }
            Self::Host { host, path } => {
                let parsed = parse_request_url(url)?;
                if parsed.host_str()? != host {
                    return None;
                }
                path.match_path(parsed.path())
            }
            Self::Regex(regex) => {
                let captures = regex.captures(url)?;
                let mut params = Map::new();
                for name in regex.capture_names().flatten() {
                    if let Some(m) = captures.name(name) {
                        params.insert(name.to_string(), Value::String(m.as_str().to_string()));
                    }
                }
                Some(params)
            }
        }
    }
}

/// Splits `scheme://[user@]host[:port]/path` into a lower-case hostname
/// and the path template.
fn split_full_url(template: &str) -> Result<(String, &str), UrlPatternError> {
    let missing = || UrlPatternError::MissingHost(template.to_string());
    let (_, rest) = template.split_once("://").ok_or_else(missing)?;
    let (authority, path) = rest
        .find('/')
        .map_or((rest, "/"), |i| (&rest[..i], &rest[i..]));
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = if host.starts_with('[') {
        host.find(']').map_or(host, |end| &host[..=end])
    } else {
        host.split(':').next().unwrap_or_default()
    };
    if host.is_empty() {
        return Err(missing());
    }
    Ok((host.to_ascii_lowercase(), path))
}
