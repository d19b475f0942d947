//! Route entry and pattern types.

use axum::http::Method;

use crate::routing::payloads::BodySchema;

/// Whether a route demands a verified session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No token required; the backend applies its own checks.
    Open,
    /// A verified session token is required (subject to strict mode).
    Authenticated,
}

/// How query parameters cross the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPolicy {
    /// No query parameters are forwarded.
    None,
    /// Only the named parameters are forwarded, re-encoded.
    Allow(&'static [&'static str]),
    /// The raw query string crosses verbatim (OAuth-style callbacks).
    Raw,
}

/// What the gateway does with a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// Forward to the backend at the given path template.
    Forward { internal: &'static str },
    /// Serve a fixed body directly, no backend involved.
    Fixed {
        body: &'static str,
        content_type: &'static str,
    },
}

/// One declarative route. Immutable after table construction.
#[derive(Debug)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: Pattern,
    pub access: Access,
    pub action: RouteAction,
    pub body: Option<BodySchema>,
    pub query: QueryPolicy,
    /// Route-specific headers copied to the backend on top of the
    /// standard allow-list.
    pub extra_headers: &'static [&'static str],
    /// Override for the decoded path-parameter length ceiling.
    pub param_limit: Option<usize>,
}

impl RouteEntry {
    pub fn new(method: Method, pattern: &'static str, access: Access) -> Self {
        Self {
            method,
            pattern: Pattern::parse(pattern),
            access,
            action: RouteAction::Forward { internal: pattern },
            body: None,
            query: QueryPolicy::None,
            extra_headers: &[],
            param_limit: None,
        }
    }

    /// A route answered by the gateway itself with a fixed body.
    pub fn fixed(
        method: Method,
        pattern: &'static str,
        body: &'static str,
        content_type: &'static str,
    ) -> Self {
        let mut entry = Self::new(method, pattern, Access::Open);
        entry.action = RouteAction::Fixed { body, content_type };
        entry
    }

    /// Override the internal path template (defaults to the pattern).
    pub fn internal(mut self, template: &'static str) -> Self {
        self.action = RouteAction::Forward { internal: template };
        self
    }

    pub fn body(mut self, schema: BodySchema) -> Self {
        self.body = Some(schema);
        self
    }

    pub fn query(mut self, params: &'static [&'static str]) -> Self {
        self.query = QueryPolicy::Allow(params);
        self
    }

    pub fn raw_query(mut self) -> Self {
        self.query = QueryPolicy::Raw;
        self
    }

    pub fn headers(mut self, names: &'static [&'static str]) -> Self {
        self.extra_headers = names;
        self
    }

    pub fn param_limit(mut self, limit: usize) -> Self {
        self.param_limit = Some(limit);
        self
    }
}

/// A parsed path pattern: literal segments, `:name` placeholders, and an
/// optional trailing `*name` capturing the rest of the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub source: &'static str,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
    Tail(&'static str),
}

impl Pattern {
    pub fn parse(source: &'static str) -> Self {
        let segments = source
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix(':') {
                    Segment::Param(name)
                } else if let Some(name) = s.strip_prefix('*') {
                    Segment::Tail(name)
                } else {
                    Segment::Literal(s)
                }
            })
            .collect::<Vec<_>>();

        debug_assert!(
            !segments[..segments.len().saturating_sub(1)]
                .iter()
                .any(|s| matches!(s, Segment::Tail(_))),
            "tail segment must be last in {source}"
        );

        Self { source, segments }
    }

    /// Match a request path, yielding raw (undecoded) parameter values.
    pub fn matches(&self, path: &str) -> Option<Vec<(&'static str, String)>> {
        let parts: Vec<&str> = path
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let mut params = Vec::new();
        let mut idx = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(idx) != Some(lit) {
                        return None;
                    }
                    idx += 1;
                }
                Segment::Param(name) => {
                    let value = parts.get(idx)?;
                    params.push((*name, (*value).to_string()));
                    idx += 1;
                }
                Segment::Tail(name) => {
                    params.push((*name, parts[idx..].join("/")));
                    idx = parts.len();
                }
            }
        }

        if idx == parts.len() {
            Some(params)
        } else {
            None
        }
    }

    /// Number of literal segments; higher wins on overlap.
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn has_tail(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Tail(_)))
    }
}
