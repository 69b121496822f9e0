//! # Path Patterns
//!
//! Compiles `:name` route patterns into `matchit` matchers.
//!
//! Each compiled route owns a single-entry `matchit` router, so routes can be
//! tried one after another in table order (first match wins) while `matchit`
//! does the segment matching and capture extraction.
//!
//! - `/users/:id` is normalized to `/users/{id}`
//! - `/files/*rest` is normalized to the catch-all `/files/{*rest}`
//! - literal segments match ASCII case-insensitively (`/USERS/1` hits `/users/:id`)
//! - captured values keep the request's case and are percent-decoded

use crate::error::{Error, Result};
use matchit::Router as MatchitRouter;

/// A compiled path pattern with its ordered parameter names
#[derive(Clone)]
pub struct PathPattern {
    /// Original pattern (e.g., "/albums/:id/personnel/:personnelId")
    source: String,
    /// Parameter names in capture order
    names: Vec<String>,
    matcher: MatchitRouter<()>,
}

impl PathPattern {
    /// Compile a route pattern
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if `matchit` rejects the
    /// normalized pattern (e.g., an empty parameter name).
    pub fn compile(pattern: &str) -> Result<Self> {
        let (normalized, names) = normalize(pattern);

        let mut matcher = MatchitRouter::new();
        matcher
            .insert(normalized, ())
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            source: pattern.to_string(),
            names,
            matcher,
        })
    }

    /// The pattern this matcher was compiled from
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parameter names, in the order their segments appear
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether a concrete path matches this pattern
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let lowered = trim_trailing_slash(path).to_ascii_lowercase();
        self.matcher.at(&lowered).is_ok()
    }

    /// Extract decoded parameters, paired positionally with `names()`
    ///
    /// Returns `None` if the path does not match.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let path = trim_trailing_slash(path);
        let lowered = path.to_ascii_lowercase();
        let matched = self.matcher.at(&lowered).ok()?;

        let captures = self
            .names
            .iter()
            .zip(matched.params.iter())
            .map(|(name, (_, raw))| {
                let original = original_case(path, &lowered, raw).unwrap_or(raw);
                (name.clone(), decode_segment(original))
            })
            .collect();
        Some(captures)
    }
}

impl std::fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathPattern")
            .field("source", &self.source)
            .field("names", &self.names)
            .finish()
    }
}

/// Convert `:name` / `*name` segments to `matchit` syntax
fn normalize(pattern: &str) -> (String, Vec<String>) {
    let mut names = Vec::new();
    let mut normalized_parts = Vec::new();

    for segment in pattern.split('/') {
        if segment.is_empty() {
            continue;
        }

        if let Some(name) = segment.strip_prefix(':') {
            names.push(name.to_string());
            normalized_parts.push(format!("{{{name}}}"));
        } else if let Some(name) = segment.strip_prefix('*') {
            names.push(name.to_string());
            normalized_parts.push(format!("{{*{name}}}"));
        } else {
            normalized_parts.push(segment.to_ascii_lowercase().replace('{', "{{").replace('}', "}}"));
        }
    }

    let normalized = if normalized_parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", normalized_parts.join("/"))
    };

    (normalized, names)
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// The slice of `path` that `raw` (borrowed from `lowered`) covers
///
/// ASCII lowercasing keeps byte offsets, so the same range in `path` holds
/// the capture with its original case.
fn original_case<'p>(path: &'p str, lowered: &str, raw: &str) -> Option<&'p str> {
    let start = (raw.as_ptr() as usize).checked_sub(lowered.as_ptr() as usize)?;
    path.get(start..start + raw.len())
}

fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), std::borrow::Cow::into_owned)
}
