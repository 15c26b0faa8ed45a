//! Virtual and resource path conventions.
//!
//! A virtual path is either empty (the hierarchy root) or begins with `/`;
//! a resource path is the relative form used between the engine and a
//! [`crate::provider::ResourceProvider`] and is never empty except to denote
//! the module universe root.

/// The normalized `/modules` prefix.
pub const MODULES_PREFIX: &str = "/modules";

/// The normalized `/packages` prefix.
pub const PACKAGES_PREFIX: &str = "/packages";

/// Returns `true` if `segment` is a legal path segment: non-empty, not `.`
/// or `..`, no leading or trailing `.`, no `/`, and no `..` substring.
///
/// This is the single predicate both virtual-path segments and resource-path
/// segments are validated against; module names and dotted-package-name
/// components reuse it too, since both are ultimately path segments.
#[must_use]
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.starts_with('.')
        && !segment.ends_with('.')
        && !segment.contains("..")
}

/// Returns `true` if `path` is a valid absolute virtual path: empty (the
/// root) or `/`-prefixed with every segment legal per [`is_valid_segment`].
#[must_use]
pub fn is_valid_absolute(path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    match path.strip_prefix('/') {
        Some(rest) if !rest.is_empty() => rest.split('/').all(is_valid_segment),
        _ => false,
    }
}

/// Returns `true` if `path` is a valid resource path: non-empty, never
/// leading `/`, every segment legal per [`is_valid_segment`].
#[must_use]
pub fn is_valid_resource(path: &str) -> bool {
    !path.is_empty() && !path.starts_with('/') && path.split('/').all(is_valid_segment)
}

/// Identifies whether `path` falls under `prefix`, either as an exact match
/// or a `/`-bounded match (`/modules` and `/modules/foo` both match the
/// `/modules` prefix; `/modulesx` does not).
#[must_use]
pub fn has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path.len() > prefix.len() && path.starts_with(prefix) && {
        path.as_bytes()[prefix.len()] == b'/'
    }
}

/// Joins `prefix` with a (possibly empty) resource-relative tail.
#[must_use]
pub fn resolve(prefix: &str, rel: &str) -> String {
    if rel.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{rel}")
    }
}

/// Strips `prefix` (and the `/` that follows it, if any) from `abs`.
///
/// Returns `None` if `abs` does not fall under `prefix`, per [`has_prefix`].
#[must_use]
pub fn relativize<'a>(prefix: &str, abs: &'a str) -> Option<&'a str> {
    if !has_prefix(abs, prefix) {
        return None;
    }
    if abs == prefix {
        return Some("");
    }
    abs.strip_prefix(prefix)?.strip_prefix('/')
}

/// The final `/`-separated segment of `path`, used for ordering and for
/// preview/base shadowing comparisons. An empty path has no base name.
#[must_use]
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Splits a resource path into its leading module-name segment and the
/// (possibly empty) remainder.
#[must_use]
pub fn split_module(resource_path: &str) -> (&str, &str) {
    match resource_path.split_once('/') {
        Some((module, rest)) => (module, rest),
        None => (resource_path, ""),
    }
}
