//! Module and package name validation and conversion.
//!
//! Modeled on `red_knot_module_resolver::ModuleName`'s validity-check shape,
//! generalized from Python-identifier rules to the generic segment grammar
//! in [`crate::path`] (our module names, unlike Python's, may themselves
//! contain dots — see scenario fixtures in the spec using names such as
//! `mod.one`).

use crate::path;

/// Returns `true` if `name` is a legal module name: a single path segment.
#[must_use]
pub fn is_valid_module_name(name: &str) -> bool {
    path::is_valid_segment(name)
}

/// Returns `true` if `name` is a legal dotted package name, e.g. `java.lang`.
///
/// Each dot-separated component must itself be a legal path segment; an
/// empty component (as produced by `a..b` or a leading/trailing dot) is
/// rejected.
#[must_use]
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(path::is_valid_segment)
}

/// Converts a dotted package name (`java.lang`) to its path form (`java/lang`).
#[must_use]
pub fn package_to_path(dotted: &str) -> String {
    dotted.replace('.', "/")
}

/// Converts a package path form (`java/lang`) to its dotted name (`java.lang`).
#[must_use]
pub fn path_to_package(path: &str) -> String {
    path.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_names_may_contain_single_dots() {
        assert!(is_valid_module_name("mod.one"));
        assert!(is_valid_module_name("a"));
        assert!(!is_valid_module_name("a.b/c"));
        assert!(!is_valid_module_name(".a"));
    }

    #[test]
    fn package_names_reject_empty_components() {
        assert!(is_valid_package_name("java.lang"));
        assert!(is_valid_package_name("b"));
        assert!(!is_valid_package_name("a..b"));
        assert!(!is_valid_package_name(".foo"));
        assert!(!is_valid_package_name("foo."));
        assert!(!is_valid_package_name(""));
    }

    #[test]
    fn dotted_path_conversion_round_trips() {
        assert_eq!(package_to_path("java.lang"), "java/lang");
        assert_eq!(path_to_package("java/lang"), "java.lang");
    }
}
