//! Namespace path naming and validation.
//!
//! Namespaces in the policy control-plane are addressed by absolute,
//! `/`-separated paths. The root namespace is `/` and every other namespace
//! path starts with `/` and never ends with one. The depth of a namespace is
//! the number of separators in its path and is bounded by [`MAX_DEPTH`].
//!
//! Paths are composed with the same normalization rules as a POSIX-style
//! lexical join: separators never repeat, `.` segments vanish, `..` climbs one
//! level, and only the root keeps a trailing separator.

use crate::provisioning::error::ProvisionError;

/// Hierarchy separator of namespace paths.
pub const SEPARATOR: char = '/';

/// Root namespace path.
pub const ROOT: &str = "/";

/// Maximum namespace depth accepted by the control-plane.
pub const MAX_DEPTH: usize = 16;

/// Returns the depth of namespace `path`.
///
/// The root has depth 0, any other namespace has as many levels as separators.
///
/// # Errors
///
/// `InvalidPath` when `path` does not start with the separator, or is not the
/// root and ends with the separator.
pub fn depth(path: &str) -> Result<usize, ProvisionError> {
    if !path.starts_with(SEPARATOR) || (path.len() > 1 && path.ends_with(SEPARATOR)) {
        return Err(ProvisionError::InvalidPath(path.to_string()));
    }
    if path == ROOT {
        return Ok(0);
    }
    Ok(path.matches(SEPARATOR).count())
}

/// Checks that `name` is a single path segment usable as a namespace name.
///
/// # Errors
///
/// `InvalidPath` when `name` is empty, `.`, `..`, or contains the separator.
pub fn validate_segment(name: &str) -> Result<(), ProvisionError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(SEPARATOR) {
        return Err(ProvisionError::InvalidPath(name.to_string()));
    }
    Ok(())
}

/// Joins a parent path and a child segment into a normalized path.
pub fn join(parent: &str, child: &str) -> String {
    let rooted = parent.starts_with(SEPARATOR) || (parent.is_empty() && child.starts_with(SEPARATOR));
    let mut segments: Vec<&str> = Vec::new();
    for segment in parent.split(SEPARATOR).chain(child.split(SEPARATOR)) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push(segment);
                }
            }
            _ => segments.push(segment),
        }
    }

    match (rooted, segments.is_empty()) {
        (true, true) => ROOT.to_string(),
        (true, false) => format!("{ROOT}{}", segments.join("/")),
        (false, true) => ".".to_string(),
        (false, false) => segments.join("/"),
    }
}

/// Returns the parent namespace of `path`. The parent of the root is the root.
pub fn parent(path: &str) -> String {
    let cleaned = join(path, "");
    match cleaned.rfind(SEPARATOR) {
        Some(0) => ROOT.to_string(),
        Some(index) => cleaned[..index].to_string(),
        None => ".".to_string(),
    }
}

/// Returns the last segment of `path`, the root being its own base name.
pub fn base_name(path: &str) -> String {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return if path.is_empty() { ".".to_string() } else { ROOT.to_string() };
    }
    match trimmed.rfind(SEPARATOR) {
        Some(index) => trimmed[index + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Name of the `index`-th capacity namespace fanned out under `base`.
pub fn child_name(base: &str, index: usize) -> String {
    format!("{base}-{index}")
}

/// Full path of the `index`-th capacity namespace of `source_namespace`.
///
/// Capacity namespaces live directly under the source namespace and are named
/// after its last segment, e.g. `/sim/sim-3`.
pub fn child_path(source_namespace: &str, index: usize) -> String {
    join(source_namespace, &child_name(&base_name(source_namespace), index))
}
