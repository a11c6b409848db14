//! Remote path helpers.
//!
//! Remote SFTP paths always use `/` as separator regardless of either OS.
//! Local paths go through `std::path` and are never handled here.

/// Join remote path components using `/`.
pub fn join_remote(base: &str, component: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

/// Strip a single leading `/` from a remote path.
///
/// Some deployments reject absolute paths in listing requests but accept the
/// same path with the leading separator removed. A bare `"/"` is left alone.
pub fn strip_leading_slash(path: &str) -> &str {
    if path.len() > 1 && path.starts_with('/') {
        &path[1..]
    } else {
        path
    }
}

/// Accumulated prefixes of a remote path, left to right.
///
/// `"a/b/c"` yields `["a", "a/b", "a/b/c"]`. Empty components (leading or
/// doubled separators) are skipped, so `"/a//b"` yields `["a", "a/b"]`.
/// Recursive directory creation checks and creates each prefix in this order.
pub fn prefixes(path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    for component in path.split('/') {
        if component.is_empty() {
            continue;
        }
        if current.is_empty() {
            current.push_str(component);
        } else {
            current.push('/');
            current.push_str(component);
        }
        result.push(current.clone());
    }

    result
}
