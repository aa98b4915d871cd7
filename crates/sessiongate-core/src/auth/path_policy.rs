/// Marker that turns an exempt entry into a prefix rule
const WILDCARD: char = '*';

/// Decide whether `path` needs authentication.
///
/// Entries ending in `*` exempt every path sharing the literal prefix.
/// Other entries match when the two differ by at most one trailing slash,
/// so `/api/v1/status` and `/api/v1/status/` are the same endpoint.
/// An empty path or an empty rule set always requires authentication.
pub fn require_auth<S: AsRef<str>>(path: &str, exempt_paths: &[S]) -> bool {
    if path.is_empty() || exempt_paths.is_empty() {
        return true;
    }

    let exempt = exempt_paths.iter().map(AsRef::as_ref).any(|rule| {
        match rule.strip_suffix(WILDCARD) {
            Some(prefix) => path.starts_with(prefix),
            None => {
                rule == path
                    || rule.strip_suffix('/') == Some(path)
                    || path.strip_suffix('/') == Some(rule)
            }
        }
    });

    !exempt
}
