//! Entity-tag freshness evaluation for conditional GET/HEAD

/// Whether the client's cached copy, described by `If-None-Match`,
/// still matches `current_etag`
///
/// Comparison is weak: `W/"x"` and `"x"` both match a server tag `"x"`.
/// Unparseable candidates never match.
pub fn is_fresh(if_none_match: Option<&str>, current_etag: &str) -> bool {
    let Some(header) = if_none_match else {
        return false;
    };

    let current = unwrap_tag(current_etag);

    header.split(',').map(str::trim).any(|candidate| {
        if candidate == "*" {
            return true;
        }
        let candidate = unwrap_tag(candidate);
        !candidate.is_empty() && candidate == current
    })
}

/// Strip an optional weak prefix and surrounding quotes
fn unwrap_tag(tag: &str) -> &str {
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(tag)
}
