/// Prefixes that route to the same table, longest first
const PREFIXES: [&str; 3] = ["/v1/api", "/api", "/v1"];

/// Canonical route path for a raw request path
///
/// Strips one of `/v1/api`, `/api` or `/v1` when it is followed by a path
/// segment boundary; a bare prefix becomes `/`. A path that would still carry
/// a prefix after stripping (`/v1/v1/models`) is left alone, so normalizing
/// twice gives the same result as normalizing once.
pub fn normalize_path(raw: &str) -> String {
    let path = raw.split_once('?').map_or(raw, |(path, _)| path);

    match strip_prefix(path) {
        Some("") => "/".to_owned(),
        Some(rest) if strip_prefix(rest).is_none() => rest.to_owned(),
        _ => path.to_owned(),
    }
}

fn strip_prefix(path: &str) -> Option<&str> {
    PREFIXES.iter().find_map(|prefix| {
        path.strip_prefix(prefix)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}
