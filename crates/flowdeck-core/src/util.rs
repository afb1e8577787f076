//! Helpers for user-supplied settings such as cloud URLs and tokens.

/// Trimmed value, or `None` when nothing but whitespace was given.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Whether a cloud URL uses a scheme the HTTP store can talk to.
pub fn is_http_url(value: &str) -> bool {
    value
        .split_once("://")
        .is_some_and(|(scheme, rest)| {
            !rest.is_empty()
                && (scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"))
        })
}
