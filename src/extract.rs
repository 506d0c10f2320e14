use std::sync::LazyLock;

use regex::Regex;

/// `http(s)://` followed by any run of non-whitespace ending in `.webm`.
static WEBM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+\.webm").expect("webm url pattern is valid"));

/// Find every `.webm` URL in `text`, left to right, without overlaps.
///
/// This is a substring match, not URL validation: anything shaped like a link
/// is handed on and a bad one fails later at download time.
pub fn extract_urls(text: &str) -> Vec<&str> {
    WEBM_URL.find_iter(text).map(|m| m.as_str()).collect()
}
