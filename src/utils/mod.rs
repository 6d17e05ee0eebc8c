//! Project-specific utilities live here.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("slug character pattern is valid"));
static SEPARATOR_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]+").expect("slug separator pattern is valid"));

/// Normalize text into a URL-safe slug.
///
/// Folds to ASCII through NFKD decomposition (accented letters lose their
/// marks, characters with no ASCII form are dropped), lowercases, drops
/// anything that is not a word character, whitespace or a hyphen, collapses
/// whitespace/hyphen runs into one hyphen and trims leading and trailing
/// hyphens and underscores.
///
/// ```
/// use book_outlet::utils::slugify;
///
/// assert_eq!(
///     slugify("Harry Potter 1 - The Philosopher's Stone"),
///     "harry-potter-1-the-philosophers-stone"
/// );
/// ```
pub fn slugify(text: &str) -> String {
    let ascii: String = text.nfkd().filter(char::is_ascii).collect();
    let lowered = ascii.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(&lowered, "");
    let hyphenated = SEPARATOR_RUNS.replace_all(&stripped, "-");
    hyphenated.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Formats a shared log prefix for project logs.
pub fn log_prefix(module: &str) -> String {
    format!("outlet::{module}")
}
