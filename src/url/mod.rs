//! URL handling module for Press-Harvest
//!
//! The ledger deduplicates by canonical URL, so every link that enters the
//! crawl pipeline (feed entries, listing hrefs, configured exclusions) goes
//! through [`canonicalize_url`] first.

mod canonical;

pub use canonical::canonicalize_url;

use crate::UrlError;
use url::Url;

/// Resolves a possibly relative `href` against the page it was found on
/// and canonicalizes the result
///
/// # Examples
///
/// ```
/// use press_harvest::url::resolve_link;
///
/// let resolved = resolve_link("https://hatena.blog/staff_picks/2024/05", "/entry/1#top").unwrap();
/// assert_eq!(resolved, "https://hatena.blog/entry/1");
/// ```
pub fn resolve_link(base: &str, href: &str) -> Result<String, UrlError> {
    let base = Url::parse(base).map_err(|e| UrlError::Parse(e.to_string()))?;
    let joined = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize_url(joined.as_str())
}
