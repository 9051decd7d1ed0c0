use crate::UrlError;
use url::Url;

/// Query parameters that only carry campaign tracking
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Canonicalizes an article URL into the ledger key
///
/// # Canonicalization Steps
///
/// 1. Trim surrounding whitespace and parse; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Require a host (the parser lowercases it and drops default ports)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters (`utm_*`, `fbclid`, ...)
/// 6. Sort remaining query parameters, drop an empty query
///
/// Paths are kept verbatim: trailing slashes and case are significant to
/// the sources this crate talks to.
///
/// # Examples
///
/// ```
/// use press_harvest::url::canonicalize_url;
///
/// let url = canonicalize_url(" https://WWW3.NHK.OR.JP/news/html/k1.html?utm_source=rss#top ").unwrap();
/// assert_eq!(url, "https://www3.nhk.or.jp/news/html/k1.html");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url.to_string())
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
