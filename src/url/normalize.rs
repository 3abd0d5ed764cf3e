use crate::UrlError;
use url::Url;

/// Query parameters that never identify a distinct page
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Normalizes a URL into the key used for frontier and visited-set lookups
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject schemes other than http and https
/// 3. Require a host (lowercased by the parser)
/// 4. Remove fragment (everything after #)
/// 5. Remove tracking query parameters, keeping the order of the rest
/// 6. Remove empty query string (trailing ?)
///
/// Paths and remaining query parameters are kept verbatim.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use sumi_trawl::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/list?page=2#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/list?page=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let total = url.query_pairs().count();
        let kept = filter_query_params(&url);

        if kept.is_empty() {
            url.set_query(None);
        } else if kept.len() != total {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

/// Drops tracking parameters while preserving the order of the rest
fn filter_query_params(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
