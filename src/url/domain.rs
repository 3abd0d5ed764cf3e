use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_trawl::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the network location (`host[:port]`) of a URL
///
/// The scheme is left out: `http://` and `https://` links to the same host
/// compare equal.
pub fn network_location(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Returns the `scheme://host[:port]` origin string of a URL
pub fn origin_string(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    Some(format!("{}://{}{}", url.scheme(), host, port))
}

/// Decides whether `candidate` belongs to the same site as `seed`
///
/// Returns `None` when either side has no resolvable network location, leaving
/// the caller to decide how to degrade.
pub fn same_site(seed: &str, candidate: &str) -> Option<bool> {
    let seed = Url::parse(seed).ok()?;
    let candidate = Url::parse(candidate).ok()?;
    Some(network_location(&seed)? == network_location(&candidate)?)
}
