use url::Url;

/// Extracts the authority (`host[:port]`) from a URL
///
/// The host is lowercased and the port is only included when it differs from
/// the scheme's default, so `http://A.test:80/` and `http://a.test/` share an
/// authority. User info is never part of the result.
///
/// # Arguments
///
/// * `url` - The URL to extract the authority from
///
/// # Returns
///
/// * `Some(String)` - The authority
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use snapgraph::url::extract_authority;
///
/// let url = Url::parse("https://Example.com/path").unwrap();
/// assert_eq!(extract_authority(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://example.com:8080/").unwrap();
/// assert_eq!(extract_authority(&url), Some("example.com:8080".to_string()));
/// ```
pub fn extract_authority(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Parses a URL string and extracts its authority in one step
pub fn authority_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(extract_authority)
}
