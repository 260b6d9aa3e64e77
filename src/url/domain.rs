use url::Url;

/// Returns the lowercase host of a URL, if it has one
pub fn site_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether `host` belongs to the site rooted at `root_host`
///
/// A host belongs to the site when it is the root host itself or any
/// subdomain of it. The comparison is case-insensitive.
///
/// # Examples
///
/// ```
/// use sitemapper::url::is_same_site;
///
/// assert!(is_same_site("example.com", "example.com"));
/// assert!(is_same_site("blog.example.com", "example.com"));
/// assert!(!is_same_site("notexample.com", "example.com"));
/// ```
pub fn is_same_site(host: &str, root_host: &str) -> bool {
    if root_host.is_empty() {
        return false;
    }

    let host = host.to_ascii_lowercase();
    let root_host = root_host.to_ascii_lowercase();

    host == root_host
        || (host.len() > root_host.len()
            && host.ends_with(&root_host)
            && host.as_bytes()[host.len() - root_host.len() - 1] == b'.')
}
