use super::domain::{is_same_site, site_host};
use std::collections::HashSet;
use url::{ParseError, Url};

/// Returns the canonical form of an absolute URL: a single trailing slash removed
///
/// This is the dedup key used by the sitemap and by the durable store, so
/// `https://example.com/a` and `https://example.com/a/` are the same page.
pub fn canonical(url: &str) -> String {
    url.strip_suffix('/').unwrap_or(url).to_string()
}

/// Resolves one raw href into an absolute, canonical, same-site URL
///
/// # Resolution Rules
///
/// Applied in order; the first matching rule decides.
///
/// 1. Unparseable href (including control characters) → discarded
/// 2. Scheme other than http/https → discarded
/// 3. No host and an empty or `/` path (self/root reference) → discarded
/// 4. No host, path starts with `/` → joined to the root's scheme and host
/// 5. No host, parent path ends with `/` → appended to the parent path
/// 6. No host, otherwise → appended to the parent's containing directory
/// 7. Host is the root host or a subdomain of it → kept, query and fragment dropped
/// 8. Any other host → discarded
///
/// Scheme-relative hrefs (`//host/path`) take the root's scheme and then
/// follow rules 7 and 8.
///
/// # Arguments
///
/// * `href` - The raw attribute value
/// * `root` - The site root the crawl started from
/// * `parent` - The page the href was found on
///
/// # Examples
///
/// ```
/// use sitemapper::url::normalize_link;
/// use url::Url;
///
/// let root = Url::parse("https://h").unwrap();
/// let parent = Url::parse("https://h/a/b.html").unwrap();
/// assert_eq!(
///     normalize_link("img/x.html", &root, &parent),
///     Some("https://h/a/img/x.html".to_string())
/// );
/// ```
pub fn normalize_link(href: &str, root: &Url, parent: &Url) -> Option<String> {
    if href.chars().any(char::is_control) {
        return None;
    }

    match Url::parse(href) {
        Ok(url) => keep_same_site(url, root),
        Err(ParseError::RelativeUrlWithoutBase) if href.starts_with("//") => {
            let url = Url::parse(&format!("{}:{}", root.scheme(), href)).ok()?;
            keep_same_site(url, root)
        }
        Err(ParseError::RelativeUrlWithoutBase) => resolve_relative(href, root, parent),
        Err(_) => None,
    }
}

/// Normalizes every href found on `parent`
///
/// Returns the accepted links in first-seen order with duplicates removed.
pub fn normalize_links<S: AsRef<str>>(hrefs: &[S], root: &Url, parent: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    hrefs
        .iter()
        .filter_map(|href| normalize_link(href.as_ref(), root, parent))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Rules 2, 7 and 8 for hrefs that carry their own host
fn keep_same_site(mut url: Url, root: &Url) -> Option<String> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = site_host(&url)?;
    let root_host = site_host(root)?;
    if !is_same_site(&host, &root_host) {
        return None;
    }

    url.set_query(None);
    url.set_fragment(None);
    Some(canonical(url.as_str()))
}

/// Rules 3 to 6 for host-less hrefs
fn resolve_relative(href: &str, root: &Url, parent: &Url) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() || path == "/" {
        return None;
    }

    let (mut url, joined) = if path.starts_with('/') {
        (root.clone(), path.to_string())
    } else {
        let parent_path = parent.path();
        let directory = match parent_path.rfind('/') {
            Some(idx) => &parent_path[..=idx],
            None => "/",
        };
        (parent.clone(), format!("{}{}", directory, path))
    };

    url.set_path(&clean_path(&joined));
    url.set_query(None);
    url.set_fragment(None);
    Some(canonical(url.as_str()))
}

/// Removes empty, `.` and `..` segments from a joined path
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}
