//! In-process sitemap: the visited set and adjacency store of one crawl
//!
//! A key's presence means the URL has been reached. A key is either expanded
//! (fetched or in flight) or a leaf reached at the depth bound. A leaf can
//! still be expanded once by a shallower arrival; [`SiteMap::claim`] is the
//! only fetch dedup mechanism the engine uses.

use crate::protocol::PageLinks;
use crate::url::canonical;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Page {
    links: BTreeSet<String>,
    expanded: bool,
}

/// Concurrency-safe mapping of canonical URL to its outbound links
#[derive(Debug, Default)]
pub struct SiteMap {
    pages: RwLock<HashMap<String, Page>>,
}

impl SiteMap {
    /// Creates an empty sitemap
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Page>> {
        self.pages.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Page>> {
        self.pages.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomically takes the right to expand `url`
    ///
    /// Returns true only for the first caller to claim a given canonical URL;
    /// every later or concurrent caller gets false. A URL previously marked as
    /// a leaf is still claimable, exactly once.
    pub fn claim(&self, url: &str) -> bool {
        let mut pages = self.write();
        let page = pages.entry(canonical(url)).or_default();
        if page.expanded {
            return false;
        }
        page.expanded = true;
        true
    }

    /// Records `url` as reached at the depth bound without expanding it
    ///
    /// Returns true if the URL was not known before. A leaf does not block a
    /// later [`claim`](Self::claim).
    pub fn mark_leaf(&self, url: &str) -> bool {
        let mut pages = self.write();
        match pages.entry(canonical(url)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Page::default());
                true
            }
        }
    }

    /// Merges `links` into the outbound set of `url`
    ///
    /// Idempotent. Links are stored in canonical form. Recording links for a
    /// URL claims it.
    pub fn record_links<S: AsRef<str>>(&self, url: &str, links: &[S]) {
        let mut pages = self.write();
        let page = pages.entry(canonical(url)).or_default();
        page.expanded = true;
        page.links.extend(links.iter().map(|link| canonical(link.as_ref())));
    }

    /// Returns true if `url` has been reached, as a leaf or expanded
    pub fn contains(&self, url: &str) -> bool {
        self.read().contains_key(&canonical(url))
    }

    /// Returns true if `url` has been claimed for expansion
    pub fn is_expanded(&self, url: &str) -> bool {
        self.read()
            .get(&canonical(url))
            .map(|page| page.expanded)
            .unwrap_or(false)
    }

    /// Returns the sorted outbound links of `url`, if it has been reached
    pub fn links(&self, url: &str) -> Option<Vec<String>> {
        self.read()
            .get(&canonical(url))
            .map(|page| page.links.iter().cloned().collect())
    }

    /// Number of reached URLs
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns every reached URL with its lexicographically sorted links
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.read()
            .iter()
            .map(|(url, page)| (url.clone(), page.links.iter().cloned().collect()))
            .collect()
    }

    /// Converts the snapshot into the wire result list, sorted by URL
    pub fn to_results(&self) -> Vec<PageLinks> {
        self.snapshot()
            .into_iter()
            .map(|(url, links)| PageLinks { url, links })
            .collect()
    }
}
