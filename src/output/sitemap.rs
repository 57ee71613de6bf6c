use super::PageResult;
use serde::Serialize;
use std::collections::HashMap;

/// Aggregate counts over every page in a [`SiteMap`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SiteMapStatistics {
    pub total_pages: usize,
    pub total_links: usize,
    pub total_forms: usize,
    pub total_endpoints: usize,
}

/// Registry of crawled pages keyed by normalized URL
///
/// Keeps insertion order for output and a parent → children index so
/// `children` is a lookup rather than a scan.
#[derive(Debug, Default)]
pub struct SiteMap {
    pages: HashMap<String, PageResult>,
    order: Vec<String>,
    children: HashMap<String, Vec<String>>,
}

impl SiteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page, replacing any earlier page with the same URL
    pub fn add(&mut self, page: PageResult) {
        let url = page.url.clone();

        if let Some(previous) = self.pages.get(&url) {
            if let Some(parent) = &previous.parent_url {
                if let Some(siblings) = self.children.get_mut(parent) {
                    siblings.retain(|child| *child != url);
                }
            }
        } else {
            self.order.push(url.clone());
        }

        if let Some(parent) = &page.parent_url {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(url.clone());
        }

        self.pages.insert(url, page);
    }

    pub fn get(&self, url: &str) -> Option<&PageResult> {
        self.pages.get(url)
    }

    /// Pages whose parent is `url`, in insertion order
    pub fn children(&self, url: &str) -> Vec<&PageResult> {
        self.children
            .get(url)
            .map(|urls| urls.iter().filter_map(|u| self.pages.get(u)).collect())
            .unwrap_or_default()
    }

    /// All pages in insertion order
    pub fn pages(&self) -> Vec<&PageResult> {
        self.order
            .iter()
            .filter_map(|u| self.pages.get(u))
            .collect()
    }

    pub fn into_pages(mut self) -> Vec<PageResult> {
        self.order
            .iter()
            .filter_map(|u| self.pages.remove(u))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn statistics(&self) -> SiteMapStatistics {
        let pages = self.pages.values();
        SiteMapStatistics {
            total_pages: self.pages.len(),
            total_links: pages.clone().map(|p| p.links.len()).sum(),
            total_forms: pages.clone().map(|p| p.forms.len()).sum(),
            total_endpoints: pages.map(|p| p.api_endpoints.len()).sum(),
        }
    }
}
