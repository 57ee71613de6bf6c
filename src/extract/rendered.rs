//! DOM extraction from a live rendered page

use super::{ButtonInfo, FormData, FormField};
use crate::browser::{DomElement, RenderedPage};
use crate::url::{normalize, resolve_url};
use crate::Result;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// Script count above which a page is treated as an SPA
pub const SPA_SCRIPT_THRESHOLD: usize = 5;

/// Mount points and attributes left behind by common SPA frameworks
const SPA_MARKERS: [&str; 6] = [
    "#root",
    "#app",
    "#__next",
    "[data-reactroot]",
    "[ng-app]",
    "[data-v-]",
];

const NON_NAVIGABLE: [&str; 3] = ["javascript:", "mailto:", "tel:"];

/// Everything extracted from one rendered page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAnalysis {
    pub title: Option<String>,
    /// Absolute, normalized, deduplicated
    pub links: Vec<String>,
    pub forms: Vec<FormData>,
    pub buttons: Vec<ButtonInfo>,
    pub is_spa: bool,
}

/// Reads links, forms, buttons and title out of a rendered page
///
/// Each extraction degrades to an empty result when the page cannot be
/// queried, so one broken selector never costs the whole page.
#[derive(Debug, Clone)]
pub struct RenderedPageExtractor {
    base: Url,
}

impl RenderedPageExtractor {
    /// `base` is the URL relative references are resolved against
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub async fn links(&self, page: &dyn RenderedPage) -> Vec<String> {
        self.try_links(page).await.unwrap_or_else(|e| {
            debug!("Link extraction failed on {}: {}", self.base, e);
            Vec::new()
        })
    }

    pub async fn forms(&self, page: &dyn RenderedPage) -> Vec<FormData> {
        self.try_forms(page).await.unwrap_or_else(|e| {
            debug!("Form extraction failed on {}: {}", self.base, e);
            Vec::new()
        })
    }

    pub async fn buttons(&self, page: &dyn RenderedPage) -> Vec<ButtonInfo> {
        self.try_buttons(page).await.unwrap_or_else(|e| {
            debug!("Button extraction failed on {}: {}", self.base, e);
            Vec::new()
        })
    }

    pub async fn title(&self, page: &dyn RenderedPage) -> Option<String> {
        page.title().await.unwrap_or_else(|e| {
            debug!("Title extraction failed on {}: {}", self.base, e);
            None
        })
    }

    /// Runs every extraction plus SPA detection
    pub async fn analyze(&self, page: &dyn RenderedPage) -> PageAnalysis {
        PageAnalysis {
            title: self.title(page).await,
            links: self.links(page).await,
            forms: self.forms(page).await,
            buttons: self.buttons(page).await,
            is_spa: detect_spa(page).await,
        }
    }

    fn absolute(&self, raw: &str) -> Option<String> {
        resolve_url(&self.base, raw)
            .and_then(|u| normalize(u).ok())
            .map(|u| u.to_string())
    }

    async fn try_links(&self, page: &dyn RenderedPage) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in page.query_selector_all("a[href]").await? {
            let Some(href) = anchor.attribute("href").await? else {
                continue;
            };
            let lower = href.trim().to_ascii_lowercase();
            if NON_NAVIGABLE.iter().any(|scheme| lower.starts_with(scheme)) {
                continue;
            }
            if let Some(url) = self.absolute(&href) {
                if seen.insert(url.clone()) {
                    links.push(url);
                }
            }
        }

        Ok(links)
    }

    async fn try_forms(&self, page: &dyn RenderedPage) -> Result<Vec<FormData>> {
        let mut forms = Vec::new();

        for form in page.query_selector_all("form").await? {
            let action = form
                .attribute("action")
                .await?
                .and_then(|a| self.absolute(&a))
                .or_else(|| self.absolute(self.base.as_str()));
            let Some(action) = action else {
                continue;
            };
            let method = form
                .attribute("method")
                .await?
                .map(|m| m.trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "GET".to_string());

            // select/textarea carry no type attribute, so each tag is queried on its own
            let mut inputs = Vec::new();
            for (selector, fixed_type) in [
                ("input", None),
                ("select", Some("select")),
                ("textarea", Some("textarea")),
            ] {
                for field in form.query_selector_all(selector).await? {
                    inputs.push(read_field(field.as_ref(), fixed_type).await?);
                }
            }

            let has_file_upload = inputs.iter().any(|f| f.field_type == "file");
            forms.push(FormData {
                action,
                method,
                inputs,
                has_file_upload,
            });
        }

        Ok(forms)
    }

    async fn try_buttons(&self, page: &dyn RenderedPage) -> Result<Vec<ButtonInfo>> {
        let mut buttons = Vec::new();

        for button in page.query_selector_all("button").await? {
            let onclick = button.attribute("onclick").await?;
            buttons.push(ButtonInfo {
                label: button.text().await?.trim().to_string(),
                button_type: Some(
                    button
                        .attribute("type")
                        .await?
                        .map(|t| t.to_ascii_lowercase())
                        .unwrap_or_else(|| "submit".to_string()),
                ),
                has_handler: onclick.is_some(),
                onclick,
            });
        }

        for input in page
            .query_selector_all("input[type='submit'], input[type='button']")
            .await?
        {
            let onclick = input.attribute("onclick").await?;
            buttons.push(ButtonInfo {
                label: input.attribute("value").await?.unwrap_or_default(),
                button_type: input.attribute("type").await?.map(|t| t.to_ascii_lowercase()),
                has_handler: onclick.is_some(),
                onclick,
            });
        }

        Ok(buttons)
    }
}

async fn read_field(field: &dyn DomElement, fixed_type: Option<&str>) -> Result<FormField> {
    let field_type = match fixed_type {
        Some(t) => t.to_string(),
        None => field
            .attribute("type")
            .await?
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text".to_string()),
    };
    Ok(FormField {
        name: field.attribute("name").await?,
        field_type,
        value: field.attribute("value").await?,
    })
}

/// SPA heuristic: a framework mount marker, or more than
/// [`SPA_SCRIPT_THRESHOLD`] external scripts
pub async fn detect_spa(page: &dyn RenderedPage) -> bool {
    for marker in SPA_MARKERS {
        match page.query_selector_all(marker).await {
            Ok(found) if !found.is_empty() => return true,
            Ok(_) => {}
            Err(e) => debug!("SPA marker query '{}' failed: {}", marker, e),
        }
    }

    match page.query_selector_all("script[src]").await {
        Ok(scripts) => scripts.len() > SPA_SCRIPT_THRESHOLD,
        Err(e) => {
            debug!("Script count query failed: {}", e);
            false
        }
    }
}

/// Owns a page and guarantees it gets closed
///
/// Call [`close`](Self::close) on the normal path. If the guard is dropped
/// instead (early return, panic, cancelled task) the close is spawned onto
/// the current runtime.
pub struct PageGuard {
    page: Option<Box<dyn RenderedPage>>,
}

impl PageGuard {
    pub fn new(page: Box<dyn RenderedPage>) -> Self {
        Self { page: Some(page) }
    }

    pub fn page(&self) -> Option<&dyn RenderedPage> {
        self.page.as_deref()
    }

    pub async fn close(mut self) -> Result<()> {
        match self.page.take() {
            Some(page) => page.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = page.close().await {
                        warn!("Failed to close abandoned page: {}", e);
                    }
                });
            }
            // No runtime left to close on; dropping releases what it can
            Err(_) => drop(page),
        }
    }
}
