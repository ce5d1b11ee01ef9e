pub use scraper::Selector;
use scraper::Html;
use url::Url;

use crate::error::{Result, ScanError};

/// A link discovered on a listing page: a state, county, A-Z filter or photo page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub href: String,
    pub name: String,
}

/// A fetched HTML document together with the URL it was served from.
///
/// The body is kept as text and parsed on each query so that a `Page` can be
/// held across await points.
#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    body: String,
}

/// Compile a CSS selector, reporting the offending text on failure.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| ScanError::Selector(css.to_string()))
}

impl Page {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }

    pub fn parse(url: &str, body: impl Into<String>) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self::new(url, body))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Anchors matched by `selector`, resolved to absolute URLs. Duplicate
    /// hrefs keep their first occurrence.
    pub fn links(&self, selector: &Selector) -> Vec<TreeNode> {
        let document = Html::parse_document(&self.body);
        let mut nodes: Vec<TreeNode> = Vec::new();

        for element in document.select(selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(href) = self.resolve(href) else {
                continue;
            };
            if nodes.iter().any(|n| n.href == href) {
                continue;
            }
            let name = element.text().collect::<String>().trim().to_string();
            nodes.push(TreeNode { href, name });
        }

        nodes
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        let document = Html::parse_document(&self.body);
        document.select(selector).next().is_some()
    }

    /// Absolute `src` of every `<img>` on the page, in document order.
    pub fn images(&self) -> Vec<String> {
        let document = Html::parse_document(&self.body);
        let img_selector = Selector::parse("img[src]").unwrap();

        let mut sources = Vec::new();
        for element in document.select(&img_selector) {
            if let Some(src) = element.value().attr("src")
                && let Some(absolute) = self.resolve(src)
                && !sources.contains(&absolute)
            {
                sources.push(absolute);
            }
        }
        sources
    }

    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        // Skip empty, javascript:, mailto:, tel:, data: and in-page anchors
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
            || href.starts_with('#')
        {
            return None;
        }

        let mut resolved = self.url.join(href).ok()?;
        resolved.set_fragment(None);
        Some(resolved.to_string())
    }
}
