use mugsampler_scanner::page::{Selector, selector};
use regex::Regex;
use std::time::Duration;

pub const DEFAULT_ROOT_URL: &str = "https://mugshots.com/US-States/";
pub const DEFAULT_LISTING_SELECTOR: &str = "div#subcategories div.column ul.categories li a";
pub const DEFAULT_ALPHABET_NAV_SELECTOR: &str = "nav#alphabet";
pub const DEFAULT_ALPHABET_LINK_SELECTOR: &str = "nav#alphabet a";
pub const DEFAULT_IMAGE_PATTERN: &str = r"(?i)mugshot.*\.(jpg|jpeg|png)$";

/// Per-cycle sampling bounds. Immutable while a cycle runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingConfig {
    pub max_states: usize,
    pub max_counties: usize,
    pub max_az_filters: usize,
    pub max_photos_per_page: usize,
    pub min_photos_per_cycle: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_states: 50,
            max_counties: 2,
            max_az_filters: 2,
            max_photos_per_page: 20,
            min_photos_per_cycle: 5000,
        }
    }
}

impl SamplingConfig {
    pub fn with_max_states(mut self, max: usize) -> Self {
        self.max_states = max;
        self
    }

    pub fn with_max_counties(mut self, max: usize) -> Self {
        self.max_counties = max;
        self
    }

    pub fn with_max_az_filters(mut self, max: usize) -> Self {
        self.max_az_filters = max;
        self
    }

    pub fn with_max_photos_per_page(mut self, max: usize) -> Self {
        self.max_photos_per_page = max;
        self
    }

    pub fn with_min_photos_per_cycle(mut self, min: usize) -> Self {
        self.min_photos_per_cycle = min;
        self
    }
}

/// Guards that end a run which cannot reach its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleLimits {
    pub max_cycles: Option<usize>,
    /// Consecutive cycles that collected nothing.
    pub max_idle_cycles: Option<usize>,
    pub max_duration: Option<Duration>,
}

impl Default for CycleLimits {
    fn default() -> Self {
        Self {
            max_cycles: Some(100),
            max_idle_cycles: Some(3),
            max_duration: None,
        }
    }
}

impl CycleLimits {
    /// No guards at all: retry until the target is met.
    pub fn unbounded() -> Self {
        Self {
            max_cycles: None,
            max_idle_cycles: None,
            max_duration: None,
        }
    }
}

/// Where the hierarchy starts and how each level is recognised on a page.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    root_url: String,
    listing: Selector,
    alphabet_nav: Selector,
    alphabet_links: Selector,
    image_pattern: Regex,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_ROOT_URL.to_string(),
            listing: selector(DEFAULT_LISTING_SELECTOR).unwrap(),
            alphabet_nav: selector(DEFAULT_ALPHABET_NAV_SELECTOR).unwrap(),
            alphabet_links: selector(DEFAULT_ALPHABET_LINK_SELECTOR).unwrap(),
            image_pattern: Regex::new(DEFAULT_IMAGE_PATTERN).unwrap(),
        }
    }
}

impl SiteLayout {
    pub fn with_root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = root_url.into();
        self
    }

    pub fn with_image_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.image_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Category links on the root and state pages.
    pub fn listing(&self) -> &Selector {
        &self.listing
    }

    /// Present on county pages that split their photos by initial.
    pub fn alphabet_nav(&self) -> &Selector {
        &self.alphabet_nav
    }

    pub fn alphabet_links(&self) -> &Selector {
        &self.alphabet_links
    }

    pub fn image_pattern(&self) -> &Regex {
        &self.image_pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampling_config() {
        let cfg = SamplingConfig::default();
        assert_eq!(cfg.max_states, 50);
        assert_eq!(cfg.max_counties, 2);
        assert_eq!(cfg.max_az_filters, 2);
        assert_eq!(cfg.max_photos_per_page, 20);
        assert_eq!(cfg.min_photos_per_cycle, 5000);
    }

    #[test]
    fn test_default_image_pattern() {
        let layout = SiteLayout::default();
        let pattern = layout.image_pattern();
        assert!(pattern.is_match("https://mugshots.com/img/Mugshot-John-Doe.JPG"));
        assert!(pattern.is_match("https://cdn.example.com/a/mugshot_1.png"));
        assert!(!pattern.is_match("https://cdn.example.com/img/logo.png"));
        assert!(!pattern.is_match("https://mugshots.com/img/mugshot.gif"));
    }

    #[test]
    fn test_invalid_image_pattern() {
        assert!(SiteLayout::default().with_image_pattern("(unclosed").is_err());
    }
}
