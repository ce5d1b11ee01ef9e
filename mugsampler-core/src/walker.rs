use crate::collector::PhotoCollector;
use crate::config::{SamplingConfig, SiteLayout};
use crate::error::{PersistenceError, SampleError};
use crate::events::{EventCallback, SampleEvent};
use crate::progress::{Level, ProgressStore};
use crate::sampler::RandomSampler;
use mugsampler_scanner::{Page, PageFetcher, TreeNode};
use std::sync::Arc;
use tracing::{info, warn};

/// Whether traversal should go on after a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    QuotaMet,
}

/// Photos newly collected during the current cycle, against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunYield {
    collected: usize,
    target: usize,
}

impl RunYield {
    pub fn new(target: usize) -> Self {
        Self {
            collected: 0,
            target,
        }
    }

    pub fn collected(&self) -> usize {
        self.collected
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn flow(&self) -> Flow {
        if self.collected >= self.target {
            Flow::QuotaMet
        } else {
            Flow::Continue
        }
    }

    pub fn record(&mut self, uploaded: usize) -> Flow {
        self.collected += uploaded;
        self.flow()
    }
}

/// Descends states, counties and A-Z filters, sampling a few branches at
/// each level and collecting photos at the leaves.
///
/// Counties and A-Z filters are recorded as visited once their subtree has
/// been attempted and are never entered again. This includes pages that
/// failed to load: a transient error drops that branch until the state is
/// reset. States are revisited every cycle unless `with_state_dedup` is
/// enabled.
pub struct TreeWalker {
    fetcher: Arc<dyn PageFetcher>,
    progress: ProgressStore,
    collector: PhotoCollector,
    sampler: RandomSampler,
    layout: SiteLayout,
    dedup_states: bool,
    event_callback: Option<EventCallback>,
}

impl TreeWalker {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        progress: ProgressStore,
        collector: PhotoCollector,
        sampler: RandomSampler,
        layout: SiteLayout,
    ) -> Self {
        Self {
            fetcher,
            progress,
            collector,
            sampler,
            layout,
            dedup_states: false,
            event_callback: None,
        }
    }

    /// Record a state as visited once none of its counties are left, and
    /// skip such states afterwards.
    pub fn with_state_dedup(mut self, enabled: bool) -> Self {
        self.dedup_states = enabled;
        self
    }

    pub(crate) fn set_event_callback(&mut self, callback: EventCallback) {
        self.collector.set_event_callback(callback.clone());
        self.event_callback = Some(callback);
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn collector(&self) -> &PhotoCollector {
        &self.collector
    }

    fn notify(&self, level: Level, url: &str) {
        if let Some(ref callback) = self.event_callback {
            callback(SampleEvent::Visiting {
                level,
                url: url.to_string(),
            });
        }
    }

    fn unvisited(&self, level: Level, nodes: Vec<TreeNode>) -> Vec<TreeNode> {
        nodes
            .into_iter()
            .filter(|node| !self.progress.is_visited(level, &node.href))
            .collect()
    }

    /// One full pass from the root listing. Failing to load the root is the
    /// only non-fatal error returned; everything below it is absorbed per
    /// branch.
    pub async fn walk_states(
        &mut self,
        cfg: &SamplingConfig,
        run: &mut RunYield,
    ) -> Result<Flow, SampleError> {
        if run.flow() == Flow::QuotaMet {
            return Ok(Flow::QuotaMet);
        }

        let root_url = self.layout.root_url().to_string();
        info!("Scraping states from {}", root_url);
        let page = self
            .fetcher
            .navigate(&root_url)
            .await
            .map_err(|source| SampleError::Navigation {
                url: root_url.clone(),
                source,
            })?;

        let mut states = page.links(self.layout.listing());
        if states.is_empty() {
            warn!(url = %root_url, "No state links found on root listing");
        }
        if self.dedup_states {
            states = self.unvisited(Level::State, states);
        }

        let sampled = self.sampler.sample(&states, cfg.max_states);
        info!("Selected {} states for sampling.", sampled.len());

        for state in sampled {
            if self.walk_counties(&state.href, cfg, run).await? == Flow::QuotaMet {
                return Ok(Flow::QuotaMet);
            }
        }

        Ok(Flow::Continue)
    }

    pub async fn walk_counties(
        &mut self,
        state_url: &str,
        cfg: &SamplingConfig,
        run: &mut RunYield,
    ) -> Result<Flow, PersistenceError> {
        info!("Scraping counties for state: {}", state_url);
        self.notify(Level::State, state_url);

        let page = match self.fetcher.navigate(state_url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = state_url, level = %Level::State, error = %e, "Error accessing counties for state. Skipping...");
                return Ok(run.flow());
            }
        };

        let counties = page.links(self.layout.listing());
        let listed = counties.len();
        let unvisited = self.unvisited(Level::County, counties);

        if self.dedup_states && listed > 0 && unvisited.is_empty() {
            info!("Every county of {} has been sampled", state_url);
            self.progress.mark_visited(Level::State, state_url)?;
            return Ok(run.flow());
        }

        let sampled = self.sampler.sample(&unvisited, cfg.max_counties);
        info!("Selected {} counties for sampling.", sampled.len());

        for county in sampled {
            let flow = self.visit_county(&county, cfg, run).await?;
            self.progress.mark_visited(Level::County, &county.href)?;

            if flow == Flow::QuotaMet {
                info!(
                    "Reached minimum photo count of {} this run.",
                    run.target()
                );
                return Ok(Flow::QuotaMet);
            }
        }

        Ok(run.flow())
    }

    /// Collect directly from the county page, or descend into its A-Z index
    /// when it has one.
    async fn visit_county(
        &mut self,
        county: &TreeNode,
        cfg: &SamplingConfig,
        run: &mut RunYield,
    ) -> Result<Flow, PersistenceError> {
        self.notify(Level::County, &county.href);

        let page = match self.fetcher.navigate(&county.href).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %county.href, level = %Level::County, error = %e, "Error accessing county. Skipping...");
                return Ok(run.flow());
            }
        };

        if page.contains(self.layout.alphabet_nav()) {
            self.walk_az_page(&page, cfg, run).await
        } else {
            let result = self
                .collector
                .collect_page(&page, cfg.max_photos_per_page)
                .await?;
            Ok(run.record(result.newly_uploaded))
        }
    }

    pub async fn walk_az_filters(
        &mut self,
        county_url: &str,
        cfg: &SamplingConfig,
        run: &mut RunYield,
    ) -> Result<Flow, PersistenceError> {
        info!("Scraping A-Z filters from county: {}", county_url);

        match self.fetcher.navigate(county_url).await {
            Ok(page) => self.walk_az_page(&page, cfg, run).await,
            Err(e) => {
                warn!(url = county_url, level = %Level::AzFilter, error = %e, "Error accessing county A-Z filters. Skipping...");
                Ok(run.flow())
            }
        }
    }

    async fn walk_az_page(
        &mut self,
        county_page: &Page,
        cfg: &SamplingConfig,
        run: &mut RunYield,
    ) -> Result<Flow, PersistenceError> {
        let filters = county_page.links(self.layout.alphabet_links());
        let unvisited = self.unvisited(Level::AzFilter, filters);

        let sampled = self.sampler.sample(&unvisited, cfg.max_az_filters);
        info!("Selected {} A-Z filters for sampling.", sampled.len());

        for filter in sampled {
            self.notify(Level::AzFilter, &filter.href);
            let result = self
                .collector
                .collect(&filter.href, cfg.max_photos_per_page)
                .await?;
            self.progress.mark_visited(Level::AzFilter, &filter.href)?;

            if run.record(result.newly_uploaded) == Flow::QuotaMet {
                info!(
                    "Reached minimum photo count of {} this run.",
                    run.target()
                );
                return Ok(Flow::QuotaMet);
            }
        }

        Ok(run.flow())
    }
}
