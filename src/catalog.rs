use std::{collections::HashMap, future::Future, path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::AppResult,
    models::{Credits, DiscoverPage, MovieDetails},
};

const BUNDLED_DISCOVER: &str = include_str!("../fallback/discover.json");
const BUNDLED_DETAILS: &str = include_str!("../fallback/movie_details.json");
const BUNDLED_CREDITS: &str = include_str!("../fallback/credits.json");

/// A provider of catalog data, either the live API or a static fixture.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn discover_page(&self, page: u32) -> AppResult<DiscoverPage>;

    async fn movie_details(&self, movie_id: i32) -> AppResult<MovieDetails>;

    async fn credits(&self, movie_id: i32) -> AppResult<Credits>;
}

/// Static catalog data keyed the same way as the live responses.
#[derive(Clone, Debug, Default)]
pub struct FixtureCatalog {
    discover: DiscoverPage,
    details: HashMap<i32, MovieDetails>,
    credits: HashMap<i32, Credits>,
}

impl FixtureCatalog {
    pub fn new(discover: DiscoverPage, details: Vec<MovieDetails>, credits: Vec<Credits>) -> Self {
        let details = details.into_iter().filter_map(|d| d.id.map(|id| (id, d))).collect();
        let credits = credits.into_iter().filter_map(|c| c.id.map(|id| (id, c))).collect();
        Self { discover, details, credits }
    }

    pub fn bundled() -> AppResult<Self> {
        Self::from_json(BUNDLED_DISCOVER, BUNDLED_DETAILS, BUNDLED_CREDITS)
    }

    pub fn from_dir(dir: &Path) -> AppResult<Self> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        };
        Self::from_json(
            &read("discover.json")?,
            &read("movie_details.json")?,
            &read("credits.json")?,
        )
    }

    pub fn from_json(discover: &str, details: &str, credits: &str) -> AppResult<Self> {
        Ok(Self::new(
            serde_json::from_str(discover)?,
            serde_json::from_str(details)?,
            serde_json::from_str(credits)?,
        ))
    }

    /// The whole discover dataset, regardless of how many pages it claims.
    pub fn discover_all(&self) -> DiscoverPage {
        self.discover.clone()
    }

    pub fn details_for(&self, movie_id: i32) -> MovieDetails {
        self.details.get(&movie_id).cloned().unwrap_or_default()
    }

    pub fn credits_for(&self, movie_id: i32) -> Credits {
        self.credits.get(&movie_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CatalogSource for FixtureCatalog {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn discover_page(&self, page: u32) -> AppResult<DiscoverPage> {
        let results = if page == 1 { self.discover.results.clone() } else { Vec::new() };
        Ok(DiscoverPage { page, results, total_pages: 1 })
    }

    async fn movie_details(&self, movie_id: i32) -> AppResult<MovieDetails> {
        Ok(self.details_for(movie_id))
    }

    async fn credits(&self, movie_id: i32) -> AppResult<Credits> {
        Ok(self.credits_for(movie_id))
    }
}

#[derive(Debug)]
pub enum DiscoverOutcome {
    Live(DiscoverPage),
    /// The primary source failed; holds the full fixture dataset. No further
    /// pages should be requested.
    Fallback(DiscoverPage),
}

/// Wraps the primary source and substitutes fixture data for any failed or
/// timed out call. Never returns an error.
#[derive(Clone)]
pub struct CatalogClient {
    primary: Arc<dyn CatalogSource>,
    fallback: Arc<FixtureCatalog>,
    fetch_timeout: Duration,
}

impl CatalogClient {
    pub fn new(
        primary: Arc<dyn CatalogSource>,
        fallback: Arc<FixtureCatalog>,
        fetch_timeout: Duration,
    ) -> Self {
        Self { primary, fallback, fetch_timeout }
    }

    pub fn source_name(&self) -> &'static str {
        self.primary.name()
    }

    pub async fn discover(&self, page: u32) -> DiscoverOutcome {
        match self.bounded(self.primary.discover_page(page)).await {
            Ok(listing) => {
                debug!(page, results = listing.results.len(), total_pages = listing.total_pages, "fetched discover page");
                DiscoverOutcome::Live(listing)
            },
            Err(err) => {
                warn!(page, source = self.primary.name(), error = %err, "discover failed, using fallback dataset");
                DiscoverOutcome::Fallback(self.fallback.discover_all())
            },
        }
    }

    pub async fn details(&self, movie_id: i32) -> MovieDetails {
        match self.bounded(self.primary.movie_details(movie_id)).await {
            Ok(details) => details,
            Err(err) => {
                warn!(movie_id, error = %err, "movie details failed, using fallback");
                self.fallback.details_for(movie_id)
            },
        }
    }

    pub async fn credits(&self, movie_id: i32) -> Credits {
        match self.bounded(self.primary.credits(movie_id)).await {
            Ok(credits) => credits,
            Err(err) => {
                warn!(movie_id, error = %err, "credits failed, using fallback");
                self.fallback.credits_for(movie_id)
            },
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        tokio::time::timeout(self.fetch_timeout, call)
            .await
            .with_context(|| format!("timed out after {:?}", self.fetch_timeout))?
    }
}
