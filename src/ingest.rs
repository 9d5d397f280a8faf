use std::{collections::HashSet, sync::Arc};

use futures::{StreamExt, stream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    catalog::{CatalogClient, DiscoverOutcome},
    config::IngestSettings,
    models::{IngestReport, MovieBundle, MovieStub},
    store::MovieStore,
};

/// Pulls movies from the catalog and stores them with their genres and cast.
#[derive(Clone)]
pub struct Ingestor {
    catalog: CatalogClient,
    store: MovieStore,
    settings: IngestSettings,
    running: Arc<Mutex<()>>,
}

impl Ingestor {
    pub fn new(catalog: CatalogClient, store: MovieStore, settings: IngestSettings) -> Self {
        Self { catalog, store, settings, running: Arc::new(Mutex::new(())) }
    }

    /// Runs the whole pipeline. Overlapping runs are serialized.
    pub async fn run(&self) -> IngestReport {
        let _guard = self.running.lock().await;

        info!(source = self.catalog.source_name(), limit = self.settings.limit, "starting ingestion");

        let (stubs, used_fallback) = self.discover().await;
        let discovered = stubs.len();

        let bundles = self.fetch(stubs).await;
        let fetched = bundles.len();
        if fetched < discovered {
            warn!(discovered, fetched, deadline = ?self.settings.deadline, "ingestion deadline reached, skipping remaining movies");
        }

        let mut report = IngestReport {
            discovered,
            fetched,
            skipped: discovered - fetched,
            used_fallback,
            ..Default::default()
        };

        for bundle in &bundles {
            match self.store.store_movie(bundle).await {
                Ok(_) => report.stored += 1,
                Err(err) => {
                    warn!(movie_id = bundle.movie.id, error = %err, "failed to store movie");
                    report.failed += 1;
                },
            }
        }

        info!(
            discovered = report.discovered,
            stored = report.stored,
            failed = report.failed,
            skipped = report.skipped,
            used_fallback = report.used_fallback,
            "ingestion finished"
        );

        report
    }

    /// Collects discover stubs up to the limit. Returns whether the fallback
    /// dataset was used.
    async fn discover(&self) -> (Vec<MovieStub>, bool) {
        let limit = self.settings.limit;
        let mut stubs: Vec<MovieStub> = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1;
        let mut total_pages = 1;
        let mut used_fallback = false;

        while stubs.len() < limit && page <= total_pages {
            let listing = match self.catalog.discover(page).await {
                DiscoverOutcome::Live(listing) => listing,
                DiscoverOutcome::Fallback(listing) => {
                    stubs.extend(listing.results.into_iter().filter(|s| seen.insert(s.id)));
                    used_fallback = true;
                    break;
                },
            };

            if listing.results.is_empty() {
                debug!(page, "empty discover page, stopping");
                break;
            }

            stubs.extend(listing.results.into_iter().filter(|s| seen.insert(s.id)));
            total_pages = listing.total_pages;
            page += 1;
        }

        stubs.truncate(limit);
        debug!(movies = stubs.len(), pages = page - 1, used_fallback, "discovery finished");
        (stubs, used_fallback)
    }

    /// Fetches details and credits for every stub, a bounded number of movies
    /// at a time, until the ingestion deadline.
    async fn fetch(&self, stubs: Vec<MovieStub>) -> Vec<MovieBundle> {
        let catalog = &self.catalog;
        let deadline = tokio::time::sleep(self.settings.deadline);

        stream::iter(stubs)
            .map(|stub| async move {
                let (details, credits) =
                    tokio::join!(catalog.details(stub.id), catalog.credits(stub.id));
                MovieBundle::new(&stub, details, credits)
            })
            .buffer_unordered(self.settings.max_concurrent.max(1))
            .take_until(deadline)
            .collect()
            .await
    }
}
