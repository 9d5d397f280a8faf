pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod search;
pub mod store;
pub mod tmdb;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::TokenService,
    catalog::{CatalogClient, CatalogSource, FixtureCatalog},
    config::{AuthSettings, Config, IngestSettings},
    error::AppResult,
    ingest::Ingestor,
    search::MovieSearch,
    store::MovieStore,
    tmdb::TmdbClient,
};

pub struct AppState {
    pub tokens: TokenService,
    pub store: MovieStore,
    pub search: MovieSearch,
    pub ingestor: Ingestor,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        catalog: CatalogClient,
        auth: &AuthSettings,
        ingest: IngestSettings,
    ) -> Self {
        let store = MovieStore::new(db.clone());
        Self {
            tokens: TokenService::new(auth),
            ingestor: Ingestor::new(catalog, store.clone(), ingest),
            search: MovieSearch::new(db),
            store,
        }
    }
}

/// Picks the live TMDB source when an access token is configured, the fixture
/// otherwise. The fixture always backs failed live calls.
pub fn catalog_client(config: &Config, http: reqwest::Client) -> AppResult<CatalogClient> {
    let fixture = Arc::new(match &config.fallback_dir {
        Some(dir) => FixtureCatalog::from_dir(dir)?,
        None => FixtureCatalog::bundled()?,
    });

    let primary: Arc<dyn CatalogSource> = if config.tmdb_access_token.trim().is_empty() {
        tracing::warn!("Using fixture catalog data - no TMDB_ACCESS_TOKEN provided");
        fixture.clone()
    } else {
        Arc::new(TmdbClient::new(
            http,
            config.tmdb_access_token.clone(),
            config.tmdb_base_url.clone(),
            config.tmdb_rps,
        ))
    };

    Ok(CatalogClient::new(primary, fixture, config.ingest.fetch_timeout))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/login", post(routes::login))
        .route("/movies", get(routes::movies))
        .route("/genres", get(routes::genres))
        .route("/ingest", post(routes::ingest))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
