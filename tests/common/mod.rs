//! Shared helpers for the integration tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use marquee::{
    AppState,
    catalog::{CatalogClient, CatalogSource, FixtureCatalog},
    config::{AuthSettings, IngestSettings},
    error::{AppError, AppResult},
    models::{CastMember, Credits, DiscoverPage, GenreRef, MovieDetails, MovieStub},
};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tower::ServiceExt;

#[allow(dead_code)]
pub const ADMIN_USERNAME: &str = "admin";
#[allow(dead_code)]
pub const ADMIN_PASSWORD: &str = "correct-horse";

pub async fn memory_db() -> DatabaseConnection {
    marquee::db::connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database")
}

pub fn auth_settings() -> AuthSettings {
    AuthSettings {
        jwt_secret: "integration-test-secret".to_string(),
        admin_username: ADMIN_USERNAME.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        token_ttl: Duration::from_secs(3600),
    }
}

pub fn ingest_settings() -> IngestSettings {
    IngestSettings {
        on_startup: false,
        fetch_timeout: Duration::from_secs(2),
        deadline: Duration::from_secs(30),
        ..Default::default()
    }
}

pub fn bundled_fixture() -> Arc<FixtureCatalog> {
    Arc::new(FixtureCatalog::bundled().expect("Bundled fixture should parse"))
}

/// A client over `primary`, backed by the bundled fixture.
#[allow(dead_code)]
pub fn client_for(primary: Arc<dyn CatalogSource>) -> CatalogClient {
    CatalogClient::new(primary, bundled_fixture(), Duration::from_millis(500))
}

/// App state whose catalog is the bundled fixture itself.
#[allow(dead_code)]
pub async fn fixture_state() -> Arc<AppState> {
    let fixture = bundled_fixture();
    let catalog = CatalogClient::new(fixture.clone(), fixture, Duration::from_secs(2));
    Arc::new(AppState::new(memory_db().await, catalog, &auth_settings(), ingest_settings()))
}

#[allow(dead_code)]
pub fn stub(id: i32, title: &str, release_date: &str, popularity: f64) -> MovieStub {
    MovieStub {
        id,
        title: Some(title.to_string()),
        release_date: Some(release_date.to_string()),
        popularity: Some(popularity),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn details(id: i32, title: &str, genres: &[(i32, &str)]) -> MovieDetails {
    MovieDetails {
        id: Some(id),
        title: Some(title.to_string()),
        revenue: Some(1_000),
        runtime: Some(90),
        genres: genres.iter().map(|(id, name)| GenreRef { id: *id, name: name.to_string() }).collect(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn credits(id: i32, cast: &[(i32, &str)]) -> Credits {
    Credits {
        id: Some(id),
        cast: cast
            .iter()
            .enumerate()
            .map(|(order, (cast_id, name))| CastMember {
                id: *cast_id,
                name: Some(name.to_string()),
                order: Some(order as i32),
                ..Default::default()
            })
            .collect(),
    }
}

/// A catalog source that serves canned pages and can be told to fail.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedCatalog {
    pub pages: Vec<Vec<MovieStub>>,
    pub details: HashMap<i32, MovieDetails>,
    pub credits: HashMap<i32, Credits>,
    pub fail_discover: bool,
    pub slow_fetch: Option<Duration>,
    pub discover_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub fetched: std::sync::Mutex<HashSet<i32>>,
}

#[allow(dead_code)]
impl ScriptedCatalog {
    pub fn with_pages(pages: Vec<Vec<MovieStub>>) -> Self {
        Self { pages, ..Default::default() }
    }

    pub fn movie(mut self, details: MovieDetails, credits: Credits) -> Self {
        if let Some(id) = details.id {
            self.details.insert(id, details);
        }
        if let Some(id) = credits.id {
            self.credits.insert(id, credits);
        }
        self
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    /// Most movie detail fetches ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for ScriptedCatalog {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn discover_page(&self, page: u32) -> AppResult<DiscoverPage> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_discover {
            return Err(AppError::Internal(anyhow::anyhow!("503 Service Unavailable")));
        }
        let results = self.pages.get(page as usize - 1).cloned().unwrap_or_default();
        Ok(DiscoverPage { page, results, total_pages: self.pages.len() as u32 })
    }

    async fn movie_details(&self, movie_id: i32) -> AppResult<MovieDetails> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.slow_fetch {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().insert(movie_id);
        self.details
            .get(&movie_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("404 Not Found")))
    }

    async fn credits(&self, movie_id: i32) -> AppResult<Credits> {
        if let Some(delay) = self.slow_fetch {
            tokio::time::sleep(delay).await;
        }
        self.credits
            .get(&movie_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("404 Not Found")))
    }
}

/// Sends one request through the router and decodes the JSON body.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        },
        None => Body::empty(),
    };

    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}
