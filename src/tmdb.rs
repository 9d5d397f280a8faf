use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::de::DeserializeOwned;

use crate::{
    catalog::CatalogSource,
    error::AppResult,
    models::{Credits, DiscoverPage, MovieDetails},
};

pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, access_token: String, base_url: String, rps: u32) -> Self {
        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Self { client, access_token, base_url, limiter }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        self.limiter.until_ready().await;

        let body = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl CatalogSource for TmdbClient {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn discover_page(&self, page: u32) -> AppResult<DiscoverPage> {
        self.get_json("discover/movie", &[("page", page.to_string())]).await
    }

    async fn movie_details(&self, movie_id: i32) -> AppResult<MovieDetails> {
        self.get_json(&format!("movie/{movie_id}"), &[]).await
    }

    async fn credits(&self, movie_id: i32) -> AppResult<Credits> {
        self.get_json(&format!("movie/{movie_id}/credits"), &[]).await
    }
}
