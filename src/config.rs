use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub tmdb_access_token: String,
    pub tmdb_base_url: String,
    pub tmdb_rps: u32,
    pub fallback_dir: Option<PathBuf>,
    pub ingest: IngestSettings,
    pub auth: AuthSettings,
}

#[derive(Clone, Debug)]
pub struct IngestSettings {
    pub on_startup: bool,
    pub limit: usize,
    pub max_concurrent: usize,
    pub fetch_timeout: Duration,
    pub deadline: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            on_startup: true,
            limit: 500,
            max_concurrent: 8,
            fetch_timeout: Duration::from_secs(10),
            deadline: Duration::from_secs(300),
        }
    }
}

#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password: String,
    pub token_ttl: Duration,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("admin_username", &self.admin_username)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://marquee.db?mode=rwc".to_string());

        let tmdb_access_token = std::env::var("TMDB_ACCESS_TOKEN").unwrap_or_default();
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());

        let tmdb_rps: u32 = env_or("TMDB_RPS", 4);

        let fallback_dir = std::env::var("FALLBACK_DIR").ok().map(PathBuf::from);

        let defaults = IngestSettings::default();
        let ingest = IngestSettings {
            on_startup: env_or("INGEST_ON_STARTUP", defaults.on_startup),
            limit: env_or("INGEST_LIMIT", defaults.limit),
            max_concurrent: env_or("MAX_CONCURRENT_REQUESTS", defaults.max_concurrent).max(1),
            fetch_timeout: Duration::from_secs(env_or(
                "FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )),
            deadline: Duration::from_secs(env_or(
                "INGEST_DEADLINE_SECS",
                defaults.deadline.as_secs(),
            )),
        };

        let auth = AuthSettings {
            jwt_secret: required("JWT_SECRET")?,
            admin_username: required("ADMIN_USERNAME")?,
            admin_password: required("ADMIN_PASSWORD")?,
            token_ttl: Duration::from_secs(3600),
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            tmdb_access_token,
            tmdb_base_url,
            tmdb_rps,
            fallback_dir,
            ingest,
            auth,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn required(key: &str) -> anyhow::Result<String> {
    let value = std::env::var(key).with_context(|| format!("{key} must be set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("{key} must not be empty");
    }
    Ok(value)
}
