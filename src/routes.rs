use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use tracing::{info, warn};

use crate::{
    AppState,
    auth::AuthUser,
    entities::genre,
    error::{AppError, AppResult},
    models::{IngestReport, LoginRequest, MoviePage, TokenResponse},
    search::MovieQueryParams,
};

pub async fn health() -> &'static str {
    "ok"
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(req) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "invalid login body");
        AppError::Validation(rejection.body_text())
    })?;

    match state.tokens.login(&req.username, &req.password)? {
        Some(token) => {
            info!(username = %req.username, "user logged in");
            Ok(Json(TokenResponse { token }))
        },
        None => {
            warn!(username = %req.username, "failed login attempt");
            Err(AppError::Unauthorized("Invalid credentials"))
        },
    }
}

pub async fn movies(
    AuthUser(_claims): AuthUser,
    State(state): State<Arc<AppState>>,
    params: Result<Query<MovieQueryParams>, QueryRejection>,
) -> AppResult<Json<MoviePage>> {
    let Query(params) = params.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "invalid query parameters");
        AppError::Validation(rejection.body_text())
    })?;

    let today: jiff::civil::Date = jiff::Zoned::now().into();
    let query = params.validate(today.year()).inspect_err(|err| {
        warn!(error = %err, "invalid query parameters");
    })?;

    let page = state.search.search(&query).await?;
    Ok(Json(page))
}

pub async fn genres(
    AuthUser(_claims): AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<genre::Model>>> {
    Ok(Json(state.store.list_genres().await?))
}

pub async fn ingest(
    AuthUser(claims): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Json<IngestReport> {
    info!(requested_by = %claims.sub, "ingestion triggered");
    Json(state.ingestor.run().await)
}
