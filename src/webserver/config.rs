// Config surface: raw schema files, live schema replacement with revert,
// the rebuild/reindex triggers, and the filter catalogue.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::application::application::Application;
use crate::config::lifecycle::ConfigKind;
use crate::config::schema::FilterConfig;

use super::documents::Empty;
use super::types::{json, ApiResponse, EndpointError, Result};

impl ApiResponse for FilterConfig {}

#[derive(Deserialize)]
pub struct CategoryParam {
    pub(crate) category: String,
}

#[derive(Serialize)]
pub(crate) struct Categories {
    data: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct BuildState {
    #[serde(rename = "isBuilded")]
    is_built: bool,
}

impl ApiResponse for Categories {}
impl ApiResponse for BuildState {}

/// Serves one of the schema files verbatim.
async fn raw_config(app: &Application, kind: ConfigKind) -> Result<impl IntoResponse> {
    let bytes = app
        .store
        .raw(kind)
        .map_err(|err| EndpointError::internal(err.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], bytes))
}

pub async fn get_index_config(State(app): State<Application>) -> Result<impl IntoResponse> {
    raw_config(&app, ConfigKind::Index).await
}

pub async fn get_filter_config(State(app): State<Application>) -> Result<impl IntoResponse> {
    raw_config(&app, ConfigKind::Filter).await
}

pub async fn get_rank_config(State(app): State<Application>) -> Result<impl IntoResponse> {
    raw_config(&app, ConfigKind::Ranking).await
}

/// Replaces the index schema; the engine keeps serving the old mapping
/// until `/rebuild` runs, and `/config/index/revert` undoes the change
/// until then.
pub async fn update_index_config(
    State(app): State<Application>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    app.index.update_schema(&body).await?;
    Ok(json(Empty {}))
}

pub async fn revert_index_config(
    State(app): State<Application>,
) -> Result<impl IntoResponse> {
    app.index.revert_schema().await?;
    Ok(json(Empty {}))
}

pub async fn is_built(State(app): State<Application>) -> Result<impl IntoResponse> {
    Ok(json(BuildState {
        is_built: app.index.is_built().await,
    }))
}

pub async fn rebuild(State(app): State<Application>) -> Result<impl IntoResponse> {
    app.index.rebuild().await?;
    Ok(json(Empty {}))
}

pub async fn reindex(State(app): State<Application>) -> Result<impl IntoResponse> {
    app.index.reindex_with_synonyms().await?;
    Ok(json(Empty {}))
}

pub async fn filters_by_category(
    Query(params): Query<CategoryParam>,
    State(app): State<Application>,
) -> Result<impl IntoResponse> {
    match app.filters.by_category(&params.category) {
        Some(entry) => Ok(json(entry.clone())),
        None => Err(EndpointError::not_found(format!(
            "unknown category '{}'",
            params.category
        ))),
    }
}

/// All known categories: the filter catalogue keys plus the schema's own
/// category list.
pub async fn categories(State(app): State<Application>) -> Result<impl IntoResponse> {
    let mut data = app.filters.categories();
    data.extend(app.index.schema().await.category);
    data.sort();
    data.dedup();
    Ok(json(Categories { data }))
}
