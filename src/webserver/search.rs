use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::application::application::Application;
use crate::indexes::query::Hit;
use crate::search::filter::FilterRequest;
use crate::search::SearchOptions;

use super::types::{json, ApiResponse, EndpointError, Result};

impl ApiResponse for Vec<Hit> {}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub(crate) query: String,
    /// JSON-encoded `FilterRequest`.
    pub(crate) filters: Option<String>,
    #[serde(rename = "sortField")]
    pub(crate) sort_field: Option<String>,
    #[serde(rename = "sortOrder")]
    pub(crate) sort_order: Option<String>,
}

#[derive(Deserialize)]
pub struct SimpleSearchParams {
    #[serde(default)]
    pub(crate) query: String,
}

/// Full search: free text, structured filters, caller sort or profile
/// ranking.
pub async fn search(
    Query(params): Query<SearchParams>,
    State(app): State<Application>,
) -> Result<impl IntoResponse> {
    let filters = match params.filters.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(serde_json::from_str::<FilterRequest>(raw).map_err(|err| {
            EndpointError::invalid_input(format!("unparsable filters: {err}"))
        })?),
        None => None,
    };
    let hits = app
        .search
        .search(SearchOptions {
            query: &params.query,
            filters,
            sort_field: params.sort_field.as_deref(),
            sort_order: params.sort_order.as_deref(),
        })
        .await?;
    Ok(json(hits))
}

pub async fn simple_search(
    Query(params): Query<SimpleSearchParams>,
    State(app): State<Application>,
) -> Result<impl IntoResponse> {
    let hits = app.search.simple_search(&params.query).await?;
    Ok(json(hits))
}

/// Field-name → zero-value template of the live schema.
pub async fn index_struct(State(app): State<Application>) -> Result<impl IntoResponse> {
    Ok(json(app.index.index_struct().await))
}
