// Document write and read routes. Writes funnel through the ingest queue;
// reads go straight to the engine.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::application::Application;
use crate::ingest::IngestOp;
use crate::model::Document;

use super::types::{json, ApiResponse, EndpointError, Result};

#[derive(Deserialize)]
pub struct OptionalDocId {
    #[serde(rename = "docId")]
    pub(crate) doc_id: Option<String>,
}

#[derive(Deserialize)]
pub struct RequiredDocId {
    #[serde(rename = "docId")]
    pub(crate) doc_id: String,
}

#[derive(Serialize)]
pub(crate) struct CreatedDoc {
    #[serde(rename = "docId")]
    doc_id: String,
}

#[derive(Serialize)]
pub(crate) struct Empty {}

impl ApiResponse for CreatedDoc {}
impl ApiResponse for Empty {}
impl ApiResponse for Vec<Document> {}
impl ApiResponse for Document {}

/// Creates a document; a missing docId gets a generated UUID.
pub async fn add(
    Query(params): Query<OptionalDocId>,
    State(app): State<Application>,
    Json(doc): Json<Document>,
) -> Result<impl IntoResponse> {
    let doc_id = params
        .doc_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    app.ingest
        .submit(IngestOp::Add {
            id: doc_id.clone(),
            doc,
        })
        .await?;
    Ok(json(CreatedDoc { doc_id }))
}

pub async fn update(
    Query(params): Query<RequiredDocId>,
    State(app): State<Application>,
    Json(doc): Json<Document>,
) -> Result<impl IntoResponse> {
    app.ingest
        .submit(IngestOp::Update {
            id: params.doc_id,
            doc,
        })
        .await?;
    Ok(json(Empty {}))
}

pub async fn remove(
    Query(params): Query<RequiredDocId>,
    State(app): State<Application>,
) -> Result<impl IntoResponse> {
    app.ingest
        .submit(IngestOp::Delete { id: params.doc_id })
        .await?;
    Ok(json(Empty {}))
}

pub async fn get_all(State(app): State<Application>) -> Result<impl IntoResponse> {
    let documents: Vec<Document> = app
        .index
        .get_all()
        .await?
        .into_iter()
        .map(|(_, fields)| fields)
        .collect();
    Ok(json(documents))
}

pub async fn get_by_id(
    Query(params): Query<RequiredDocId>,
    State(app): State<Application>,
) -> Result<impl IntoResponse> {
    match app.index.get(&params.doc_id).await? {
        Some(document) => Ok(json(document)),
        None => Err(EndpointError::not_found(format!(
            "document '{}' not found",
            params.doc_id
        ))),
    }
}
