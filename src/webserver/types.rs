use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::borrow::Cow;

use crate::indexes::indexer::EngineError;
use crate::ingest::IngestError;

pub(crate) trait ApiResponse: erased_serde::Serialize {}
erased_serde::serialize_trait_object!(ApiResponse);

/// Every endpoint exposes a Response type
#[derive(serde::Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub(crate) enum Response<'a> {
    Ok(Box<dyn erased_serde::Serialize + Send + Sync + 'static>),
    Error(EndpointError<'a>),
}

impl<T: ApiResponse + Send + Sync + 'static> From<T> for Response<'static> {
    fn from(value: T) -> Self {
        Self::Ok(Box::new(value))
    }
}

/// The response upon encountering an error
#[derive(serde::Serialize, PartialEq, Eq, Debug)]
pub struct EndpointError<'a> {
    /// The kind of this error
    kind: ErrorKind,

    /// A context aware message describing the error
    message: Cow<'a, str>,
}

/// The kind of an error
#[derive(serde::Serialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    ValidationFailed,
    CannotRevertWhenBuilt,
    Busy,
    Internal,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::CannotRevertWhenBuilt => StatusCode::BAD_REQUEST,
            // Everything else is a 500 to the caller; the kind in the body
            // tells the difference.
            ErrorKind::InvalidInput
            | ErrorKind::ValidationFailed
            | ErrorKind::Busy
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl EndpointError<'static> {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<EngineError> for EndpointError<'static> {
    fn from(err: EngineError) -> Self {
        let kind = match &err {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Validation(_) => ErrorKind::ValidationFailed,
            EngineError::CannotRevertWhenBuilt => ErrorKind::CannotRevertWhenBuilt,
            EngineError::Query(_) | EngineError::Config(_) | EngineError::FieldWrite(_) => {
                ErrorKind::InvalidInput
            }
            EngineError::Synonyms(_) | EngineError::Tantivy(_) | EngineError::Io(_) => {
                ErrorKind::Internal
            }
        };
        Self::new(kind, err.to_string())
    }
}

impl From<IngestError> for EndpointError<'static> {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Busy => Self::new(ErrorKind::Busy, err.to_string()),
            IngestError::Closed => Self::internal(err.to_string()),
            IngestError::Engine(engine) => engine.into(),
        }
    }
}

impl IntoResponse for EndpointError<'static> {
    fn into_response(self) -> axum::response::Response {
        let status = self.kind.status();
        (status, Json(Response::Error(self))).into_response()
    }
}

pub(crate) type Result<T> = std::result::Result<T, EndpointError<'static>>;

pub(crate) fn json<'a, T>(val: T) -> Json<Response<'a>>
where
    Response<'a>: From<T>,
{
    Json(Response::from(val))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexes::query::QueryError;
    use crate::validate::ValidationError;

    #[test]
    fn status_mapping_follows_the_table() {
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorKind::CannotRevertWhenBuilt.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorKind::InvalidInput.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ErrorKind::Busy.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn engine_errors_map_to_kinds() {
        let err: EndpointError = EngineError::NotFound("a".to_owned()).into();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err: EndpointError =
            EngineError::Validation(ValidationError::FieldMissing("title".to_owned())).into();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);

        let err: EndpointError = EngineError::CannotRevertWhenBuilt.into();
        assert_eq!(err.kind, ErrorKind::CannotRevertWhenBuilt);

        let err: EndpointError = EngineError::Query(QueryError::EmptyQuery).into();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn errors_serialize_with_snake_case_kind() {
        let err = EndpointError::not_found("document 'a' not found");
        let body = serde_json::to_string(&err).unwrap();
        assert_eq!(
            body,
            r#"{"kind":"not_found","message":"document 'a' not found"}"#
        );
    }
}
