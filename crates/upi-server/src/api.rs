//! HTTP handlers for the `/upi/` resource.
//!
//! Input is validated before any store call. Every store-side failure,
//! whatever its cause, becomes a `400` whose `detail` is the raw error text.

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use upi_store::{StoreError, UpiRecord};

/// Minimum length of `name`, in characters.
const MIN_NAME_LEN: usize = 1;
/// Minimum length of `upi_id`, in characters.
const MIN_UPI_ID_LEN: usize = 5;

/// Request body for create and update.
#[derive(Debug, Clone)]
pub struct UpiPayload {
    pub name: String,
    pub upi_id: String,
}

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Location of the offending input, e.g. `["body", "name"]`.
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    fn body(loc: &[&str], msg: impl Into<String>, kind: &str) -> Self {
        let mut path = vec!["body".to_string()];
        path.extend(loc.iter().map(|s| s.to_string()));
        Self {
            loc: path,
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    fn too_short(field: &str, min: usize) -> Self {
        Self {
            loc: vec!["body".to_string(), field.to_string()],
            msg: format!("String should have at least {min} characters"),
            kind: "string_too_short".to_string(),
        }
    }
}

impl UpiPayload {
    /// Extracts the payload from a decoded JSON body.
    ///
    /// Missing and non-string fields are reported per field, together with
    /// any length violations of the fields that are present.
    pub fn from_json(body: &Value) -> Result<Self, Vec<FieldError>> {
        let Some(object) = body.as_object() else {
            return Err(vec![FieldError::body(
                &[],
                "Input should be a valid dictionary",
                "model_attributes_type",
            )]);
        };

        let mut errors = Vec::new();
        let mut field = |key: &str| match object.get(key) {
            None => {
                errors.push(FieldError::body(&[key], "Field required", "missing"));
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                errors.push(FieldError::body(
                    &[key],
                    "Input should be a valid string",
                    "string_type",
                ));
                None
            }
        };
        let name = field("name");
        let upi_id = field("upi_id");

        let payload = Self {
            name: name.unwrap_or_default(),
            upi_id: upi_id.unwrap_or_default(),
        };
        if let Err(length_errors) = payload.validate() {
            let fresh: Vec<FieldError> = length_errors
                .into_iter()
                .filter(|e| !errors.iter().any(|prior| prior.loc == e.loc))
                .collect();
            errors.extend(fresh);
        }

        if errors.is_empty() {
            Ok(payload)
        } else {
            Err(errors)
        }
    }

    /// Checks field lengths, collecting every violation.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.name.chars().count() < MIN_NAME_LEN {
            errors.push(FieldError::too_short("name", MIN_NAME_LEN));
        }
        if self.upi_id.chars().count() < MIN_UPI_ID_LEN {
            errors.push(FieldError::too_short("upi_id", MIN_UPI_ID_LEN));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input failed validation; the store was not called.
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    /// The store operation failed. Carries the store's message verbatim.
    #[error("{0}")]
    Store(String),
    /// The body could not be read at all, e.g. it exceeded the size limit.
    #[error("{0}")]
    Body(JsonRejection),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::BytesRejection(_) => ApiError::Body(rejection),
            other => ApiError::Validation(vec![FieldError::body(
                &[],
                other.body_text(),
                "json_invalid",
            )]),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(vec![FieldError {
            loc: vec!["path".to_string(), "id".to_string()],
            msg: rejection.body_text(),
            kind: "int_parsing".to_string(),
        }])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": errors })),
            )
                .into_response(),
            ApiError::Store(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": message }))).into_response()
            }
            ApiError::Body(rejection) => rejection.into_response(),
        }
    }
}

/// Success acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

fn validated(body: Result<Json<Value>, JsonRejection>) -> Result<UpiPayload, ApiError> {
    let Json(body) = body?;
    UpiPayload::from_json(&body).map_err(ApiError::Validation)
}

/// Runs a blocking store call off the async executor.
async fn run_store<T, F>(op: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "store task join error");
            ApiError::Store(format!("task join error: {e}"))
        })??)
}

/// POST /upi/
pub async fn create_upi_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let payload = validated(payload)?;
    let store = state.store.clone();
    run_store(move || store.create(&payload.name, &payload.upi_id)).await?;
    Ok(MessageResponse::new("UPI created successfully"))
}

/// GET /upi/
pub async fn list_upi_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<UpiRecord>>, ApiError> {
    let store = state.store.clone();
    let records = run_store(move || store.list_all()).await?;
    Ok(Json(records))
}

/// PUT /upi/{id}
///
/// Succeeds even when no record has `id`.
pub async fn update_upi_handler(
    Extension(state): Extension<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = id?;
    let payload = validated(payload)?;
    let store = state.store.clone();
    run_store(move || store.update(id, &payload.name, &payload.upi_id)).await?;
    Ok(MessageResponse::new("UPI updated successfully"))
}

/// DELETE /upi/{id}
///
/// Succeeds even when no record has `id`.
pub async fn delete_upi_handler(
    Extension(state): Extension<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = id?;
    let store = state.store.clone();
    run_store(move || store.delete(id)).await?;
    Ok(MessageResponse::new("UPI deleted successfully"))
}
