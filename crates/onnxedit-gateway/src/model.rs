//! `/model/*` handlers
//!
//! Every route addresses one editing session, picked by the optional
//! `?session=` query parameter and defaulting to the configured session.

use crate::response::{error_body, model_file, ApiError};
use crate::server::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use onnxedit_core::{EditFailurePolicy, Error, NodeDescriptor, SessionKey};
use onnxedit_editor::NodeDetail;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub session: Option<String>,
}

impl AppState {
    pub fn session_key(&self, query: &SessionQuery) -> SessionKey {
        match query.session.as_deref() {
            Some(s) if !s.is_empty() => SessionKey::new(s),
            _ => self.config.default_session_key(),
        }
    }
}

/// POST /model/open - multipart upload, field `file`.
pub async fn open(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    let key = state.session_key(&query);
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("malformed upload: {e}")))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::InvalidRequest(format!("malformed upload: {e}")))?;
            upload = Some(data);
            break;
        }
    }
    let data = upload.ok_or_else(|| Error::InvalidRequest("missing multipart field 'file'".into()))?;
    state.sessions.open(&key, &data).await?;
    Ok(StatusCode::OK)
}

/// POST /model/assign_node_ids - body is the reconciliation sequence.
pub async fn assign_node_ids(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let key = state.session_key(&query);
    let expected: Vec<NodeDescriptor> = serde_json::from_slice(&body)
        .map_err(|e| Error::InvalidRequest(format!("reconciliation sequence: {e}")))?;
    let assigned = state
        .sessions
        .with_session(&key, |s| s.assign_node_ids(&expected))
        .await?;
    info!(session = %key, assigned, "node ids reconciled");
    Ok(Json(json!({ "ok": true, "assigned": assigned })))
}

/// POST /model/edit - body is one edit request.
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    let key = state.session_key(&query);
    let result = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => state.sessions.with_session(&key, |s| s.apply_json(value)).await,
        Err(e) => Err(Error::InvalidRequest(format!("edit body: {e}"))),
    };
    match result {
        Ok(outcome) => {
            let mut body = json!({ "ok": true });
            if let (Some(obj), Ok(Value::Object(extra))) =
                (body.as_object_mut(), serde_json::to_value(&outcome))
            {
                obj.extend(extra);
            }
            Json(body).into_response()
        }
        Err(e) => match state.config.edit_failures {
            EditFailurePolicy::Reject => ApiError(e).into_response(),
            EditFailurePolicy::Acknowledge => {
                warn!(session = %key, "edit failed: {}", e);
                Json(error_body(&e)).into_response()
            }
        },
    }
}

/// GET|POST /model/save
pub async fn save(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Response, ApiError> {
    let key = state.session_key(&query);
    let bytes = state.sessions.with_session(&key, |s| Ok(s.to_bytes())).await?;
    info!(session = %key, bytes = bytes.len(), "model saved");
    Ok(model_file(bytes, &state.config.save_filename))
}

/// GET /model/cleanup - prune dead nodes, then answer like `/model/save`.
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Response, ApiError> {
    let key = state.session_key(&query);
    let bytes = state
        .sessions
        .with_session(&key, |s| {
            s.cleanup()?;
            Ok(s.to_bytes())
        })
        .await?;
    Ok(model_file(bytes, &state.config.save_filename))
}

/// GET /model/fold_constants - fold, then answer like `/model/save`.
pub async fn fold_constants(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Response, ApiError> {
    let key = state.session_key(&query);
    let bytes = state
        .sessions
        .with_session(&key, |s| {
            s.fold_constants()?;
            Ok(s.to_bytes())
        })
        .await?;
    Ok(model_file(bytes, &state.config.save_filename))
}

/// GET /model/nodes - bound nodes as reconciliation entries.
pub async fn nodes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Vec<NodeDescriptor>>, ApiError> {
    let key = state.session_key(&query);
    let nodes = state.sessions.with_session(&key, |s| Ok(s.describe())).await?;
    Ok(Json(nodes))
}

/// GET /model/inspect - every node with its attributes, bound or not.
pub async fn inspect(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Vec<NodeDetail>>, ApiError> {
    let key = state.session_key(&query);
    let nodes = state.sessions.with_session(&key, |s| Ok(s.inspect())).await?;
    Ok(Json(nodes))
}
