//! Error and file responses

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use onnxedit_core::Error;
use tracing::{error, warn};

/// An `onnxedit_core::Error` on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NodeNotFound(_)
        | Error::AttributeNotFound { .. }
        | Error::IoNotFound { .. }
        | Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::UnknownAction(_)
        | Error::InvalidRequest(_)
        | Error::Parse(_)
        | Error::Structural(_)
        | Error::Coercion(_)
        | Error::ModelIoNotFound { .. }
        | Error::Json(_) => StatusCode::BAD_REQUEST,
        Error::CountMismatch { .. } | Error::NoModel => StatusCode::CONFLICT,
        Error::Config(_) | Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `{ "ok": false, "error": ..., "kind": ... }`
pub fn error_body(err: &Error) -> serde_json::Value {
    serde_json::json!({
        "ok": false,
        "error": err.to_string(),
        "kind": err.kind(),
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            warn!("request rejected: {}", self.0);
        }
        (status, Json(error_body(&self.0))).into_response()
    }
}

/// Serialized model offered as a download.
pub fn model_file(bytes: Vec<u8>, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use onnxedit_core::{IoSlot, NodeId};

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(&Error::NodeNotFound(NodeId(1))), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&Error::model_io_not_found(IoSlot::Input, "x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&Error::UnknownAction("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&Error::CountMismatch { matched: 0, expected: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&Error::NoModel), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&Error::SessionNotFound(onnxedit_core::SessionKey::new("x"))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_shape() {
        let body = error_body(&Error::NoModel);
        assert_eq!(body["ok"], false);
        assert_eq!(body["kind"], "no_model");
        assert_eq!(body["error"], "no model is open");
    }
}
