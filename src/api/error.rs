use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use snafu::Snafu;

use crate::model::ParseListingId;
use crate::store::StoreError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("{source}"))]
    InvalidListing { source: ParseListingId },

    #[snafu(display("`{text}` is not a duration: {source}"))]
    InvalidWindow {
        text: String,
        source: humantime::DurationError,
    },

    #[snafu(display("view store failed: {source}"))]
    Store { source: StoreError },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidListing { .. } | ApiError::InvalidWindow { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store { source } if source.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
