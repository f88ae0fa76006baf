use api_shared::{AuthError, ErrorRes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use riskcare_core::{CoreError, ErrorKind};

/// Every way a handler can fail, rendered as a JSON [`ErrorRes`].
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    Auth(AuthError),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Auth(err) => (
                StatusCode::UNAUTHORIZED,
                ErrorRes::new("unauthenticated", err.to_string()),
            ),
            ApiError::Core(err) if err.kind() == ErrorKind::Storage => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorRes::new(ErrorKind::Storage.as_str(), "Internal error"),
                )
            }
            ApiError::Core(err) => (status_for(err.kind()), ErrorRes::from(err)),
        };
        (status, Json(body)).into_response()
    }
}
