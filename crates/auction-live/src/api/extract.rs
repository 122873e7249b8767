// Request body extractor whose rejections use the API error body.

use axum::extract::FromRequest;

use super::error::ApiError;

/// `Json<T>` that reports a missing, malformed or mistyped body as
/// `ApiError::BadRequest` instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
