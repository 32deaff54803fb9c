//! Request extractors: caller identity and JSON bodies.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use medtrack_core::USER_ID_HEADER;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::AppState;

/// The data partition a request operates on.
///
/// Taken verbatim from `X-User-ID`; nothing authenticates it. Requests without
/// the header use the configured fallback, or a fresh anonymous id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[async_trait]
impl FromRequestParts<AppState> for UserId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty());

        if let Some(user_id) = header {
            return Ok(UserId(user_id.to_string()));
        }

        let user_id = match &state.fallback_user_id {
            Some(fallback) => fallback.clone(),
            None => format!("anonymous-{}", uuid::Uuid::new_v4()),
        };
        tracing::warn!(user_id, "Request without {} header", USER_ID_HEADER);
        Ok(UserId(user_id))
    }
}

/// `Json` whose rejections become `400 {error}` instead of axum's plain-text errors
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
