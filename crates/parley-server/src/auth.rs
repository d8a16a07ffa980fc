use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use parley_shared::UserId;

use crate::api::AppState;
use crate::error::ApiError;
use crate::users::User;

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_HEADER: &str = "x-user-id";

/// The caller, resolved through the user directory. Missing or unknown ids
/// are rejected with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> UserId {
        self.0.id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id: UserId = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or(ApiError::Unauthorized)?;

        state
            .users
            .get_user(id)
            .await
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}
