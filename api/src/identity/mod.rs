//! Who is making the request.
//!
//! Authentication happens upstream: the gateway in front of this service
//! verifies the session and forwards the user's id and privilege flag as
//! headers. This module only reads them.

use axum::http::{StatusCode, request::Parts};
use uuid::Uuid;

use crate::error::{ApiRequestError, AppError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const PRIVILEGED_HEADER: &str = "x-user-privileged";

#[derive(thiserror::Error, Debug)]
pub enum AuthenticationError {
    #[error("Authentication required, but no `x-user-id` header found.")]
    NoIdentity,

    #[error("Unauthorized, the `x-user-id` header does not hold a valid user id.")]
    Unauthorized,
}

impl ApiRequestError for AuthenticationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn code(&self) -> &'static str {
        "UNAUTHORIZED"
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    /// Staff accounts may moderate content they don't own.
    pub privileged: bool,
}

impl Identity {
    pub fn can_modify(&self, author_id: Uuid) -> bool {
        self.privileged || self.user_id == author_id
    }

    fn from_parts(parts: &Parts) -> Result<Self, AuthenticationError> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(AuthenticationError::NoIdentity)?
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or(AuthenticationError::Unauthorized)?;

        let privileged = parts
            .headers
            .get(PRIVILEGED_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Identity {
            user_id,
            privileged,
        })
    }
}

pub struct MaybeAuthUser(pub Result<Identity, AuthenticationError>);

impl<S> axum::extract::FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(Identity::from_parts(parts)))
    }
}

pub struct AuthUser(pub Identity);

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeAuthUser(auth_user) = MaybeAuthUser::from_request_parts(parts, state).await?;

        Ok(AuthUser(auth_user?))
    }
}
