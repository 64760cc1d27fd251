use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::auth::SESSION_COOKIE;
use crate::web::error::AppError;
use crate::web::AppState;

/// The logged-in user behind the request's session cookie.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Same as [`CurrentUser`], but rejects with 401 instead of redirecting.
#[derive(Debug, Clone)]
pub struct ApiUser(pub CurrentUser);

pub struct LoginRedirect;

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to("/login").into_response()
    }
}

async fn resolve(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar.get(SESSION_COOKIE)?;
    let session = state.sessions.get(cookie.value()).await?;

    Some(CurrentUser {
        id: session.user_id,
        name: session.name,
        email: session.email,
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await.ok_or(LoginRedirect)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for ApiUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await
            .map(ApiUser)
            .ok_or(AppError::Unauthorized)
    }
}
