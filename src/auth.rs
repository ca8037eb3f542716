use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// Header carrying the acting user's identity, set by the upstream auth
/// layer. The core trusts it without re-validating.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the acting user as asserted upstream.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[derive(Debug)]
pub enum AuthError {
    MissingIdentity,
    InvalidIdentity,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingIdentity => "Missing user identity",
            AuthError::InvalidIdentity => "Invalid user identity",
        };

        let body = Json(json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": message,
            }
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(AuthError::MissingIdentity)?
            .to_str()
            .map_err(|_| AuthError::InvalidIdentity)?;

        let user_id = Uuid::parse_str(raw.trim()).map_err(|_| AuthError::InvalidIdentity)?;

        Ok(AuthUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn extracts_uuid_from_header() {
        let id = Uuid::new_v4();
        let req = Request::builder()
            .header(USER_ID_HEADER, id.to_string())
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id, id);
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_header() {
        let req = Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(matches!(
            AuthUser::from_request_parts(&mut parts, &()).await,
            Err(AuthError::MissingIdentity)
        ));

        let req = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(matches!(
            AuthUser::from_request_parts(&mut parts, &()).await,
            Err(AuthError::InvalidIdentity)
        ));
    }
}
