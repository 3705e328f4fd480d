//! Authentication middleware for Axum

use anime_db::{ROLE_ADMIN, Roles};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::gate::AuthGate;

/// Authenticated user information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub roles: Roles,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

/// Authentication middleware
///
/// Runs every request through the [`AuthGate`]. Allowed requests continue
/// with the [`AuthUser`] (when one was verified) in their extensions;
/// rejected requests are answered here and never reach a handler.
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    // A header that is not visible ASCII cannot hold basic credentials
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default().to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();

    let decision = gate.handle(&method, &uri, authorization.as_deref()).await;

    match decision.into_result() {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(err) => err.into_response_with_realm(gate.realm()),
    }
}

/// Check that a user holds a role
pub fn require_role(user: &AuthUser, role: &str) -> Result<(), AuthError> {
    if user.has_role(role) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole {
            username: user.username.clone(),
            required: role.to_string(),
        })
    }
}

/// Extractor for the authenticated user (required)
pub struct RequireAuth(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Extractor for an authenticated admin
pub struct RequireAdmin(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        require_role(&user, ROLE_ADMIN)?;
        Ok(RequireAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::BasicCredentials;
    use crate::password::test_service;
    use crate::policy::AccessPolicy;
    use crate::store::{CredentialStore, InMemoryCredentialStore};
    use anime_db::NewUser;
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header::WWW_AUTHENTICATE},
        middleware::from_fn_with_state,
        routing::{delete, get},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let hasher = test_service();
        let store = InMemoryCredentialStore::new();
        for (username, roles) in [("nicholas", "ADMIN,USER"), ("devdojo", "USER")] {
            store
                .save(NewUser {
                    username: username.to_string(),
                    name: username.to_string(),
                    password_hash: hasher.hash("senha123").unwrap(),
                    roles: roles.parse().unwrap(),
                })
                .await
                .unwrap();
        }

        let gate = AuthGate::new(Arc::new(store), hasher, Arc::new(AccessPolicy::default()))
            .unwrap()
            .with_realm("test-realm");

        Router::new()
            .route("/animes", get(|RequireAuth(user): RequireAuth| async move { user.username }))
            .route("/animes/{id}", delete(|RequireAdmin(_): RequireAdmin| async { StatusCode::NO_CONTENT }))
            .route("/animes/admin/{id}", get(|| async { "admin" }))
            .route("/actuator/health", get(|| async { "UP" }))
            .layer(from_fn_with_state(gate, auth_middleware))
    }

    fn request(method: &str, uri: &str, user: Option<(&str, &str)>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some((username, password)) = user {
            let creds = BasicCredentials {
                username: username.to_string(),
                password: password.to_string(),
            };
            builder = builder.header(AUTHORIZATION, creds.to_header_value());
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_identity_reaches_handler() {
        let response = app()
            .await
            .oneshot(request("GET", "/animes", Some(("devdojo", "senha123"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "devdojo");
    }

    #[tokio::test]
    async fn test_rejections_short_circuit() {
        let app = app().await;

        let response = app.clone().oneshot(request("GET", "/animes", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"test-realm\", charset=\"UTF-8\""
        );

        let response = app
            .clone()
            .oneshot(request("GET", "/animes/admin/5", Some(("devdojo", "senha123"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request("GET", "/animes/admin/5", Some(("nicholas", "senha123"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_ascii_header_is_unauthorized() {
        let mut req = request("GET", "/animes", None);
        req.headers_mut().insert(
            AUTHORIZATION,
            axum::http::HeaderValue::from_bytes(b"Basic \xff\xfe").unwrap(),
        );

        let response = app().await.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_user_and_bad_password_responses_match() {
        let app = app().await;

        let unknown = app
            .clone()
            .oneshot(request("GET", "/animes", Some(("ghost", "senha123"))))
            .await
            .unwrap();
        let bad = app
            .oneshot(request("GET", "/animes", Some(("devdojo", "nope"))))
            .await
            .unwrap();

        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_string(unknown).await, body_string(bad).await);
    }

    #[tokio::test]
    async fn test_require_admin_extractor() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(request("DELETE", "/animes/1", Some(("devdojo", "senha123"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request("DELETE", "/animes/1", Some(("nicholas", "senha123"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_open_route_without_credentials() {
        let response = app()
            .await
            .oneshot(request("GET", "/actuator/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_require_role() {
        let user = AuthUser {
            id: 1,
            username: "devdojo".to_string(),
            name: "DevDojo".to_string(),
            roles: "USER".parse().unwrap(),
        };

        assert!(require_role(&user, "USER").is_ok());
        assert!(require_role(&user, "ROLE_USER").is_ok());
        assert!(matches!(
            require_role(&user, "ADMIN"),
            Err(AuthError::InsufficientRole { .. })
        ));
        assert!(!user.is_admin());
    }
}
