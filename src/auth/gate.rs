use std::sync::Arc;

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::service::AuthService;
use crate::auth::session::{Identity, SessionManager, SESSION_COOKIE};
use crate::error::AuthError;

/// Where anonymous visitors are sent when they hit a protected route.
pub const ANONYMOUS_HOME: &str = "/";

/// Username and password submitted alongside a request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Resolves the identity behind each request. Never fails: anything that
/// does not check out is `Identity::Anonymous`.
pub struct RequestGate {
    auth_service: Arc<AuthService>,
    sessions: Arc<SessionManager>,
}

impl RequestGate {
    pub fn new(auth_service: Arc<AuthService>, sessions: Arc<SessionManager>) -> Self {
        Self {
            auth_service,
            sessions,
        }
    }

    /// Trust a previously issued session token without re-checking the password.
    pub fn from_session(&self, token: Option<&str>) -> Identity {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Identity::Anonymous;
        };

        match self.sessions.resolve(token) {
            Ok(identity) => identity,
            Err(e) => {
                debug!("Ignoring session token: {}", e);
                Identity::Anonymous
            }
        }
    }

    /// Re-verify credentials submitted with this very request.
    pub async fn from_credentials(&self, credentials: Option<&Credentials>) -> Identity {
        let Some(credentials) = credentials else {
            return Identity::Anonymous;
        };

        match self
            .auth_service
            .authenticate(&credentials.username, &credentials.password)
            .await
        {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Per-request credentials rejected for {}: {}", credentials.username, e);
                Identity::Anonymous
            }
        }
    }

    /// Session cookie first, then submitted credentials.
    pub async fn resolve(&self, req: &HttpRequest, submitted: Option<&Credentials>) -> Identity {
        let cookie = req.cookie(SESSION_COOKIE);
        match self.from_session(cookie.as_ref().map(|c| c.value())) {
            Identity::Anonymous => self.from_credentials(submitted).await,
            identity @ Identity::Authenticated { .. } => identity,
        }
    }
}

/// Response for an anonymous request to a protected route.
pub fn unauthorized() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, ANONYMOUS_HOME))
        .json(serde_json::json!({
            "message": AuthError::Unauthorized.to_string()
        }))
}
