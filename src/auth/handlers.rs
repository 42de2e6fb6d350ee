use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::gate::{unauthorized, ANONYMOUS_HOME};
use crate::auth::session::Identity;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub username: String,
    pub message: String,
}

/// Authenticate and start a session. Any credential failure, including an
/// unknown username, produces the same 401.
pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::ValidationError(
            "Username and password are compulsory!".to_string(),
        ));
    }

    let identity = match state.auth_service.authenticate(&req.username, &req.password).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Login failed for {}: {}", req.username, e);
            return Err(e);
        }
    };

    info!("Login successful for {}", req.username);
    start_session(&state, identity, HttpResponse::Ok(), "Logged in successfully")
}

/// Create an account and log it in right away.
pub async fn register(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if let Err(e) = state.auth_service.register_user(&req.username, &req.password).await {
        warn!("Registration failed for {}: {}", req.username, e);
        return Err(e);
    }

    let identity = state.auth_service.authenticate(&req.username, &req.password).await?;
    start_session(&state, identity, HttpResponse::Created(), "Registered successfully")
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match state.gate.resolve(&req, None).await {
        Identity::Anonymous => unauthorized(),
        Identity::Authenticated { username } => {
            info!("Logging out {}", username);
            HttpResponse::SeeOther()
                .insert_header((header::LOCATION, ANONYMOUS_HOME))
                .cookie(state.sessions.logout_cookie())
                .finish()
        }
    }
}

fn start_session(
    state: &AppState,
    identity: Identity,
    mut builder: actix_web::HttpResponseBuilder,
    message: &str,
) -> Result<HttpResponse, AppError> {
    let username = identity.username().unwrap_or_default().to_string();
    let token = state
        .sessions
        .issue(&identity)?
        .ok_or_else(|| AppError::InternalError("no session for anonymous identity".into()))?;

    Ok(builder
        .cookie(state.sessions.login_cookie(token))
        .json(AuthResponse {
            username,
            message: message.to_string(),
        }))
}
