pub mod auth;
pub mod blog;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, Identity, RequestGate, SessionManager};
pub use db::{Database, Post, PostStore};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Mount every route on an actix `App`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    use auth::handlers::{login, logout, register};
    use blog::handlers::{add_post, feed, list_posts, search_posts};

    cfg.route("/health", web::get().to(health_check))
        .route("/", web::get().to(feed))
        .route("/posts", web::get().to(list_posts))
        .route("/posts/search", web::get().to(search_posts))
        .service(
            web::scope("/auth")
                .route("/login", web::post().to(login))
                .route("/register", web::post().to(register))
                .route("/logout", web::get().to(logout))
                .route("/add_post", web::post().to(add_post)),
        );
}

/// Application state shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: Database,
    pub auth_service: Arc<AuthService>,
    pub sessions: Arc<SessionManager>,
    pub gate: Arc<RequestGate>,
    pub posts: Arc<PostStore>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let db = Database::connect(&config.database.url, config.database.max_connections).await?;
        Ok(Self::with_database(config, db))
    }

    /// Wire every component on top of an already opened database.
    pub fn with_database(config: Settings, db: Database) -> Self {
        let auth_service = Arc::new(AuthService::new(Arc::new(db.credentials())));
        let sessions = Arc::new(SessionManager::from_config(&config.auth));
        let gate = Arc::new(RequestGate::new(auth_service.clone(), sessions.clone()));
        let posts = Arc::new(db.posts());

        Self {
            config: Arc::new(config),
            db,
            auth_service,
            sessions,
            gate,
            posts,
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.db.close().await;
        Ok(())
    }
}
