use actix_web::{web, HttpRequest, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::gate::unauthorized;
use crate::auth::{Credentials, Identity};
use crate::blog::markdown::convert_to_html;
use crate::db::{NewPost, Post, PostQuery};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub date: Option<String>,
    pub keyword: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub posts: Vec<Post>,
}

/// Every field is optional at parse time so that anonymous callers reach
/// the gate; `text` is checked once the caller is known.
#[derive(Debug, Deserialize)]
pub struct AddPostRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    pub date: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AddPostRequest {
    fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

fn page_size(state: &AppState, requested: Option<u32>) -> u32 {
    let blog = &state.config.blog;
    requested.unwrap_or(blog.page_size).min(blog.max_page_size)
}

/// Empty strings count as "not given".
fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::ValidationError(format!("Invalid date: {}", s))),
    }
}

pub async fn feed(state: web::Data<AppState>) -> HttpResponse {
    let limit = page_size(&state, None);
    HttpResponse::Ok().json(FeedResponse {
        posts: state.posts.list(limit).await,
    })
}

pub async fn list_posts(
    params: web::Query<FeedParams>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let limit = page_size(&state, params.limit);
    HttpResponse::Ok().json(FeedResponse {
        posts: state.posts.list(limit).await,
    })
}

pub async fn search_posts(
    params: web::Query<SearchParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let query = PostQuery {
        date: parse_date(params.date.as_deref())?,
        keyword: params.keyword.clone().filter(|k| !k.is_empty()),
    };
    let limit = page_size(&state, params.limit);
    debug!("Searching posts: {:?} (limit {})", query, limit);

    Ok(HttpResponse::Ok().json(FeedResponse {
        posts: state.posts.search(&query, limit).await,
    }))
}

/// Publish a post. Requires a session cookie or valid credentials in the body.
pub async fn add_post(
    http_req: HttpRequest,
    req: web::Json<AddPostRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let submitted = req.credentials();
    let username = match state.gate.resolve(&http_req, submitted.as_ref()).await {
        Identity::Anonymous => {
            warn!("Anonymous attempt to add a post");
            return Ok(unauthorized());
        }
        Identity::Authenticated { username } => username,
    };

    let text = req
        .text
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::ValidationError("Post text is compulsory!".to_string()))?;

    let new_post = NewPost::new(
        req.title.clone().filter(|t| !t.is_empty()),
        convert_to_html(text),
        parse_date(req.date.as_deref())?,
    );

    match state.posts.create(&new_post).await {
        Ok(post) => {
            info!("New post {} added by {}", post.id, username);
            Ok(HttpResponse::Created().json(serde_json::json!({
                "message": "Post inserted",
                "post": post,
            })))
        }
        Err(e) => {
            error!("Addition of new post by {} failed: {}", username, e);
            Err(e)
        }
    }
}
