use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of the `users` table. Never changes after registration.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub username: String,
    #[sqlx(rename = "hash")]
    pub password_hash: String,
    pub salt: String,
}

/// A published post. `text` holds the already rendered HTML body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: Option<String>,
    pub text: String,
    pub date: NaiveDate,
}

/// Input for `PostStore::create`.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: Option<String>,
    pub text: String,
    pub date: Option<NaiveDate>,
}

impl NewPost {
    pub fn new(title: Option<String>, text: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            title,
            text: text.into(),
            date,
        }
    }
}

/// Filter for `PostStore::search`. An empty query matches nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
    pub date: Option<NaiveDate>,
    pub keyword: Option<String>,
}

impl PostQuery {
    /// Keyword to match, treating an empty string as absent.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().filter(|k| !k.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.keyword().is_none()
    }
}
