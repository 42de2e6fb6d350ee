use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, error, info};

use crate::db::models::{NewPost, Post, PostQuery};
use crate::db::rollback_after;
use crate::error::AppError;

/// Storage for blog posts.
///
/// Reads come back in insertion order. `list` and `search` never fail:
/// a storage fault is logged, counted in `read_failures` and reported as
/// an empty result. `try_list` and `try_search` surface the error instead.
pub struct PostStore {
    pool: SqlitePool,
    read_failures: AtomicU64,
}

impl PostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            read_failures: AtomicU64::new(0),
        }
    }

    /// Insert a post. A missing date means today.
    pub async fn create(&self, post: &NewPost) -> Result<Post, AppError> {
        let date = post.date.unwrap_or_else(|| Local::now().date_naive());

        let mut transaction = self.pool.begin().await?;

        let result = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (title, text, date) VALUES (?, ?, ?) RETURNING id, title, text, date",
        )
        .bind(&post.title)
        .bind(&post.text)
        .bind(date)
        .fetch_one(&mut *transaction)
        .await;

        match result {
            Ok(created) => {
                transaction.commit().await?;
                info!("Post {} inserted into database", created.id);
                Ok(created)
            }
            Err(e) => {
                error!("SQL error while inserting post: {}", e);
                Err(rollback_after(transaction, e.into()).await)
            }
        }
    }

    pub async fn list(&self, limit: u32) -> Vec<Post> {
        let result = self.try_list(limit).await;
        self.degrade("list", result)
    }

    pub async fn try_list(&self, limit: u32) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT id, title, text, date FROM posts ORDER BY id ASC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    pub async fn search(&self, query: &PostQuery, limit: u32) -> Vec<Post> {
        let result = self.try_search(query, limit).await;
        self.degrade("search", result)
    }

    /// Date matches exactly; keyword is a case-sensitive substring of the
    /// rendered text. Both given means both must hold. A query with
    /// neither returns nothing without touching storage.
    pub async fn try_search(&self, query: &PostQuery, limit: u32) -> Result<Vec<Post>, AppError> {
        if query.is_empty() {
            debug!("Empty search query, skipping storage");
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, title, text, date FROM posts WHERE 1 = 1");
        if let Some(date) = query.date {
            builder.push(" AND date = ").push_bind(date);
        }
        if let Some(keyword) = query.keyword() {
            builder.push(" AND instr(text, ").push_bind(keyword).push(") > 0");
        }
        builder.push(" ORDER BY id ASC LIMIT ").push_bind(i64::from(limit));

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    /// Number of reads that were answered with an empty list because storage failed.
    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    fn degrade(&self, operation: &str, result: Result<Vec<Post>, AppError>) -> Vec<Post> {
        match result {
            Ok(posts) => posts,
            Err(e) => {
                self.read_failures.fetch_add(1, Ordering::Relaxed);
                error!("Post {} failed, returning no posts: {}", operation, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn query(date: Option<&str>, keyword: Option<&str>) -> PostQuery {
        PostQuery {
            date: date.map(day),
            keyword: keyword.map(String::from),
        }
    }

    async fn seeded() -> (Database, PostStore) {
        let db = Database::in_memory().await.expect("Failed to open database");
        let store = db.posts();
        for (title, text, date) in [
            ("One", "alpha release notes", "2024-01-01"),
            ("Two", "beta testing", "2024-01-01"),
            ("Three", "alpha again", "2024-02-15"),
            ("Four", "Alphabet soup", "2024-03-01"),
        ] {
            store
                .create(&NewPost::new(Some(title.into()), text, Some(day(date))))
                .await
                .unwrap();
        }
        (db, store)
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().filter_map(|p| p.title.as_deref()).collect()
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let db = Database::in_memory().await.unwrap();
        let store = db.posts();

        let created = store
            .create(&NewPost::new(Some("Hello".into()), "<h1>World</h1>", Some(day("2024-03-01"))))
            .await
            .unwrap();

        let posts = store.list(10).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0], created);
        assert_eq!(posts[0].text, "<h1>World</h1>");
        assert_eq!(posts[0].date, day("2024-03-01"));
    }

    #[tokio::test]
    async fn test_create_defaults_to_today() {
        let db = Database::in_memory().await.unwrap();
        let store = db.posts();

        let created = store.create(&NewPost::new(None, "untitled", None)).await.unwrap();

        assert_eq!(created.date, Local::now().date_naive());
        assert_eq!(created.title, None);
    }

    #[tokio::test]
    async fn test_list_respects_limit_and_order() {
        let (_db, store) = seeded().await;

        assert_eq!(titles(&store.list(2).await), vec!["One", "Two"]);
        assert_eq!(titles(&store.list(10).await), vec!["One", "Two", "Three", "Four"]);
        assert!(store.list(0).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_filters_is_empty() {
        let (_db, store) = seeded().await;

        assert!(store.search(&PostQuery::default(), 10).await.is_empty());
        assert!(store.search(&query(None, Some("")), 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_by_date() {
        let (_db, store) = seeded().await;

        let posts = store.search(&query(Some("2024-01-01"), None), 10).await;
        assert_eq!(titles(&posts), vec!["One", "Two"]);
        assert!(posts.iter().all(|p| p.date == day("2024-01-01")));
    }

    #[tokio::test]
    async fn test_search_by_keyword_is_case_sensitive() {
        let (_db, store) = seeded().await;

        let posts = store.search(&query(None, Some("alpha")), 10).await;
        assert_eq!(titles(&posts), vec!["One", "Three"]);

        let posts = store.search(&query(None, Some("Alpha")), 10).await;
        assert_eq!(titles(&posts), vec!["Four"]);
    }

    #[tokio::test]
    async fn test_search_keyword_wildcards_are_literal() {
        let (_db, store) = seeded().await;

        assert!(store.search(&query(None, Some("%")), 10).await.is_empty());
        assert!(store.search(&query(None, Some("a_pha")), 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_by_date_and_keyword() {
        let (_db, store) = seeded().await;

        let posts = store.search(&query(Some("2024-01-01"), Some("alpha")), 10).await;
        assert_eq!(titles(&posts), vec!["One"]);

        let posts = store.search(&query(Some("2024-03-01"), Some("alpha")), 10).await;
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let (_db, store) = seeded().await;

        let posts = store.search(&query(None, Some("a")), 1).await;
        assert_eq!(titles(&posts), vec!["One"]);
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_to_empty() {
        let (db, store) = seeded().await;
        db.close().await;

        assert_eq!(store.read_failures(), 0);
        assert!(store.list(10).await.is_empty());
        assert!(store.search(&query(None, Some("alpha")), 10).await.is_empty());
        assert_eq!(store.read_failures(), 2);

        assert!(store.try_list(10).await.is_err());
        // An empty query short-circuits before storage, so it is not a failure.
        assert!(store.search(&PostQuery::default(), 10).await.is_empty());
        assert_eq!(store.read_failures(), 2);
    }

    #[tokio::test]
    async fn test_create_on_closed_store_fails() {
        let (db, store) = seeded().await;
        db.close().await;

        let result = store.create(&NewPost::new(None, "lost", None)).await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }
}
