use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{CommentId, NewsId, UserId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredNews {
    pub news_id: NewsId,
    pub title: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredComment {
    pub comment_id: CommentId,
    pub news_id: NewsId,
    pub author_id: UserId,
    pub author_username: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (username) VALUES (?)
             ON CONFLICT(username) DO UPDATE SET username=excluded.username
             RETURNING id",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn username_for_user(&self, user_id: UserId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT username FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn create_news(
        &self,
        title: &str,
        body: &str,
        date: DateTime<Utc>,
    ) -> Result<NewsId> {
        let rec = sqlx::query("INSERT INTO news (title, body, date) VALUES (?, ?, ?) RETURNING id")
            .bind(title)
            .bind(body)
            .bind(date)
            .fetch_one(&self.pool)
            .await?;
        Ok(NewsId(rec.get::<i64, _>(0)))
    }

    pub async fn get_news(&self, news_id: NewsId) -> Result<Option<StoredNews>> {
        let row = sqlx::query("SELECT id, title, body, date FROM news WHERE id = ?")
            .bind(news_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| StoredNews {
            news_id: NewsId(r.get::<i64, _>(0)),
            title: r.get::<String, _>(1),
            body: r.get::<String, _>(2),
            date: r.get::<DateTime<Utc>, _>(3),
        }))
    }

    /// Most recent first; id breaks ties between equal dates.
    pub async fn list_recent_news(&self, limit: u32) -> Result<Vec<StoredNews>> {
        let rows = sqlx::query(
            "SELECT id, title, body, date
             FROM news
             ORDER BY date DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredNews {
                news_id: NewsId(r.get::<i64, _>(0)),
                title: r.get::<String, _>(1),
                body: r.get::<String, _>(2),
                date: r.get::<DateTime<Utc>, _>(3),
            })
            .collect())
    }

    pub async fn insert_comment(
        &self,
        news_id: NewsId,
        author_id: UserId,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<CommentId> {
        let rec = sqlx::query(
            "INSERT INTO comments (news_id, author_user_id, text, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(news_id.0)
        .bind(author_id.0)
        .bind(text)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(CommentId(rec.get::<i64, _>(0)))
    }

    pub async fn get_comment(&self, comment_id: CommentId) -> Result<Option<StoredComment>> {
        let row = sqlx::query(
            "SELECT c.id, c.news_id, c.author_user_id, u.username, c.text, c.created_at
             FROM comments c
             INNER JOIN users u ON u.id = c.author_user_id
             WHERE c.id = ?",
        )
        .bind(comment_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(stored_comment_from_row))
    }

    /// Oldest first; id breaks ties between equal timestamps.
    pub async fn list_comments_for_news(&self, news_id: NewsId) -> Result<Vec<StoredComment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.news_id, c.author_user_id, u.username, c.text, c.created_at
             FROM comments c
             INNER JOIN users u ON u.id = c.author_user_id
             WHERE c.news_id = ?
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(news_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(stored_comment_from_row).collect())
    }

    /// Updates the text only when `author_id` owns the comment. Returns
    /// whether a row was touched.
    pub async fn update_comment_text(
        &self,
        comment_id: CommentId,
        author_id: UserId,
        text: &str,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE comments SET text = ? WHERE id = ? AND author_user_id = ?",
        )
        .bind(text)
        .bind(comment_id.0)
        .bind(author_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Deletes the comment only when `author_id` owns it. Returns whether a
    /// row was removed.
    pub async fn delete_comment(&self, comment_id: CommentId, author_id: UserId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM comments WHERE id = ? AND author_user_id = ?")
            .bind(comment_id.0)
            .bind(author_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn comment_count_for_news(&self, news_id: NewsId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE news_id = ?")
            .bind(news_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn stored_comment_from_row(r: sqlx::sqlite::SqliteRow) -> StoredComment {
    StoredComment {
        comment_id: CommentId(r.get::<i64, _>(0)),
        news_id: NewsId(r.get::<i64, _>(1)),
        author_id: UserId(r.get::<i64, _>(2)),
        author_username: r.get::<Option<String>, _>(3),
        text: r.get::<String, _>(4),
        created_at: r.get::<DateTime<Utc>, _>(5),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
