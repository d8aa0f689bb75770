use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CommentId, NewsId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSummary {
    pub news_id: NewsId,
    pub title: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsPayload {
    pub news_id: NewsId,
    pub title: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPayload {
    pub comment_id: CommentId,
    pub news_id: NewsId,
    pub author_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_username: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Pre-filled state of the comment form, present only for
/// authenticated viewers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentForm {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsDetailResponse {
    pub news: NewsPayload,
    pub comments: Vec<CommentPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<CommentForm>,
}
