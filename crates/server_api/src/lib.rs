use chrono::Utc;
use shared::{
    domain::{CommentId, NewsId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{CommentForm, CommentPayload, NewsDetailResponse, NewsPayload, NewsSummary},
};
use storage::{Storage, StoredComment, StoredNews};
use tracing::debug;

pub mod moderation;

pub use moderation::ModerationPolicy;

pub const MAX_COMMENT_BYTES: usize = 4096;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub moderation: ModerationPolicy,
    pub home_page_size: u32,
}

pub async fn home_page(ctx: &ApiContext) -> Result<Vec<NewsSummary>, ApiError> {
    let news = ctx
        .storage
        .list_recent_news(ctx.home_page_size)
        .await
        .map_err(internal)?;
    Ok(news
        .into_iter()
        .map(|item| NewsSummary {
            news_id: item.news_id,
            title: item.title,
            date: item.date,
        })
        .collect())
}

/// Detail payload for one news item. The comment form is present only for
/// authenticated viewers.
pub async fn news_detail(
    ctx: &ApiContext,
    news_id: NewsId,
    viewer: Option<UserId>,
) -> Result<NewsDetailResponse, ApiError> {
    let news = ctx
        .storage
        .get_news(news_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "news not found"))?;
    let comments = ctx
        .storage
        .list_comments_for_news(news_id)
        .await
        .map_err(internal)?;

    Ok(NewsDetailResponse {
        news: news_payload(news),
        comments: comments.into_iter().map(comment_payload).collect(),
        form: viewer.map(|_| CommentForm::default()),
    })
}

pub async fn submit_comment(
    ctx: &ApiContext,
    user_id: UserId,
    news_id: NewsId,
    text: &str,
) -> Result<CommentPayload, ApiError> {
    ctx.storage
        .get_news(news_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "news not found"))?;
    validate_comment_text(&ctx.moderation, text)?;

    let created_at = Utc::now();
    let comment_id = ctx
        .storage
        .insert_comment(news_id, user_id, text, created_at)
        .await
        .map_err(internal)?;
    let author_username = ctx
        .storage
        .username_for_user(user_id)
        .await
        .map_err(internal)?;

    Ok(CommentPayload {
        comment_id,
        news_id,
        author_id: user_id,
        author_username,
        text: text.to_string(),
        created_at,
    })
}

/// Current state of a comment for pre-filling the edit form. Author-only.
pub async fn comment_for_edit(
    ctx: &ApiContext,
    user_id: UserId,
    comment_id: CommentId,
) -> Result<CommentPayload, ApiError> {
    let comment = ensure_comment_author(ctx, comment_id, user_id).await?;
    Ok(comment_payload(comment))
}

/// Replaces the comment text under the same moderation policy as creation.
/// Returns the owning news id for the redirect. Author-only.
pub async fn edit_comment(
    ctx: &ApiContext,
    user_id: UserId,
    comment_id: CommentId,
    text: &str,
) -> Result<NewsId, ApiError> {
    let comment = ensure_comment_author(ctx, comment_id, user_id).await?;
    validate_comment_text(&ctx.moderation, text)?;

    let updated = ctx
        .storage
        .update_comment_text(comment_id, user_id, text)
        .await
        .map_err(internal)?;
    if !updated {
        // Row vanished between the ownership check and the write.
        return Err(ApiError::new(ErrorCode::NotFound, "comment not found"));
    }
    Ok(comment.news_id)
}

/// Removes the comment and returns the owning news id for the redirect.
/// Author-only.
pub async fn delete_comment(
    ctx: &ApiContext,
    user_id: UserId,
    comment_id: CommentId,
) -> Result<NewsId, ApiError> {
    let comment = ensure_comment_author(ctx, comment_id, user_id).await?;

    let removed = ctx
        .storage
        .delete_comment(comment_id, user_id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(ApiError::new(ErrorCode::NotFound, "comment not found"));
    }
    Ok(comment.news_id)
}

pub fn validate_comment_text(policy: &ModerationPolicy, text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::field_error("text", "comment text cannot be empty"));
    }
    if text.len() > MAX_COMMENT_BYTES {
        return Err(ApiError::field_error(
            "text",
            format!("comment exceeds {MAX_COMMENT_BYTES} bytes"),
        ));
    }
    if policy.matches(text) {
        debug!("comment text rejected by moderation policy");
        return Err(ApiError::field_error("text", policy.warning()));
    }
    Ok(())
}

/// Loads the comment when `user_id` is its author. Any other outcome, the
/// comment missing included, reads as not-found so non-owners cannot probe
/// for existence.
async fn ensure_comment_author(
    ctx: &ApiContext,
    comment_id: CommentId,
    user_id: UserId,
) -> Result<StoredComment, ApiError> {
    let comment = ctx
        .storage
        .get_comment(comment_id)
        .await
        .map_err(internal)?;
    match comment {
        Some(comment) if comment.author_id == user_id => Ok(comment),
        _ => Err(ApiError::new(ErrorCode::NotFound, "comment not found")),
    }
}

fn news_payload(news: StoredNews) -> NewsPayload {
    NewsPayload {
        news_id: news.news_id,
        title: news.title,
        body: news.body,
        date: news.date,
    }
}

fn comment_payload(comment: StoredComment) -> CommentPayload {
    CommentPayload {
        comment_id: comment.comment_id,
        news_id: comment.news_id,
        author_id: comment.author_id,
        author_username: comment.author_username,
        text: comment.text,
        created_at: comment.created_at,
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
