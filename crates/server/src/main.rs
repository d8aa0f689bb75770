use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use server_api::{
    comment_for_edit, delete_comment, edit_comment, home_page, news_detail, submit_comment,
    ApiContext, ModerationPolicy,
};
use shared::{
    domain::{CommentId, NewsId},
    error::{ApiError, ErrorCode},
    protocol::{CommentPayload, NewsDetailResponse, NewsSummary},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod config;
mod session;

use config::{load_settings, prepare_database_url};
use session::{bearer_token, mint_session_token, verify_session_token, SessionConfig, SessionUser};

const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    session: SessionConfig,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoginResponse {
    user_id: i64,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    text: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        moderation: ModerationPolicy::from_config(settings.bad_words, settings.moderation_warning),
        home_page_size: settings.home_page_size,
    };
    let session = SessionConfig {
        secret: settings.session_secret,
        ttl_seconds: settings.session_ttl_seconds,
    };

    let state = AppState { api, session };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route("/news", get(http_home_page))
        .route(
            "/news/:news_id",
            get(http_news_detail).post(http_submit_comment),
        )
        .route(
            "/comments/:comment_id/edit",
            get(http_comment_for_edit).post(http_edit_comment),
        )
        .route(
            "/comments/:comment_id/delete",
            post(http_delete_comment).delete(http_delete_comment),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ApiError>)> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(error_response(ApiError::field_error(
            "username",
            "username cannot be empty",
        )));
    }

    let user_id = state
        .api
        .storage
        .create_user(username)
        .await
        .map_err(|e| error_response(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    let token = mint_session_token(&state.session, user_id, username).map_err(|e| {
        error_response(ApiError::new(
            ErrorCode::Internal,
            format!("token mint failed: {e}"),
        ))
    })?;

    Ok(Json(LoginResponse {
        user_id: user_id.0,
        token,
    }))
}

async fn http_home_page(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NewsSummary>>, (StatusCode, Json<ApiError>)> {
    home_page(&state.api).await.map(Json).map_err(error_response)
}

async fn http_news_detail(
    State(state): State<Arc<AppState>>,
    Path(news_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<NewsDetailResponse>, (StatusCode, Json<ApiError>)> {
    let viewer = current_user(&state, &headers).map(|user| user.user_id);
    news_detail(&state.api, NewsId(news_id), viewer)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn http_submit_comment(
    State(state): State<Arc<AppState>>,
    Path(news_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<CommentRequest>,
) -> Result<Redirect, (StatusCode, Json<ApiError>)> {
    let news_id = NewsId(news_id);
    let Some(user) = current_user(&state, &headers) else {
        // Anonymous submissions never persist; the client just lands back
        // on the detail page.
        return Ok(redirect_to_comments(news_id));
    };

    submit_comment(&state.api, user.user_id, news_id, &req.text)
        .await
        .map_err(error_response)?;
    Ok(redirect_to_comments(news_id))
}

async fn http_comment_for_edit(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<CommentPayload>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state, &headers).map_err(error_response)?;
    comment_for_edit(&state.api, user.user_id, CommentId(comment_id))
        .await
        .map(Json)
        .map_err(error_response)
}

async fn http_edit_comment(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<CommentRequest>,
) -> Result<Redirect, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state, &headers).map_err(error_response)?;
    let news_id = edit_comment(&state.api, user.user_id, CommentId(comment_id), &req.text)
        .await
        .map_err(error_response)?;
    Ok(redirect_to_comments(news_id))
}

async fn http_delete_comment(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Redirect, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state, &headers).map_err(error_response)?;
    let news_id = delete_comment(&state.api, user.user_id, CommentId(comment_id))
        .await
        .map_err(error_response)?;
    Ok(redirect_to_comments(news_id))
}

fn current_user(state: &AppState, headers: &HeaderMap) -> Option<SessionUser> {
    let token = bearer_token(headers)?;
    verify_session_token(&state.session, token)
}

fn require_user(state: &AppState, headers: &HeaderMap) -> Result<SessionUser, ApiError> {
    current_user(state, headers)
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "login required"))
}

fn redirect_to_comments(news_id: NewsId) -> Redirect {
    Redirect::to(&format!("/news/{}#comments", news_id.0))
}

fn error_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
