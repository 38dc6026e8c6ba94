//! # mn-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core
//! contracts. Response bodies expose only public comment fields; email
//! addresses and identity material stay server-side.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use mn_core::error::AppError;
use mn_core::models::{Comment, CommentEdit, DeleteOutcome, Mode, NewComment, VoteOutcome};
use mn_core::moderation::{self, ActivateOutcome};
use mn_core::token::{Claim, TokenError};
use mn_core::validate;
use serde::{Deserialize, Serialize};

use crate::auth::{client_addr, cookie_name, cookie_token};
use crate::AppState;

/// Translates the core taxonomy into HTTP statuses. Store failures are
/// logged server-side and reported without detail.
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "store failure");
            return (status, "internal error").into_response();
        }
        (status, self.0.to_string()).into_response()
    }
}

/// Public view of a comment. The `hash` is the privacy-preserving
/// identity fingerprint; email and raw addresses are never serialized.
#[derive(Debug, Serialize)]
pub struct CommentDto {
    pub id: i64,
    pub parent: Option<i64>,
    pub created: DateTime<Utc>,
    pub modified: Option<DateTime<Utc>>,
    pub mode: i64,
    pub text: String,
    pub author: Option<String>,
    pub website: Option<String>,
    pub hash: String,
    pub likes: i64,
    pub dislikes: i64,
}

impl From<&Comment> for CommentDto {
    fn from(c: &Comment) -> Self {
        CommentDto {
            id: c.id,
            parent: c.parent,
            created: c.created,
            modified: c.modified,
            mode: c.mode.as_i64(),
            text: c.text.clone(),
            author: c.author.clone(),
            website: c.website.clone(),
            hash: c.remote_addr.clone(),
            likes: c.likes,
            dislikes: c.dislikes,
        }
    }
}

// ── Creation ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UriQuery {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct NewCommentReq {
    pub text: String,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notification: bool,
}

/// Creates a comment: 201 when immediately visible, 202 when held for
/// moderation. Sets the signed ownership cookie for the new id.
pub async fn new_comment(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UriQuery>,
    headers: HeaderMap,
    Json(req): Json<NewCommentReq>,
) -> Result<Response, ApiError> {
    let addr = client_addr(&headers);
    let new = NewComment {
        parent: req.parent,
        remote_addr: state.hasher.fingerprint(&addr, req.email.as_deref()),
        text: req.text,
        author: req.author,
        email: req.email,
        website: req.website,
        mode: moderation::entry_mode(state.policy.moderation_enabled),
        notification: req.notification,
    };
    validate::check_new(&new)?;

    let comment = state.repo.create(&q.uri, req.title.as_deref(), new).await?;
    tracing::debug!(id = comment.id, uri = %q.uri, "comment created");

    let token = state
        .signer
        .sign(Claim::Ownership { id: comment.id }, Some(state.policy.ownership_window))?;
    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        cookie_name(comment.id),
        token,
        state.policy.ownership_window.num_seconds()
    );

    let status = if comment.mode == Mode::Pending {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    let mut response = (status, Json(CommentDto::from(&comment))).into_response();
    response.headers_mut().append(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| AppError::Store(e.to_string()))?,
    );
    Ok(response)
}

// ── Listing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    pub uri: String,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    /// Thread id, or null when the URI has no thread (not an error).
    pub id: Option<i64>,
    pub total_replies: i64,
    pub replies: Vec<CommentDto>,
}

pub async fn fetch(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FetchQuery>,
) -> Result<Json<FetchResponse>, ApiError> {
    let thread = state.repo.thread_by_uri(&q.uri).await?;
    let total_replies = state
        .repo
        .count_by_uris(std::slice::from_ref(&q.uri))
        .await?
        .first()
        .copied()
        .unwrap_or(0);
    let replies = state.repo.fetch(&q.uri, q.parent, q.limit).await?;

    Ok(Json(FetchResponse {
        id: thread.map(|t| t.id),
        total_replies,
        replies: replies.iter().map(CommentDto::from).collect(),
    }))
}

/// Single-comment view. Pending comments are visible only to their
/// owner; everyone else learns nothing beyond "not found".
pub async fn view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<CommentDto>, ApiError> {
    let comment = state
        .repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("comment".into(), id))?;

    if comment.mode == Mode::Pending {
        let token = cookie_token(&headers, id)
            .ok_or_else(|| AppError::NotFound("comment".into(), id))?;
        state
            .signer
            .verify_ownership(&token, id)
            .map_err(|_| AppError::NotFound("comment".into(), id))?;
    }
    Ok(Json(CommentDto::from(&comment)))
}

// ── Client edit and delete ───────────────────────────────────────────────────

pub async fn edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(edit): Json<CommentEdit>,
) -> Result<Json<CommentDto>, ApiError> {
    let token =
        cookie_token(&headers, id).ok_or_else(|| AppError::Forbidden("not your comment".into()))?;
    state.signer.verify_ownership(&token, id)?;
    validate::check_edit(&edit)?;

    let updated = state.repo.update(id, edit).await?;
    Ok(Json(CommentDto::from(&updated)))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Option<CommentDto>>, ApiError> {
    let token =
        cookie_token(&headers, id).ok_or_else(|| AppError::Forbidden("not your comment".into()))?;
    state.signer.verify_ownership(&token, id)?;

    match state.repo.delete(id).await? {
        DeleteOutcome::Tombstoned(c) => Ok(Json(Some(CommentDto::from(&c)))),
        DeleteOutcome::Removed => Ok(Json(None)),
    }
}

// ── Moderation links ─────────────────────────────────────────────────────────

/// Moderator actions arrive as signed links: the token must carry the
/// moderation claim for exactly this comment id.
pub async fn moderate(
    State(state): State<Arc<AppState>>,
    Path((id, action, token)): Path<(i64, String, String)>,
    body: String,
) -> Result<Response, ApiError> {
    match action.as_str() {
        "activate" => {
            state.signer.verify_moderation(&token, id)?;
            let reply = match state.repo.activate(id).await? {
                ActivateOutcome::Activated => "Comment has been activated",
                ActivateOutcome::AlreadyActivated => "Already activated",
            };
            Ok(reply.into_response())
        }
        "edit" => {
            state.signer.verify_moderation(&token, id)?;
            let edit: CommentEdit = serde_json::from_str(&body)
                .map_err(|e| AppError::Validation(format!("invalid edit payload: {e}")))?;
            validate::check_edit(&edit)?;
            let updated = state.repo.update(id, edit).await?;
            Ok(Json(CommentDto::from(&updated)).into_response())
        }
        "delete" => {
            state.signer.verify_moderation(&token, id)?;
            state.repo.delete(id).await?;
            Ok("Comment has been deleted".into_response())
        }
        // Unknown actions get 404, before any token is inspected
        _ => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Path((id, email, token)): Path<(i64, String, String)>,
) -> Result<Response, ApiError> {
    state.signer.verify_unsubscribe(&token, &email)?;
    state.repo.unsubscribe(id, &email).await?;
    Ok("Successfully unsubscribed".into_response())
}

// ── Votes ────────────────────────────────────────────────────────────────────

pub async fn like(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<VoteOutcome>, ApiError> {
    vote_on(&state, id, &headers, true).await
}

pub async fn dislike(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<VoteOutcome>, ApiError> {
    vote_on(&state, id, &headers, false).await
}

async fn vote_on(
    state: &AppState,
    id: i64,
    headers: &HeaderMap,
    like: bool,
) -> Result<Json<VoteOutcome>, ApiError> {
    let voter = state.hasher.fingerprint(&client_addr(headers), None);
    Ok(Json(state.repo.vote(id, like, &voter).await?))
}

// ── Aggregation ──────────────────────────────────────────────────────────────

pub async fn count(
    State(state): State<Arc<AppState>>,
    Json(uris): Json<Vec<String>>,
) -> Result<Json<Vec<i64>>, ApiError> {
    Ok(Json(state.repo.count_by_uris(&uris).await?))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LatestDto {
    pub uri: String,
    #[serde(flatten)]
    pub comment: CommentDto,
}

pub async fn latest(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LatestQuery>,
) -> Result<Response, ApiError> {
    if !state.policy.latest_enabled {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let limit = q
        .limit
        .ok_or_else(|| AppError::Validation("limit must be a positive integer".into()))?;

    let items = state.repo.latest(limit).await?;
    let body: Vec<LatestDto> = items
        .iter()
        .map(|(thread, comment)| LatestDto {
            uri: thread.uri.clone(),
            comment: CommentDto::from(comment),
        })
        .collect();
    Ok(Json(body).into_response())
}
