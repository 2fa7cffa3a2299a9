use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    App,
    error::AppError,
    identity::{AuthUser, Identity},
    poetry::{
        error::PoetryError,
        like::ToggleOutcome,
        models::LikeTarget,
        within,
    },
};

#[derive(Deserialize)]
pub struct LikeSubmission {
    #[serde(default)]
    content_ref: Option<Uuid>,
    #[serde(default)]
    comment_ref: Option<Uuid>,
}

fn report(
    user: &Identity,
    target: &dyn std::fmt::Debug,
    outcome: Result<ToggleOutcome, PoetryError>,
) -> Result<ToggleOutcome, AppError> {
    match outcome {
        Ok(outcome) => {
            tracing::info!(
                user_id = %user.user_id,
                ?target,
                action = ?outcome.action,
                count = outcome.count,
                "Like toggled"
            );
            Ok(outcome)
        }
        Err(e @ PoetryError::Conflict { .. }) => {
            tracing::warn!(user_id = %user.user_id, ?target, "Like toggle kept losing races");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn toggle(ctx: &App, user: Identity, target: LikeTarget) -> Result<ToggleOutcome, AppError> {
    let outcome = within(
        ctx.config.request_deadline,
        ctx.poetry.likes.toggle(user.user_id, target),
    )
    .await;

    report(&user, &target, outcome)
}

#[debug_handler]
pub async fn like_poem(
    State(ctx): State<App>,
    Path(poem_id): Path<Uuid>,
    AuthUser(user): AuthUser,
) -> Result<Json<ToggleOutcome>, AppError> {
    Ok(Json(toggle(&ctx, user, LikeTarget::Poem(poem_id)).await?))
}

#[debug_handler]
pub async fn like_comment(
    State(ctx): State<App>,
    Path(comment_id): Path<Uuid>,
    AuthUser(user): AuthUser,
) -> Result<Json<ToggleOutcome>, AppError> {
    Ok(Json(
        toggle(&ctx, user, LikeTarget::Comment(comment_id)).await?,
    ))
}

/// Toggle for clients that address the target by its two optional
/// references, exactly one of which must be set.
#[debug_handler]
pub async fn toggle_like(
    State(ctx): State<App>,
    AuthUser(user): AuthUser,
    crate::json::Json(submission): crate::json::Json<LikeSubmission>,
) -> Result<Json<ToggleOutcome>, AppError> {
    let outcome = within(
        ctx.config.request_deadline,
        ctx.poetry
            .likes
            .toggle_refs(user.user_id, submission.content_ref, submission.comment_ref),
    )
    .await;

    let target = (submission.content_ref, submission.comment_ref);
    Ok(Json(report(&user, &target, outcome)?))
}
