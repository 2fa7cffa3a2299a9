use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    App,
    error::AppError,
    identity::MaybeAuthUser,
    poetry::{error::PoetryError, models::LikeTarget, within},
};

#[derive(Serialize)]
pub struct PoemCounts {
    likes: u64,
    comments: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    is_liked: Option<bool>,
}

#[derive(Serialize)]
pub struct CommentCounts {
    likes: u64,
    direct_replies: u64,
    total_replies: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    is_liked: Option<bool>,
}

pub async fn get_poem_counts(
    State(ctx): State<App>,
    Path(poem_id): Path<Uuid>,
    MaybeAuthUser(auth_user): MaybeAuthUser,
) -> Result<Json<PoemCounts>, AppError> {
    let target = LikeTarget::Poem(poem_id);
    let poetry = &ctx.poetry;

    let counts = within(ctx.config.request_deadline, async {
        Ok::<_, PoetryError>(PoemCounts {
            likes: poetry.counts.like_count(&target).await?,
            comments: poetry.counts.comment_count(poem_id).await?,
            is_liked: match &auth_user {
                Ok(user) => Some(poetry.likes.is_liked(user.user_id, &target).await?),
                Err(_) => None,
            },
        })
    })
    .await?;

    Ok(Json(counts))
}

pub async fn get_comment_counts(
    State(ctx): State<App>,
    Path(comment_id): Path<Uuid>,
    MaybeAuthUser(auth_user): MaybeAuthUser,
) -> Result<Json<CommentCounts>, AppError> {
    let target = LikeTarget::Comment(comment_id);
    let poetry = &ctx.poetry;

    let counts = within(ctx.config.request_deadline, async {
        // also answers NotFound for unknown comments
        let total_replies = poetry.counts.subtree_reply_count(comment_id).await?;

        Ok::<_, PoetryError>(CommentCounts {
            likes: poetry.counts.like_count(&target).await?,
            direct_replies: poetry.counts.direct_reply_count(comment_id).await?,
            total_replies,
            is_liked: match &auth_user {
                Ok(user) => Some(poetry.likes.is_liked(user.user_id, &target).await?),
                Err(_) => None,
            },
        })
    })
    .await?;

    Ok(Json(counts))
}
