//! Storage seams for the comment and like core.
//!
//! Every method is one atomic store operation. Multi-record writes (deleting
//! a subtree, one toggle attempt) run in a single transaction, so a caller
//! that drops the future part way through never leaves partial writes.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use super::{
    error::PoetryError,
    models::{Comment, Like, LikeTarget, Poem, TargetKind},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Inserts the complete record. For a reply the parent is checked as part
    /// of the same write, a missing parent is `NotFound`.
    async fn insert_comment(&self, comment: &Comment) -> Result<(), PoetryError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, PoetryError>;

    async fn update_comment_text(
        &self,
        id: Uuid,
        text: &str,
        updated_at: NaiveDateTime,
    ) -> Result<Option<Comment>, PoetryError>;

    /// Direct children, oldest first.
    async fn children_of(&self, id: Uuid) -> Result<Vec<Comment>, PoetryError>;

    /// Comments strictly below `path`, in path order.
    async fn subtree_of(&self, path: &str) -> Result<Vec<Comment>, PoetryError>;

    /// Every comment on a poem, replies included, in path order.
    async fn comments_on(&self, content_id: Uuid) -> Result<Vec<Comment>, PoetryError>;

    /// Every comment written by `author_id`, newest first.
    async fn comments_by(&self, author_id: Uuid) -> Result<Vec<Comment>, PoetryError>;

    /// Removes the comment at `path`, everything below it and every like on
    /// the removed comments. Returns the number of comments removed.
    async fn delete_subtree(&self, path: &str) -> Result<u64, PoetryError>;

    async fn count_comments_on(&self, content_id: Uuid) -> Result<u64, PoetryError>;

    async fn count_children(&self, id: Uuid) -> Result<u64, PoetryError>;

    async fn count_subtree(&self, path: &str) -> Result<u64, PoetryError>;
}

/// Result of a single toggle attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAttempt {
    Liked,
    Unliked,
    /// A concurrent toggle on the same pair got in between the insert and the
    /// delete; nothing was written and the attempt may be replayed.
    Contended,
}

#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Inserts `like` unless the (user, target) pair already has one, in
    /// which case that one is deleted instead. The target is checked in the
    /// same write, a missing target is `NotFound` and nothing is written.
    async fn toggle_like(&self, like: &Like) -> Result<ToggleAttempt, PoetryError>;

    async fn has_liked(&self, user_id: Uuid, target: &LikeTarget) -> Result<bool, PoetryError>;

    async fn count_likes(&self, target: &LikeTarget) -> Result<u64, PoetryError>;

    /// Like counts for many targets of the same kind. Targets without likes
    /// are absent from the map.
    async fn count_likes_for(
        &self,
        kind: TargetKind,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, u64>, PoetryError>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_poem(&self, id: Uuid) -> Result<Option<Poem>, PoetryError>;
}
