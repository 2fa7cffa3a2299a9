pub mod comment;
pub mod counts;
pub mod error;
pub mod handlers;
pub mod like;
pub mod models;
pub mod path;
pub mod repository;
pub mod routes;

use std::{future::Future, sync::Arc, time::Duration};

use self::{
    comment::CommentTree,
    counts::CountAggregator,
    error::PoetryError,
    like::LikeToggle,
    repository::{CommentStore, ContentStore, LikeStore},
};

/// The comment and like core, wired to one store.
#[derive(Clone)]
pub struct Poetry {
    pub comments: CommentTree,
    pub likes: LikeToggle,
    pub counts: CountAggregator,
}

impl Poetry {
    pub fn new<S>(store: Arc<S>, toggle_max_attempts: u32) -> Self
    where
        S: CommentStore + LikeStore + ContentStore + 'static,
    {
        let counts = CountAggregator::new(store.clone(), store.clone());

        Poetry {
            comments: CommentTree::new(store.clone(), store.clone(), counts.clone()),
            likes: LikeToggle::new(
                store.clone(),
                store.clone(),
                store.clone(),
                toggle_max_attempts,
            ),
            counts,
        }
    }
}

/// Runs a core operation with a deadline. Store operations are atomic, so
/// giving up half way leaves nothing half written.
pub async fn within<T, F>(deadline: Duration, operation: F) -> Result<T, PoetryError>
where
    F: Future<Output = Result<T, PoetryError>>,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| PoetryError::DeadlineExceeded)?
}
