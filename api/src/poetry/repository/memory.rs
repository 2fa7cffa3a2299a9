use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CommentStore, ContentStore, LikeStore, ToggleAttempt};
use crate::poetry::{
    error::PoetryError,
    models::{Comment, Like, LikeTarget, Poem, TargetKind},
    path,
};

#[derive(Default)]
struct State {
    poems: HashMap<Uuid, Poem>,
    comments: HashMap<Uuid, Comment>,
    // ordered index used for prefix scans; byte order of paths is a
    // pre-order walk of each tree
    by_path: BTreeMap<String, Uuid>,
    likes: HashMap<(Uuid, LikeTarget), Like>,
}

impl State {
    fn subtree_ids(&self, path: &str) -> Vec<Uuid> {
        let prefix = path::descendant_prefix(path);
        self.by_path
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .map(|(_, id)| *id)
            .collect()
    }
}

/// A store that keeps everything in process. Every call takes the lock once,
/// which makes each call atomic and each read a consistent snapshot.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poems are owned by another service; this is how they get here when
    /// there is no database.
    pub async fn insert_poem(&self, poem: Poem) {
        self.state.write().await.poems.insert(poem.id, poem);
    }

    #[cfg(test)]
    pub async fn like_records_for(&self, user_id: Uuid, target: &LikeTarget) -> usize {
        self.state
            .read()
            .await
            .likes
            .values()
            .filter(|l| l.user_id == user_id && &l.target == target)
            .count()
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, comment: &Comment) -> Result<(), PoetryError> {
        let mut state = self.state.write().await;

        if state.comments.contains_key(&comment.id) || state.by_path.contains_key(&comment.path)
        {
            return Err(PoetryError::ConstraintViolation(format!(
                "comment `{}` already exists",
                comment.id
            )));
        }

        if let Some(parent_id) = comment.parent_id {
            if !state.comments.contains_key(&parent_id) {
                return Err(PoetryError::comment_not_found(parent_id));
            }
        }

        state.by_path.insert(comment.path.clone(), comment.id);
        state.comments.insert(comment.id, comment.clone());

        Ok(())
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, PoetryError> {
        Ok(self.state.read().await.comments.get(&id).cloned())
    }

    async fn update_comment_text(
        &self,
        id: Uuid,
        text: &str,
        updated_at: NaiveDateTime,
    ) -> Result<Option<Comment>, PoetryError> {
        let mut state = self.state.write().await;
        Ok(state.comments.get_mut(&id).map(|c| {
            c.text = text.to_string();
            c.updated_at = updated_at;
            c.clone()
        }))
    }

    async fn children_of(&self, id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        let state = self.state.read().await;
        let mut children: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.parent_id == Some(id))
            .cloned()
            .collect();
        children.sort_by_key(|c| (c.created_at, c.id));
        Ok(children)
    }

    async fn subtree_of(&self, path: &str) -> Result<Vec<Comment>, PoetryError> {
        let state = self.state.read().await;
        Ok(state
            .subtree_ids(path)
            .iter()
            .filter_map(|id| state.comments.get(id).cloned())
            .collect())
    }

    async fn comments_on(&self, content_id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        let state = self.state.read().await;
        Ok(state
            .by_path
            .values()
            .filter_map(|id| state.comments.get(id))
            .filter(|c| c.content_id == content_id)
            .cloned()
            .collect())
    }

    async fn comments_by(&self, author_id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.author_id == author_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| std::cmp::Reverse((c.created_at, c.id)));
        Ok(comments)
    }

    async fn delete_subtree(&self, path: &str) -> Result<u64, PoetryError> {
        let mut state = self.state.write().await;

        let Some(&root) = state.by_path.get(path) else {
            return Ok(0);
        };

        let mut removed: HashSet<Uuid> = state.subtree_ids(path).into_iter().collect();
        removed.insert(root);

        for id in &removed {
            if let Some(c) = state.comments.remove(id) {
                state.by_path.remove(&c.path);
            }
        }

        state.likes.retain(|(_, target), _| match target {
            LikeTarget::Comment(id) => !removed.contains(id),
            LikeTarget::Poem(_) => true,
        });

        Ok(removed.len() as u64)
    }

    async fn count_comments_on(&self, content_id: Uuid) -> Result<u64, PoetryError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|c| c.content_id == content_id)
            .count() as u64)
    }

    async fn count_children(&self, id: Uuid) -> Result<u64, PoetryError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|c| c.parent_id == Some(id))
            .count() as u64)
    }

    async fn count_subtree(&self, path: &str) -> Result<u64, PoetryError> {
        Ok(self.state.read().await.subtree_ids(path).len() as u64)
    }
}

#[async_trait]
impl LikeStore for MemoryStore {
    async fn toggle_like(&self, like: &Like) -> Result<ToggleAttempt, PoetryError> {
        let mut state = self.state.write().await;
        let key = (like.user_id, like.target);

        match like.target {
            LikeTarget::Poem(id) if !state.poems.contains_key(&id) => {
                return Err(PoetryError::poem_not_found(id));
            }
            LikeTarget::Comment(id) if !state.comments.contains_key(&id) => {
                return Err(PoetryError::comment_not_found(id));
            }
            _ => {}
        }

        if state.likes.remove(&key).is_some() {
            Ok(ToggleAttempt::Unliked)
        } else {
            state.likes.insert(key, like.clone());
            Ok(ToggleAttempt::Liked)
        }
    }

    async fn has_liked(&self, user_id: Uuid, target: &LikeTarget) -> Result<bool, PoetryError> {
        Ok(self
            .state
            .read()
            .await
            .likes
            .contains_key(&(user_id, *target)))
    }

    async fn count_likes(&self, target: &LikeTarget) -> Result<u64, PoetryError> {
        let state = self.state.read().await;
        Ok(state.likes.keys().filter(|(_, t)| t == target).count() as u64)
    }

    async fn count_likes_for(
        &self,
        kind: TargetKind,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, u64>, PoetryError> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let state = self.state.read().await;

        let mut counts = HashMap::new();
        for (_, target) in state.likes.keys() {
            if target.kind() == kind && wanted.contains(&target.id()) {
                *counts.entry(target.id()).or_insert(0) += 1;
            }
        }

        Ok(counts)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_poem(&self, id: Uuid) -> Result<Option<Poem>, PoetryError> {
        Ok(self.state.read().await.poems.get(&id).cloned())
    }
}
