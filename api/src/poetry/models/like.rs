use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::poetry::error::{PoetryError, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Poem,
    Comment,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Poem => "poem",
            TargetKind::Comment => "comment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "poem" => Some(TargetKind::Poem),
            "comment" => Some(TargetKind::Comment),
            _ => None,
        }
    }
}

/// The single thing a like applies to. The kind is whichever variant is
/// populated, it can't be set on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LikeTarget {
    Poem(Uuid),
    Comment(Uuid),
}

impl LikeTarget {
    /// Exactly one of the references has to be given.
    pub fn from_refs(
        content_ref: Option<Uuid>,
        comment_ref: Option<Uuid>,
    ) -> Result<Self, PoetryError> {
        match (content_ref, comment_ref) {
            (Some(poem), None) => Ok(LikeTarget::Poem(poem)),
            (None, Some(comment)) => Ok(LikeTarget::Comment(comment)),
            (Some(_), Some(_)) => Err(PoetryError::validation(
                "A like targets either a poem or a comment, not both",
            )),
            (None, None) => Err(PoetryError::validation(
                "A like needs a poem or a comment to target",
            )),
        }
    }

    pub fn new(kind: TargetKind, id: Uuid) -> Self {
        match kind {
            TargetKind::Poem => LikeTarget::Poem(id),
            TargetKind::Comment => LikeTarget::Comment(id),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            LikeTarget::Poem(_) => TargetKind::Poem,
            LikeTarget::Comment(_) => TargetKind::Comment,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            LikeTarget::Poem(id) | LikeTarget::Comment(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target: LikeTarget,
    pub created_at: NaiveDateTime,
}

impl Like {
    pub fn new(user_id: Uuid, target: LikeTarget) -> Self {
        Like {
            id: Uuid::now_v7(),
            user_id,
            target,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// How a like is laid out in the `likes` table.
#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = crate::schema::likes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LikeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_kind: String,
    pub target_id: Uuid,
    pub created_at: NaiveDateTime,
}

impl From<&Like> for LikeRecord {
    fn from(like: &Like) -> Self {
        LikeRecord {
            id: like.id,
            user_id: like.user_id,
            target_kind: like.target.kind().as_str().to_string(),
            target_id: like.target.id(),
            created_at: like.created_at,
        }
    }
}

impl TryFrom<LikeRecord> for Like {
    type Error = StorageError;

    fn try_from(r: LikeRecord) -> Result<Self, Self::Error> {
        let kind = TargetKind::parse(&r.target_kind).ok_or_else(|| {
            StorageError::Corrupt(format!(
                "like `{}` has unknown target kind `{}`",
                r.id, r.target_kind
            ))
        })?;

        Ok(Like {
            id: r.id,
            user_id: r.user_id,
            target: LikeTarget::new(kind, r.target_id),
            created_at: r.created_at,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn target_needs_exactly_one_reference() {
        let id = Uuid::now_v7();
        assert_eq!(
            LikeTarget::from_refs(Some(id), None).unwrap(),
            LikeTarget::Poem(id)
        );
        assert_eq!(
            LikeTarget::from_refs(None, Some(id)).unwrap(),
            LikeTarget::Comment(id)
        );
        assert!(matches!(
            LikeTarget::from_refs(Some(id), Some(id)),
            Err(PoetryError::Validation(_))
        ));
        assert!(matches!(
            LikeTarget::from_refs(None, None),
            Err(PoetryError::Validation(_))
        ));
    }

    #[test]
    fn record_kind_is_derived_from_target() {
        let like = Like::new(Uuid::now_v7(), LikeTarget::Comment(Uuid::now_v7()));
        let record = LikeRecord::from(&like);
        assert_eq!(record.target_kind, "comment");
        assert_eq!(record.target_id, like.target.id());
        assert_eq!(Like::try_from(record).unwrap(), like);
    }

    #[test]
    fn unknown_kind_is_corrupt() {
        let record = LikeRecord {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            target_kind: "reply".into(),
            target_id: Uuid::now_v7(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        assert!(matches!(
            Like::try_from(record),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn target_serializes_as_tagged_union() {
        let id = Uuid::nil();
        let json = serde_json::to_value(LikeTarget::Poem(id)).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "poem", "id": id }));
    }
}
