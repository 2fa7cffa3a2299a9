use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::poetry::path;

#[derive(Queryable, Selectable, Insertable, Debug, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: Uuid,
    pub content_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub text: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub path: String,
    pub depth: i32,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::comments)]
pub struct UpdateComment<'a> {
    pub text: &'a str,
    pub updated_at: NaiveDateTime,
}

pub const MAX_TEXT_LEN: usize = 5000;

impl Comment {
    /// Builds the complete record of a top-level comment. The id is generated
    /// here so the path is known before anything is written.
    pub fn new_root(content_id: Uuid, author_id: Uuid, text: String) -> Self {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().naive_utc();
        Comment {
            id,
            content_id,
            author_id,
            parent_id: None,
            text,
            created_at: now,
            updated_at: now,
            path: path::root(id),
            depth: 0,
        }
    }

    pub fn new_reply(parent: &Comment, author_id: Uuid, text: String) -> Self {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().naive_utc();
        Comment {
            id,
            content_id: parent.content_id,
            author_id,
            parent_id: Some(parent.id),
            text,
            created_at: now,
            updated_at: now,
            path: path::child(&parent.path, id),
            depth: parent.depth + 1,
        }
    }
}

/// Trims the text and checks its length.
pub fn validate_text(text: &str) -> Result<String, &'static str> {
    let text = text.trim();

    if text.is_empty() {
        return Err("No content provided");
    }

    if text.chars().count() > MAX_TEXT_LEN {
        return Err("Content too long (max 5000 characters)");
    }

    Ok(text.to_string())
}
