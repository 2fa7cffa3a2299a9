//! Turning a flat, path-ordered list of comments into nested threads.

use std::{
    cmp::Reverse,
    collections::{HashMap, HashSet},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::poetry::models::Comment;

// The model that will be returned to the client
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub like_count: u64,
    pub reply_count: u64,
    pub children: Vec<CommentNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SortType {
    #[default]
    Oldest,
    New,
    Best,
}

impl<'de> Deserialize<'de> for SortType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match String::deserialize(deserializer)?.as_str() {
            "oldest" => Ok(SortType::Oldest),
            "new" => Ok(SortType::New),
            "best" => Ok(SortType::Best),
            _ => Err(serde::de::Error::custom("invalid sort type")),
        }
    }
}

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Window over the top-level comments of a poem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    offset: usize,
    size: usize,
}

impl Page {
    pub fn new(offset: Option<usize>, size: Option<usize>) -> Self {
        Page {
            offset: offset.unwrap_or(0),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.size).collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

/// Nests every comment under its parent. Comments whose parent is not part
/// of `flat` become roots, which is what a subtree fetch needs for its top
/// node.
pub fn assemble(
    flat: Vec<Comment>,
    like_counts: &HashMap<Uuid, u64>,
    sort: SortType,
) -> Vec<CommentNode> {
    let present: HashSet<Uuid> = flat.iter().map(|c| c.id).collect();

    let mut children = HashMap::<Uuid, Vec<Comment>>::with_capacity(flat.len());
    let mut roots = vec![];

    for comment in flat {
        match comment.parent_id {
            Some(parent_id) if present.contains(&parent_id) => {
                children.entry(parent_id).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    let mut forest: Vec<CommentNode> = roots
        .into_iter()
        .map(|c| build_node(c, &mut children, like_counts))
        .collect();

    match sort {
        SortType::Oldest => sort_oldest(&mut forest),
        SortType::New => sort_new(&mut forest),
        SortType::Best => sort_best(&mut forest),
    }

    forest
}

fn build_node(
    comment: Comment,
    children: &mut HashMap<Uuid, Vec<Comment>>,
    like_counts: &HashMap<Uuid, u64>,
) -> CommentNode {
    let nodes: Vec<CommentNode> = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|c| build_node(c, children, like_counts))
        .collect();

    CommentNode {
        like_count: like_counts.get(&comment.id).copied().unwrap_or(0),
        reply_count: nodes.len() as u64,
        comment,
        children: nodes,
    }
}

fn sort_oldest(nodes: &mut [CommentNode]) {
    nodes.sort_by_key(|n| (n.comment.created_at, n.comment.id));

    for node in nodes {
        sort_oldest(&mut node.children);
    }
}

fn sort_best(nodes: &mut [CommentNode]) {
    // sort the top level comments
    nodes.sort_by_key(|n| (Reverse(n.like_count), n.comment.created_at));

    // sort the children recursively
    for node in nodes {
        sort_best(&mut node.children);
    }
}

fn sort_new(nodes: &mut [CommentNode]) {
    nodes.sort_by(|a, b| b.comment.created_at.cmp(&a.comment.created_at));

    // replies under a new comment still read best first
    for node in nodes {
        sort_best(&mut node.children);
    }
}
