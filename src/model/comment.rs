use super::traits::{Model, StructFieldNames};
use super::user::attach_author;
use crate::constants;
use crate::types::error::Error;
use crate::types::links::JsonMap;
use course_forum::{FromPgRow, GetFieldNames, IntoJsonMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(
    Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow, GetFieldNames, IntoJsonMap,
)]
pub struct Comment {
    pub id: i64,
    pub created_at: i64,
    pub uid: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>, //为空时是对post的顶级评论
    pub content: String,
    pub is_anonymous: bool,
    pub like_count: i32,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Id the reply should hang under: replies to a reply join the same
    /// thread, keeping the tree two levels deep.
    pub fn thread_root(&self) -> i64 {
        self.parent_id.unwrap_or(self.id)
    }

    pub fn into_view(self, author: &str, avatar: &str, viewer: Option<i64>) -> JsonMap {
        let hide = self.is_anonymous && viewer != Some(self.uid);
        let mut mp = self.into_json_map();
        attach_author(&mut mp, hide, author, avatar);
        mp
    }
}

/// Checks a reply target and returns the parent id to store.
pub fn reply_parent(parent: &Comment, post_id: i64) -> Result<i64, Error> {
    if parent.post_id != post_id {
        return Err(Error::not_found("父评论不存在或不属于该帖子"));
    }
    Ok(parent.thread_root())
}

impl Model for Comment {
    fn table_name() -> &'static str {
        constants::COMMENT_TABLE_NAME
    }
}

/// Comments of one post indexed by id. Parents are ids, not references.
#[derive(Debug, Default)]
pub struct CommentTree {
    nodes: HashMap<i64, Comment>,
    roots: Vec<i64>,
    replies: HashMap<i64, Vec<i64>>,
}

impl CommentTree {
    /// Roots and replies keep the order they arrive in. Replies whose parent is
    /// missing are dropped.
    pub fn build(comments: Vec<Comment>) -> Self {
        let mut tree = CommentTree::default();
        let mut pending = Vec::new();
        for c in comments {
            match c.parent_id {
                None => tree.roots.push(c.id),
                Some(parent) => pending.push((parent, c.id)),
            }
            tree.nodes.insert(c.id, c);
        }
        for (parent, id) in pending {
            let root = match tree.nodes.get(&parent) {
                Some(p) => p.thread_root(),
                None => {
                    tree.nodes.remove(&id);
                    continue;
                }
            };
            tree.replies.entry(root).or_default().push(id);
        }
        tree
    }

    pub fn roots(&self) -> impl Iterator<Item = &Comment> {
        self.roots.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn replies_of(&self, id: i64) -> impl Iterator<Item = &Comment> {
        self.replies
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.nodes.get(id))
    }

    /// The comment itself plus every reply under it.
    pub fn thread_ids(&self, id: i64) -> Vec<i64> {
        let mut ids = vec![id];
        ids.extend(self.replies_of(id).map(|c| c.id));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i64, post_id: i64, parent_id: Option<i64>) -> Comment {
        Comment {
            id,
            post_id,
            parent_id,
            uid: id * 10,
            content: format!("c{}", id),
            ..Default::default()
        }
    }

    #[test]
    fn replies_group_under_their_root() {
        let tree = CommentTree::build(vec![
            comment(1, 5, None),
            comment(2, 5, Some(1)),
            comment(3, 5, Some(1)),
            comment(4, 5, None),
        ]);
        assert_eq!(tree.roots().count(), 2);
        let ids: Vec<_> = tree.replies_of(1).map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(tree.replies_of(4).count(), 0);
        assert_eq!(tree.thread_ids(1), vec![1, 2, 3]);
    }

    #[test]
    fn reply_to_reply_stays_two_levels() {
        let parent = comment(2, 5, Some(1));
        assert_eq!(reply_parent(&parent, 5).unwrap(), 1);
        let tree = CommentTree::build(vec![
            comment(1, 5, None),
            comment(2, 5, Some(1)),
            comment(3, 5, Some(2)),
        ]);
        let ids: Vec<_> = tree.replies_of(1).map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn reply_to_another_posts_comment_is_rejected() {
        let parent = comment(1, 6, None);
        let e = reply_parent(&parent, 5).unwrap_err();
        assert_eq!(e.error_type, crate::types::error::ErrorType::NotFound);
    }

    #[test]
    fn orphan_replies_are_dropped() {
        let tree = CommentTree::build(vec![comment(1, 5, None), comment(2, 5, Some(9))]);
        assert_eq!(tree.roots().count(), 1);
        assert_eq!(tree.replies_of(9).count(), 0);
        assert_eq!(tree.thread_ids(1), vec![1]);
    }
}
