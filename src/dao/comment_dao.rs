use super::{crud, post_dao, postgres};
use crate::constants;
use crate::json_map;
use crate::model::comment::{reply_parent, Comment, CommentTree};
use crate::model::query::clamp_page;
use crate::model::traits::*;
use crate::model::user::User;
use crate::types::error::Error;
use crate::types::links::JsonMap;
use anyhow::Result;
use serde_json::Value as Json;
use std::collections::HashMap;
use tokio_postgres::{GenericClient, Row};

pub struct NewComment {
    pub uid: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub is_anonymous: bool,
}

/// Adds a comment, or a reply when `parent_id` is set. Only top-level
/// comments count towards the post's `comment_count`.
pub async fn add_comment(c: NewComment) -> Result<i64> {
    let mut conn = postgres::get_pg_connect().await?;
    let tx = postgres::begin(&mut conn).await?;
    let mut post = post_dao::lock_post(&tx, c.post_id).await?;

    let parent_id = match c.parent_id {
        Some(id) => {
            let parent = crud::get_object::<Comment, _>(&tx, id)
                .await?
                .ok_or_else(|| Error::not_found("父评论不存在或不属于该帖子"))?;
            Some(reply_parent(&parent, post.id)?)
        }
        None => None,
    };

    let now = chrono::Local::now().timestamp_millis();
    let sql = format!(
        "INSERT INTO \"{}\" (created_at, uid, post_id, parent_id, content, is_anonymous) VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        Comment::table_name()
    );
    let id: i64 = tx
        .query_one(
            sql.as_str(),
            &[&now, &c.uid, &post.id, &parent_id, &c.content, &c.is_anonymous],
        )
        .await?
        .get(0);
    post.add_comment(parent_id.is_none(), now);
    post_dao::save_counters(&tx, &post).await?;
    tx.commit().await?;

    tracing::info!(comment_id = id, post_id = post.id, uid = c.uid, parent_id = ?parent_id, "comment added");
    Ok(id)
}

/// Replies to `comment_id` on whatever post it belongs to.
pub async fn reply(uid: i64, comment_id: i64, content: String, is_anonymous: bool) -> Result<i64> {
    let parent = {
        let conn = postgres::get_pg_connect().await?;
        crud::must_get::<Comment, _>(&**conn, comment_id, "评论不存在").await?
    };
    add_comment(NewComment {
        uid,
        post_id: parent.post_id,
        parent_id: Some(parent.id),
        content,
        is_anonymous,
    })
    .await
}

/// Deletes a comment; a top-level one takes its replies with it. Threads
/// holding the best answer are kept.
pub async fn delete_comment(uid: i64, is_admin: bool, comment_id: i64) -> Result<()> {
    let mut conn = postgres::get_pg_connect().await?;
    let post_id = crud::must_get::<Comment, _>(&**conn, comment_id, "评论不存在")
        .await?
        .post_id;

    let tx = postgres::begin(&mut conn).await?;
    let mut post = post_dao::lock_post(&tx, post_id).await?;
    let comment = crud::must_get::<Comment, _>(&tx, comment_id, "评论不存在").await?;
    if comment.uid != uid && !is_admin {
        return Err(Error::permission_denied("没有权限删除").into());
    }
    if let Some(best) = post.best_answer {
        let sql = format!(
            "{} WHERE post_id = $1 AND (id = $2 OR parent_id = $2)",
            Comment::select_sql()
        );
        let thread = tx
            .query(sql.as_str(), &[&post_id, &comment_id])
            .await?
            .into_iter()
            .map(<Comment as From<Row>>::from)
            .collect();
        if CommentTree::build(thread).thread_ids(comment_id).contains(&best) {
            return Err(Error::permission_denied("最佳答案不能删除").into());
        }
    }

    crud::delete::<Comment, _>(&tx, comment_id).await?;
    post.remove_comment(comment.is_top_level(), chrono::Local::now().timestamp_millis());
    post_dao::save_counters(&tx, &post).await?;
    tx.commit().await?;
    tracing::info!(comment_id, post_id, uid, "comment deleted");
    Ok(())
}

pub async fn like_comment(comment_id: i64) -> Result<i32> {
    let conn = postgres::get_pg_connect().await?;
    let sql = format!(
        "UPDATE \"{}\" SET like_count = like_count + 1 WHERE id = $1 RETURNING like_count",
        Comment::table_name()
    );
    let row = conn
        .query_opt(sql.as_str(), &[&comment_id])
        .await?
        .ok_or_else(|| Error::not_found("评论不存在"))?;
    let like_count: i32 = row.get(0);
    tracing::debug!(comment_id, like_count, "comment liked");
    Ok(like_count)
}

async fn comments_with_authors<C: GenericClient + Sync>(
    client: &C,
    condition: &str,
    param: &(dyn tokio_postgres::types::ToSql + Sync),
    tail: &str,
) -> Result<(Vec<Comment>, HashMap<i64, (String, String)>)> {
    let sql = format!(
        "SELECT {}, u.username, u.avatar FROM \"{}\" c JOIN \"{}\" u ON u.id = c.uid WHERE {} ORDER BY c.created_at ASC, c.id ASC {}",
        Comment::columns_with_alias("c"),
        Comment::table_name(),
        User::table_name(),
        condition,
        tail
    );
    let mut authors = HashMap::new();
    let comments = client
        .query(sql.as_str(), &[param])
        .await?
        .into_iter()
        .map(|row| {
            let names: (String, String) = (row.get("username"), row.get("avatar"));
            let c = <Comment as From<Row>>::from(row);
            authors.insert(c.id, names);
            c
        })
        .collect();
    Ok((comments, authors))
}

/// One page of top-level comments, oldest first, each with a `replies` list.
pub async fn comment_page<C: GenericClient + Sync>(
    client: &C,
    post_id: i64,
    page: i64,
    viewer: Option<i64>,
) -> Result<JsonMap> {
    let page_size = constants::COMMENTS_PAGE_SIZE;
    let sql = format!(
        "SELECT count(*) FROM \"{}\" WHERE post_id = $1 AND parent_id IS NULL",
        Comment::table_name()
    );
    let total: i64 = client.query_one(sql.as_str(), &[&post_id]).await?.get(0);
    let page = clamp_page(page, total, page_size);

    let tail = format!("LIMIT {} OFFSET {}", page_size, (page - 1) * page_size);
    let (mut comments, mut authors) =
        comments_with_authors(client, "c.post_id = $1 AND c.parent_id IS NULL", &post_id, &tail)
            .await?;
    let root_ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
    if !root_ids.is_empty() {
        let (replies, reply_authors) =
            comments_with_authors(client, "c.parent_id = ANY($1)", &root_ids, "").await?;
        comments.extend(replies);
        authors.extend(reply_authors);
    }

    let render = |c: &Comment| -> JsonMap {
        let (name, avatar) = authors.get(&c.id).cloned().unwrap_or_default();
        c.clone().into_view(&name, &avatar, viewer)
    };
    let tree = CommentTree::build(comments);
    let list: Vec<JsonMap> = tree
        .roots()
        .map(|root| {
            let mut mp = render(root);
            let replies: Vec<Json> = tree.replies_of(root.id).map(|r| Json::Object(render(r))).collect();
            mp.insert("replies".into(), Json::Array(replies));
            mp
        })
        .collect();

    Ok(json_map!(
        "comments" => list,
        "comment_total" => total,
        "comment_page" => page,
        "comment_page_count" => ((total + page_size - 1) / page_size).max(1)
    ))
}
