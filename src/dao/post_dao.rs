use super::{comment_dao, crud, postgres, user_dao};
use crate::json_map;
use crate::model::bounty::{self, BountyState};
use crate::model::comment::Comment;
use crate::model::course::{Category, Course};
use crate::model::engagement::{apply_toggle, EngagementKind, ToggleOutcome};
use crate::model::post::{Post, PostChanges};
use crate::model::query::{clamp_page, PostQuery, SortKey, SqlParam};
use crate::model::traits::*;
use crate::types::error::Error;
use crate::types::links::JsonMap;
use anyhow::Result;
use tokio_postgres::{GenericClient, Row};

fn now() -> i64 {
    chrono::Local::now().timestamp_millis()
}

pub async fn lock_post<C: GenericClient + Sync>(client: &C, id: i64) -> Result<Post> {
    crud::must_lock::<Post, C>(client, id, "帖子不存在").await
}

/// Writes every counter and the heat score of a locked post.
pub async fn save_counters<C: GenericClient + Sync>(client: &C, post: &Post) -> Result<()> {
    let sql = format!(
        "UPDATE \"{}\" SET like_count = $1, collect_count = $2, comment_count = $3, view_count = $4, heat_score = $5 WHERE id = $6",
        Post::table_name()
    );
    client
        .execute(
            sql.as_str(),
            &[
                &post.like_count,
                &post.collect_count,
                &post.comment_count,
                &post.view_count,
                &post.heat_score,
                &post.id,
            ],
        )
        .await?;
    Ok(())
}

async fn check_refs<C: GenericClient + Sync>(
    client: &C,
    course_id: Option<i64>,
    category_id: Option<i64>,
) -> Result<()> {
    if let Some(id) = course_id {
        if !crud::exists::<Course, C>(client, id).await? {
            return Err(Error::not_found("课程不存在").into());
        }
    }
    if let Some(id) = category_id {
        if !crud::exists::<Category, C>(client, id).await? {
            return Err(Error::not_found("分类不存在").into());
        }
    }
    Ok(())
}

/// Inserts a new post. `post.bounty_points` is the requested bounty; it is
/// taken from the author in the same transaction.
pub async fn create_post(mut post: Post) -> Result<i64> {
    let mut conn = postgres::get_pg_connect().await?;
    let tx = postgres::begin(&mut conn).await?;
    check_refs(&tx, post.course_id, post.category_id).await?;

    let amount = std::mem::take(&mut post.bounty_points);
    let mut author = user_dao::lock_user(&tx, post.uid).await?;
    bounty::escrow(&mut author, &mut post, amount)?;
    if amount > 0 {
        user_dao::save_points(&tx, &author).await?;
    }

    let sql = format!(
        "INSERT INTO \"{}\" (created_at, updated_at, uid, course_id, category_id, title, content, tags, is_anonymous, bounty_points, heat_score) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
        Post::table_name()
    );
    let id: i64 = tx
        .query_one(
            sql.as_str(),
            &[
                &post.created_at,
                &post.updated_at,
                &post.uid,
                &post.course_id,
                &post.category_id,
                &post.title,
                &post.content,
                &post.tags,
                &post.is_anonymous,
                &post.bounty_points,
                &post.heat_score,
            ],
        )
        .await?
        .get(0);
    tx.commit().await?;

    tracing::info!(post_id = id, uid = post.uid, course_id = ?post.course_id, "post created");
    if amount > 0 {
        tracing::info!(post_id = id, uid = author.id, amount, balance = author.points, "bounty escrowed");
        user_dao::sync_ranking(&[&author]).await;
    }
    Ok(id)
}

pub async fn update_post(uid: i64, post_id: i64, changes: PostChanges) -> Result<()> {
    let mut conn = postgres::get_pg_connect().await?;
    let tx = postgres::begin(&mut conn).await?;
    let mut post = lock_post(&tx, post_id).await?;
    if !post.is_author(uid) {
        return Err(Error::permission_denied("没有权限修改").into());
    }
    check_refs(&tx, None, changes.category_id).await?;
    changes.apply(&mut post, now());

    let sql = format!(
        "UPDATE \"{}\" SET title = $1, content = $2, category_id = $3, tags = $4, is_anonymous = $5, updated_at = $6 WHERE id = $7",
        Post::table_name()
    );
    tx.execute(
        sql.as_str(),
        &[
            &post.title,
            &post.content,
            &post.category_id,
            &post.tags,
            &post.is_anonymous,
            &post.updated_at,
            &post.id,
        ],
    )
    .await?;
    tx.commit().await?;
    tracing::info!(post_id, uid, "post updated");
    Ok(())
}

/// Removes a post with its comments and memberships. An escrow that was never
/// settled goes back to the author.
pub async fn delete_post(uid: i64, is_admin: bool, post_id: i64) -> Result<()> {
    let mut conn = postgres::get_pg_connect().await?;
    let tx = postgres::begin(&mut conn).await?;
    let post = lock_post(&tx, post_id).await?;
    if !post.is_author(uid) && !is_admin {
        return Err(Error::permission_denied("没有权限删除").into());
    }

    let mut refunded = None;
    if post.bounty_state() == BountyState::Escrowed {
        let mut author = user_dao::lock_user(&tx, post.uid).await?;
        let amount = bounty::refund(&post, &mut author)?;
        user_dao::save_points(&tx, &author).await?;
        refunded = Some((author, amount));
    }
    crud::delete::<Post, _>(&tx, post_id).await?;
    tx.commit().await?;

    tracing::info!(post_id, uid, "post deleted");
    if let Some((author, amount)) = refunded {
        tracing::info!(post_id, uid = author.id, amount, balance = author.points, "bounty refunded");
        user_dao::sync_ranking(&[&author]).await;
    }
    Ok(())
}

/// Flips a like or collect of `uid` on a post under a row lock.
pub async fn toggle(uid: i64, post_id: i64, kind: EngagementKind) -> Result<ToggleOutcome> {
    let mut conn = postgres::get_pg_connect().await?;
    let tx = postgres::begin(&mut conn).await?;
    let mut post = lock_post(&tx, post_id).await?;

    let table = kind.table_name();
    let existed = has_membership(&tx, kind, post_id, uid).await?;
    match existed {
        true => {
            let sql = format!("DELETE FROM \"{}\" WHERE post_id = $1 AND uid = $2", table);
            tx.execute(sql.as_str(), &[&post_id, &uid]).await?;
        }
        false => {
            let sql = format!(
                "INSERT INTO \"{}\" (post_id, uid, created_at) VALUES ($1, $2, $3)",
                table
            );
            tx.execute(sql.as_str(), &[&post_id, &uid, &now()]).await?;
        }
    }

    let outcome = apply_toggle(&mut post, kind, existed, now());
    let sql = format!(
        "UPDATE \"{}\" SET {} = $1, heat_score = $2 WHERE id = $3",
        Post::table_name(),
        kind.counter_field()
    );
    tx.execute(sql.as_str(), &[&outcome.count, &outcome.heat_score, &post_id])
        .await?;
    tx.commit().await?;
    tracing::info!(post_id, uid, action = outcome.action, count = outcome.count, "engagement toggled");
    Ok(outcome)
}

async fn has_membership<C: GenericClient + Sync>(
    client: &C,
    kind: EngagementKind,
    post_id: i64,
    uid: i64,
) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM \"{}\" WHERE post_id = $1 AND uid = $2",
        kind.table_name()
    );
    Ok(client.query_opt(sql.as_str(), &[&post_id, &uid]).await?.is_some())
}

/// Counts a view, then renders the post with one page of comments.
pub async fn post_detail(viewer: Option<i64>, post_id: i64, page: i64) -> Result<JsonMap> {
    let mut conn = postgres::get_pg_connect().await?;
    let tx = postgres::begin(&mut conn).await?;
    let mut post = lock_post(&tx, post_id).await?;
    post.add_view(now());
    save_counters(&tx, &post).await?;
    tx.commit().await?;

    let client: &tokio_postgres::Client = &**conn;
    let author = user_dao::find_user(client, post.uid).await?;
    let (has_liked, has_collected) = match viewer {
        Some(uid) => (
            has_membership(client, EngagementKind::Like, post_id, uid).await?,
            has_membership(client, EngagementKind::Collect, post_id, uid).await?,
        ),
        None => (false, false),
    };
    let can_select = viewer.map_or(false, |uid| post.can_select_best_answer(uid));
    let comments = comment_dao::comment_page(client, post_id, page, viewer).await?;

    let mut mp = json_map!(
        "post" => post.into_view(&author.username, &author.avatar, viewer),
        "has_liked" => has_liked,
        "has_collected" => has_collected,
        "can_select_best_answer" => can_select
    );
    mp.extend(comments);
    Ok(mp)
}

fn post_with_author(row: Row, viewer: Option<i64>) -> JsonMap {
    let author: String = row.get("username");
    let avatar: String = row.get("avatar");
    <Post as From<Row>>::from(row).into_view(&author, &avatar, viewer)
}

fn page_map(posts: Vec<JsonMap>, total: i64, page: i64, page_size: i64) -> JsonMap {
    json_map!(
        "posts" => posts,
        "total" => total,
        "page" => page,
        "page_count" => ((total + page_size - 1) / page_size).max(1)
    )
}

/// Filtered, sorted page of posts with author names attached.
pub async fn find_posts<C: GenericClient + Sync>(
    client: &C,
    mut q: PostQuery,
    viewer: Option<i64>,
) -> Result<JsonMap> {
    let (clause, params) = q.where_clause("p");
    let from = format!("\"{}\" p {}", Post::table_name(), clause);
    let total = crud::count(client, from.as_str(), &params).await?;
    q.page = clamp_page(q.page, total, q.page_size);

    let sql = format!(
        "SELECT {}, u.username, u.avatar FROM \"{}\" p JOIN \"{}\" u ON u.id = p.uid {} {} LIMIT {} OFFSET {}",
        Post::columns_with_alias("p"),
        Post::table_name(),
        crate::model::user::User::table_name(),
        clause,
        q.sort.order_by("p"),
        q.page_size,
        q.offset()
    );
    let posts = client
        .query(sql.as_str(), crud::param_refs(&params).as_slice())
        .await?
        .into_iter()
        .map(|row| post_with_author(row, viewer))
        .collect();
    Ok(page_map(posts, total, q.page, q.page_size))
}

/// Posts collected by `uid`, most recently collected first.
pub async fn find_collected<C: GenericClient + Sync>(
    client: &C,
    uid: i64,
    keyword: Option<String>,
    page: i64,
    page_size: i64,
) -> Result<JsonMap> {
    let mut q = PostQuery::new(SortKey::Newest, page, page_size);
    q.keyword = keyword;
    let (clause, mut params) = q.where_clause("p");
    params.push(Box::new(uid) as SqlParam);
    let cond = format!("c.uid = ${}", params.len());
    let clause = match clause.is_empty() {
        true => format!("WHERE {}", cond),
        false => format!("{} AND {}", clause, cond),
    };
    let join = format!(
        "\"{}\" p JOIN \"{}\" c ON c.post_id = p.id",
        Post::table_name(),
        EngagementKind::Collect.table_name()
    );

    let total = crud::count(client, format!("{} {}", join, clause).as_str(), &params).await?;
    q.page = clamp_page(q.page, total, q.page_size);
    let sql = format!(
        "SELECT {}, u.username, u.avatar FROM {} JOIN \"{}\" u ON u.id = p.uid {} ORDER BY c.created_at DESC, c.id DESC LIMIT {} OFFSET {}",
        Post::columns_with_alias("p"),
        join,
        crate::model::user::User::table_name(),
        clause,
        q.page_size,
        q.offset()
    );
    let posts = client
        .query(sql.as_str(), crud::param_refs(&params).as_slice())
        .await?
        .into_iter()
        .map(|row| post_with_author(row, Some(uid)))
        .collect();
    Ok(page_map(posts, total, q.page, q.page_size))
}

/// Courses, categories and site-wide totals for the forum index.
pub async fn forum_stats<C: GenericClient + Sync>(client: &C) -> Result<JsonMap> {
    let courses = crud::find_all::<Course, C>(client, "order_num ASC, id ASC").await?;
    let categories = crud::find_all::<Category, C>(client, "id ASC").await?;
    let post_count = crud::count(client, format!("\"{}\"", Post::table_name()).as_str(), &[]).await?;
    let comment_count =
        crud::count(client, format!("\"{}\"", Comment::table_name()).as_str(), &[]).await?;
    Ok(json_map!(
        "courses" => courses,
        "categories" => categories,
        "post_count" => post_count,
        "comment_count" => comment_count
    ))
}

/// Totals over the posts written by `uid`.
pub async fn my_post_stats<C: GenericClient + Sync>(client: &C, uid: i64) -> Result<JsonMap> {
    let sql = format!(
        "SELECT count(*), COALESCE(SUM(like_count), 0)::BIGINT, COALESCE(SUM(comment_count), 0)::BIGINT FROM \"{}\" WHERE uid = $1",
        Post::table_name()
    );
    let row = client.query_one(sql.as_str(), &[&uid]).await?;
    let (posts, likes, comments): (i64, i64, i64) = (row.get(0), row.get(1), row.get(2));
    Ok(json_map!(
        "total_posts" => posts,
        "total_likes" => likes,
        "total_comments" => comments
    ))
}

/// Pays the post's bounty to the author of `comment_id`. `Ok(None)` when the
/// requester may not settle this post.
pub async fn select_best_answer(uid: i64, post_id: i64, comment_id: i64) -> Result<Option<i32>> {
    let mut conn = postgres::get_pg_connect().await?;
    let tx = postgres::begin(&mut conn).await?;
    let mut post = lock_post(&tx, post_id).await?;
    let comment = crud::must_get::<Comment, _>(&tx, comment_id, "评论不存在").await?;
    if !post.can_select_best_answer(uid) || comment.post_id != post.id {
        return Ok(None);
    }

    let mut answerer = user_dao::lock_user(&tx, comment.uid).await?;
    if !bounty::select_best_answer(&mut post, &comment, uid, &mut answerer)? {
        return Ok(None);
    }
    let sql = format!("UPDATE \"{}\" SET best_answer = $1 WHERE id = $2", Post::table_name());
    tx.execute(sql.as_str(), &[&post.best_answer, &post.id]).await?;
    user_dao::save_points(&tx, &answerer).await?;
    tx.commit().await?;

    tracing::info!(
        post_id,
        comment_id,
        answerer = answerer.id,
        amount = post.bounty_points,
        "best answer selected"
    );
    user_dao::sync_ranking(&[&answerer]).await;
    Ok(Some(post.bounty_points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_map_counts_pages() {
        let mp = page_map(vec![], 41, 3, 20);
        assert_eq!(mp["page_count"], json!(3));
        assert_eq!(mp["total"], json!(41));
        let empty = page_map(vec![], 0, 1, 20);
        assert_eq!(empty["page_count"], json!(1));
    }
}
