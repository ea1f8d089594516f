use super::{crud, postgres, redis_db};
use crate::constants;
use crate::model::{traits::*, user::User};
use crate::types::links::JsonMap;
use anyhow::Result;
use serde_json::json;
use tokio_postgres::{GenericClient, Row};

pub async fn find_user<C: GenericClient + Sync>(client: &C, id: i64) -> Result<User> {
    crud::must_get::<User, C>(client, id, "用户不存在").await
}

pub async fn lock_user<C: GenericClient + Sync>(client: &C, id: i64) -> Result<User> {
    crud::must_lock::<User, C>(client, id, "用户不存在").await
}

pub async fn save_points<C: GenericClient + Sync>(client: &C, user: &User) -> Result<()> {
    let sql = format!("UPDATE \"{}\" SET points = $1 WHERE id = $2", User::table_name());
    client.execute(sql.as_str(), &[&user.points, &user.id]).await?;
    Ok(())
}

/// Rebuilds the ranking set from the user table unless it is cached. The
/// write is dropped when a balance changed since the table was read; false
/// then means the set is unusable and callers read from SQL.
pub async fn cache_ranking() -> Result<bool> {
    let zkey = constants::POINTS_RANKING_ZSET;
    if redis_db::exists(zkey).await? {
        return Ok(true);
    }
    let seen = redis_db::get_i64(constants::POINTS_RANKING_VERSION).await?;
    let conn = postgres::get_pg_connect().await?;
    let sql = format!("SELECT id, points FROM \"{}\"", User::table_name());
    let items: Vec<(f64, i64)> = conn
        .query(sql.as_str(), &[])
        .await?
        .into_iter()
        .map(|row| {
            let (id, points): (i64, i32) = (row.get(0), row.get(1));
            (User::ranking_score(points), id)
        })
        .collect();
    let stored = redis_db::replace_zset_if_unchanged(
        zkey,
        constants::POINTS_RANKING_VERSION,
        seen,
        items.as_slice(),
        constants::POINTS_RANKING_EXPIRE,
    )
    .await?;
    if !stored {
        tracing::debug!("balances moved during ranking rebuild, skipped");
    }
    Ok(stored)
}

async fn write_ranking(users: &[&User]) -> Result<()> {
    redis_db::incr(constants::POINTS_RANKING_VERSION).await?;
    for u in users {
        let score = User::ranking_score(u.points);
        redis_db::zadd_xx(constants::POINTS_RANKING_ZSET, u.id, score).await?;
    }
    Ok(())
}

/// Pushes committed balances into the ranking set and bumps its version so a
/// rebuild that read older balances is discarded. A failed write drops the
/// set so the next read rebuilds it from PostgreSQL.
pub async fn sync_ranking(users: &[&User]) {
    if let Err(e) = write_ranking(users).await {
        tracing::warn!(error = %e, "ranking cache update failed, dropping it");
        redis_db::del(constants::POINTS_RANKING_ZSET)
            .await
            .unwrap_or(());
    }
}

async fn users_by_ids<C: GenericClient + Sync>(client: &C, ids: &[i64]) -> Result<Vec<User>> {
    let sql = format!("{} WHERE id = ANY($1)", User::select_sql());
    Ok(client
        .query(sql.as_str(), &[&ids])
        .await?
        .into_iter()
        .map(<User as From<Row>>::from)
        .collect())
}

/// Reads the top of the set down to the score of place `limit`, including
/// everyone tied with it, so the id tie-break can be applied here.
async fn ranked_from_cache<C: GenericClient + Sync>(
    client: &C,
    limit: isize,
) -> Result<Vec<User>> {
    let zkey = constants::POINTS_RANKING_ZSET;
    let floor = redis_db::zrevrange_withscores(zkey, limit - 1, limit - 1)
        .await?
        .first()
        .map(|(_, score)| *score);
    let ids = match floor {
        Some(score) => redis_db::zrevrangebyscore_from(zkey, score).await?,
        None => redis_db::zrevrange(zkey, 0, -1).await?,
    };
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let users = users_by_ids(client, ids.as_slice()).await?;
    Ok(User::sort_ranking(users, limit as usize))
}

async fn ranked_from_sql<C: GenericClient + Sync>(client: &C, limit: isize) -> Result<Vec<User>> {
    let sql = format!("{} ORDER BY points DESC, id ASC LIMIT $1", User::select_sql());
    Ok(client
        .query(sql.as_str(), &[&(limit as i64)])
        .await?
        .into_iter()
        .map(<User as From<Row>>::from)
        .collect())
}

/// Top `limit` users by points, highest first, ties by lower id.
pub async fn points_ranking(limit: isize) -> Result<Vec<JsonMap>> {
    let conn = postgres::get_pg_connect().await?;
    let client: &tokio_postgres::Client = &**conn;
    let users = match cache_ranking().await? {
        true => ranked_from_cache(client, limit).await?,
        false => ranked_from_sql(client, limit).await?,
    };
    Ok(users
        .into_iter()
        .enumerate()
        .map(|(i, u)| {
            let mut mp = u.public_info();
            mp.insert("rank".into(), json!(i + 1));
            mp
        })
        .collect())
}

/// Number of users with strictly more points, plus one.
pub async fn rank_of<C: GenericClient + Sync>(client: &C, user: &User) -> Result<i64> {
    let above = match cache_ranking().await? {
        true => {
            let min = format!("({}", User::ranking_score(user.points));
            redis_db::zcount(constants::POINTS_RANKING_ZSET, min, "+inf").await?
        }
        false => {
            let sql = format!("SELECT count(*) FROM \"{}\" WHERE points > $1", User::table_name());
            client.query_one(sql.as_str(), &[&user.points]).await?.get(0)
        }
    };
    Ok(above + 1)
}
