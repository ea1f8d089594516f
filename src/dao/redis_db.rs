use crate::constants;
use anyhow::Result;
use mobc_redis::{
    mobc::{Connection as PoolConnection, Pool},
    redis,
    redis::{aio::Connection, AsyncCommands, Client, ToRedisArgs},
    RedisConnectionManager,
};

use lazy_static::lazy_static;
lazy_static! {
    static ref POOL: Pool<RedisConnectionManager> = create_redis_pool();
}

fn create_redis_pool() -> Pool<RedisConnectionManager> {
    let client = Client::open(crate::config::env::redis_url())
        .unwrap_or_else(|e| panic!("无法连接到 redis 数据库: {}", e));
    let manager = RedisConnectionManager::new(client);
    Pool::builder()
        .max_open(constants::REDIS_POOL_SIZE)
        .build(manager)
}

pub async fn get_conn() -> Result<PoolConnection<RedisConnectionManager>> {
    POOL.get()
        .await
        .map_err(|e| anyhow::anyhow!("获取 redis 连接失败: {:?}", e))
}

pub async fn ping() -> Result<String> {
    let mut conn = get_conn().await?;
    let res: String = redis::cmd("PING")
        .query_async(&mut conn as &mut Connection)
        .await?;
    Ok(res)
}

pub async fn exists<K: AsRef<str>>(key: K) -> Result<bool> {
    let mut conn = get_conn().await?;
    Ok(conn.exists(key.as_ref()).await?)
}

pub async fn del<K: AsRef<str>>(key: K) -> Result<()> {
    let mut conn = get_conn().await?;
    let _: () = conn.del(key.as_ref()).await?;
    Ok(())
}

pub async fn get_i64<K: AsRef<str>>(key: K) -> Result<i64> {
    let mut conn = get_conn().await?;
    let v: Option<i64> = conn.get(key.as_ref()).await?;
    Ok(v.unwrap_or(0))
}

pub async fn incr<K: AsRef<str>>(key: K) -> Result<i64> {
    let mut conn = get_conn().await?;
    Ok(conn.incr(key.as_ref(), 1).await?)
}

/// `ZADD key XX`: updates an existing member of an existing set, never
/// creates either.
pub async fn zadd_xx<K: AsRef<str>, M: ToRedisArgs, S: ToRedisArgs>(
    key: K,
    member: M,
    score: S,
) -> Result<()> {
    let mut conn = get_conn().await?;
    let _: i64 = redis::cmd("ZADD")
        .arg(key.as_ref())
        .arg("XX")
        .arg(score)
        .arg(member)
        .query_async(&mut conn as &mut Connection)
        .await?;
    Ok(())
}

/// Replaces the sorted set `key` with `items` (`(score, member)`) and sets its
/// ttl, but only if `guard` still holds `seen`. The check and the write are
/// one WATCH/MULTI transaction. Returns false when `guard` moved.
pub async fn replace_zset_if_unchanged<K: AsRef<str>, G: AsRef<str>>(
    key: K,
    guard: G,
    seen: i64,
    items: &[(f64, i64)],
    expire: usize,
) -> Result<bool> {
    let mut conn = get_conn().await?;
    let conn = &mut conn as &mut Connection;
    let _: () = redis::cmd("WATCH").arg(guard.as_ref()).query_async(&mut *conn).await?;
    let current: Option<i64> = conn.get(guard.as_ref()).await?;
    if current.unwrap_or(0) != seen {
        let _: () = redis::cmd("UNWATCH").query_async(&mut *conn).await?;
        return Ok(false);
    }
    let res: redis::Value = replace_zset_pipe(key.as_ref(), items, expire)
        .query_async(&mut *conn)
        .await?;
    // EXEC answers nil when the watched key changed
    Ok(res != redis::Value::Nil)
}

/// MULTI, DEL, ZADD, EXPIRE, EXEC. An empty `items` only deletes, so no
/// set is ever left without a ttl.
fn replace_zset_pipe(key: &str, items: &[(f64, i64)], expire: usize) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic().del(key).ignore();
    if !items.is_empty() {
        pipe.zadd_multiple(key, items).ignore();
        pipe.expire(key, expire).ignore();
    }
    pipe
}

/// `(member, score)` pairs for ranks `l..=r`, highest score first.
pub async fn zrevrange_withscores<K: AsRef<str>>(
    key: K,
    l: isize,
    r: isize,
) -> Result<Vec<(i64, f64)>> {
    let mut conn = get_conn().await?;
    Ok(conn.zrevrange_withscores(key.as_ref(), l, r).await?)
}

/// Members from highest score to lowest, ranks `l..=r`.
pub async fn zrevrange<K: AsRef<str>>(key: K, l: isize, r: isize) -> Result<Vec<i64>> {
    let mut conn = get_conn().await?;
    Ok(conn.zrevrange(key.as_ref(), l, r).await?)
}

/// Members with `min <= score`, highest first.
pub async fn zrevrangebyscore_from<K: AsRef<str>>(key: K, min: f64) -> Result<Vec<i64>> {
    let mut conn = get_conn().await?;
    Ok(conn.zrevrangebyscore(key.as_ref(), "+inf", min).await?)
}

pub async fn zcount<K: AsRef<str>, M: ToRedisArgs + Send + Sync, MM: ToRedisArgs + Send + Sync>(
    key: K,
    min: M,
    max: MM,
) -> Result<i64> {
    let mut conn = get_conn().await?;
    Ok(conn.zcount(key.as_ref(), min, max).await?)
}

#[cfg(test)]
mod tests {
    use super::replace_zset_pipe;

    fn packed(items: &[(f64, i64)]) -> String {
        let bytes = replace_zset_pipe("ranking", items, 60).get_packed_pipeline();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn position(haystack: &str, cmd: &str) -> usize {
        haystack
            .find(&format!("\r\n{}\r\n", cmd))
            .unwrap_or_else(|| panic!("{} missing", cmd))
    }

    #[test]
    fn rebuild_is_one_transaction_with_ttl() {
        let p = packed(&[(5.0, 1), (3.0, 2)]);
        let order: Vec<usize> = ["MULTI", "DEL", "ZADD", "EXPIRE", "EXEC"]
            .iter()
            .map(|c| position(&p, c))
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{}", p);
    }

    #[test]
    fn empty_rebuild_only_deletes() {
        let p = packed(&[]);
        assert!(p.contains("DEL"));
        assert!(!p.contains("ZADD"));
        assert!(!p.contains("EXPIRE"));
    }
}
