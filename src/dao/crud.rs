use crate::model::query::SqlParam;
use crate::model::traits::*;
use crate::types::error::Error;
use anyhow::Result;
use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, Row};

pub fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

fn from_row<T: Model>(row: Row) -> T {
    <T as From<Row>>::from(row)
}

pub async fn get_object<T: Model, C: GenericClient + Sync>(client: &C, id: i64) -> Result<Option<T>> {
    let sql = format!("{} WHERE id = $1", T::select_sql());
    Ok(client.query_opt(sql.as_str(), &[&id]).await?.map(from_row::<T>))
}

/// Row-locking read, only meaningful inside a transaction.
pub async fn lock_object<T: Model, C: GenericClient + Sync>(client: &C, id: i64) -> Result<Option<T>> {
    let sql = format!("{} WHERE id = $1 FOR UPDATE", T::select_sql());
    Ok(client.query_opt(sql.as_str(), &[&id]).await?.map(from_row::<T>))
}

/// Like `get_object`, but a missing row becomes a NotFound error with `msg`.
pub async fn must_get<T: Model, C: GenericClient + Sync>(client: &C, id: i64, msg: &str) -> Result<T> {
    get_object::<T, C>(client, id)
        .await?
        .ok_or_else(|| Error::not_found(msg).into())
}

pub async fn must_lock<T: Model, C: GenericClient + Sync>(client: &C, id: i64, msg: &str) -> Result<T> {
    lock_object::<T, C>(client, id)
        .await?
        .ok_or_else(|| Error::not_found(msg).into())
}

pub async fn exists<T: Model, C: GenericClient + Sync>(client: &C, id: i64) -> Result<bool> {
    let sql = format!("SELECT 1 FROM \"{}\" WHERE id = $1", T::table_name());
    Ok(client.query_opt(sql.as_str(), &[&id]).await?.is_some())
}

pub async fn count<C: GenericClient + Sync>(client: &C, from: &str, params: &[SqlParam]) -> Result<i64> {
    let sql = format!("SELECT count(*) FROM {}", from);
    Ok(client
        .query_one(sql.as_str(), param_refs(params).as_slice())
        .await?
        .get(0))
}

pub async fn find_all<T: Model, C: GenericClient + Sync>(client: &C, order_by: &str) -> Result<Vec<T>> {
    let sql = format!("{} ORDER BY {}", T::select_sql(), order_by);
    Ok(client
        .query(sql.as_str(), &[])
        .await?
        .into_iter()
        .map(from_row::<T>)
        .collect())
}

pub async fn delete<T: Model, C: GenericClient + Sync>(client: &C, id: i64) -> Result<u64> {
    let sql = format!("DELETE FROM \"{}\" WHERE id = $1", T::table_name());
    Ok(client.execute(sql.as_str(), &[&id]).await?)
}
