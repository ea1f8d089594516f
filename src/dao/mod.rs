pub mod comment_dao;
pub mod crud;
pub mod post_dao;
pub mod postgres;
pub mod redis_db;
pub mod user_dao;
