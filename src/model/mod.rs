pub mod bounty;
pub mod comment;
pub mod course;
pub mod engagement;
pub mod post;
pub mod query;
pub mod traits;
pub mod user;
