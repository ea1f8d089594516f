pub mod auth_login;
pub mod token_decode;
