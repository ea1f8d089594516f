use crate::types::error_response::ErrorResponse;
use crate::utils::jwt::UserToken;
use axum::{http::Request, response::IntoResponse};
use axum_extra::middleware::Next;

pub async fn auth_login<B>(req: Request<B>, next: Next<B>) -> impl IntoResponse {
    match req.extensions().get::<UserToken>() {
        Some(_) => Ok(next.run(req).await),
        None => Err(ErrorResponse::not_authenticated()),
    }
}
