use crate::constants;
use crate::utils::jwt::{self, UserToken};
use axum::{http::Request, response::IntoResponse};
use axum_extra::middleware::Next;

/// Puts the decoded `UserToken` into the request extensions. Requests without
/// a valid bearer token pass through anonymously.
pub async fn token_decode<B>(mut req: Request<B>, next: Next<B>) -> impl IntoResponse {
    let claims = req
        .headers()
        .get(constants::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .and_then(|token| jwt::decode::<UserToken>(token).ok());
    if let Some(claims) = claims {
        req.extensions_mut().insert(claims);
    }
    next.run(req).await
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::bearer_token;

    #[test]
    fn strips_the_scheme() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  x "), Some("x"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }

    #[test]
    fn scheme_needs_a_separating_space() {
        assert_eq!(bearer_token("BearerXYZ"), None);
        assert_eq!(bearer_token("bearerabc.def"), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
