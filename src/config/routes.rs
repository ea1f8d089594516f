use crate::{
    middleware::{auth_login::auth_login, token_decode::token_decode},
    service::forum_service,
};
use axum::{
    routing::{get, post},
    Router,
};
use axum_extra::middleware::from_fn;

/// Routes readable without logging in. `/post/:post_id` also takes
/// `POST /post/new`, which checks the login itself.
fn public_routes() -> Router {
    Router::new()
        .route("/posts", get(forum_service::forum_index))
        .route("/course/:course_id/posts", get(forum_service::course_posts))
        .route(
            "/post/:post_id",
            get(forum_service::post_detail).post(forum_service::create_post),
        )
        .route("/ranking", get(forum_service::ranking))
}

fn login_routes() -> Router {
    Router::new()
        .route("/course/:course_id/post/new", post(forum_service::create_course_post))
        .route("/post/:post_id/update", post(forum_service::update_post))
        .route("/post/:post_id/delete", post(forum_service::delete_post))
        .route("/post/:post_id/like", post(forum_service::like_post))
        .route("/post/:post_id/collect", post(forum_service::collect_post))
        .route("/post/:post_id/comment", post(forum_service::comment_post))
        .route(
            "/post/:post_id/best_answer/:comment_id",
            post(forum_service::select_best_answer),
        )
        .route("/comment/:comment_id/reply", post(forum_service::reply_comment))
        .route("/comment/:comment_id/delete", post(forum_service::delete_comment))
        .route("/comment/:comment_id/like", post(forum_service::like_comment))
        .route("/my/posts", get(forum_service::my_posts))
        .route("/my/collected", get(forum_service::my_collected))
        .route_layer(from_fn(auth_login))
}

pub fn config_routes() -> Router {
    Router::new()
        .nest(
            "/api/forum",
            Router::new().merge(public_routes()).merge(login_routes()),
        )
        .route_layer(from_fn(token_decode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::utils::jwt::testing::token_for;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value as Json};
    use tower::ServiceExt;

    fn request(method: &str, uri: &str, token: Option<&str>, body: Json) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(t) = token {
            builder = builder.header(constants::AUTHORIZATION, format!("Bearer {}", t));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(req: Request<Body>) -> (StatusCode, Json) {
        let resp = config_routes().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_body() -> Json {
        json!({"title": "二叉树遍历", "content": "求讲解", "bounty_points": 10})
    }

    #[tokio::test]
    async fn mutations_need_login() {
        for uri in [
            "/api/forum/post/3/like",
            "/api/forum/post/3/collect",
            "/api/forum/post/3/best_answer/4",
            "/api/forum/comment/4/delete",
        ] {
            let (status, body) = send(request("POST", uri, None, json!({}))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(body, json!({"status": false, "msg": "未登录"}));
        }
    }

    #[tokio::test]
    async fn personal_lists_need_login() {
        let (status, body) = send(request("GET", "/api/forum/my/posts", None, json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "未登录");
    }

    #[tokio::test]
    async fn invalid_token_is_anonymous() {
        token_for(9, constants::STUDENT);
        let req = request("POST", "/api/forum/post/new", Some("garbage"), post_body());
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], false);
    }

    #[tokio::test]
    async fn admins_cannot_post() {
        let token = token_for(1, constants::ADMIN);
        let req = request("POST", "/api/forum/post/new", Some(token.as_str()), post_body());
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"status": false, "msg": "没有权限"}));
    }

    #[tokio::test]
    async fn rejected_form_lists_field_errors() {
        let token = token_for(2, constants::STUDENT);
        let body = json!({"title": "", "content": "x", "bounty_points": -5});
        let req = request("POST", "/api/forum/post/new", Some(token.as_str()), body);
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], false);
        assert_eq!(body["errors"]["title"], json!(["标题不能为空"]));
        assert_eq!(body["errors"]["bounty_points"], json!(["悬赏积分不能为负数"]));
    }

    #[tokio::test]
    async fn post_path_other_than_new_is_not_found() {
        let token = token_for(2, constants::STUDENT);
        let req = request("POST", "/api/forum/post/12", Some(token.as_str()), post_body());
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "页面不存在");
    }

    #[tokio::test]
    async fn anonymous_post_without_body_is_unauthorized() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/forum/post/new")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"status": false, "msg": "未登录"}));
    }

    #[tokio::test]
    async fn malformed_post_body_is_a_json_error() {
        let token = token_for(2, constants::STUDENT);
        let req = Request::builder()
            .method("POST")
            .uri("/api/forum/post/new")
            .header("content-type", "application/json")
            .header(constants::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"status": false, "msg": "请求格式错误"}));
    }
}
