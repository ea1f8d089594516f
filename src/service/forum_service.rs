use super::forms::{CommentForm, PostForm, PostUpdateForm};
use crate::constants;
use crate::dao::comment_dao::{self, NewComment};
use crate::dao::{crud, post_dao, postgres, user_dao};
use crate::json_map;
use crate::model::course::Course;
use crate::model::engagement::EngagementKind;
use crate::model::query::{parse_page, CourseFilter, ListQuery, SortKey};
use crate::model::user::User;
use crate::types::error_response::ErrorResponse;
use crate::types::links::{JsonMap, ResponseResult};
use crate::types::response::Response;
use crate::utils::jwt::UserToken;
use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    Json as AxumJson,
};
use serde::Deserialize;
use tokio_postgres::GenericClient;
use validator::Validate;

type MaybeToken = Option<Extension<UserToken>>;

fn viewer_of(token: &MaybeToken) -> Option<i64> {
    token.as_ref().map(|t| t.id)
}

fn now() -> i64 {
    chrono::Local::now().timestamp_millis()
}

/// The viewer's user row. A token whose user no longer exists reads as
/// anonymous.
async fn viewer_user<C: GenericClient + Sync>(
    client: &C,
    viewer: Option<i64>,
) -> Result<Option<User>, ErrorResponse> {
    Ok(match viewer {
        Some(uid) => crud::get_object::<User, _>(client, uid).await?,
        None => None,
    })
}

fn current_user_entry(user: Option<&User>) -> JsonMap {
    user.map(|u| json_map!("current_user" => u.clone().public_info()))
        .unwrap_or_default()
}

fn my_rank_entry(user: Option<&User>, rank: i64) -> JsonMap {
    user.map(|u| json_map!("my_rank" => rank, "my_points" => u.points))
        .unwrap_or_default()
}

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

pub async fn forum_index(token: MaybeToken, Query(q): Query<ListQuery>) -> ResponseResult {
    let viewer = viewer_of(&token);
    let conn = postgres::get_pg_connect().await?;
    let client: &tokio_postgres::Client = &**conn;
    let query = q.into_post_query(SortKey::Heat, constants::FORUM_INDEX_PAGE_SIZE);
    let mut data = post_dao::find_posts(client, query, viewer).await?;
    data.extend(post_dao::forum_stats(client).await?);
    let user = viewer_user(client, viewer).await?;
    data.extend(current_user_entry(user.as_ref()));
    Ok(Response::from(data).into_response())
}

/// `course_id` 0 lists posts that belong to no course.
pub async fn course_posts(
    token: MaybeToken,
    Path(course_id): Path<i64>,
    Query(q): Query<ListQuery>,
) -> ResponseResult {
    let viewer = viewer_of(&token);
    let conn = postgres::get_pg_connect().await?;
    let client: &tokio_postgres::Client = &**conn;
    let mut query = q.into_post_query(SortKey::Heat, constants::COURSE_POSTS_PAGE_SIZE);
    let course = match course_id {
        0 => {
            query.course = CourseFilter::NoCourse;
            None
        }
        id => {
            query.course = CourseFilter::Course(id);
            Some(crud::must_get::<Course, _>(client, id, "课程不存在").await?)
        }
    };
    let mut data = post_dao::find_posts(client, query, viewer).await?;
    data.insert("course".into(), serde_json::json!(course));
    Ok(Response::from(data).into_response())
}

pub async fn post_detail(
    token: MaybeToken,
    Path(post_id): Path<i64>,
    Query(q): Query<PageQuery>,
) -> ResponseResult {
    let page = parse_page(q.page.as_deref());
    let data = post_dao::post_detail(viewer_of(&token), post_id, page).await?;
    Ok(Response::from(data).into_response())
}

async fn __create_post(token: UserToken, mut form: PostForm, course_id: Option<i64>) -> ResponseResult {
    if !token.can_post() {
        return Err(ErrorResponse::forbidden_with_str("没有权限"));
    }
    form.validate()?;
    if course_id.is_some() {
        form.course_id = course_id;
    }
    let id = post_dao::create_post(form.into_post(token.id, now())).await?;
    Ok(Response::new("发布成功", json_map!("post_id" => id)).into_response())
}

/// `POST /post/new`. The path is matched by the same pattern as the detail
/// page, so anything other than `new` is a 404. Login is checked before the
/// body so anonymous callers get 401 whatever they send.
pub async fn create_post(
    token: MaybeToken,
    Path(target): Path<String>,
    form: Option<AxumJson<PostForm>>,
) -> ResponseResult {
    if target != "new" {
        return Err(ErrorResponse::not_found_with_str("页面不存在"));
    }
    let Extension(token) = token.ok_or_else(ErrorResponse::not_authenticated)?;
    let AxumJson(form) = form.ok_or_else(|| ErrorResponse::bad_request_with_str("请求格式错误"))?;
    __create_post(token, form, None).await
}

pub async fn create_course_post(
    Extension(token): Extension<UserToken>,
    Path(course_id): Path<i64>,
    AxumJson(form): AxumJson<PostForm>,
) -> ResponseResult {
    __create_post(token, form, Some(course_id)).await
}

pub async fn update_post(
    Extension(token): Extension<UserToken>,
    Path(post_id): Path<i64>,
    AxumJson(form): AxumJson<PostUpdateForm>,
) -> ResponseResult {
    form.validate()?;
    post_dao::update_post(token.id, post_id, form.into()).await?;
    Ok(Response::from_msg("修改成功").into_response())
}

pub async fn delete_post(Extension(token): Extension<UserToken>, Path(post_id): Path<i64>) -> ResponseResult {
    post_dao::delete_post(token.id, token.is_admin(), post_id).await?;
    Ok(Response::from_msg("删除成功").into_response())
}

async fn __toggle(token: UserToken, post_id: i64, kind: EngagementKind) -> ResponseResult {
    let outcome = post_dao::toggle(token.id, post_id, kind).await?;
    Ok(Response::from(json_map!(
        "action" => outcome.action,
        kind.counter_field() => outcome.count,
        "heat_score" => outcome.heat_score
    ))
    .into_response())
}

pub async fn like_post(Extension(token): Extension<UserToken>, Path(post_id): Path<i64>) -> ResponseResult {
    __toggle(token, post_id, EngagementKind::Like).await
}

pub async fn collect_post(Extension(token): Extension<UserToken>, Path(post_id): Path<i64>) -> ResponseResult {
    __toggle(token, post_id, EngagementKind::Collect).await
}

pub async fn comment_post(
    Extension(token): Extension<UserToken>,
    Path(post_id): Path<i64>,
    AxumJson(form): AxumJson<CommentForm>,
) -> ResponseResult {
    form.validate()?;
    let id = comment_dao::add_comment(NewComment {
        uid: token.id,
        post_id,
        parent_id: form.parent_id,
        content: form.content,
        is_anonymous: form.is_anonymous,
    })
    .await?;
    Ok(Response::new("评论成功", json_map!("comment_id" => id)).into_response())
}

pub async fn reply_comment(
    Extension(token): Extension<UserToken>,
    Path(comment_id): Path<i64>,
    AxumJson(form): AxumJson<CommentForm>,
) -> ResponseResult {
    form.validate()?;
    let id = comment_dao::reply(token.id, comment_id, form.content, form.is_anonymous).await?;
    Ok(Response::new("回复成功", json_map!("comment_id" => id)).into_response())
}

pub async fn delete_comment(
    Extension(token): Extension<UserToken>,
    Path(comment_id): Path<i64>,
) -> ResponseResult {
    comment_dao::delete_comment(token.id, token.is_admin(), comment_id).await?;
    Ok(Response::from_msg("删除成功").into_response())
}

pub async fn like_comment(Extension(_): Extension<UserToken>, Path(comment_id): Path<i64>) -> ResponseResult {
    let like_count = comment_dao::like_comment(comment_id).await?;
    Ok(Response::from(json_map!("like_count" => like_count)).into_response())
}

pub async fn select_best_answer(
    Extension(token): Extension<UserToken>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> ResponseResult {
    let res = match post_dao::select_best_answer(token.id, post_id, comment_id).await? {
        Some(amount) => Response::new(
            "已选择最佳答案",
            json_map!("best_answer" => comment_id, "bounty_points" => amount),
        ),
        None => Response::fail("选择最佳答案失败，请检查权限和积分"),
    };
    Ok(res.into_response())
}

pub async fn my_posts(Extension(token): Extension<UserToken>, Query(q): Query<ListQuery>) -> ResponseResult {
    let conn = postgres::get_pg_connect().await?;
    let client: &tokio_postgres::Client = &**conn;
    let mut query = q.into_post_query(SortKey::Newest, constants::MY_POSTS_PAGE_SIZE);
    query.author = Some(token.id);
    let mut data = post_dao::find_posts(client, query, Some(token.id)).await?;
    data.extend(post_dao::my_post_stats(client, token.id).await?);
    Ok(Response::from(data).into_response())
}

pub async fn my_collected(Extension(token): Extension<UserToken>, Query(q): Query<ListQuery>) -> ResponseResult {
    let conn = postgres::get_pg_connect().await?;
    let keyword = q.keyword.filter(|k| !k.trim().is_empty());
    let data = post_dao::find_collected(
        &**conn,
        token.id,
        keyword,
        parse_page(q.page.as_deref()),
        constants::MY_COLLECTED_PAGE_SIZE,
    )
    .await?;
    Ok(Response::from(data).into_response())
}

pub async fn ranking(token: MaybeToken) -> ResponseResult {
    let ranking = user_dao::points_ranking(constants::RANKING_SIZE).await?;
    let mut data = json_map!("ranking" => ranking);
    if let Some(uid) = viewer_of(&token) {
        let conn = postgres::get_pg_connect().await?;
        let client: &tokio_postgres::Client = &**conn;
        let user = viewer_user(client, Some(uid)).await?;
        let rank = match &user {
            Some(u) => user_dao::rank_of(client, u).await?,
            None => 0,
        };
        data.extend(my_rank_entry(user.as_ref(), rank));
    }
    Ok(Response::from(data).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            username: "lin".into(),
            points: 120,
            ..Default::default()
        }
    }

    #[test]
    fn missing_viewer_row_adds_no_fields() {
        assert!(current_user_entry(None).is_empty());
        assert!(my_rank_entry(None, 0).is_empty());
    }

    #[test]
    fn present_viewer_row_adds_profile_and_rank() {
        let u = user();
        let mp = current_user_entry(Some(&u));
        assert_eq!(mp["current_user"]["username"], "lin");
        let mp = my_rank_entry(Some(&u), 3);
        assert_eq!(mp["my_rank"], 3);
        assert_eq!(mp["my_points"], 120);
    }
}
