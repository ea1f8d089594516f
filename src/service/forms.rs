use crate::model::post::{normalize_tags, Post, PostChanges};
use crate::types::links::JsonMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

const MAX_TAGS: usize = 5;
const MAX_TAG_LEN: usize = 20;

#[derive(Validate, Serialize, Deserialize, Debug, Default)]
pub struct PostForm {
    #[validate(length(min = 1, message = "标题不能为空"))]
    #[validate(length(max = 100, message = "标题不能超过100个字符"))]
    pub title: String,

    #[validate(length(min = 1, message = "内容不能为空"))]
    pub content: String,

    #[serde(default)]
    pub course_id: Option<i64>, // 0 和空都表示不属于任何课程
    #[serde(default)]
    pub category_id: Option<i64>,

    #[serde(default)]
    #[validate(custom = "validate_tags")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_anonymous: bool,

    #[serde(default)]
    #[validate(range(min = 0, message = "悬赏积分不能为负数"))]
    pub bounty_points: i32,
}

impl PostForm {
    /// New post for `uid`; counters start at zero and `bounty_points` holds
    /// the requested amount until it is escrowed.
    pub fn into_post(self, uid: i64, now: i64) -> Post {
        Post {
            created_at: now,
            updated_at: now,
            uid,
            course_id: self.course_id.filter(|id| *id != 0),
            category_id: self.category_id,
            title: self.title,
            content: self.content,
            tags: normalize_tags(self.tags),
            is_anonymous: self.is_anonymous,
            bounty_points: self.bounty_points,
            ..Default::default()
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Default)]
pub struct PostUpdateForm {
    #[validate(length(min = 1, message = "标题不能为空"))]
    #[validate(length(max = 100, message = "标题不能超过100个字符"))]
    pub title: String,

    #[validate(length(min = 1, message = "内容不能为空"))]
    pub content: String,

    #[serde(default)]
    pub category_id: Option<i64>,

    #[serde(default)]
    #[validate(custom = "validate_tags")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_anonymous: bool,
}

impl From<PostUpdateForm> for PostChanges {
    fn from(f: PostUpdateForm) -> Self {
        PostChanges {
            title: f.title,
            content: f.content,
            category_id: f.category_id,
            tags: f.tags,
            is_anonymous: f.is_anonymous,
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Default)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "评论内容不能为空"))]
    #[validate(length(max = 2000, message = "评论不能超过2000个字符"))]
    pub content: String,

    #[serde(default)]
    pub parent_id: Option<i64>,

    #[serde(default)]
    pub is_anonymous: bool,
}

fn validate_tags(tags: &Vec<String>) -> Result<(), ValidationError> {
    let message = if tags.len() > MAX_TAGS {
        "标签不能超过5个"
    } else if tags.iter().any(|t| t.chars().count() > MAX_TAG_LEN) {
        "单个标签不能超过20个字符"
    } else {
        return Ok(());
    };
    Err(ValidationError {
        code: Cow::from("tags"),
        message: Some(Cow::from(message)),
        params: Default::default(),
    })
}

fn sorted_field_messages(e: &ValidationErrors) -> Vec<(&'static str, Vec<String>)> {
    let mut fields: Vec<_> = e
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .filter_map(|item| item.message.as_ref().map(|s| s.to_string()))
                .collect();
            (field, messages)
        })
        .collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    fields
}

pub fn from_validation_errors(e: &ValidationErrors) -> String {
    sorted_field_messages(e)
        .into_iter()
        .flat_map(|(_, messages)| messages)
        .collect::<Vec<_>>()
        .join(" , ")
}

/// `field -> [messages]`, sent as `errors` next to the joined message.
pub fn validation_error_map(e: &ValidationErrors) -> JsonMap {
    sorted_field_messages(e)
        .into_iter()
        .map(|(field, messages)| (field.to_string(), json!(messages)))
        .collect::<serde_json::Map<String, Json>>()
}
