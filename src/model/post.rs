use super::traits::{Model, StructFieldNames};
use super::user::attach_author;
use crate::constants;
use crate::types::links::JsonMap;
use course_forum::{FromPgRow, GetFieldNames, IntoJsonMap};
use serde::{Deserialize, Serialize};
use serde_json::json;

const LIKE_WEIGHT: f64 = 2.0;
const COLLECT_WEIGHT: f64 = 3.0;
const COMMENT_WEIGHT: f64 = 4.0;
const VIEW_WEIGHT: f64 = 0.1;
const AGE_OFFSET_HOURS: f64 = 2.0;
const GRAVITY: f64 = 1.2;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(
    Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow, GetFieldNames, IntoJsonMap,
)]
pub struct Post {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,

    pub uid: i64,                  // 作者id
    pub course_id: Option<i64>,    // 为空时不属于任何课程
    pub category_id: Option<i64>,

    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_anonymous: bool,

    pub like_count: i32,
    pub collect_count: i32,
    pub comment_count: i32, // 只统计顶级评论
    pub view_count: i32,
    pub heat_score: f64,

    pub bounty_points: i32,
    pub best_answer: Option<i64>,
}

impl Post {
    /// Engagement divided by an age penalty. Same counters and `now` give the
    /// same score.
    pub fn calculate_heat(&self, now: i64) -> f64 {
        let raw = LIKE_WEIGHT * self.like_count as f64
            + COLLECT_WEIGHT * self.collect_count as f64
            + COMMENT_WEIGHT * self.comment_count as f64
            + VIEW_WEIGHT * self.view_count as f64;
        let age_hours = (now - self.created_at).max(0) as f64 / MILLIS_PER_HOUR;
        let heat = raw / (age_hours + AGE_OFFSET_HOURS).powf(GRAVITY);
        (heat * 10000.0).round() / 10000.0
    }

    pub fn refresh_heat(&mut self, now: i64) -> f64 {
        self.heat_score = self.calculate_heat(now);
        self.heat_score
    }

    pub fn add_view(&mut self, now: i64) {
        self.view_count += 1;
        self.refresh_heat(now);
    }

    pub fn add_comment(&mut self, top_level: bool, now: i64) {
        if top_level {
            self.comment_count += 1;
        }
        self.refresh_heat(now);
    }

    pub fn remove_comment(&mut self, top_level: bool, now: i64) {
        if top_level {
            self.comment_count = (self.comment_count - 1).max(0);
        }
        self.refresh_heat(now);
    }

    pub fn is_author(&self, uid: i64) -> bool {
        self.uid == uid
    }

    /// Json for listings and detail pages. Anonymous posts hide the author
    /// from everyone but the author.
    pub fn into_view(self, author: &str, avatar: &str, viewer: Option<i64>) -> JsonMap {
        let hide = self.is_anonymous && viewer != Some(self.uid);
        let state = self.bounty_state();
        let mut mp = self.into_json_map();
        attach_author(&mut mp, hide, author, avatar);
        mp.insert("bounty_state".into(), json!(state));
        mp
    }
}

/// Editable part of a post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub tags: Vec<String>,
    pub is_anonymous: bool,
}

impl PostChanges {
    pub fn apply(self, post: &mut Post, now: i64) {
        post.title = self.title;
        post.content = self.content;
        post.category_id = self.category_id;
        post.tags = normalize_tags(self.tags);
        post.is_anonymous = self.is_anonymous;
        post.updated_at = now;
    }
}

/// Trims, drops empties and duplicates, keeps first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for tag in tags {
        let t = tag.trim();
        if !t.is_empty() && !res.iter().any(|x| x == t) {
            res.push(t.to_string());
        }
    }
    res
}

impl Model for Post {
    fn table_name() -> &'static str {
        constants::POST_TABLE_NAME
    }
}
