use super::traits::{Model, StructFieldNames};
use crate::constants;
use crate::types::links::JsonMap;
use course_forum::{FromPgRow, GetFieldNames};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, FromPgRow, GetFieldNames)]
pub struct User {
    pub id: i64,
    pub created_at: i64,
    pub username: String,
    pub avatar: String,
    pub role: String, //student, teacher, admin
    pub points: i32,
}

impl User {
    /// Score in the ranking set. Any i32 is exact as an f64, so equal points
    /// give equal scores and ties are broken by `sort_ranking`.
    pub fn ranking_score(points: i32) -> f64 {
        points as f64
    }

    /// Points desc, then lower id first, keeping the first `limit`.
    pub fn sort_ranking(mut users: Vec<User>, limit: usize) -> Vec<User> {
        users.sort_by(|a, b| b.points.cmp(&a.points).then(a.id.cmp(&b.id)));
        users.truncate(limit);
        users
    }

    pub fn public_info(self) -> JsonMap {
        crate::json_map!(
            "id" => self.id,
            "username" => self.username,
            "avatar" => self.avatar,
            "role" => self.role,
            "points" => self.points
        )
    }
}

/// Adds `author`/`avatar` to a post or comment view, masking anonymous
/// content.
pub fn attach_author(mp: &mut JsonMap, hidden: bool, author: &str, avatar: &str) {
    match hidden {
        true => {
            mp.remove("uid");
            mp.insert("author".into(), json!(constants::ANONYMOUS_AUTHOR));
            mp.insert("avatar".into(), json!(""));
        }
        false => {
            mp.insert("author".into(), json!(author));
            mp.insert("avatar".into(), json!(avatar));
        }
    }
}

impl Model for User {
    fn table_name() -> &'static str {
        constants::USER_TABLE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, points: i32) -> User {
        User {
            id,
            points,
            ..Default::default()
        }
    }

    #[test]
    fn scores_stay_exact_for_large_balances() {
        let a = User::ranking_score(1_000_000);
        assert_eq!(a, User::ranking_score(1_000_000));
        assert!(User::ranking_score(1_000_001) > a);
        assert_eq!(User::ranking_score(i32::MAX) as i64, i32::MAX as i64);
        assert!(User::ranking_score(i32::MAX) > User::ranking_score(i32::MAX - 1));
    }

    #[test]
    fn ranking_orders_by_points_then_lower_id() {
        let users = vec![
            user(3, 1_000_000),
            user(9, 5),
            user(2, 1_000_000),
            user(4, 1_000_001),
        ];
        let ids: Vec<i64> = User::sort_ranking(users, 3).iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![4, 2, 3]);
    }

    #[test]
    fn hidden_author_drops_uid() {
        let mut mp = crate::json_map!("uid" => 3);
        attach_author(&mut mp, true, "bob", "b.png");
        assert!(mp.get("uid").is_none());
        assert_eq!(mp["author"], json!(constants::ANONYMOUS_AUTHOR));
    }
}
