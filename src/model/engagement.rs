use super::post::Post;
use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementKind {
    Like,
    Collect,
}

impl EngagementKind {
    pub fn table_name(self) -> &'static str {
        match self {
            EngagementKind::Like => constants::POST_LIKE_TABLE_NAME,
            EngagementKind::Collect => constants::POST_COLLECT_TABLE_NAME,
        }
    }

    pub fn counter_field(self) -> &'static str {
        match self {
            EngagementKind::Like => "like_count",
            EngagementKind::Collect => "collect_count",
        }
    }

    pub fn action(self, on: bool) -> &'static str {
        match (self, on) {
            (EngagementKind::Like, true) => "like",
            (EngagementKind::Like, false) => "unlike",
            (EngagementKind::Collect, true) => "collect",
            (EngagementKind::Collect, false) => "uncollect",
        }
    }

    fn counter(self, post: &mut Post) -> &mut i32 {
        match self {
            EngagementKind::Like => &mut post.like_count,
            EngagementKind::Collect => &mut post.collect_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    pub action: &'static str,
    pub count: i32,
    pub heat_score: f64,
}

/// Flips the counter for a toggle. `existed` says whether the membership row
/// was present before; the caller deletes or inserts it accordingly.
pub fn apply_toggle(post: &mut Post, kind: EngagementKind, existed: bool, now: i64) -> ToggleOutcome {
    let counter = kind.counter(post);
    *counter = match existed {
        true => (*counter - 1).max(0),
        false => *counter + 1,
    };
    let count = *counter;
    ToggleOutcome {
        action: kind.action(!existed),
        count,
        heat_score: post.refresh_heat(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_then_unlike() {
        let mut p = Post::default();
        let on = apply_toggle(&mut p, EngagementKind::Like, false, 0);
        assert_eq!(on.action, "like");
        assert_eq!(on.count, 1);
        assert_eq!(on.heat_score, p.heat_score);
        let off = apply_toggle(&mut p, EngagementKind::Like, true, 0);
        assert_eq!(off.action, "unlike");
        assert_eq!(off.count, 0);
        assert_eq!(p.like_count, 0);
    }

    #[test]
    fn collect_only_touches_collect_count() {
        let mut p = Post::default();
        let out = apply_toggle(&mut p, EngagementKind::Collect, false, 0);
        assert_eq!(out.action, "collect");
        assert_eq!(p.collect_count, 1);
        assert_eq!(p.like_count, 0);
        assert_eq!(apply_toggle(&mut p, EngagementKind::Collect, true, 0).action, "uncollect");
    }

    #[test]
    fn counter_follows_create_minus_delete_and_floors_at_zero() {
        let mut p = Post::default();
        // a stale counter can see more deletes than creates
        let existed = [true, false, false, true, false, true, true, true];
        let mut expected = 0i32;
        for e in existed {
            let out = apply_toggle(&mut p, EngagementKind::Like, e, 0);
            expected = match e {
                true => (expected - 1).max(0),
                false => expected + 1,
            };
            assert_eq!(out.count, expected);
            assert!(out.count >= 0);
        }
        assert_eq!(p.like_count, 0);
    }
}
