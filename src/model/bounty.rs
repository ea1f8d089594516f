//! Bounty escrow and best-answer settlement.
//!
//! A post moves `NoBounty -> Escrowed` when it is created with points taken
//! from its author, and `Escrowed -> Settled` when the author picks a best
//! answer. `Settled` is terminal: `bounty_points` stays populated as the
//! awarded amount and `best_answer` is never cleared.

use super::comment::Comment;
use super::post::Post;
use super::user::User;
use crate::types::error::Error;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BountyState {
    NoBounty,
    Escrowed,
    Settled,
}

impl Post {
    pub fn bounty_state(&self) -> BountyState {
        match (self.best_answer, self.bounty_points > 0) {
            (Some(_), _) => BountyState::Settled,
            (None, true) => BountyState::Escrowed,
            (None, false) => BountyState::NoBounty,
        }
    }

    pub fn can_select_best_answer(&self, uid: i64) -> bool {
        self.is_author(uid) && self.bounty_state() == BountyState::Escrowed
    }
}

/// Takes `amount` from the author and holds it on the post. Leaves both
/// untouched on failure.
pub fn escrow(author: &mut User, post: &mut Post, amount: i32) -> Result<(), Error> {
    if amount < 0 {
        return Err(Error::validation_failed("悬赏积分不能为负数"));
    }
    if amount == 0 {
        return Ok(());
    }
    if author.points < amount {
        return Err(Error::insufficient_funds(author.points));
    }
    author.points -= amount;
    post.bounty_points = amount;
    Ok(())
}

fn credit(user: &mut User, amount: i32) -> Result<(), Error> {
    user.points = user
        .points
        .checked_add(amount)
        .ok_or_else(|| Error::system_error("积分溢出"))?;
    Ok(())
}

/// Pays the escrow to the comment's author. Returns false, changing nothing,
/// unless `requester` owns an escrowed post and the comment belongs to it.
/// A payout past `i32::MAX` is an error and changes nothing either.
pub fn select_best_answer(
    post: &mut Post,
    comment: &Comment,
    requester: i64,
    answerer: &mut User,
) -> Result<bool, Error> {
    if !post.can_select_best_answer(requester)
        || comment.post_id != post.id
        || answerer.id != comment.uid
    {
        return Ok(false);
    }
    credit(answerer, post.bounty_points)?;
    post.best_answer = Some(comment.id);
    Ok(true)
}

/// Returns an unsettled escrow to the author, e.g. when the post is deleted.
pub fn refund(post: &Post, author: &mut User) -> Result<i32, Error> {
    if post.bounty_state() != BountyState::Escrowed || author.id != post.uid {
        return Ok(0);
    }
    credit(author, post.bounty_points)?;
    Ok(post.bounty_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, points: i32) -> User {
        User {
            id,
            points,
            username: format!("u{}", id),
            ..Default::default()
        }
    }

    fn post_by(uid: i64) -> Post {
        Post {
            id: 100,
            uid,
            ..Default::default()
        }
    }

    fn comment_on(post_id: i64, id: i64, uid: i64) -> Comment {
        Comment {
            id,
            post_id,
            uid,
            ..Default::default()
        }
    }

    #[test]
    fn escrow_deducts_from_author() {
        let mut author = user(1, 50);
        let mut p = post_by(1);
        escrow(&mut author, &mut p, 10).unwrap();
        assert_eq!(author.points, 40);
        assert_eq!(p.bounty_points, 10);
        assert_eq!(p.bounty_state(), BountyState::Escrowed);
    }

    #[test]
    fn escrow_of_whole_balance_is_allowed() {
        let mut author = user(1, 10);
        let mut p = post_by(1);
        escrow(&mut author, &mut p, 10).unwrap();
        assert_eq!(author.points, 0);
    }

    #[test]
    fn escrow_fails_without_funds_and_changes_nothing() {
        let mut author = user(1, 5);
        let mut p = post_by(1);
        let e = escrow(&mut author, &mut p, 10).unwrap_err();
        assert_eq!(e.error_type, crate::types::error::ErrorType::InsufficientFunds);
        assert_eq!(author.points, 5);
        assert_eq!(p.bounty_points, 0);
        assert_eq!(p.bounty_state(), BountyState::NoBounty);
    }

    #[test]
    fn zero_bounty_is_a_plain_post() {
        let mut author = user(1, 5);
        let mut p = post_by(1);
        escrow(&mut author, &mut p, 0).unwrap();
        assert_eq!(author.points, 5);
        assert_eq!(p.bounty_state(), BountyState::NoBounty);
    }

    #[test]
    fn settlement_happens_exactly_once() {
        let mut author = user(1, 50);
        let mut answerer = user(2, 0);
        let mut p = post_by(1);
        escrow(&mut author, &mut p, 10).unwrap();
        let c = comment_on(p.id, 9, 2);

        assert!(!select_best_answer(&mut p, &c, 2, &mut answerer).unwrap());
        assert_eq!(answerer.points, 0);
        assert_eq!(p.best_answer, None);

        assert!(select_best_answer(&mut p, &c, 1, &mut answerer).unwrap());
        assert_eq!(answerer.points, 10);
        assert_eq!(p.best_answer, Some(9));
        assert_eq!(p.bounty_state(), BountyState::Settled);

        assert!(!select_best_answer(&mut p, &c, 1, &mut answerer).unwrap());
        assert_eq!(answerer.points, 10);
        assert_eq!(author.points, 40);
    }

    #[test]
    fn settlement_needs_a_bounty() {
        let mut answerer = user(2, 0);
        let mut p = post_by(1);
        let c = comment_on(p.id, 9, 2);
        assert!(!select_best_answer(&mut p, &c, 1, &mut answerer).unwrap());
        assert_eq!(p.best_answer, None);
    }

    #[test]
    fn settlement_rejects_comments_of_other_posts() {
        let mut author = user(1, 50);
        let mut answerer = user(2, 0);
        let mut p = post_by(1);
        escrow(&mut author, &mut p, 10).unwrap();
        let c = comment_on(p.id + 1, 9, 2);
        assert!(!select_best_answer(&mut p, &c, 1, &mut answerer).unwrap());
        assert_eq!(answerer.points, 0);
    }

    #[test]
    fn refund_only_for_unsettled_escrow() {
        let mut author = user(1, 50);
        let mut p = post_by(1);
        escrow(&mut author, &mut p, 10).unwrap();
        assert_eq!(refund(&p, &mut author).unwrap(), 10);
        assert_eq!(author.points, 50);

        p.best_answer = Some(3);
        assert_eq!(refund(&p, &mut author).unwrap(), 0);
        assert_eq!(author.points, 50);
    }

    #[test]
    fn payout_overflow_is_an_error_and_changes_nothing() {
        let mut author = user(1, 50);
        let mut answerer = user(2, i32::MAX);
        let mut p = post_by(1);
        escrow(&mut author, &mut p, 10).unwrap();
        let c = comment_on(p.id, 9, 2);
        let e = select_best_answer(&mut p, &c, 1, &mut answerer).unwrap_err();
        assert_eq!(e.error_type, crate::types::error::ErrorType::SystemError);
        assert_eq!(answerer.points, i32::MAX);
        assert_eq!(p.best_answer, None);

        author.points = i32::MAX - 5;
        assert!(refund(&p, &mut author).is_err());
        assert_eq!(author.points, i32::MAX - 5);
    }
}
