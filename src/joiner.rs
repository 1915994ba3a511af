//! Left join of counterparty replies onto NotFoundSysB rows.

use crate::records::{CategoryRow, JoinedCase, ReplyRecord};
use std::collections::HashMap;
use tracing::info;

pub struct ResolutionJoiner {
    row_cap: usize,
}

impl ResolutionJoiner {
    pub fn new(row_cap: usize) -> Self {
        Self { row_cap }
    }

    /// Left outer join on `order_id = Transaction ID`.
    ///
    /// Output follows the order of `not_found_rows`. A row with several replies
    /// appears once per reply, in reply order; a row with none appears once
    /// with empty reply fields. Only the first `row_cap` replies are visible.
    pub fn join(&self, not_found_rows: &[CategoryRow], reply_rows: &[ReplyRecord]) -> Vec<JoinedCase> {
        let mut replies_by_id: HashMap<&str, Vec<&ReplyRecord>> = HashMap::new();
        for reply in reply_rows.iter().take(self.row_cap) {
            replies_by_id
                .entry(reply.transaction_id.as_str())
                .or_default()
                .push(reply);
        }

        let mut joined = Vec::with_capacity(not_found_rows.len());
        let mut unmatched = 0usize;
        for row in not_found_rows {
            match replies_by_id.get(row.order_id.as_str()) {
                Some(replies) => {
                    joined.extend(replies.iter().map(|reply| JoinedCase::with_reply(row, reply)));
                }
                None => {
                    unmatched += 1;
                    joined.push(JoinedCase::without_reply(row));
                }
            }
        }

        info!(
            "Joined {} not-found rows with {} replies: {} cases, {} without reply",
            not_found_rows.len(),
            reply_rows.len().min(self.row_cap),
            joined.len(),
            unmatched
        );
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, amount: f64) -> CategoryRow {
        CategoryRow {
            order_id: id.to_string(),
            amount,
            date: None,
        }
    }

    fn reply(id: &str, comment: &str) -> ReplyRecord {
        ReplyRecord {
            transaction_id: id.to_string(),
            amount: Some(1.0),
            comments: Some(comment.to_string()),
        }
    }

    #[test]
    fn test_every_left_row_survives() {
        let left = vec![row("A", 10.0), row("B", 20.0), row("C", 30.0)];
        let replies = vec![reply("B", "resolved"), reply("Z", "stray")];
        let joined = ResolutionJoiner::new(200).join(&left, &replies);

        let ids: Vec<_> = joined.iter().map(|c| c.order_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(joined[0].comment, None);
        assert_eq!(joined[1].comment.as_deref(), Some("resolved"));
        assert_eq!(joined[1].amount, 20.0);
        assert_eq!(joined[1].reply_amount, Some(1.0));
    }

    #[test]
    fn test_duplicate_replies_fan_out() {
        let left = vec![row("A", 10.0)];
        let replies = vec![reply("A", "first"), reply("A", "second")];
        let joined = ResolutionJoiner::new(200).join(&left, &replies);
        let comments: Vec<_> = joined.iter().map(|c| c.comment_text()).collect();
        assert_eq!(comments, vec!["first", "second"]);
    }

    #[test]
    fn test_replies_beyond_cap_are_invisible() {
        let left = vec![row("T0", 1.0), row("T249", 1.0)];
        let replies: Vec<_> = (0..250)
            .map(|i| reply(&format!("T{}", i), "resolved"))
            .collect();
        let joined = ResolutionJoiner::new(200).join(&left, &replies);
        assert_eq!(joined.len(), 2);
        assert!(joined[0].comment.is_some());
        assert!(joined[1].comment.is_none());
    }
}
