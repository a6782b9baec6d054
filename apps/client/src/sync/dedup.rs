//! Queue collapse applied before a drain.
//!
//! Toggles collapse per word; progress and result records collapse per quiz
//! mode. In both cases the most recently queued action survives. Survivors
//! keep their original ids and are replayed in ascending id order.

use std::collections::HashMap;

use wordquiz_core::types::{ActionPayload, PendingAction, QuizMode};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Word(String),
    Mode(QuizMode),
}

fn dedup_key(payload: &ActionPayload) -> Option<DedupKey> {
    match payload {
        ActionPayload::ToggleMemorized(toggle) => Some(DedupKey::Word(toggle.word_id.clone())),
        ActionPayload::QuizProgress(progress) => Some(DedupKey::Mode(progress.quiz_mode)),
        ActionPayload::QuizResult(result) => Some(DedupKey::Mode(result.quiz_mode)),
        ActionPayload::ClearSession => None,
    }
}

/// Outcome of collapsing a queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupPlan {
    /// Actions to replay, ascending by id.
    pub survivors: Vec<PendingAction>,
    /// Ids to delete before replay starts.
    pub superseded: Vec<i64>,
}

/// Split a queue into survivors and superseded ids.
pub fn plan(mut actions: Vec<PendingAction>) -> DedupPlan {
    actions.sort_by_key(|a| a.id);

    let mut latest: HashMap<DedupKey, i64> = HashMap::new();
    for action in &actions {
        if let Some(key) = dedup_key(&action.payload) {
            latest.insert(key, action.id);
        }
    }

    let mut out = DedupPlan::default();
    for action in actions {
        let keep = match dedup_key(&action.payload) {
            Some(key) => latest.get(&key) == Some(&action.id),
            None => true,
        };
        if keep {
            out.survivors.push(action);
        } else {
            out.superseded.push(action.id);
        }
    }
    out
}
