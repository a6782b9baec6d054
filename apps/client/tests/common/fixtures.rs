//! Test fixtures and factory functions for creating test data.

use chrono::{Duration, Utc};

use wordquiz_core::types::{LocalFolder, LocalWord, QuizMode, QuizSessionSnapshot, QuizWord};

/// A level-0 word due now, in folder `f1`.
pub fn word(id: &str) -> LocalWord {
    LocalWord {
        id: id.to_string(),
        word: format!("word-{id}"),
        meaning: format!("meaning-{id}"),
        memorized: false,
        level: 0,
        next_review_at: Utc::now() - Duration::minutes(1),
        folder_id: Some("f1".to_string()),
    }
}

/// Words `w1..=wn`, all fresh.
pub fn words(n: usize) -> Vec<LocalWord> {
    (1..=n).map(|i| word(&format!("w{i}"))).collect()
}

pub fn folder(id: &str, sort_order: i64) -> LocalFolder {
    LocalFolder {
        id: id.to_string(),
        name: format!("Folder {id}"),
        color: "#10B981".to_string(),
        sort_order,
    }
}

/// A quiz over `words` positioned at `current_index`.
pub fn session(words: &[LocalWord], current_index: usize) -> QuizSessionSnapshot {
    QuizSessionSnapshot {
        words: words.iter().map(QuizWord::from).collect(),
        current_index,
        memorized_count: 0,
        folder_ids: None,
        quiz_mode: QuizMode::Normal,
        manual_reveal: false,
        wrong_words: Vec::new(),
        saved_at: Utc::now(),
    }
}
