use std::collections::VecDeque;

use crate::config::DEFAULT_HISTORY_CAPACITY;

/// Bounded linear undo log of full-text snapshots.
///
/// `undo` and `redo` arm a one-shot suppression flag: the editing surface echoes the
/// restored snapshot back as a content change, and that echo must not become a new
/// entry. The flag is cleared by the very next `push`, whatever its source.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: VecDeque<String>,
    cursor: usize,
    capacity: usize,
    suppress_next: bool,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryManager {
    pub fn new(initial: String, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY) + 1);
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            capacity,
            suppress_next: false,
        }
    }

    /// Records a content change. Returns `false` when the push was absorbed by the
    /// suppression flag.
    pub fn push(&mut self, value: String) -> bool {
        if self.suppress_next {
            self.suppress_next = false;
            return false;
        }

        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(value);
        self.cursor += 1;

        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.cursor = self.cursor.min(self.capacity - 1);
        }
        true
    }

    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.suppress_next = true;
        self.cursor -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.suppress_next = true;
        self.cursor += 1;
        true
    }

    pub fn reset(&mut self, value: String) {
        self.entries.clear();
        self.entries.push_back(value);
        self.cursor = 0;
        self.suppress_next = false;
    }

    pub fn current(&self) -> &str {
        // cursor < entries.len() holds after every mutation
        &self.entries[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_suppressing(&self) -> bool {
        self.suppress_next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> HistoryManager {
        HistoryManager::new("v0".to_string(), DEFAULT_HISTORY_CAPACITY)
    }

    #[test]
    fn push_advances_cursor() {
        let mut history = history();
        assert!(history.push("v1".to_string()));
        assert!(history.push("v2".to_string()));
        assert_eq!(history.current(), "v2");
        assert_eq!(history.len(), 3);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_and_redo_move_without_growing() {
        let mut history = history();
        history.push("v1".to_string());
        history.push("v2".to_string());

        assert!(history.undo());
        assert_eq!(history.current(), "v1");
        assert!(!history.push("v1".to_string()));
        assert_eq!(history.len(), 3);

        assert!(history.redo());
        assert_eq!(history.current(), "v2");
        assert!(!history.push("v2".to_string()));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn undo_at_start_and_redo_at_end_are_no_ops() {
        let mut history = history();
        assert!(!history.undo());
        assert!(!history.redo());
        assert!(!history.is_suppressing());
        assert!(history.push("v1".to_string()));
    }

    #[test]
    fn suppression_is_one_shot() {
        let mut history = history();
        history.push("v1".to_string());
        history.undo();
        assert!(history.is_suppressing());
        assert!(!history.push("echo".to_string()));
        assert!(!history.is_suppressing());
        assert!(history.push("typed".to_string()));
        assert_eq!(history.current(), "typed");
    }

    #[test]
    fn push_after_undo_discards_redo_branch() {
        let mut history = history();
        history.push("v1".to_string());
        history.push("v2".to_string());
        history.undo();
        history.push("v1".to_string());

        history.push("branch".to_string());
        assert!(!history.can_redo());
        assert!(!history.redo());
        assert_eq!(history.current(), "branch");
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut history = history();
        for i in 1..=150 {
            history.push(format!("v{i}"));
            assert!(history.len() <= DEFAULT_HISTORY_CAPACITY);
            assert!(history.cursor() < history.len());
        }
        assert_eq!(history.len(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(history.cursor(), DEFAULT_HISTORY_CAPACITY - 1);
        assert_eq!(history.current(), "v150");

        let mut steps = 0;
        while history.undo() {
            history.push(history.current().to_string());
            steps += 1;
        }
        assert_eq!(steps, DEFAULT_HISTORY_CAPACITY - 1);
        assert_eq!(history.current(), "v51");
    }

    #[test]
    fn eviction_after_undo_keeps_cursor_valid() {
        let mut history = HistoryManager::new("v0".to_string(), 3);
        history.push("v1".to_string());
        history.push("v2".to_string());
        history.undo();
        history.push("v1".to_string());
        history.push("v3".to_string());
        history.push("v4".to_string());
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
        assert_eq!(history.current(), "v4");
    }

    #[test]
    fn reset_collapses_to_single_entry() {
        let mut history = history();
        history.push("v1".to_string());
        history.undo();
        history.reset("fresh".to_string());
        assert_eq!(history.len(), 1);
        assert_eq!(history.current(), "fresh");
        assert!(!history.can_undo());
        assert!(!history.is_suppressing());
        assert!(history.push("next".to_string()));
    }
}
