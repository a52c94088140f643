/// Linear undo/redo stack of immutable snapshots.
///
/// Always holds at least the baseline snapshot; `cursor` indexes the current
/// one. Committing drops everything after the cursor.
#[derive(Clone, Debug)]
pub struct History<T> {
    snapshots: Vec<T>,
    cursor: usize,
    limit: Option<usize>,
}

impl<T> History<T> {
    pub fn new(baseline: T) -> Self {
        Self {
            snapshots: vec![baseline],
            cursor: 0,
            limit: None,
        }
    }

    /// Keep at most `limit` snapshots (at least 1), discarding the oldest.
    pub fn with_limit(baseline: T, limit: usize) -> Self {
        Self {
            snapshots: vec![baseline],
            cursor: 0,
            limit: Some(limit.max(1)),
        }
    }

    pub fn current(&self) -> &T {
        &self.snapshots[self.cursor]
    }

    pub fn commit(&mut self, snapshot: T) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        if let Some(limit) = self.limit {
            if self.snapshots.len() > limit {
                let excess = self.snapshots.len() - limit;
                self.snapshots.drain(..excess);
            }
        }
        self.cursor = self.snapshots.len() - 1;
    }

    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.snapshots.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Number of retained snapshots, baseline included.
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_redo_walks_the_stack() {
        let mut h = History::new(0);
        h.commit(1);
        h.commit(2);
        assert_eq!(*h.current(), 2);
        assert!(h.undo());
        assert!(h.undo());
        assert_eq!(*h.current(), 0);
        assert!(!h.undo());
        assert!(h.redo());
        assert_eq!(*h.current(), 1);
    }

    #[test]
    fn commit_truncates_redo_branch() {
        let mut h = History::new("a");
        h.commit("b");
        h.commit("c");
        h.undo();
        h.undo();
        h.commit("d");
        assert!(!h.can_redo());
        assert_eq!(h.depth(), 2);
        assert!(h.undo());
        assert_eq!(*h.current(), "a");
    }

    #[test]
    fn limit_drops_oldest() {
        let mut h = History::with_limit(0, 3);
        for i in 1..=5 {
            h.commit(i);
        }
        assert_eq!(h.depth(), 3);
        assert!(h.undo());
        assert!(h.undo());
        assert!(!h.undo());
        assert_eq!(*h.current(), 3);
    }
}
