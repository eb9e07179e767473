// Ordered segment playlist with a cursor. Segments that failed to load are
// skipped when moving in either direction.

use std::collections::HashSet;

use crate::data::{SegmentRecord, SegmentSet};

#[derive(Debug, Clone, Default)]
pub struct SegmentQueue {
    set: SegmentSet,
    current_index: Option<usize>,
    failed: HashSet<usize>,
    repeat: bool,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the playlist; the cursor moves to the first segment.
    pub fn load(&mut self, set: SegmentSet) {
        self.current_index = if set.is_empty() { None } else { Some(0) };
        self.set = set;
        self.failed.clear();
    }

    /// Wrap around to the first segment after the last one.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&SegmentRecord> {
        self.current_index.and_then(|i| self.set.get(i))
    }

    pub fn segments(&self) -> &SegmentSet {
        &self.set
    }

    /// Move to the next playable segment. Returns `None` at the end of the
    /// list (unless repeating) or when every segment has failed.
    pub fn advance(&mut self) -> Option<&SegmentRecord> {
        let len = self.len();
        let start = self.current_index?;
        let next = (1..=len)
            .map(|step| start + step)
            .take_while(|i| self.repeat || *i < len)
            .map(|i| i % len)
            .find(|i| !self.failed.contains(i))?;
        self.current_index = Some(next);
        self.set.get(next)
    }

    /// Move to the previous playable segment; stays put at the start.
    pub fn prev(&mut self) -> Option<&SegmentRecord> {
        let start = self.current_index?;
        let prev = (0..start).rev().find(|i| !self.failed.contains(i))?;
        self.current_index = Some(prev);
        self.set.get(prev)
    }

    /// Jump straight to `index`, failed or not.
    pub fn jump(&mut self, index: usize) -> Option<&SegmentRecord> {
        if index >= self.len() {
            return None;
        }
        self.current_index = Some(index);
        self.set.get(index)
    }

    pub fn mark_failed(&mut self, index: usize) {
        if index < self.len() {
            self.failed.insert(index);
        }
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(n: usize) -> SegmentQueue {
        let mut q = SegmentQueue::new();
        q.load(SegmentSet::new(
            (1..=n).map(|i| SegmentRecord::fallback(&format!("{}.mp3", i))).collect(),
        ));
        q
    }

    #[test]
    fn advance_skips_failed() {
        let mut q = queue(3);
        q.mark_failed(1);
        assert_eq!(q.advance().map(|r| r.file.as_str()), Some("3.mp3"));
        assert!(q.advance().is_none());
        assert_eq!(q.current_index(), Some(2));
    }

    #[test]
    fn repeat_wraps_around() {
        let mut q = queue(2);
        q.set_repeat(true);
        q.advance();
        assert_eq!(q.advance().map(|r| r.file.as_str()), Some("1.mp3"));
    }

    #[test]
    fn all_failed_stops() {
        let mut q = queue(2);
        q.set_repeat(true);
        q.mark_failed(0);
        q.mark_failed(1);
        assert!(q.advance().is_none());
    }
}
