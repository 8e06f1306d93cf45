//! Playback queue with explicit current-index tracking
//!
//! Invariant: `current_index` is `None` or a valid index into the queue,
//! and the current track is never removed by bulk operations — clearing
//! keeps it at index 0 and shuffling pins it there.

use bilivox_common::Track;
use rand::Rng;

#[derive(Debug, Default)]
pub struct TrackQueue {
    tracks: Vec<Track>,
    current: Option<usize>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn current_mut(&mut self) -> Option<&mut Track> {
        match self.current {
            Some(i) => self.tracks.get_mut(i),
            None => None,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Append a track at the tail.
    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Select a specific entry as current; `None` when out of range.
    pub fn select(&mut self, index: usize) -> Option<&Track> {
        if index >= self.tracks.len() {
            return None;
        }
        self.current = Some(index);
        self.tracks.get(index)
    }

    /// Drop the current selection without touching the entries.
    pub fn deselect(&mut self) {
        self.current = None;
    }

    /// Remove a pending entry; the current entry cannot be removed this
    /// way. Adjusts the current index when an earlier entry goes away.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() || self.current == Some(index) {
            return None;
        }
        let removed = self.tracks.remove(index);
        if let Some(cur) = self.current {
            if index < cur {
                self.current = Some(cur - 1);
            }
        }
        Some(removed)
    }

    /// Keep only the current track (moved to index 0); empty the queue when
    /// nothing is active.
    pub fn clear_keep_current(&mut self) {
        match self.current {
            Some(cur) => {
                let current = self.tracks.remove(cur);
                self.tracks.clear();
                self.tracks.push(current);
                self.current = Some(0);
            }
            None => self.tracks.clear(),
        }
    }

    /// Drop everything, selection included.
    pub fn clear_all(&mut self) {
        self.tracks.clear();
        self.current = None;
    }

    /// Fisher–Yates shuffle of all entries except the current one, which is
    /// pinned to index 0.
    pub fn shuffle_pinning_current(&mut self) {
        if self.tracks.len() <= 1 {
            return;
        }
        let mut rng = rand::thread_rng();
        let start = match self.current {
            Some(cur) => {
                let current = self.tracks.remove(cur);
                self.tracks.insert(0, current);
                self.current = Some(0);
                1
            }
            None => 0,
        };
        for i in (start + 1..self.tracks.len()).rev() {
            let j = rng.gen_range(start..=i);
            self.tracks.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn track(title: &str) -> Track {
        Track::new(title, 120, "https://cdn/s", "https://page/s", "up", "tester")
    }

    fn assert_invariant(queue: &TrackQueue) {
        match queue.current_index() {
            Some(i) => {
                assert!(i < queue.len(), "current index {} out of range {}", i, queue.len());
                assert!(queue.current().is_some());
            }
            None => assert!(queue.current().is_none()),
        }
    }

    #[test]
    fn push_and_select() {
        let mut queue = TrackQueue::new();
        queue.push(track("A"));
        queue.push(track("B"));

        assert_eq!(queue.len(), 2);
        assert!(queue.current().is_none());

        assert!(queue.select(1).is_some());
        assert_eq!(queue.current().unwrap().title, "B");
        assert!(queue.select(5).is_none());
        // failed select leaves the previous selection intact
        assert_eq!(queue.current_index(), Some(1));
        assert_invariant(&queue);
    }

    #[test]
    fn invariant_holds_across_operation_sequences() {
        let mut queue = TrackQueue::new();
        for title in ["A", "B", "C", "D"] {
            queue.push(track(title));
            assert_invariant(&queue);
        }
        queue.select(2);
        assert_invariant(&queue);
        queue.remove(0);
        assert_invariant(&queue);
        assert_eq!(queue.current().unwrap().title, "C");
        queue.clear_keep_current();
        assert_invariant(&queue);
        queue.clear_all();
        assert_invariant(&queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_keeps_only_current_at_index_zero() {
        let mut queue = TrackQueue::new();
        for title in ["A", "B", "C"] {
            queue.push(track(title));
        }
        queue.select(1);
        queue.clear_keep_current();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.current().unwrap().title, "B");
    }

    #[test]
    fn clear_without_current_empties_queue() {
        let mut queue = TrackQueue::new();
        queue.push(track("A"));
        queue.clear_keep_current();

        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn remove_adjusts_current_index() {
        let mut queue = TrackQueue::new();
        for title in ["A", "B", "C"] {
            queue.push(track(title));
        }
        queue.select(2);

        assert!(queue.remove(0).is_some());
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.current().unwrap().title, "C");
        assert_invariant(&queue);
    }

    #[test]
    fn remove_rejects_current_entry() {
        let mut queue = TrackQueue::new();
        queue.push(track("A"));
        queue.select(0);

        assert!(queue.remove(0).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn shuffle_pins_current_and_preserves_tracks() {
        let mut queue = TrackQueue::new();
        for i in 0..10 {
            queue.push(track(&format!("T{}", i)));
        }
        queue.select(4);
        let before: HashSet<String> = queue.tracks().iter().map(|t| t.title.clone()).collect();

        queue.shuffle_pinning_current();

        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.current().unwrap().title, "T4");
        let after: HashSet<String> = queue.tracks().iter().map(|t| t.title.clone()).collect();
        assert_eq!(before, after);
        assert_invariant(&queue);
    }

    #[test]
    fn shuffle_without_current_keeps_no_selection() {
        let mut queue = TrackQueue::new();
        for i in 0..5 {
            queue.push(track(&format!("T{}", i)));
        }
        queue.shuffle_pinning_current();
        assert_eq!(queue.current_index(), None);
        assert_eq!(queue.len(), 5);
    }
}
