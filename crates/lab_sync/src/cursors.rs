//! Collaborator cursor presence
//!
//! Ephemeral positions of other participants, keyed by their
//! server-assigned session identity. Records carry no file-mutation
//! capability; they exist purely for awareness and are pruned when the
//! server reports a disconnect.

use lab_common::CursorPos;
use rand::Rng;
use std::collections::HashMap;

/// One remote participant's cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorRecord {
    pub session_id: String,
    pub file: String,
    pub pos: CursorPos,
    /// Display color, assigned at first sighting and stable for the
    /// record's lifetime.
    pub color: String,
}

/// Presence map of remote cursors
#[derive(Debug, Clone, Default)]
pub struct CursorTracker {
    cursors: HashMap<String, CursorRecord>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn get(&self, session_id: &str) -> Option<&CursorRecord> {
        self.cursors.get(session_id)
    }

    /// Apply a `movedCursor` event: update position and file in place
    /// for a known session, or create a new record with a fresh color.
    pub fn upsert(&mut self, session_id: &str, file: &str, pos: CursorPos) {
        match self.cursors.get_mut(session_id) {
            Some(record) => {
                record.pos = pos;
                record.file = file.to_string();
            }
            None => {
                self.cursors.insert(
                    session_id.to_string(),
                    CursorRecord {
                        session_id: session_id.to_string(),
                        file: file.to_string(),
                        pos,
                        color: random_color(),
                    },
                );
            }
        }
    }

    /// Apply a `deleteCursor` event. Unknown ids are a no-op.
    pub fn remove(&mut self, session_id: &str) -> bool {
        self.cursors.remove(session_id).is_some()
    }

    /// Cursors to render for the given open file. Off-file cursors stay
    /// tracked; this is a display filter only.
    pub fn visible_in<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a CursorRecord> {
        self.cursors.values().filter(move |c| c.file == file)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CursorRecord> {
        self.cursors.values()
    }
}

/// Pseudorandom `#rrggbb` display color
fn random_color() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("#{:06x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_creates_one_record_with_stable_color() {
        let mut tracker = CursorTracker::new();
        tracker.upsert("s-1", "main.py", CursorPos::new(1, 2));
        assert_eq!(tracker.len(), 1);

        let color = tracker.get("s-1").map(|c| c.color.clone());
        assert!(color.as_deref().is_some_and(|c| c.starts_with('#') && c.len() == 7));

        tracker.upsert("s-1", "util.py", CursorPos::new(8, 0));
        assert_eq!(tracker.len(), 1);
        let record = tracker.get("s-1").cloned();
        assert!(record.is_some());
        let record = record.expect("record exists");
        assert_eq!(record.file, "util.py");
        assert_eq!(record.pos, CursorPos::new(8, 0));
        assert_eq!(Some(record.color), color);
    }

    #[test]
    fn test_remove_and_duplicate_remove() {
        let mut tracker = CursorTracker::new();
        tracker.upsert("s-1", "main.py", CursorPos::new(0, 0));

        assert!(tracker.remove("s-1"));
        assert!(tracker.is_empty());
        // Duplicate delete for an unknown id is a no-op.
        assert!(!tracker.remove("s-1"));
        assert!(!tracker.remove("never-seen"));
    }

    #[test]
    fn test_visible_in_filters_without_evicting() {
        let mut tracker = CursorTracker::new();
        tracker.upsert("s-1", "main.py", CursorPos::new(1, 1));
        tracker.upsert("s-2", "util.py", CursorPos::new(2, 2));

        let visible: Vec<_> = tracker.visible_in("main.py").collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].session_id, "s-1");

        // The off-file cursor is still tracked.
        assert_eq!(tracker.len(), 2);
    }
}
