//! Linear undo/redo over structured change records.
//!
//! `snapshots[..applied]` are in effect; `snapshots[applied..]` are redoable.
//! Pushing after an undo discards the redoable tail.

use crate::error::Result;
use crate::model::{Change, Entity, Snapshot};
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: usize = 100;

/// Raw, non-recording mutations the history replays through. Implementations
/// must not cascade: cascades are already recorded as their own changes.
///
/// `at` is the list position to restore an entity to. It is set only when
/// undoing, and `None` means append.
pub trait ReplayTarget {
    fn replay_create(&mut self, entity: &Entity, at: Option<usize>) -> Result<()>;
    fn replay_delete(&mut self, entity: &Entity) -> Result<()>;
    /// Replace the entity currently matching `current` with `target`.
    fn replay_replace(&mut self, current: &Entity, target: &Entity, at: Option<usize>) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

#[derive(Clone, Debug)]
pub struct History {
    snapshots: Vec<Snapshot>,
    applied: usize,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        History::new(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History {
            snapshots: Vec::new(),
            applied: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Index of the last applied snapshot, `None` when everything is undone.
    pub fn cursor(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.snapshots.len()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.applied = 0;
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if snapshot.changes.is_empty() {
            return;
        }
        self.snapshots.truncate(self.applied);
        self.snapshots.push(snapshot);
        if self.snapshots.len() > self.capacity {
            let overflow = self.snapshots.len() - self.capacity;
            self.snapshots.drain(..overflow);
        }
        self.applied = self.snapshots.len();
    }

    /// Reverts the last applied snapshot. Returns `false` when there is nothing
    /// to undo.
    pub fn undo<T: ReplayTarget + ?Sized>(&mut self, target: &mut T) -> bool {
        if self.applied == 0 {
            return false;
        }
        self.applied -= 1;
        replay(&self.snapshots[self.applied], target, Direction::Undo);
        true
    }

    pub fn redo<T: ReplayTarget + ?Sized>(&mut self, target: &mut T) -> bool {
        if self.applied >= self.snapshots.len() {
            return false;
        }
        replay(&self.snapshots[self.applied], target, Direction::Redo);
        self.applied += 1;
        true
    }
}

fn replay<T: ReplayTarget + ?Sized>(snapshot: &Snapshot, target: &mut T, dir: Direction) {
    debug!(object = %snapshot.object, entity = %snapshot.entity, ?dir, changes = snapshot.changes.len(), "replaying snapshot");
    for change in &snapshot.changes {
        if let Err(e) = replay_change(change, target, dir) {
            warn!(object = %change.object, error = %e, ?dir, "skipping history step");
        }
    }
}

fn replay_change<T: ReplayTarget + ?Sized>(change: &Change, target: &mut T, dir: Direction) -> Result<()> {
    // Redo lands where the original edit did: at the end.
    let (before, after, at) = match dir {
        Direction::Undo => (&change.to, &change.from, change.index),
        Direction::Redo => (&change.from, &change.to, None),
    };
    match (before, after) {
        (None, Some(e)) => target.replay_create(e, at),
        (Some(e), None) => target.replay_delete(e),
        (Some(cur), Some(next)) => target.replay_replace(cur, next, at),
        (None, None) => Err(crate::error::EditorError::InvalidChange(change.object.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use crate::model::{Dictionary, EntityKind, Operation};
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Dicts(BTreeMap<String, String>);

    impl ReplayTarget for Dicts {
        fn replay_create(&mut self, e: &Entity, _at: Option<usize>) -> Result<()> {
            let Entity::Dictionary(d) = e else { unreachable!() };
            if self.0.contains_key(&d.name) {
                return Err(EditorError::duplicate(EntityKind::Dictionary, &d.name));
            }
            self.0.insert(d.name.clone(), d.data().to_string());
            Ok(())
        }
        fn replay_delete(&mut self, e: &Entity) -> Result<()> {
            self.0
                .remove(e.name())
                .map(|_| ())
                .ok_or_else(|| EditorError::not_found(EntityKind::Dictionary, e.name()))
        }
        fn replay_replace(&mut self, cur: &Entity, next: &Entity, at: Option<usize>) -> Result<()> {
            self.replay_delete(cur)?;
            self.replay_create(next, at)
        }
    }

    fn dict(name: &str, data: &str) -> Entity {
        Entity::Dictionary(Dictionary::new(name, data))
    }

    fn add(name: &str) -> Snapshot {
        Snapshot::new(name, EntityKind::Dictionary, Operation::Add, vec![Change::added(dict(name, ""))])
    }

    fn apply_add(t: &mut Dicts, h: &mut History, name: &str) {
        t.0.insert(name.to_string(), String::new());
        h.push(add(name));
    }

    #[test]
    fn undo_redo_walks_the_cursor() {
        let mut t = Dicts::default();
        let mut h = History::default();
        assert!(!h.undo(&mut t));
        apply_add(&mut t, &mut h, "a");
        apply_add(&mut t, &mut h, "b");
        assert_eq!(h.cursor(), Some(1));
        assert!(h.undo(&mut t));
        assert!(!t.0.contains_key("b"));
        assert!(h.redo(&mut t));
        assert!(t.0.contains_key("b"));
        assert!(!h.redo(&mut t));
    }

    #[test]
    fn push_after_undo_truncates() {
        let mut t = Dicts::default();
        let mut h = History::default();
        for n in ["s1", "s2", "s3"] {
            apply_add(&mut t, &mut h, n);
        }
        h.undo(&mut t);
        h.undo(&mut t);
        assert_eq!(h.cursor(), Some(0));
        apply_add(&mut t, &mut h, "s4");
        assert!(!h.redo(&mut t));
        let objs: Vec<_> = h.snapshots().iter().map(|s| s.object.as_str()).collect();
        assert_eq!(objs, vec!["s1", "s4"]);
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut t = Dicts::default();
        let mut h = History::new(2);
        for n in ["a", "b", "c"] {
            apply_add(&mut t, &mut h, n);
        }
        assert_eq!(h.len(), 2);
        assert_eq!(h.cursor(), Some(1));
        assert_eq!(h.snapshots()[0].object, "b");
    }

    #[test]
    fn missing_entities_are_skipped_not_fatal() {
        let mut t = Dicts::default();
        let mut h = History::default();
        t.0.insert("x".into(), "1".into());
        t.0.insert("y".into(), "1".into());
        h.push(Snapshot::new(
            "x",
            EntityKind::Dictionary,
            Operation::Change,
            vec![
                Change::modified(dict("x", "0"), dict("x", "1")).unwrap(),
                Change::modified(dict("y", "0"), dict("y", "1")).unwrap(),
            ],
        ));
        // "x" disappears out of band.
        t.0.remove("x");
        assert!(h.undo(&mut t));
        assert_eq!(t.0.get("y").map(String::as_str), Some("0"));
        assert_eq!(h.cursor(), None);
    }

    #[derive(Default)]
    struct Positions(Vec<Option<usize>>);

    impl ReplayTarget for Positions {
        fn replay_create(&mut self, _: &Entity, at: Option<usize>) -> Result<()> {
            self.0.push(at);
            Ok(())
        }
        fn replay_delete(&mut self, _: &Entity) -> Result<()> {
            Ok(())
        }
        fn replay_replace(&mut self, _: &Entity, _: &Entity, at: Option<usize>) -> Result<()> {
            self.0.push(at);
            Ok(())
        }
    }

    #[test]
    fn undo_passes_recorded_positions_redo_appends() {
        let mut t = Positions::default();
        let mut h = History::default();
        h.push(Snapshot::new(
            "x",
            EntityKind::Dictionary,
            Operation::Remove,
            vec![
                Change::removed(dict("x", "")).at(3),
                Change::modified(dict("y", "0"), dict("y", "1")).unwrap().at(1),
            ],
        ));
        assert!(h.undo(&mut t));
        assert_eq!(t.0, vec![Some(3), Some(1)]);
        assert!(h.redo(&mut t));
        assert_eq!(t.0, vec![Some(3), Some(1), None]);
    }

    #[test]
    fn empty_snapshots_are_ignored() {
        let mut h = History::default();
        h.push(Snapshot::new("n", EntityKind::Box, Operation::Change, Vec::new()));
        assert!(h.is_empty());
    }
}
