//! Selection set driven by gesture transitions.
//!
//! Objects themselves live outside this crate; the set only tracks
//! their ids.  `DeselectAll` empties it, and drag tools bracket each
//! transformation with begin/complete.

use std::collections::BTreeSet;

use tracing::debug;

/// Opaque id of a selectable object in the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    selected: BTreeSet<ObjectId>,
    transforming: bool,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the object was already selected.
    pub fn select(&mut self, id: ObjectId) -> bool {
        self.selected.insert(id)
    }

    pub fn deselect(&mut self, id: ObjectId) -> bool {
        self.selected.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.selected.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.selected.iter().copied()
    }

    /// Clear the selection.  Returns how many objects were dropped.
    pub fn clear_all(&mut self) -> usize {
        let n = self.selected.len();
        self.selected.clear();
        debug!("selection cleared ({} objects)", n);
        n
    }

    pub fn is_transforming(&self) -> bool {
        self.transforming
    }

    /// Start a transformation.  False if one is already in progress.
    pub fn begin_transformation(&mut self) -> bool {
        if self.transforming {
            return false;
        }
        self.transforming = true;
        true
    }

    /// Finish the transformation.  False if none was in progress.
    pub fn complete_transformation(&mut self) -> bool {
        std::mem::replace(&mut self.transforming, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_and_clear() {
        let mut s = SelectionSet::new();
        assert!(s.select(ObjectId(3)));
        assert!(!s.select(ObjectId(3)));
        s.select(ObjectId(1));
        assert_eq!(s.ids().collect::<Vec<_>>(), vec![ObjectId(1), ObjectId(3)]);
        assert!(s.deselect(ObjectId(1)));
        assert_eq!(s.clear_all(), 1);
        assert!(s.is_empty());
    }

    #[test]
    fn test_transformation_bracketing() {
        let mut s = SelectionSet::new();
        assert!(!s.complete_transformation());
        assert!(s.begin_transformation());
        assert!(!s.begin_transformation());
        assert!(s.is_transforming());
        assert!(s.complete_transformation());
        assert!(!s.is_transforming());
    }
}
