//! Bidirectional note/item association index.
//!
//! # Invariants
//! - `items_by_note[n]` contains `i` iff `notes_by_item[i]` contains `n`.
//! - Empty sets are never stored; a missing key means zero links.
//! - Both directions keep link insertion order.

use crate::model::item::AnnotatedItemId;
use crate::model::note::NoteId;
use indexmap::{IndexMap, IndexSet};

/// One persisted association with its position on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRecord {
    pub note_id: NoteId,
    pub item_id: AnnotatedItemId,
    /// Position of `item_id` among the items of `note_id`.
    pub note_pos: u32,
    /// Position of `note_id` among the notes of `item_id`.
    pub item_pos: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LinkGraph {
    items_by_note: IndexMap<NoteId, IndexSet<AnnotatedItemId>>,
    notes_by_item: IndexMap<AnnotatedItemId, IndexSet<NoteId>>,
}

impl LinkGraph {
    /// Records one edge. Returns `false` when it already existed.
    pub(crate) fn link(&mut self, note: NoteId, item: AnnotatedItemId) -> bool {
        let added = self.items_by_note.entry(note).or_default().insert(item);
        self.notes_by_item.entry(item).or_default().insert(note);
        added
    }

    /// Removes one edge. Returns `false` when it did not exist.
    pub(crate) fn unlink(&mut self, note: NoteId, item: AnnotatedItemId) -> bool {
        let removed = match self.items_by_note.get_mut(&note) {
            Some(items) => items.shift_remove(&item),
            None => false,
        };
        if !removed {
            return false;
        }
        if let Some(notes) = self.notes_by_item.get_mut(&item) {
            notes.shift_remove(&note);
        }
        self.drop_empty(note, item);
        true
    }

    pub(crate) fn contains(&self, note: NoteId, item: AnnotatedItemId) -> bool {
        self.items_by_note
            .get(&note)
            .is_some_and(|items| items.contains(&item))
    }

    pub(crate) fn notes_of(&self, item: AnnotatedItemId) -> Vec<NoteId> {
        self.notes_by_item
            .get(&item)
            .map(|notes| notes.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn items_of(&self, note: NoteId) -> Vec<AnnotatedItemId> {
        self.items_by_note
            .get(&note)
            .map(|items| items.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn note_count(&self, item: AnnotatedItemId) -> usize {
        self.notes_by_item.get(&item).map_or(0, IndexSet::len)
    }

    pub(crate) fn item_count(&self, note: NoteId) -> usize {
        self.items_by_note.get(&note).map_or(0, IndexSet::len)
    }

    /// Removes every edge of `note` and returns the items it was linked to.
    pub(crate) fn detach_note(&mut self, note: NoteId) -> Vec<AnnotatedItemId> {
        let items: Vec<AnnotatedItemId> = self
            .items_by_note
            .shift_remove(&note)
            .map(|items| items.into_iter().collect())
            .unwrap_or_default();
        for item in &items {
            if let Some(notes) = self.notes_by_item.get_mut(item) {
                notes.shift_remove(&note);
                if notes.is_empty() {
                    self.notes_by_item.shift_remove(item);
                }
            }
        }
        items
    }

    /// Removes every edge of `item` and returns the notes it was linked to.
    pub(crate) fn detach_item(&mut self, item: AnnotatedItemId) -> Vec<NoteId> {
        let notes: Vec<NoteId> = self
            .notes_by_item
            .shift_remove(&item)
            .map(|notes| notes.into_iter().collect())
            .unwrap_or_default();
        for note in &notes {
            if let Some(items) = self.items_by_note.get_mut(note) {
                items.shift_remove(&item);
                if items.is_empty() {
                    self.items_by_note.shift_remove(note);
                }
            }
        }
        notes
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.notes_by_item.values().map(IndexSet::len).sum()
    }

    /// Exports all edges with their per-side positions, grouped by item.
    pub(crate) fn records(&self) -> Vec<LinkRecord> {
        let mut records = Vec::with_capacity(self.edge_count());
        for (item, notes) in &self.notes_by_item {
            for (item_pos, note) in notes.iter().enumerate() {
                let note_pos = self
                    .items_by_note
                    .get(note)
                    .and_then(|items| items.get_index_of(item))
                    .unwrap_or_default();
                records.push(LinkRecord {
                    note_id: *note,
                    item_id: *item,
                    note_pos: note_pos as u32,
                    item_pos: item_pos as u32,
                });
            }
        }
        records
    }

    /// Rebuilds the index from exported records, restoring both orders.
    pub(crate) fn from_records(records: &[LinkRecord]) -> Self {
        let mut graph = Self::default();

        let mut by_item = records.to_vec();
        by_item.sort_by_key(|record| record.item_pos);
        for record in &by_item {
            graph
                .notes_by_item
                .entry(record.item_id)
                .or_default()
                .insert(record.note_id);
        }

        let mut by_note = records.to_vec();
        by_note.sort_by_key(|record| record.note_pos);
        for record in &by_note {
            graph
                .items_by_note
                .entry(record.note_id)
                .or_default()
                .insert(record.item_id);
        }

        graph
    }

    fn drop_empty(&mut self, note: NoteId, item: AnnotatedItemId) {
        if self.items_by_note.get(&note).is_some_and(IndexSet::is_empty) {
            self.items_by_note.shift_remove(&note);
        }
        if self.notes_by_item.get(&item).is_some_and(IndexSet::is_empty) {
            self.notes_by_item.shift_remove(&item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LinkGraph;
    use uuid::Uuid;

    #[test]
    fn link_is_deduplicated_and_symmetric() {
        let mut graph = LinkGraph::default();
        let note = Uuid::new_v4();
        let item = Uuid::new_v4();

        assert!(graph.link(note, item));
        assert!(!graph.link(note, item));
        assert_eq!(graph.note_count(item), 1);
        assert_eq!(graph.item_count(note), 1);
        assert!(graph.contains(note, item));
    }

    #[test]
    fn unlink_drops_empty_sides() {
        let mut graph = LinkGraph::default();
        let note = Uuid::new_v4();
        let item = Uuid::new_v4();
        graph.link(note, item);

        assert!(graph.unlink(note, item));
        assert!(!graph.unlink(note, item));
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.items_of(note).is_empty());
        assert!(graph.notes_of(item).is_empty());
    }

    #[test]
    fn records_round_trip_preserves_both_orders() {
        let mut graph = LinkGraph::default();
        let (n1, n2) = (Uuid::new_v4(), Uuid::new_v4());
        let (i1, i2) = (Uuid::new_v4(), Uuid::new_v4());
        graph.link(n1, i1);
        graph.link(n2, i2);
        graph.link(n2, i1);
        graph.link(n1, i2);

        let rebuilt = LinkGraph::from_records(&graph.records());
        assert_eq!(rebuilt.notes_of(i1), vec![n1, n2]);
        assert_eq!(rebuilt.notes_of(i2), vec![n2, n1]);
        assert_eq!(rebuilt.items_of(n1), vec![i1, i2]);
        assert_eq!(rebuilt.items_of(n2), vec![i2, i1]);
    }
}
