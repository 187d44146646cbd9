//! Notes registry: the annotation graph between notes and assembly items.
//!
//! # Responsibility
//! - Own every note and annotated item record.
//! - Maintain many-to-many associations between them.
//! - Detect orphan notes and cascade deletions.
//!
//! # Invariants
//! - At most one annotated item exists per (item key, qualifier).
//! - An annotated item with zero linked notes is purged immediately, on
//!   every removal path.
//! - Orphan notes persist until deleted explicitly or through a removal
//!   call made with `del_if_orphan`.
//! - Invalid input is reported as `None`/`false`/`0`; nothing here panics.

mod links;

pub use links::LinkRecord;

use crate::model::item::{
    AnnotatedItem, AnnotatedItemId, AnnotatedItemRef, AssemblyItemId, ItemQualifier,
};
use crate::model::note::{Note, NoteId, NotePayload};
use indexmap::IndexMap;
use links::LinkGraph;
use log::debug;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;
use uuid::Uuid;

/// Result type used by fallible registry operations.
pub type NotesResult<T> = Result<T, NotesError>;

/// Errors from the few registry operations that can fail for reasons other
/// than invalid input.
#[derive(Debug)]
pub enum NotesError {
    /// Binary note source could not be read.
    Io(std::io::Error),
    /// Rows handed to `NotesRegistry::from_parts` break a registry invariant.
    InconsistentSnapshot(String),
}

impl Display for NotesError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read note data: {err}"),
            Self::InconsistentSnapshot(message) => {
                write!(f, "inconsistent notes snapshot: {message}")
            }
        }
    }
}

impl Error for NotesError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::InconsistentSnapshot(_) => None,
        }
    }
}

impl From<std::io::Error> for NotesError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// In-memory annotation graph.
///
/// Notes and annotated items are kept in creation order; associations keep
/// link order on both sides.
#[derive(Debug, Clone, Default)]
pub struct NotesRegistry {
    notes: IndexMap<NoteId, Note>,
    items: IndexMap<AnnotatedItemId, AnnotatedItem>,
    links: LinkGraph,
}

impl NotesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from stored rows.
    ///
    /// Items without links are dropped so the cleanup invariant holds even
    /// for snapshots written by older builds.
    ///
    /// # Errors
    /// - Duplicate note or item ids.
    /// - Two items with the same (item key, qualifier).
    /// - Links that reference unknown notes or items, or repeat an edge.
    pub fn from_parts(
        notes: Vec<Note>,
        items: Vec<AnnotatedItem>,
        links: Vec<LinkRecord>,
    ) -> NotesResult<Self> {
        let mut registry = Self::new();

        for note in notes {
            let id = note.id;
            if registry.notes.insert(id, note).is_some() {
                return Err(NotesError::InconsistentSnapshot(format!(
                    "duplicate note id {id}"
                )));
            }
        }

        for item in items {
            let id = item.id;
            if registry
                .items
                .values()
                .any(|existing| existing.reference == item.reference)
            {
                return Err(NotesError::InconsistentSnapshot(format!(
                    "duplicate annotated item reference on {id}"
                )));
            }
            if registry.items.insert(id, item).is_some() {
                return Err(NotesError::InconsistentSnapshot(format!(
                    "duplicate annotated item id {id}"
                )));
            }
        }

        let mut seen = HashSet::with_capacity(links.len());
        for link in &links {
            if !registry.notes.contains_key(&link.note_id) {
                return Err(NotesError::InconsistentSnapshot(format!(
                    "link references unknown note {}",
                    link.note_id
                )));
            }
            if !registry.items.contains_key(&link.item_id) {
                return Err(NotesError::InconsistentSnapshot(format!(
                    "link references unknown annotated item {}",
                    link.item_id
                )));
            }
            if !seen.insert((link.note_id, link.item_id)) {
                return Err(NotesError::InconsistentSnapshot(format!(
                    "duplicate link {} -> {}",
                    link.note_id, link.item_id
                )));
            }
        }
        registry.links = LinkGraph::from_records(&links);

        let before = registry.items.len();
        let links_ref = &registry.links;
        registry
            .items
            .retain(|id, _| links_ref.note_count(*id) > 0);
        let dropped = before - registry.items.len();
        if dropped > 0 {
            debug!(
                "event=registry_load module=registry status=ok dropped_empty_items={}",
                dropped
            );
        }

        Ok(registry)
    }

    // ---- creation ----

    /// Creates a comment note.
    pub fn create_comment(
        &mut self,
        author: impl Into<String>,
        timestamp: impl Into<String>,
        text: impl Into<String>,
    ) -> &Note {
        self.insert_note(Note::new(
            author,
            timestamp,
            NotePayload::Comment { text: text.into() },
        ))
    }

    /// Creates a binary note from an in-memory buffer.
    pub fn create_bin_data(
        &mut self,
        author: impl Into<String>,
        timestamp: impl Into<String>,
        title: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> &Note {
        self.insert_note(Note::new(
            author,
            timestamp,
            NotePayload::BinData {
                title: title.into(),
                mime_type: mime_type.into(),
                data,
            },
        ))
    }

    /// Creates a binary note by reading `source` to its end.
    ///
    /// Nothing is created when reading fails.
    pub fn create_bin_data_from_reader<R: Read>(
        &mut self,
        author: impl Into<String>,
        timestamp: impl Into<String>,
        title: impl Into<String>,
        mime_type: impl Into<String>,
        mut source: R,
    ) -> NotesResult<&Note> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        Ok(self.create_bin_data(author, timestamp, title, mime_type, data))
    }

    // ---- association ----

    /// Attaches `note` to the whole item. Returns `None` if `note` is not a
    /// note or `item` is null.
    pub fn add_note(&mut self, note: NoteId, item: &AssemblyItemId) -> Option<&AnnotatedItem> {
        self.add_note_with(note, item, ItemQualifier::None)
    }

    /// Attaches `note` to one attribute of the item.
    pub fn add_note_to_attr(
        &mut self,
        note: NoteId,
        item: &AssemblyItemId,
        guid: Uuid,
    ) -> Option<&AnnotatedItem> {
        self.add_note_with(note, item, ItemQualifier::Attribute(guid))
    }

    /// Attaches `note` to one sub-shape of the item.
    pub fn add_note_to_subshape(
        &mut self,
        note: NoteId,
        item: &AssemblyItemId,
        subshape_index: u32,
    ) -> Option<&AnnotatedItem> {
        self.add_note_with(note, item, ItemQualifier::Subshape(subshape_index))
    }

    /// Attaches `note` to the item identified by (`item`, `qualifier`),
    /// creating the annotated item on first use. Re-linking is a no-op.
    ///
    /// Returns `None` for an unknown note or the null item id.
    pub fn add_note_with(
        &mut self,
        note: NoteId,
        item: &AssemblyItemId,
        qualifier: ItemQualifier,
    ) -> Option<&AnnotatedItem> {
        if item.is_null() || !self.notes.contains_key(&note) {
            return None;
        }

        let item_id = match self.find_item(item, &qualifier) {
            Some(id) => id,
            None => {
                let record = AnnotatedItem::new(AnnotatedItemRef::new(item.clone(), qualifier));
                let id = record.id;
                self.items.insert(id, record);
                debug!(
                    "event=item_create module=registry status=ok item_id={} qualifier={}",
                    id,
                    qualifier.kind_name()
                );
                id
            }
        };

        if self.links.link(note, item_id) {
            debug!(
                "event=note_link module=registry status=ok note_id={} item_id={}",
                note, item_id
            );
        }
        self.items.get(&item_id)
    }

    // ---- query ----

    pub fn nb_notes(&self) -> usize {
        self.notes.len()
    }

    pub fn nb_annotated_items(&self) -> usize {
        self.items.len()
    }

    /// All note ids in creation order.
    pub fn note_ids(&self) -> Vec<NoteId> {
        self.notes.keys().copied().collect()
    }

    /// All annotated item ids in creation order.
    pub fn annotated_item_ids(&self) -> Vec<AnnotatedItemId> {
        self.items.keys().copied().collect()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn annotated_items(&self) -> impl Iterator<Item = &AnnotatedItem> {
        self.items.values()
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(&id)
    }

    pub fn annotated_item(&self, id: AnnotatedItemId) -> Option<&AnnotatedItem> {
        self.items.get(&id)
    }

    pub fn is_note(&self, id: NoteId) -> bool {
        self.notes.contains_key(&id)
    }

    /// Returns whether the unqualified item carries at least one note.
    pub fn is_annotated_item(&self, item: &AssemblyItemId) -> bool {
        self.find_annotated_item(item).is_some()
    }

    pub fn find_annotated_item(&self, item: &AssemblyItemId) -> Option<AnnotatedItemId> {
        self.find_item(item, &ItemQualifier::None)
    }

    pub fn find_annotated_item_attr(
        &self,
        item: &AssemblyItemId,
        guid: Uuid,
    ) -> Option<AnnotatedItemId> {
        self.find_item(item, &ItemQualifier::Attribute(guid))
    }

    pub fn find_annotated_item_subshape(
        &self,
        item: &AssemblyItemId,
        subshape_index: u32,
    ) -> Option<AnnotatedItemId> {
        self.find_item(item, &ItemQualifier::Subshape(subshape_index))
    }

    /// Linear scan in creation order; first match wins.
    pub fn find_item(
        &self,
        item: &AssemblyItemId,
        qualifier: &ItemQualifier,
    ) -> Option<AnnotatedItemId> {
        self.items
            .values()
            .find(|record| record.reference.matches(item, qualifier))
            .map(|record| record.id)
    }

    /// Notes attached to the whole item, in link order.
    pub fn get_notes(&self, item: &AssemblyItemId) -> Vec<NoteId> {
        self.get_notes_with(item, &ItemQualifier::None)
    }

    pub fn get_attr_notes(&self, item: &AssemblyItemId, guid: Uuid) -> Vec<NoteId> {
        self.get_notes_with(item, &ItemQualifier::Attribute(guid))
    }

    pub fn get_subshape_notes(&self, item: &AssemblyItemId, subshape_index: u32) -> Vec<NoteId> {
        self.get_notes_with(item, &ItemQualifier::Subshape(subshape_index))
    }

    pub fn get_notes_with(&self, item: &AssemblyItemId, qualifier: &ItemQualifier) -> Vec<NoteId> {
        self.find_item(item, qualifier)
            .map(|id| self.links.notes_of(id))
            .unwrap_or_default()
    }

    /// Annotated items a note is attached to, in link order.
    pub fn get_note_items(&self, note: NoteId) -> Vec<AnnotatedItemId> {
        self.links.items_of(note)
    }

    /// Returns whether `note` is a note with no associations.
    pub fn is_orphan(&self, note: NoteId) -> bool {
        self.notes.contains_key(&note) && self.links.item_count(note) == 0
    }

    pub fn nb_orphan_notes(&self) -> usize {
        self.notes
            .keys()
            .filter(|id| self.links.item_count(**id) == 0)
            .count()
    }

    /// Orphan notes in creation order.
    pub fn get_orphan_notes(&self) -> Vec<NoteId> {
        self.notes
            .keys()
            .copied()
            .filter(|id| self.links.item_count(*id) == 0)
            .collect()
    }

    /// Exports all associations for persistence.
    pub fn link_records(&self) -> Vec<LinkRecord> {
        self.links.records()
    }

    // ---- removal ----

    /// Detaches `note` from the whole item.
    ///
    /// Returns `false` without mutating anything when `note` is not a note,
    /// the item is not annotated, or the two are not linked.
    pub fn remove_note(
        &mut self,
        note: NoteId,
        item: &AssemblyItemId,
        del_if_orphan: bool,
    ) -> bool {
        self.remove_note_with(note, item, &ItemQualifier::None, del_if_orphan)
    }

    pub fn remove_attr_note(
        &mut self,
        note: NoteId,
        item: &AssemblyItemId,
        guid: Uuid,
        del_if_orphan: bool,
    ) -> bool {
        self.remove_note_with(note, item, &ItemQualifier::Attribute(guid), del_if_orphan)
    }

    pub fn remove_subshape_note(
        &mut self,
        note: NoteId,
        item: &AssemblyItemId,
        subshape_index: u32,
        del_if_orphan: bool,
    ) -> bool {
        self.remove_note_with(
            note,
            item,
            &ItemQualifier::Subshape(subshape_index),
            del_if_orphan,
        )
    }

    pub fn remove_note_with(
        &mut self,
        note: NoteId,
        item: &AssemblyItemId,
        qualifier: &ItemQualifier,
        del_if_orphan: bool,
    ) -> bool {
        if !self.notes.contains_key(&note) {
            return false;
        }
        let Some(item_id) = self.find_item(item, qualifier) else {
            return false;
        };
        if !self.links.contains(note, item_id) {
            return false;
        }
        self.links.unlink(note, item_id);
        debug!(
            "event=note_unlink module=registry status=ok note_id={} item_id={}",
            note, item_id
        );

        if self.links.note_count(item_id) == 0 {
            self.purge_item(item_id);
        }
        if del_if_orphan && self.is_orphan(note) {
            self.delete_note(note);
        }
        true
    }

    /// Detaches every note from the whole item and purges the item.
    ///
    /// Returns `false` when the item is not annotated.
    pub fn remove_all_notes(&mut self, item: &AssemblyItemId, del_if_orphan: bool) -> bool {
        self.remove_all_notes_with(item, &ItemQualifier::None, del_if_orphan)
    }

    pub fn remove_all_attr_notes(
        &mut self,
        item: &AssemblyItemId,
        guid: Uuid,
        del_if_orphan: bool,
    ) -> bool {
        self.remove_all_notes_with(item, &ItemQualifier::Attribute(guid), del_if_orphan)
    }

    pub fn remove_all_subshape_notes(
        &mut self,
        item: &AssemblyItemId,
        subshape_index: u32,
        del_if_orphan: bool,
    ) -> bool {
        self.remove_all_notes_with(item, &ItemQualifier::Subshape(subshape_index), del_if_orphan)
    }

    pub fn remove_all_notes_with(
        &mut self,
        item: &AssemblyItemId,
        qualifier: &ItemQualifier,
        del_if_orphan: bool,
    ) -> bool {
        let Some(item_id) = self.find_item(item, qualifier) else {
            return false;
        };

        let detached = self.links.detach_item(item_id);
        debug!(
            "event=item_unlink_all module=registry status=ok item_id={} notes={}",
            item_id,
            detached.len()
        );
        if del_if_orphan {
            for note in detached {
                if self.is_orphan(note) {
                    self.delete_note(note);
                }
            }
        }
        self.purge_item(item_id);
        true
    }

    /// Deletes a note, detaching it from all items first.
    ///
    /// Items left without notes are purged. Returns `false` if `note` is not a note.
    pub fn delete_note(&mut self, note: NoteId) -> bool {
        if !self.notes.contains_key(&note) {
            return false;
        }

        for item_id in self.links.detach_note(note) {
            if self.links.note_count(item_id) == 0 {
                self.purge_item(item_id);
            }
        }
        self.notes.shift_remove(&note);
        debug!("event=note_delete module=registry status=ok note_id={}", note);
        true
    }

    /// Deletes the given notes and returns how many were deleted.
    pub fn delete_notes(&mut self, notes: &[NoteId]) -> usize {
        notes.iter().filter(|id| self.delete_note(**id)).count()
    }

    pub fn delete_all_notes(&mut self) -> usize {
        let ids = self.note_ids();
        self.delete_notes(&ids)
    }

    pub fn delete_orphan_notes(&mut self) -> usize {
        let ids = self.get_orphan_notes();
        self.delete_notes(&ids)
    }

    fn insert_note(&mut self, note: Note) -> &Note {
        debug!(
            "event=note_create module=registry status=ok note_id={} kind={:?}",
            note.id,
            note.kind()
        );
        self.notes.entry(note.id).or_insert(note)
    }

    fn purge_item(&mut self, item_id: AnnotatedItemId) {
        self.links.detach_item(item_id);
        if self.items.shift_remove(&item_id).is_some() {
            debug!(
                "event=item_purge module=registry status=ok item_id={}",
                item_id
            );
        }
    }
}

impl Display for NotesRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Notes           : {}", self.nb_notes())?;
        writeln!(f, "Annotated items : {}", self.nb_annotated_items())
    }
}
