//! Note domain model.
//!
//! # Responsibility
//! - Define the note record shared by comment and binary notes.
//! - Keep payload variants behind one `Note` contract.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - Every note carries exactly one payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one note.
pub type NoteId = Uuid;

/// Payload category of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Comment,
    BinData,
}

/// Content attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotePayload {
    /// Free text comment.
    Comment { text: String },
    /// Opaque binary attachment, e.g. an image or a document.
    BinData {
        title: String,
        mime_type: String,
        data: Vec<u8>,
    },
}

impl NotePayload {
    pub fn kind(&self) -> NoteKind {
        match self {
            Self::Comment { .. } => NoteKind::Comment,
            Self::BinData { .. } => NoteKind::BinData,
        }
    }
}

/// One annotation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Author name as supplied by the caller.
    pub author: String,
    /// Caller-formatted timestamp; not interpreted.
    pub timestamp: String,
    pub payload: NotePayload,
}

impl Note {
    /// Creates a note with a generated stable ID.
    pub fn new(
        author: impl Into<String>,
        timestamp: impl Into<String>,
        payload: NotePayload,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), author, timestamp, payload)
    }

    /// Creates a note with a caller-provided ID.
    ///
    /// Used by load paths where identity already exists in storage.
    pub fn with_id(
        id: NoteId,
        author: impl Into<String>,
        timestamp: impl Into<String>,
        payload: NotePayload,
    ) -> Self {
        Self {
            id,
            author: author.into(),
            timestamp: timestamp.into(),
            payload,
        }
    }

    pub fn kind(&self) -> NoteKind {
        self.payload.kind()
    }

    /// Comment text, or the title of a binary note.
    pub fn headline(&self) -> &str {
        match &self.payload {
            NotePayload::Comment { text } => text.as_str(),
            NotePayload::BinData { title, .. } => title.as_str(),
        }
    }

    /// Size of the attached data in bytes; zero for comments.
    pub fn data_size(&self) -> usize {
        match &self.payload {
            NotePayload::Comment { .. } => 0,
            NotePayload::BinData { data, .. } => data.len(),
        }
    }
}
