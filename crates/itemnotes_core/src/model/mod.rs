//! Domain model for notes and annotated assembly items.
//!
//! # Responsibility
//! - Define canonical data structures used by the notes registry.
//! - Keep item references opaque and comparable.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Item identity is the pair (item key, qualifier).

pub mod item;
pub mod note;
