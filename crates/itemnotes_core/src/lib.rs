//! Core logic for itemnotes: comments and binary notes attached to
//! assembly items, with orphan tracking and cascading cleanup.
//! This crate is the single source of truth for annotation invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;

pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LoggingConfig,
};
pub use model::item::{
    AnnotatedItem, AnnotatedItemId, AnnotatedItemRef, AssemblyItemId, ItemQualifier,
};
pub use model::note::{Note, NoteId, NoteKind, NotePayload};
pub use registry::{LinkRecord, NotesError, NotesRegistry, NotesResult};
pub use repo::notes_repo::{
    NotesRepoError, NotesRepoResult, NotesRepository, SqliteNotesRepository,
};
pub use service::notes_service::{NotesService, NotesServiceError, NotesSummary};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
