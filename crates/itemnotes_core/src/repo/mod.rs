//! Repository layer for notes registry persistence.
//!
//! # Responsibility
//! - Define the snapshot persistence contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories only accept fully migrated connections.
//! - Read paths return semantic errors (`InvalidData`, `Snapshot`) in
//!   addition to DB transport errors.

pub mod notes_repo;
