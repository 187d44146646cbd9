//! Notes use-case service.
//!
//! # Responsibility
//! - Load a registry from a repository, expose it for edits, write it back.
//! - Provide summary counts for callers that only need an overview.
//!
//! # Invariants
//! - The in-memory registry is the single source of truth between `open`
//!   and `save`; nothing is persisted implicitly.

use crate::registry::NotesRegistry;
use crate::repo::notes_repo::{NotesRepoError, NotesRepository};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for notes use-cases.
#[derive(Debug)]
pub enum NotesServiceError {
    /// Persistence-layer failure.
    Repo(NotesRepoError),
}

impl Display for NotesServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NotesServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<NotesRepoError> for NotesServiceError {
    fn from(value: NotesRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Overview counts of one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesSummary {
    pub notes: usize,
    pub annotated_items: usize,
    pub orphan_notes: usize,
}

/// Notes service facade over a repository implementation.
pub struct NotesService<R: NotesRepository> {
    repo: R,
    registry: NotesRegistry,
}

impl<R: NotesRepository> NotesService<R> {
    /// Loads the stored registry through `repo`.
    pub fn open(repo: R) -> Result<Self, NotesServiceError> {
        let registry = repo.load_registry()?;
        Ok(Self { repo, registry })
    }

    pub fn registry(&self) -> &NotesRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut NotesRegistry {
        &mut self.registry
    }

    /// Persists the current registry, replacing the stored snapshot.
    pub fn save(&mut self) -> Result<(), NotesServiceError> {
        self.repo.save_registry(&self.registry)?;
        Ok(())
    }

    pub fn summary(&self) -> NotesSummary {
        NotesSummary {
            notes: self.registry.nb_notes(),
            annotated_items: self.registry.nb_annotated_items(),
            orphan_notes: self.registry.nb_orphan_notes(),
        }
    }

    /// Consumes the service and returns the registry.
    pub fn into_registry(self) -> NotesRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::{NotesService, NotesSummary};
    use crate::model::item::AssemblyItemId;
    use crate::registry::NotesRegistry;
    use crate::repo::notes_repo::{NotesRepoResult, NotesRepository};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct MemoryRepo {
        stored: Rc<RefCell<Option<NotesRegistry>>>,
    }

    impl NotesRepository for MemoryRepo {
        fn save_registry(&mut self, registry: &NotesRegistry) -> NotesRepoResult<()> {
            *self.stored.borrow_mut() = Some(registry.clone());
            Ok(())
        }

        fn load_registry(&self) -> NotesRepoResult<NotesRegistry> {
            Ok(self.stored.borrow().clone().unwrap_or_default())
        }
    }

    #[test]
    fn summary_counts_orphans() {
        let mut service = NotesService::open(MemoryRepo::default()).unwrap();
        let registry = service.registry_mut();
        let linked = registry.create_comment("alice", "t1", "linked").id;
        registry.create_comment("alice", "t2", "orphan");
        registry.add_note(linked, &AssemblyItemId::parse("0:1:1:1"));

        assert_eq!(
            service.summary(),
            NotesSummary {
                notes: 2,
                annotated_items: 1,
                orphan_notes: 1,
            }
        );
    }

    #[test]
    fn save_hands_registry_to_repository() {
        let repo = MemoryRepo::default();
        let mut service = NotesService::open(repo.clone()).unwrap();
        service.registry_mut().create_comment("bob", "t1", "x");
        service.save().unwrap();

        let reopened = NotesService::open(repo).unwrap();
        assert_eq!(reopened.registry().nb_notes(), 1);
    }
}
