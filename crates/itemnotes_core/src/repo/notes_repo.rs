//! Notes snapshot repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist a whole `NotesRegistry` and load it back.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `save_registry` replaces the stored snapshot in one transaction.
//! - Load restores creation order of notes and items and link order on
//!   both sides of every association.
//! - Invalid persisted rows are rejected, never masked.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::item::{AnnotatedItem, AnnotatedItemRef, AssemblyItemId, ItemQualifier};
use crate::model::note::{Note, NotePayload};
use crate::registry::{LinkRecord, NotesError, NotesRegistry};
use log::{error, info};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "notes",
        &[
            "note_uuid",
            "seq",
            "author",
            "timestamp",
            "kind",
            "comment_text",
            "title",
            "mime_type",
            "data",
        ],
    ),
    (
        "annotated_items",
        &["item_uuid", "seq", "item_path", "qualifier_kind", "qualifier_value"],
    ),
    ("note_links", &["note_uuid", "item_uuid", "note_pos", "item_pos"]),
];

/// Result type used by notes repository operations.
pub type NotesRepoResult<T> = Result<T, NotesRepoError>;

/// Errors from notes snapshot persistence.
#[derive(Debug)]
pub enum NotesRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// A persisted row cannot be converted to a model value.
    InvalidData(String),
    /// Rows decode but break a registry invariant.
    Snapshot(NotesError),
}

impl Display for NotesRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "notes repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "notes repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "notes repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted notes data: {message}"),
            Self::Snapshot(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NotesRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Snapshot(err) => Some(err),
            Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for NotesRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for NotesRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<NotesError> for NotesRepoError {
    fn from(value: NotesError) -> Self {
        Self::Snapshot(value)
    }
}

/// Repository interface for registry snapshots.
pub trait NotesRepository {
    /// Replaces the stored snapshot with `registry`.
    fn save_registry(&mut self, registry: &NotesRegistry) -> NotesRepoResult<()>;
    /// Loads the stored snapshot; an empty database yields an empty registry.
    fn load_registry(&self) -> NotesRepoResult<NotesRegistry>;
}

/// SQLite-backed notes repository.
pub struct SqliteNotesRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNotesRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> NotesRepoResult<Self> {
        ensure_notes_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NotesRepository for SqliteNotesRepository<'_> {
    fn save_registry(&mut self, registry: &NotesRegistry) -> NotesRepoResult<()> {
        let started_at = Instant::now();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        match write_snapshot(&tx, registry) {
            Ok(()) => {
                tx.commit()?;
                info!(
                    "event=registry_save module=repo status=ok notes={} items={} duration_ms={}",
                    registry.nb_notes(),
                    registry.nb_annotated_items(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=registry_save module=repo status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn load_registry(&self) -> NotesRepoResult<NotesRegistry> {
        let started_at = Instant::now();
        let notes = load_notes(self.conn)?;
        let items = load_items(self.conn)?;
        let links = load_links(self.conn)?;
        let registry = NotesRegistry::from_parts(notes, items, links)?;
        info!(
            "event=registry_load module=repo status=ok notes={} items={} duration_ms={}",
            registry.nb_notes(),
            registry.nb_annotated_items(),
            started_at.elapsed().as_millis()
        );
        Ok(registry)
    }
}

fn write_snapshot(tx: &Transaction<'_>, registry: &NotesRegistry) -> NotesRepoResult<()> {
    tx.execute_batch(
        "DELETE FROM note_links;
         DELETE FROM annotated_items;
         DELETE FROM notes;",
    )?;

    for (seq, note) in registry.notes().enumerate() {
        let (kind, comment_text, title, mime_type, data) = match &note.payload {
            NotePayload::Comment { text } => ("comment", Some(text.as_str()), None, None, None),
            NotePayload::BinData {
                title,
                mime_type,
                data,
            } => (
                "bin_data",
                None,
                Some(title.as_str()),
                Some(mime_type.as_str()),
                Some(data.as_slice()),
            ),
        };
        tx.execute(
            "INSERT INTO notes (
                note_uuid,
                seq,
                author,
                timestamp,
                kind,
                comment_text,
                title,
                mime_type,
                data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                note.id.to_string(),
                seq as i64,
                note.author.as_str(),
                note.timestamp.as_str(),
                kind,
                comment_text,
                title,
                mime_type,
                data,
            ],
        )?;
    }

    for (seq, item) in registry.annotated_items().enumerate() {
        tx.execute(
            "INSERT INTO annotated_items (
                item_uuid,
                seq,
                item_path,
                qualifier_kind,
                qualifier_value
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                item.id.to_string(),
                seq as i64,
                item.reference.item.to_string(),
                item.reference.qualifier.kind_name(),
                qualifier_value_to_db(&item.reference.qualifier),
            ],
        )?;
    }

    for link in registry.link_records() {
        tx.execute(
            "INSERT INTO note_links (note_uuid, item_uuid, note_pos, item_pos)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                link.note_id.to_string(),
                link.item_id.to_string(),
                i64::from(link.note_pos),
                i64::from(link.item_pos),
            ],
        )?;
    }

    Ok(())
}

fn load_notes(conn: &Connection) -> NotesRepoResult<Vec<Note>> {
    let mut stmt = conn.prepare(
        "SELECT
            note_uuid,
            author,
            timestamp,
            kind,
            comment_text,
            title,
            mime_type,
            data
         FROM notes
         ORDER BY seq ASC, note_uuid ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

fn load_items(conn: &Connection) -> NotesRepoResult<Vec<AnnotatedItem>> {
    let mut stmt = conn.prepare(
        "SELECT
            item_uuid,
            item_path,
            qualifier_kind,
            qualifier_value
         FROM annotated_items
         ORDER BY seq ASC, item_uuid ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_item_row(row)?);
    }
    Ok(items)
}

fn load_links(conn: &Connection) -> NotesRepoResult<Vec<LinkRecord>> {
    let mut stmt = conn.prepare(
        "SELECT note_uuid, item_uuid, note_pos, item_pos
         FROM note_links
         ORDER BY item_uuid ASC, item_pos ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut links = Vec::new();
    while let Some(row) = rows.next()? {
        let note_text: String = row.get("note_uuid")?;
        let item_text: String = row.get("item_uuid")?;
        links.push(LinkRecord {
            note_id: parse_uuid(&note_text, "note_links.note_uuid")?,
            item_id: parse_uuid(&item_text, "note_links.item_uuid")?,
            note_pos: parse_position(row.get("note_pos")?, "note_links.note_pos")?,
            item_pos: parse_position(row.get("item_pos")?, "note_links.item_pos")?,
        });
    }
    Ok(links)
}

fn parse_note_row(row: &Row<'_>) -> NotesRepoResult<Note> {
    let id_text: String = row.get("note_uuid")?;
    let id = parse_uuid(&id_text, "notes.note_uuid")?;
    let kind: String = row.get("kind")?;

    let payload = match kind.as_str() {
        "comment" => {
            let text: Option<String> = row.get("comment_text")?;
            NotePayload::Comment {
                text: text.ok_or_else(|| missing_field(id, "notes.comment_text"))?,
            }
        }
        "bin_data" => {
            let title: Option<String> = row.get("title")?;
            let mime_type: Option<String> = row.get("mime_type")?;
            let data: Option<Vec<u8>> = row.get("data")?;
            NotePayload::BinData {
                title: title.ok_or_else(|| missing_field(id, "notes.title"))?,
                mime_type: mime_type.ok_or_else(|| missing_field(id, "notes.mime_type"))?,
                data: data.ok_or_else(|| missing_field(id, "notes.data"))?,
            }
        }
        other => {
            return Err(NotesRepoError::InvalidData(format!(
                "invalid note kind `{other}` in notes.kind"
            )));
        }
    };

    Ok(Note::with_id(
        id,
        row.get::<_, String>("author")?,
        row.get::<_, String>("timestamp")?,
        payload,
    ))
}

fn parse_item_row(row: &Row<'_>) -> NotesRepoResult<AnnotatedItem> {
    let id_text: String = row.get("item_uuid")?;
    let id = parse_uuid(&id_text, "annotated_items.item_uuid")?;
    let path: String = row.get("item_path")?;
    let kind: String = row.get("qualifier_kind")?;
    let value: String = row.get("qualifier_value")?;

    let item = AssemblyItemId::parse(&path);
    if item.is_null() {
        return Err(NotesRepoError::InvalidData(format!(
            "empty item path in annotated_items.item_path for {id}"
        )));
    }
    let qualifier = parse_qualifier(&kind, &value)?;
    Ok(AnnotatedItem::with_id(id, AnnotatedItemRef::new(item, qualifier)))
}

fn qualifier_value_to_db(qualifier: &ItemQualifier) -> String {
    match qualifier {
        ItemQualifier::None => String::new(),
        ItemQualifier::Attribute(guid) => guid.to_string(),
        ItemQualifier::Subshape(index) => index.to_string(),
    }
}

fn parse_qualifier(kind: &str, value: &str) -> NotesRepoResult<ItemQualifier> {
    match kind {
        "none" => Ok(ItemQualifier::None),
        "attribute" => Ok(ItemQualifier::Attribute(parse_uuid(
            value,
            "annotated_items.qualifier_value",
        )?)),
        "subshape" => value.parse::<u32>().map(ItemQualifier::Subshape).map_err(|_| {
            NotesRepoError::InvalidData(format!(
                "invalid subshape index `{value}` in annotated_items.qualifier_value"
            ))
        }),
        other => Err(NotesRepoError::InvalidData(format!(
            "invalid qualifier kind `{other}` in annotated_items.qualifier_kind"
        ))),
    }
}

fn parse_uuid(value: &str, column: &'static str) -> NotesRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| NotesRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn parse_position(value: i64, column: &'static str) -> NotesRepoResult<u32> {
    u32::try_from(value).map_err(|_| {
        NotesRepoError::InvalidData(format!("invalid position `{value}` in {column}"))
    })
}

fn missing_field(id: Uuid, column: &'static str) -> NotesRepoError {
    NotesRepoError::InvalidData(format!("missing {column} for note {id}"))
}

fn ensure_notes_connection_ready(conn: &Connection) -> NotesRepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(NotesRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(NotesRepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(NotesRepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> NotesRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> NotesRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
