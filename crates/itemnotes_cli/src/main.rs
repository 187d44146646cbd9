//! Command-line front end for an itemnotes database.
//!
//! # Responsibility
//! - Map subcommands onto `NotesService` / `NotesRegistry` operations.
//! - Persist the registry after every mutating command.

use clap::{Args, Parser, Subcommand};
use itemnotes_core::db::open_db;
use itemnotes_core::{
    default_log_level, init_logging, AssemblyItemId, ItemQualifier, NoteId, NotesRegistry,
    NotesService, SqliteNotesRepository,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "itemnotes")]
#[command(about = "Attach comments and binary notes to assembly items", version)]
struct Cli {
    /// Notes database file
    #[arg(long, env = "ITEMNOTES_DB", default_value = "itemnotes.sqlite3")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error); requires --log-dir
    #[arg(long, env = "ITEMNOTES_LOG_LEVEL", requires = "log_dir")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, env = "ITEMNOTES_LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print note and annotated item counts
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a comment and attach it to an item
    Comment {
        #[arg(long)]
        author: String,

        #[arg(long)]
        timestamp: String,

        #[arg(long)]
        text: String,

        #[command(flatten)]
        target: Target,
    },

    /// List notes attached to an item
    Notes {
        #[command(flatten)]
        target: Target,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detach a note from an item
    Unlink {
        #[arg(long)]
        note: Uuid,

        #[command(flatten)]
        target: Target,

        /// Delete the note if it is no longer attached anywhere
        #[arg(long)]
        delete_orphan: bool,
    },

    /// Delete a note and detach it everywhere
    Delete {
        #[arg(long)]
        note: Uuid,
    },

    /// List notes attached to nothing
    Orphans {
        /// Delete them instead of listing
        #[arg(long)]
        purge: bool,
    },
}

/// Item reference given on the command line.
#[derive(Args)]
struct Target {
    /// Assembly item path, e.g. 0:1:1:1/0:1:1:2
    #[arg(long)]
    item: String,

    /// Attribute GUID qualifier
    #[arg(long, conflicts_with = "subshape")]
    attr: Option<Uuid>,

    /// Sub-shape index qualifier
    #[arg(long)]
    subshape: Option<u32>,
}

impl Target {
    fn resolve(&self) -> Result<(AssemblyItemId, ItemQualifier), String> {
        let item = AssemblyItemId::parse(&self.item);
        if item.is_null() {
            return Err("item path cannot be empty".to_string());
        }
        let qualifier = match (self.attr, self.subshape) {
            (Some(guid), _) => ItemQualifier::Attribute(guid),
            (None, Some(index)) => ItemQualifier::Subshape(index),
            (None, None) => ItemQualifier::None,
        };
        Ok((item, qualifier))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let mut conn = open_db(&cli.db)?;
    let repo = SqliteNotesRepository::try_new(&mut conn)?;
    let mut service = NotesService::open(repo)?;

    let mutated = match cli.command {
        Commands::Summary { json } => {
            let summary = service.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", service.registry());
                println!("Orphan notes    : {}", summary.orphan_notes);
            }
            false
        }
        Commands::Comment {
            author,
            timestamp,
            text,
            target,
        } => {
            let (item, qualifier) = target.resolve()?;
            let registry = service.registry_mut();
            let note_id = registry.create_comment(author, timestamp, text).id;
            let annotated = registry
                .add_note_with(note_id, &item, qualifier)
                .ok_or("failed to attach the new note")?;
            println!("{note_id} -> {}", annotated.reference);
            true
        }
        Commands::Notes { target, json } => {
            let (item, qualifier) = target.resolve()?;
            let ids = service.registry().get_notes_with(&item, &qualifier);
            print_notes(service.registry(), &ids, json)?;
            false
        }
        Commands::Unlink {
            note,
            target,
            delete_orphan,
        } => {
            let (item, qualifier) = target.resolve()?;
            if !service
                .registry_mut()
                .remove_note_with(note, &item, &qualifier, delete_orphan)
            {
                return Err(format!("note {note} is not attached to {}", target.item).into());
            }
            true
        }
        Commands::Delete { note } => {
            if !service.registry_mut().delete_note(note) {
                return Err(format!("note {note} does not exist").into());
            }
            true
        }
        Commands::Orphans { purge } => {
            if purge {
                let deleted = service.registry_mut().delete_orphan_notes();
                println!("deleted {deleted} orphan note(s)");
                deleted > 0
            } else {
                let orphans = service.registry().get_orphan_notes();
                print_notes(service.registry(), &orphans, false)?;
                false
            }
        }
    };

    if mutated {
        service.save()?;
        info!("event=cli_command module=cli status=ok mutated=true");
    }
    Ok(())
}

fn print_notes(
    registry: &NotesRegistry,
    ids: &[NoteId],
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let notes: Vec<_> = ids.iter().filter_map(|id| registry.note(*id)).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }
    for note in notes {
        println!(
            "{}  {:?}  {}  {}  {}",
            note.id,
            note.kind(),
            note.author,
            note.timestamp,
            note.headline()
        );
    }
    Ok(())
}
