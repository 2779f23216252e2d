//! Replay command - runs a scripted editing session against an in-memory backend.
//!
//! A script is a JSON array of steps, each tagged with `op`:
//!
//! ```json
//! [
//!   { "op": "set", "path": "title", "value": "Hello" },
//!   { "op": "create_related", "path": "author", "collection": "users" },
//!   { "op": "set", "level": 1, "path": "name", "value": "Ada" },
//!   { "op": "save", "level": 1 }
//! ]
//! ```
//!
//! `level` defaults to the root form.

use std::sync::Arc;

use formstack::{
    DrawerStack, EngineConfig,
    drawer::SaveOutcome,
    persistence::InMemoryPersistence,
    schema::SchemaSet,
};
use serde::Deserialize;
use tracing::info;

use crate::cli::ReplayArgs;
use crate::output::{OutputFormat, print_json};

type BoxError = Box<dyn std::error::Error>;

/// One scripted user action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Set {
        #[serde(default)]
        level: usize,
        path: String,
        value: serde_json::Value,
    },
    AddRow {
        #[serde(default)]
        level: usize,
        path: String,
        index: Option<usize>,
        block_type: Option<String>,
    },
    RemoveRow {
        #[serde(default)]
        level: usize,
        path: String,
        index: usize,
    },
    MoveRow {
        #[serde(default)]
        level: usize,
        path: String,
        from: usize,
        to: usize,
    },
    SetTab {
        #[serde(default)]
        level: usize,
        path: String,
        tab: String,
    },
    CreateRelated {
        #[serde(default)]
        level: usize,
        path: String,
        collection: String,
    },
    Save {
        #[serde(default)]
        level: usize,
    },
    Cancel {
        level: usize,
    },
    Discard {
        level: usize,
    },
}

/// The state of a session after its script ran.
#[derive(Debug)]
pub struct Replay {
    pub log: Vec<String>,
    pub document: serde_json::Value,
    pub depth: usize,
}

/// Run the replay command
pub async fn run(args: &ReplayArgs, config: EngineConfig, format: OutputFormat) -> Result<(), BoxError> {
    let schemas = Arc::new(SchemaSet::from_path(&args.schema)?);
    let steps: Vec<Step> = serde_json::from_str(&std::fs::read_to_string(&args.script)?)?;
    let collection = match &args.collection {
        Some(collection) => collection.clone(),
        None => schemas
            .slugs()
            .next()
            .ok_or("schema file declares no collections")?
            .to_string(),
    };

    let replay = replay(schemas, &collection, config, &steps).await?;

    match format {
        OutputFormat::Human => {
            for (n, line) in replay.log.iter().enumerate() {
                println!("{:>3}  {line}", n + 1);
            }
            if replay.depth > 0 {
                println!("({} drawer(s) still open)", replay.depth);
            }
            println!("{}", serde_json::to_string_pretty(&replay.document)?);
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "steps": replay.log,
            "depth": replay.depth,
            "document": replay.document,
        }))?,
    }
    Ok(())
}

/// Runs `steps` on a fresh stack whose root form authors a `collection` document.
pub async fn replay(
    schemas: Arc<SchemaSet>,
    collection: &str,
    config: EngineConfig,
    steps: &[Step],
) -> Result<Replay, BoxError> {
    let persistence = InMemoryPersistence::new(Arc::clone(&schemas));
    let mut stack = DrawerStack::new(schemas, collection, config)?;

    let mut log = Vec::with_capacity(steps.len());
    for (n, step) in steps.iter().enumerate() {
        let line = apply(&mut stack, &persistence, step)
            .await
            .map_err(|err| format!("step {}: {err}", n + 1))?;
        info!(step = n + 1, depth = stack.depth(), "{line}");
        log.push(line);
    }

    Ok(Replay {
        log,
        document: stack.root().form().map(|form| form.tree().to_json()).unwrap_or_default(),
        depth: stack.depth(),
    })
}

async fn apply(stack: &mut DrawerStack, persistence: &InMemoryPersistence, step: &Step) -> Result<String, BoxError> {
    Ok(match step {
        Step::Set { level, path, value } => {
            stack.form_mut(*level)?.set_json(path, value)?;
            format!("set {path} at level {level}")
        }
        Step::AddRow {
            level,
            path,
            index,
            block_type,
        } => {
            let row = stack
                .form_mut(*level)?
                .add_row(path, index.unwrap_or(usize::MAX), block_type.as_deref())?;
            format!("added row {} to {path}", row.id())
        }
        Step::RemoveRow { level, path, index } => {
            let form = stack.form_mut(*level)?;
            let id = form
                .tree()
                .rows(path)
                .and_then(|rows| rows.get(*index))
                .map(|row| row.id().clone())
                .ok_or_else(|| format!("no row {index} in {path}"))?;
            form.remove_row(path, &id)?;
            format!("removed row {id} from {path}")
        }
        Step::MoveRow {
            level,
            path,
            from,
            to,
        } => {
            stack.form_mut(*level)?.move_row(path, *from, *to)?;
            format!("moved {path}.{from} to {to}")
        }
        Step::SetTab { level, path, tab } => {
            stack.form_mut(*level)?.set_active_tab(path, tab)?;
            format!("selected tab {tab} of {path}")
        }
        Step::CreateRelated {
            level,
            path,
            collection,
        } => {
            let id = stack
                .relationships()
                .add_inline_created(*level, path, collection)?;
            format!("opened {id}")
        }
        Step::Save { level } => match stack.save(*level, persistence).await? {
            SaveOutcome::Saved(document) => format!("saved {} {}", document.collection, document.id),
            SaveOutcome::Committed(document) => {
                format!("saved {} {} and committed it", document.collection, document.id)
            }
            SaveOutcome::Dropped => "save dropped".to_string(),
        },
        Step::Cancel { level } => {
            stack.cancel(*level)?;
            format!("cancelled drawer {level}")
        }
        Step::Discard { level } => {
            let closed = stack.discard(*level)?;
            format!("discarded {closed} drawer(s) from level {level}")
        }
    })
}
