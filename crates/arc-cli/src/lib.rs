//! Command surface for the `arc` binary.
//!
//! Hosts that want the same behavior in-process can parse a [`Cli`] and hand
//! it to [`run_cli`]. Every command loads the full store, applies one core
//! operation and writes back only when that operation succeeded.

#![allow(clippy::missing_errors_doc)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use arc_core::{
    activity_log, now_utc, ArcError, ArchiveSelection, Brief, Completion, ItemEdit, ItemId,
    ItemSet, Kind, ListFilter, NewItem, NewKind, ParentChange, Prefix, Stamp, StepReport,
    StepSource, DEFAULT_LOG_LIMIT, DEFAULT_PREFIX,
};
use arc_store_jsonl::{JsonlItemStore, LoadReport};
use clap::{Args, Parser, Subcommand};

pub mod config;
mod render;

use config::{RuntimeConfig, DEFAULT_LOG_LEVEL, DEFAULT_STORE_DIR};

#[derive(Debug, Parser)]
#[command(name = "arc")]
#[command(about = "Outcome and action tracker backed by a line-per-record file")]
pub struct Cli {
    /// Store directory.
    #[arg(long, global = true, env = "ARC_DIR", default_value = DEFAULT_STORE_DIR)]
    dir: PathBuf,

    /// Identity recorded as `created_by`.
    #[arg(long, global = true, env = "ARC_USER")]
    user: Option<String>,

    /// Session token that scopes tactical steps. Defaults to the working
    /// directory.
    #[arg(long, global = true, env = "ARC_SESSION")]
    session: Option<String>,

    /// Log filter used when `ARC_LOG` is unset.
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    #[must_use]
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the store directory.
    Init(InitArgs),
    /// Create an outcome, or an action with --outcome / --standalone.
    New(NewArgs),
    List(ListArgs),
    Show(ShowArgs),
    /// Mark an item done and unblock its waiters.
    Done(QuietIdArgs),
    Wait(WaitArgs),
    Unwait(QuietIdArgs),
    Edit(EditArgs),
    /// Start, inspect or clear the tactical checklist of an action.
    Work(WorkArgs),
    /// Finish the current tactical step.
    Step,
    /// Turn an outcome into an action or back.
    Convert(ConvertArgs),
    /// Move done items to the archive file.
    Archive(ArchiveArgs),
    Reopen(IdArgs),
    Log(LogArgs),
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,
}

#[derive(Debug, Args)]
pub struct NewArgs {
    title: String,
    #[arg(long)]
    why: String,
    #[arg(long)]
    what: String,
    #[arg(long)]
    done: String,
    /// Parent outcome; creates an action.
    #[arg(long, conflicts_with = "standalone")]
    outcome: Option<String>,
    /// Create an action without a parent outcome.
    #[arg(long)]
    standalone: bool,
    /// Print only the new id.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, conflicts_with_all = ["waiting", "all"])]
    ready: bool,
    #[arg(long, conflicts_with = "all")]
    waiting: bool,
    #[arg(long)]
    all: bool,
    #[arg(long, conflicts_with = "jsonl")]
    json: bool,
    #[arg(long)]
    jsonl: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(required_unless_present = "current")]
    id: Option<String>,
    /// Show this session's active checklist instead.
    #[arg(long, conflicts_with = "id")]
    current: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    id: String,
}

#[derive(Debug, Args)]
pub struct QuietIdArgs {
    id: String,
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Args)]
pub struct WaitArgs {
    id: String,
    /// Another item's id, or free text.
    reason: String,
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    why: Option<String>,
    #[arg(long)]
    what: Option<String>,
    #[arg(long)]
    done: Option<String>,
    /// New parent outcome, or `none` to make the action standalone.
    #[arg(long)]
    outcome: Option<String>,
    #[arg(long)]
    order: Option<u32>,
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Args)]
pub struct WorkArgs {
    #[arg(required_unless_present_any = ["status", "clear"])]
    id: Option<String>,
    /// Explicit steps; parsed from the brief's `what` when omitted.
    steps: Vec<String>,
    /// Restart a checklist that already has progress.
    #[arg(long)]
    force: bool,
    #[arg(long, conflicts_with_all = ["id", "clear", "force"])]
    status: bool,
    #[arg(long, conflicts_with_all = ["id", "force"])]
    clear: bool,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    id: String,
    /// Parent outcome when converting an outcome into an action.
    #[arg(long)]
    outcome: Option<String>,
    /// Detach the outcome's children to standalone.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    #[arg(required_unless_present = "all")]
    ids: Vec<String>,
    /// Archive every done item that can be archived.
    #[arg(long, conflicts_with = "ids")]
    all: bool,
}

#[derive(Debug, Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_LIMIT)]
    limit: usize,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long)]
    json: bool,
}

/// Executes the parsed command against the store named by `--dir`.
///
/// # Errors
/// Returns an error when the store is missing or unreadable, when the core
/// operation rejects the request, or when writing back fails. Nothing is
/// written in the failure cases.
pub fn run_cli(cli: Cli) -> Result<()> {
    let Cli {
        dir,
        user,
        session,
        command,
        ..
    } = cli;
    if let Command::Init(args) = &command {
        return run_init(&dir, args);
    }
    let config = RuntimeConfig::resolve(dir, user, session)?;
    let store = JsonlItemStore::open(&config.dir)?;
    run_command(command, &store, &config)
}

fn run_command(command: Command, store: &JsonlItemStore, config: &RuntimeConfig) -> Result<()> {
    let LoadReport {
        items: mut items,
        skipped,
    } = store.load()?;
    match command {
        Command::Init(_) => bail!("internal dispatch error: init is handled before store open"),
        Command::New(args) => run_new(args, store, &mut items, config),
        Command::List(args) => run_list(&args, &items),
        Command::Show(args) => run_show(&args, &items, config),
        Command::Done(args) => run_done(&args, store, &mut items),
        Command::Wait(args) => {
            let record = items.wait(&args.id, &args.reason)?;
            store.save(&items)?;
            if !args.quiet {
                println!("{} now waiting for: {}", record.id, record.waiting_for);
            }
            Ok(())
        }
        Command::Unwait(args) => {
            let id = items.unwait(&args.id)?;
            store.save(&items)?;
            if !args.quiet {
                println!("{id} no longer waiting");
            }
            Ok(())
        }
        Command::Edit(args) => run_edit(args, store, &mut items),
        Command::Work(args) => run_work(args, store, &mut items, config),
        Command::Step => run_step(store, &mut items, config),
        Command::Convert(args) => {
            let conversion = items.convert(&args.id, args.outcome.as_deref(), args.force)?;
            store.save(&items)?;
            println!("Converted {} to {}", conversion.id, conversion.to);
            if !conversion.orphaned.is_empty() {
                println!("Moved to standalone: {}", join_ids(&conversion.orphaned));
            }
            Ok(())
        }
        Command::Archive(args) => run_archive(args, store, &mut items),
        Command::Reopen(args) => run_reopen(&args, store, &mut items),
        Command::Log(args) => {
            let archived = store.load_archive()?;
            let events = activity_log(&items, &archived, args.limit);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                println!("{}", render::format_log(&events));
            }
            Ok(())
        }
        Command::Status(args) => {
            let summary = items.status_summary();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", render::format_status(&summary, items.prefix(), skipped.len()));
            }
            Ok(())
        }
    }
}

fn run_init(dir: &Path, args: &InitArgs) -> Result<()> {
    let prefix = Prefix::parse(&args.prefix)?;
    let store = JsonlItemStore::init(dir, &prefix)?;
    println!(
        "Initialized arc in {} (prefix: {prefix})",
        store.root().display()
    );
    Ok(())
}

fn run_new(
    args: NewArgs,
    store: &JsonlItemStore,
    items: &mut ItemSet,
    config: &RuntimeConfig,
) -> Result<()> {
    let kind = match (args.outcome, args.standalone) {
        (Some(parent), _) => NewKind::Action {
            parent: Some(parent),
        },
        (None, true) => NewKind::Action { parent: None },
        (None, false) => NewKind::Outcome,
    };
    let new = NewItem {
        title: args.title,
        brief: Brief {
            why: args.why,
            what: args.what,
            done: args.done,
        },
        kind,
    };
    let stamp = Stamp {
        actor: config.actor.clone(),
        at: now_utc(),
    };
    let reserved = store.archived_ids()?;
    let id = items.create(new, &stamp, &reserved, &mut rand::thread_rng())?;
    store.save(items)?;
    if args.quiet {
        println!("{id}");
    } else {
        println!("Created: {id}");
    }
    Ok(())
}

fn run_list(args: &ListArgs, items: &ItemSet) -> Result<()> {
    let filter = if args.ready {
        ListFilter::Ready
    } else if args.waiting {
        ListFilter::Waiting
    } else if args.all {
        ListFilter::All
    } else {
        ListFilter::Default
    };
    let view = items.list_view(filter);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&render::list_json(&view)?)?);
    } else if args.jsonl {
        let lines = render::jsonl_lines(&view.flatten())?;
        if !lines.is_empty() {
            println!("{lines}");
        }
    } else {
        println!("{}", render::format_hierarchy(&view, filter));
    }
    Ok(())
}

fn run_show(args: &ShowArgs, items: &ItemSet, config: &RuntimeConfig) -> Result<()> {
    if args.current {
        let Some(status) = items.work_status(&config.session) else {
            return Ok(());
        };
        if args.json {
            let item = items.require(status.id.as_str())?;
            println!("{}", serde_json::to_string_pretty(&item.to_json_value()?)?);
        } else {
            println!("{}", render::format_current(&status));
        }
        return Ok(());
    }

    let Some(raw_id) = args.id.as_deref() else {
        bail!("Provide an id or --current");
    };
    let item = items.require(raw_id)?;
    let actions = if item.kind() == Kind::Outcome {
        items.children_of(&item.id)
    } else {
        Vec::new()
    };
    if args.json {
        let with_actions = (item.kind() == Kind::Outcome).then_some(actions.as_slice());
        let value = render::item_json(item, with_actions)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", render::format_item(item, &actions));
    }
    Ok(())
}

fn run_done(args: &QuietIdArgs, store: &JsonlItemStore, items: &mut ItemSet) -> Result<()> {
    match items.complete(&args.id, now_utc())? {
        Completion::Completed { id, unblocked } => {
            store.save(items)?;
            if !args.quiet {
                println!("Done: {id}");
                if !unblocked.is_empty() {
                    println!("Unblocked: {}", join_ids(&unblocked));
                }
            }
        }
        Completion::AlreadyDone { id } => {
            if !args.quiet {
                println!("Already done: {id}");
            }
        }
    }
    Ok(())
}

fn run_edit(args: EditArgs, store: &JsonlItemStore, items: &mut ItemSet) -> Result<()> {
    let parent = args.outcome.map(|raw| {
        if raw.trim().eq_ignore_ascii_case("none") {
            ParentChange::Detach
        } else {
            ParentChange::Attach(raw)
        }
    });
    let edit = ItemEdit {
        title: args.title,
        why: args.why,
        what: args.what,
        done: args.done,
        parent,
        order: args.order,
    };
    let id = items.edit(&args.id, edit)?;
    store.save(items)?;
    if !args.quiet {
        println!("Updated: {id}");
    }
    Ok(())
}

fn run_work(
    args: WorkArgs,
    store: &JsonlItemStore,
    items: &mut ItemSet,
    config: &RuntimeConfig,
) -> Result<()> {
    if args.status {
        match items.work_status(&config.session) {
            Some(status) => println!("{}", render::format_current(&status)),
            None => println!("No active tactical steps in this session."),
        }
        return Ok(());
    }
    if args.clear {
        if let Some(id) = items.clear_work(&config.session) {
            store.save(items)?;
            println!("Cleared tactical steps from {id}");
        }
        return Ok(());
    }

    let Some(raw_id) = args.id else {
        bail!("Provide an action id, --status or --clear");
    };
    let source = if args.steps.is_empty() {
        StepSource::FromBrief
    } else {
        StepSource::Explicit(args.steps)
    };
    items.start_work(&raw_id, source, &config.session, args.force)?;
    store.save(items)?;
    if let Some(status) = items.work_status(&config.session) {
        println!("{}", render::format_current(&status));
    }
    Ok(())
}

fn run_step(store: &JsonlItemStore, items: &mut ItemSet, config: &RuntimeConfig) -> Result<()> {
    let report = items.advance_step(&config.session, now_utc())?;
    store.save(items)?;
    match report {
        StepReport::Advanced {
            id,
            finished,
            next,
            current,
            total,
        } => {
            println!("✓ {current}/{total} {finished} ({id})");
            println!("→ {}. {next}", current + 1);
        }
        StepReport::Completed {
            id,
            finished,
            total,
            unblocked,
        } => {
            println!("✓ {total}/{total} {finished} ({id})");
            println!("Done: {id}");
            if !unblocked.is_empty() {
                println!("Unblocked: {}", join_ids(&unblocked));
            }
        }
    }
    Ok(())
}

fn run_archive(args: ArchiveArgs, store: &JsonlItemStore, items: &mut ItemSet) -> Result<()> {
    let selection = if args.all {
        ArchiveSelection::AllDone
    } else {
        ArchiveSelection::Ids(args.ids)
    };
    let taken = items.take_for_archive(&selection, now_utc())?;
    if taken.is_empty() {
        println!("Nothing to archive.");
        return Ok(());
    }
    store.append_archive(&taken)?;
    store.save(items)?;
    println!("Archived {} item(s)", taken.len());
    Ok(())
}

fn run_reopen(args: &IdArgs, store: &JsonlItemStore, items: &mut ItemSet) -> Result<()> {
    if items.find(&args.id).is_some() {
        let id = items.reopen(&args.id)?;
        store.save(items)?;
        println!("Reopened: {id}");
        return Ok(());
    }
    let Some(archived) = store.find_archived(&args.id, items.prefix())? else {
        return Err(ArcError::NotFound(args.id.trim().to_string()).into());
    };
    let id = items.restore_from_archive(archived);
    store.save(items)?;
    store.remove_from_archive(id.as_str(), items.prefix())?;
    println!("Reopened: {id} (restored from archive)");
    Ok(())
}

fn join_ids(ids: &[ItemId]) -> String {
    ids.iter()
        .map(ItemId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
