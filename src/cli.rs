// ============================================================================
// Pixel Quilt CLI: operator maintenance on the shared store
// ============================================================================
//
// Usage examples:
//   pixel-quilt snapshot create --label "before the party"
//   pixel-quilt snapshot list
//   pixel-quilt --store-file rehearsal.json migrate expand --to 48
//   pixel-quilt migrate rollback --to 30
//   pixel-quilt export --output quilt.png --scale 12
//
// Running without a subcommand opens the GUI.  Destructive commands always
// ask for a typed confirmation keyword; there is no --yes.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use crate::color::Color;
use crate::config::Settings;
use crate::error::{QuiltError, Result};
use crate::grid::{Quilt, QuiltLayout};
use crate::maintenance::{self, Outcome, Prompt, StdinPrompt};
use crate::ops::export::{MAX_EXPORT_SCALE, export_png};
use crate::snapshot::{self, format_bytes};
use crate::store::{QuiltStore, SQUARES_PATH};

const RULE_WIDTH: usize = 60;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Collaborative pixel quilt.
#[derive(Parser, Debug)]
#[command(
    name = "pixel-quilt",
    version,
    about = "Collaborative pixel quilt: GUI and store maintenance",
    long_about = "Without a subcommand, opens the quilt editor.\n\n\
                  Subcommands operate on the shared store selected by\n\
                  --database-url / --store-file, the QUILT_DATABASE_URL\n\
                  environment variable or the settings file, in that order."
)]
pub struct CliArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Realtime database root URL (https://<project>.firebaseio.com).
    #[arg(long, global = true, value_name = "URL", conflicts_with = "store_file")]
    pub database_url: Option<String>,

    /// Database auth token, sent as ?auth=.
    #[arg(long, global = true, value_name = "TOKEN")]
    pub auth_token: Option<String>,

    /// Use a local JSON document as the store.
    #[arg(long, global = true, value_name = "PATH")]
    pub store_file: Option<PathBuf>,

    /// Quilt layout: classic (30 × 15²), grid36 (36 × 16²) or grid48 (48 × 15²).
    #[arg(long, global = true, value_name = "LAYOUT", value_parser = parse_layout)]
    pub layout: Option<QuiltLayout>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Overwrite the stored quilt with blank squares.
    Reset {
        /// Number of squares (defaults to the layout's count).
        #[arg(long)]
        squares: Option<usize>,
    },
    /// Create, list or restore manual snapshots.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Grow or shrink the stored square list.
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Render the stored quilt to a PNG file.
    Export {
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Output pixels per quilt pixel.
        #[arg(
            long,
            default_value_t = 8,
            value_parser = clap::value_parser!(u32).range(1..=MAX_EXPORT_SCALE as i64)
        )]
        scale: u32,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SnapshotAction {
    Create {
        /// Label; prompted for when omitted.
        #[arg(long)]
        label: Option<String>,
    },
    List,
    Restore,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MigrateAction {
    /// Append blank squares up to the target count.
    Expand {
        #[arg(long, default_value_t = 48)]
        to: usize,
    },
    /// Drop squares past the target count.
    Rollback {
        #[arg(long, default_value_t = 30)]
        to: usize,
    },
}

fn parse_layout(s: &str) -> std::result::Result<QuiltLayout, String> {
    QuiltLayout::preset(s).ok_or_else(|| format!("unknown layout '{}' (classic, grid36, grid48)", s))
}

impl StoreArgs {
    /// Flags override the environment, which overrides the settings file.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.database_url {
            settings.database_url = url.clone();
            settings.store_file = None;
        }
        if let Some(token) = &self.auth_token {
            settings.auth_token = token.clone();
        }
        if let Some(path) = &self.store_file {
            settings.store_file = Some(path.clone());
        }
        if let Some(layout) = self.layout {
            settings.layout = layout;
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one maintenance command and return an OS exit code.
/// `0` = completed or cancelled by the operator, `1` = error.
pub fn run(store_args: &StoreArgs, command: Command) -> ExitCode {
    let mut settings = Settings::load();
    store_args.apply(&mut settings);

    let result = settings.open_store().and_then(|store| {
        let mut prompt = StdinPrompt;
        let mut out = io::stdout();
        execute(
            store.as_ref(),
            settings.layout,
            command,
            &mut prompt,
            &mut out,
        )
    });

    match result {
        Ok(outcome) => {
            crate::log_info!("Command finished: {:?}", outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            crate::log_err!("Command failed: {}", e);
            eprintln!("error: {}", e);
            if let Some(path) = crate::logger::log_path() {
                eprintln!("log: {}", path.display());
            }
            ExitCode::FAILURE
        }
    }
}

/// Dispatch `command` against `store`.
pub fn execute(
    store: &dyn QuiltStore,
    layout: QuiltLayout,
    command: Command,
    prompt: &mut dyn Prompt,
    out: &mut dyn Write,
) -> Result<Outcome> {
    match command {
        Command::Reset { squares } => run_reset(store, layout, squares, out),
        Command::Snapshot { action } => match action {
            SnapshotAction::Create { label } => run_snapshot_create(store, label, prompt, out),
            SnapshotAction::List => run_snapshot_list(store, out),
            SnapshotAction::Restore => run_snapshot_restore(store, prompt, out),
        },
        Command::Migrate { action } => match action {
            MigrateAction::Expand { to } => run_expand(store, layout, to, prompt, out),
            MigrateAction::Rollback { to } => run_rollback(store, to, prompt, out),
        },
        Command::Export { output, scale } => run_export(store, layout, &output, scale, out),
    }
}

fn rule(out: &mut dyn Write, ch: char) -> Result<()> {
    writeln!(out, "{}", ch.to_string().repeat(RULE_WIDTH))?;
    Ok(())
}

fn cancelled(out: &mut dyn Write) -> Result<Outcome> {
    writeln!(out, "Cancelled.")?;
    Ok(Outcome::Cancelled)
}

// ============================================================================
// reset
// ============================================================================

pub fn run_reset(
    store: &dyn QuiltStore,
    layout: QuiltLayout,
    squares: Option<usize>,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let layout = match squares {
        Some(count) => QuiltLayout::builder()
            .squares(count)
            .columns(layout.columns)
            .grid_size(layout.grid_size)
            .build()?,
        None => layout,
    };
    writeln!(out, "Resetting {} ...", store.describe())?;
    maintenance::reset(store, layout)?;
    writeln!(
        out,
        "Reset {} squares ({}×{}, all {}).",
        layout.squares,
        layout.grid_size,
        layout.grid_size,
        Color::BACKGROUND
    )?;
    Ok(Outcome::Completed)
}

// ============================================================================
// snapshot create / list / restore
// ============================================================================

pub fn run_snapshot_create(
    store: &dyn QuiltStore,
    label: Option<String>,
    prompt: &mut dyn Prompt,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let label = match label {
        Some(l) => l,
        None => prompt.ask("Enter snapshot label (or press Enter for default): ")?,
    };

    writeln!(out, "Creating snapshot ...")?;
    let info = snapshot::create_snapshot(store, Some(&label))?;

    writeln!(out, "Snapshot created.")?;
    writeln!(out)?;
    writeln!(out, "  Timestamp: {}", info.timestamp)?;
    writeln!(out, "  Date:      {}", info.date_string())?;
    writeln!(out, "  Hash:      {}", info.hash)?;
    writeln!(out, "  Size:      {}", format_bytes(info.size))?;
    writeln!(out, "  Squares:   {}", info.square_count)?;
    writeln!(out, "  Label:     {}", info.label)?;
    writeln!(out, "  Path:      {}", info.path())?;
    Ok(Outcome::Completed)
}

fn print_snapshot_list(list: &[snapshot::SnapshotInfo], out: &mut dyn Write) -> Result<()> {
    for (i, info) in list.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{}. {}", i + 1, info.label)?;
        writeln!(out, "   Date:      {}", info.date_string())?;
        writeln!(out, "   Timestamp: {}", info.timestamp)?;
        writeln!(out, "   Squares:   {}", info.square_count)?;
        writeln!(out, "   Size:      {}", format_bytes(info.size))?;
        writeln!(out, "   Hash:      {}", info.hash)?;
    }
    Ok(())
}

pub fn run_snapshot_list(store: &dyn QuiltStore, out: &mut dyn Write) -> Result<Outcome> {
    let list = snapshot::list_snapshots(store)?;
    if list.is_empty() {
        writeln!(out, "No snapshots found. Create one with: pixel-quilt snapshot create")?;
        return Ok(Outcome::NothingToDo);
    }
    writeln!(out, "{} snapshot(s):", list.len())?;
    print_snapshot_list(&list, out)?;
    Ok(Outcome::Completed)
}

pub fn run_snapshot_restore(
    store: &dyn QuiltStore,
    prompt: &mut dyn Prompt,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let list = snapshot::list_snapshots(store)?;
    if list.is_empty() {
        writeln!(out, "No snapshots found. Create one with: pixel-quilt snapshot create")?;
        return Ok(Outcome::NothingToDo);
    }

    writeln!(out, "Available snapshots:")?;
    print_snapshot_list(&list, out)?;
    writeln!(out)?;
    rule(out, '-')?;

    let answer = prompt.ask("Enter number to restore (or \"cancel\" to exit): ")?;
    let answer = answer.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("cancel") {
        return cancelled(out);
    }
    let selected = answer
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=list.len()).contains(n))
        .map(|n| &list[n - 1])
        .ok_or_else(|| QuiltError::invalid(format!("invalid selection '{}'", answer)))?;

    writeln!(out)?;
    writeln!(out, "WARNING: this will OVERWRITE the current squares data.")?;
    writeln!(out, "  Restoring: {}", selected.label)?;
    writeln!(out, "  Squares:   {}", selected.square_count)?;
    writeln!(out, "  From:      {}", selected.date_string())?;

    if prompt.ask("Type \"RESTORE\" to confirm: ")? != "RESTORE" {
        return cancelled(out);
    }

    let restored = snapshot::restore_snapshot(store, selected.timestamp)?;
    writeln!(out, "Snapshot restored.")?;
    writeln!(out, "  Squares restored: {}", restored.square_count)?;
    writeln!(out, "  Data hash:        {}", restored.hash)?;
    Ok(Outcome::Completed)
}

// ============================================================================
// migrate expand / rollback
// ============================================================================

pub fn run_expand(
    store: &dyn QuiltStore,
    layout: QuiltLayout,
    target: usize,
    prompt: &mut dyn Prompt,
    out: &mut dyn Write,
) -> Result<Outcome> {
    writeln!(out, "Reading current data from {} ...", store.describe())?;
    let current = maintenance::read_squares(store)?;
    writeln!(out, "Found {} squares.", current.len())?;

    let plan = maintenance::plan_expand(&current, target, layout.grid_size, Color::BACKGROUND)?;
    writeln!(out, "Data structure is valid.")?;

    if plan.current_count >= target {
        writeln!(out, "Grid already has {} squares (>= {}).", plan.current_count, target)?;
        if !prompt.ask("Do you want to continue anyway? (yes/no): ")?.eq_ignore_ascii_case("yes") {
            return cancelled(out);
        }
    }
    if plan.to_add == 0 {
        writeln!(out, "No squares to add.")?;
        return Ok(Outcome::NothingToDo);
    }

    writeln!(out)?;
    writeln!(out, "Migration plan:")?;
    rule(out, '-')?;
    writeln!(out, "  Current squares:       {}", plan.current_count)?;
    writeln!(out, "  New squares to add:    {}", plan.to_add)?;
    writeln!(out, "  Total after migration: {}", plan.expanded.len())?;
    writeln!(
        out,
        "  Squares 0-{}: preserved, {}-{}: new blank squares",
        plan.current_count.saturating_sub(1),
        plan.current_count,
        target - 1
    )?;
    writeln!(out, "  Current data hash:     {}", plan.current_hash)?;
    writeln!(out, "  Preserved data hash:   {}", plan.preserved_hash)?;
    writeln!(out, "  Hashes match:          {}", if plan.hashes_match() { "yes" } else { "NO" })?;
    writeln!(out, "  Size now:              {}", format_bytes(plan.current_size))?;
    writeln!(out, "  Size after:            {}", format_bytes(plan.expanded_size))?;
    rule(out, '-')?;

    if !plan.hashes_match() {
        return Err(QuiltError::Integrity {
            expected: format!("hash {}", plan.current_hash),
            actual: format!("hash {}", plan.preserved_hash),
        });
    }

    writeln!(out)?;
    writeln!(out, "WARNING: this modifies the shared quilt.")?;
    writeln!(out, "Create a snapshot first: pixel-quilt snapshot create")?;
    if prompt.ask("Type \"MIGRATE\" to confirm and proceed: ")? != "MIGRATE" {
        return cancelled(out);
    }

    let report = maintenance::apply_expand(store, &plan, Color::BACKGROUND)?;
    writeln!(out, "Verified {} squares.", report.verified_count)?;
    writeln!(out, "Preserved data hash: {} (matches original)", report.verified_hash)?;
    if report.non_blank.is_empty() {
        writeln!(out, "All {} new squares are blank.", plan.to_add)?;
    } else {
        for i in &report.non_blank {
            writeln!(out, "  Square {} is not blank", i)?;
        }
    }
    writeln!(out, "Migration completed: {} squares.", report.verified_count)?;
    Ok(Outcome::Completed)
}

pub fn run_rollback(
    store: &dyn QuiltStore,
    target: usize,
    prompt: &mut dyn Prompt,
    out: &mut dyn Write,
) -> Result<Outcome> {
    writeln!(out, "Reading current data from {} ...", store.describe())?;
    let current = maintenance::read_squares(store)?;
    writeln!(out, "Found {} squares.", current.len())?;

    let plan = maintenance::plan_rollback(&current, target, Color::BACKGROUND);
    if plan.is_noop() {
        writeln!(out, "Already at {} squares or fewer. Nothing to roll back.", target)?;
        return Ok(Outcome::NothingToDo);
    }

    writeln!(out)?;
    writeln!(out, "Rollback plan:")?;
    rule(out, '-')?;
    writeln!(out, "  Current squares:    {}", plan.current_count)?;
    writeln!(out, "  Squares to remove:  {}", plan.to_remove)?;
    writeln!(out, "  Total after:        {}", plan.truncated.len())?;
    writeln!(out, "  Current data hash:  {}", plan.current_hash)?;
    writeln!(out, "  Rolled back hash:   {}", plan.truncated_hash)?;
    writeln!(out, "  Size now:           {}", format_bytes(plan.current_size))?;
    writeln!(out, "  Size after:         {}", format_bytes(plan.truncated_size))?;
    rule(out, '-')?;

    if plan.custom.is_empty() {
        writeln!(out, "All removed squares are blank.")?;
    } else {
        writeln!(out, "These squares carry designs that will be LOST:")?;
        for i in &plan.custom {
            writeln!(out, "  Square {}", i)?;
        }
    }

    if prompt.ask("Type \"ROLLBACK\" to confirm: ")? != "ROLLBACK" {
        return cancelled(out);
    }

    let count = maintenance::apply_rollback(store, &plan)?;
    writeln!(out, "Rollback completed: {} squares.", count)?;
    Ok(Outcome::Completed)
}

// ============================================================================
// export
// ============================================================================

pub fn run_export(
    store: &dyn QuiltStore,
    layout: QuiltLayout,
    output: &Path,
    scale: u32,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let value = store
        .get(SQUARES_PATH)?
        .ok_or_else(|| QuiltError::not_found(SQUARES_PATH))?;
    let quilt = Quilt::from_value(&value, layout.columns, layout.grid_size)?;
    export_png(&quilt, output, scale)?;
    writeln!(
        out,
        "Exported {} squares to {} ({}x scale).",
        quilt.len(),
        output.display(),
        scale
    )?;
    Ok(Outcome::Completed)
}
