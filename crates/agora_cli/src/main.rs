//! `agora` admin entry point.
//!
//! # Responsibility
//! - Open the ledger database, load config, start logging.
//! - Run maintenance jobs through the background worker pool and print
//!   their reports.

use agora_core::{
    export_all, init_logging, BulkReconciler, Clock, LedgerConfig, ObjectKind, ReconcileJob,
    ReconcileReport, ReconcileWorkerHandle, SqliteDatastore, SystemClock, UserSelection,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Agora - reputation ledger maintenance
#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ledger database file
    #[arg(long, global = true, default_value = "agora.db")]
    db: PathBuf,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write rolling logs to this absolute directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recompute every tag count from tagged posts
    RecountTags,
    /// Rename a tag on every post
    RenameTag { from: String, to: String },
    /// Remove a tag from every post and delete it
    DeleteTag { tag: String },
    /// Rename a space and rewrite references to it
    RenameSpace { space_id: String, name: String },
    /// Delete a space, moving its posts to the default space
    DeleteSpace { space_id: String },
    /// Add spaces to profiles (all profiles unless --user is given)
    AssignSpaces {
        #[arg(required = true)]
        spaces: Vec<String>,
        #[arg(long = "user")]
        users: Vec<String>,
    },
    /// Grant or revoke a custom badge marker
    CustomBadge {
        marker: String,
        #[arg(long)]
        revoke: bool,
        #[arg(long = "user")]
        users: Vec<String>,
    },
    /// Fold one question into another
    MergeQuestions { source_id: String, target_id: String },
    /// Delete every object of one kind
    DeleteAll { kind: String },
    /// Write every object to a JSON backup file
    Export { file: PathBuf },
    /// Replace the store contents with a JSON backup file
    Import { file: PathBuf },
}

fn selection(users: Vec<String>) -> UserSelection {
    if users.is_empty() {
        UserSelection::All
    } else {
        UserSelection::Ids(users)
    }
}

fn load_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(dir) = cli.log_dir.clone() {
        config.logging.dir = Some(dir);
    }
    Ok(config)
}

fn job_for(command: Command) -> Result<ReconcileJob> {
    let job = match command {
        Command::RecountTags => ReconcileJob::RecountTags,
        Command::RenameTag { from, to } => ReconcileJob::RenameTag { from, to },
        Command::DeleteTag { tag } => ReconcileJob::DeleteTag { tag },
        Command::RenameSpace { space_id, name } => ReconcileJob::RenameSpace {
            space_id,
            new_name: name,
        },
        Command::DeleteSpace { space_id } => ReconcileJob::DeleteSpace { space_id },
        Command::AssignSpaces { spaces, users } => ReconcileJob::AssignSpaces {
            selection: selection(users),
            spaces,
        },
        Command::CustomBadge {
            marker,
            revoke,
            users,
        } => ReconcileJob::SetCustomBadge {
            selection: selection(users),
            marker,
            grant: !revoke,
        },
        Command::MergeQuestions {
            source_id,
            target_id,
        } => ReconcileJob::MergeQuestions {
            source_id,
            target_id,
        },
        Command::DeleteAll { kind } => match ObjectKind::parse(&kind) {
            Some(kind) => ReconcileJob::DeleteAll { kind },
            None => bail!("unknown object kind `{kind}`"),
        },
        Command::Import { file } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read backup `{}`", file.display()))?;
            let backup = serde_json::from_str(&text)
                .with_context(|| format!("backup `{}` is not valid JSON", file.display()))?;
            ReconcileJob::Import {
                backup: Box::new(backup),
            }
        }
        Command::Export { .. } => bail!("export does not run as a background job"),
    };
    Ok(job)
}

fn print_report(report: &ReconcileReport) {
    println!(
        "job={} pages={} scanned={} patched={} created={} deleted={}",
        report.job, report.pages, report.scanned, report.patched, report.created, report.deleted
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.logging).context("failed to start logging")?;

    let store = Arc::new(
        SqliteDatastore::open(&cli.db)
            .with_context(|| format!("failed to open `{}`", cli.db.display()))?,
    );
    info!(
        "event=cli_start module=cli status=ok db={}",
        cli.db.display()
    );

    if let Command::Export { file } = &cli.command {
        let bulk = BulkReconciler::new(store.as_ref(), config.jobs.page_size);
        let backup = export_all(&bulk, SystemClock.now_millis())?;
        fs::write(file, serde_json::to_string_pretty(&backup)?)
            .with_context(|| format!("failed to write backup `{}`", file.display()))?;
        println!("exported={} file={}", backup.len(), file.display());
        return Ok(());
    }

    let job = job_for(cli.command)?;
    let workers = ReconcileWorkerHandle::start(Arc::clone(&store), config.jobs, config.tags)?;
    let result = workers.enqueue(job).and_then(|ticket| ticket.wait());
    workers.shutdown();
    print_report(&result?);
    Ok(())
}
