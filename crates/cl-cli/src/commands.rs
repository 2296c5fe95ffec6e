use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use cl_ledger::{ChangeLedger, CheckpointSequencer, TrackedModel};
use cl_store::{Direction, Document, Filter, InMemoryDataStore};
use cl_sync::{
    ConflictResolver, LocalReplica, ReplicationConfig, ReplicationCoordinator, WatermarkStore,
};
use cl_types::{Change, ChangeKind, Revision};
use colored::Colorize;
use serde_json::{json, Value};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ReplicationConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ReplicationConfig::default(),
    };
    let format = cli.format;
    match cli.command {
        Command::Checkpoint(args) => cmd_checkpoint(&cli.store, &config, args, format).await,
        Command::Put(args) => cmd_put(&cli.store, &config, args, format).await,
        Command::Delete(args) => cmd_delete(&cli.store, &config, args, format).await,
        Command::Track(args) => cmd_track(&cli.store, &config, args).await,
        Command::Changes(args) => cmd_changes(&cli.store, &config, args, format).await,
        Command::Replicate(args) => cmd_replicate(&config, args, format).await,
    }
}

/// A store snapshot opened from disk with its ledger.
struct Workspace {
    path: PathBuf,
    store: Arc<InMemoryDataStore>,
    ledger: Arc<ChangeLedger>,
}

impl Workspace {
    fn open(path: &Path, config: &ReplicationConfig, model: Option<&str>) -> anyhow::Result<Self> {
        let store = Arc::new(
            InMemoryDataStore::load(path)
                .with_context(|| format!("loading store {}", path.display()))?,
        );
        let sequencer = CheckpointSequencer::new(store.clone(), config.checkpoint_collection.clone());
        let mut ledger = ChangeLedger::with_sequencer(store.clone(), sequencer);
        for tracked in &config.models {
            ledger.register(tracked.clone());
        }
        if let Some(name) = model {
            if !ledger.is_tracked(name) {
                ledger.register(TrackedModel::new(name));
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            store,
            ledger: Arc::new(ledger),
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        self.store
            .persist(&self.path)
            .with_context(|| format!("writing store {}", self.path.display()))
    }
}

async fn cmd_checkpoint(
    path: &Path,
    config: &ReplicationConfig,
    args: CheckpointArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ws = Workspace::open(path, config, None)?;
    let seq = if args.bump {
        ws.ledger.sequencer().bump_last_seq(args.source_id).await?
    } else {
        ws.ledger.sequencer().current().await?
    };
    ws.save()?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "seq": seq })),
        OutputFormat::Text if args.bump => {
            println!("{} Opened checkpoint {}", "✓".green().bold(), format!("#{seq}").yellow())
        }
        OutputFormat::Text => println!("Current checkpoint {}", format!("#{seq}").yellow()),
    }
    Ok(())
}

async fn cmd_put(
    path: &Path,
    config: &ReplicationConfig,
    args: PutArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let fields = match serde_json::from_str::<Value>(&args.json).context("parsing record JSON")? {
        Value::Object(map) => map,
        other => bail!("record must be a JSON object, got {other}"),
    };
    let ws = Workspace::open(path, config, Some(&args.model))?;
    let change = ws
        .ledger
        .save_record(&args.model, Document::new(args.id, fields))
        .await?;
    ws.save()?;
    print_changes(std::slice::from_ref(&change), format)
}

async fn cmd_delete(
    path: &Path,
    config: &ReplicationConfig,
    args: DeleteArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ws = Workspace::open(path, config, Some(&args.model))?;
    let change = ws.ledger.delete_record(&args.model, &args.id).await?;
    ws.save()?;
    print_changes(std::slice::from_ref(&change), format)
}

async fn cmd_track(path: &Path, config: &ReplicationConfig, args: TrackArgs) -> anyhow::Result<()> {
    let ws = Workspace::open(path, config, Some(&args.model))?;
    let count = if args.all {
        ws.ledger.rectify_all(&args.model).await?
    } else {
        ws.ledger.rectify_model_changes(&args.model, &args.ids).await?;
        args.ids.len()
    };
    ws.save()?;
    println!(
        "{} Rectified {} {} change(s)",
        "✓".green().bold(),
        count.to_string().bold(),
        args.model.cyan()
    );
    Ok(())
}

async fn cmd_changes(
    path: &Path,
    config: &ReplicationConfig,
    args: ChangesArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ws = Workspace::open(path, config, Some(&args.model))?;
    let changes = match args.since {
        Some(since) => ws.ledger.changes_since(&args.model, since).await?,
        None => {
            let filter = Filter::new().order_by("checkpoint", Direction::Asc);
            ws.ledger.changes(&args.model, &filter).await?
        }
    };
    if changes.is_empty() && format == OutputFormat::Text {
        println!("No changes.");
        return Ok(());
    }
    print_changes(&changes, format)
}

async fn cmd_replicate(
    config: &ReplicationConfig,
    args: ReplicateArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if args.source == args.target {
        bail!("source and target must be different stores");
    }
    let src = Workspace::open(&args.source, config, Some(&args.model))?;
    let dst = Workspace::open(&args.target, config, Some(&args.model))?;
    let source = LocalReplica::with_id(args.source.display().to_string(), Arc::clone(&src.ledger));
    let target = LocalReplica::with_id(args.target.display().to_string(), Arc::clone(&dst.ledger));

    let mut options = config.options();
    options.force |= args.force;
    if let Some(size) = args.chunk_size {
        options.chunk_size = size;
    }
    let watermarks =
        WatermarkStore::with_collection(src.store.clone(), config.watermark_collection.clone());
    let report = ReplicationCoordinator::new(watermarks)
        .replicate(&source, &target, &args.model, &options)
        .await?;

    let mut resolved = 0;
    if let Some(resolution) = args.resolve {
        let resolver = ConflictResolver::new(&source, &target);
        for conflict in &report.conflicts {
            match resolution {
                Resolution::Source => resolver.resolve_using_source(conflict).await?,
                Resolution::Target => resolver.resolve_using_target(conflict).await?,
            };
            resolved += 1;
        }
    }
    src.save()?;
    dst.save()?;

    if format == OutputFormat::Json {
        let out = json!({
            "applied": report.applied,
            "since": report.since,
            "sealed": report.sealed,
            "targetCheckpoint": report.target_checkpoint,
            "watermark": report.watermark,
            "conflicts": report.conflicts,
            "resolved": resolved,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{} {} → {} ({}): {} applied, checkpoints {}..={}",
        if report.is_clean() { "✓".green().bold() } else { "!".yellow().bold() },
        args.source.display(),
        args.target.display(),
        args.model.cyan(),
        report.applied.to_string().bold(),
        report.since + 1,
        report.sealed
    );
    for conflict in &report.conflicts {
        println!(
            "  {} {}  source {}  target {}",
            conflict.kind.to_string().red(),
            conflict.model_id.bold(),
            short_rev(&conflict.source_change.rev),
            short_rev(&conflict.target_change.rev)
        );
    }
    if resolved > 0 {
        println!("  Resolved {resolved} conflict(s); they apply on the next pass.");
    } else if !report.is_clean() {
        println!("  Re-run with --resolve source|target to settle conflicts.");
    }
    Ok(())
}

fn print_changes(changes: &[Change], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(changes)?);
        return Ok(());
    }
    for change in changes {
        let kind = match change.kind() {
            ChangeKind::Create => "create".green(),
            ChangeKind::Update => "update".yellow(),
            ChangeKind::Delete => "delete".red(),
        };
        println!(
            "{:>6}  {:<7} {}  {} → {}",
            format!("#{}", change.checkpoint).dimmed(),
            kind,
            change.model_id.bold(),
            short_rev(&change.prev),
            short_rev(&change.rev)
        );
    }
    Ok(())
}

fn short_rev(rev: &Option<Revision>) -> String {
    rev.as_ref().map_or_else(|| "null".to_string(), |r| r.short().to_string())
}
