//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use provtrace_core::fixtures::supply_chain_ledger;
use provtrace_core::{
    ChainWalker, FollowKey, FollowPath, FollowSelf, InMemoryLedger, LedgerQueryClient,
    LineageChain, LineageStep, SelectionPolicy, TraceConfig, TransactionRecord, VersionRef,
    WalkTarget,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Trace {
            asset,
            block,
            tx,
            follow,
            path,
            self_history,
            strict,
            max_depth,
            ledger,
            json,
        } => {
            let start = match (block, tx) {
                (Some(block), Some(tx)) => WalkTarget::at(asset, VersionRef::new(block, tx)),
                _ => WalkTarget::latest(asset),
            };
            let policy = build_policy(follow, path, self_history, strict);
            handle_trace(
                start,
                policy.as_ref(),
                max_depth,
                ledger.as_deref(),
                json,
                workspace,
            )
            .await
        }
        Commands::Inspect {
            asset,
            block,
            tx,
            ledger,
            json,
        } => {
            let target = WalkTarget::at(asset, VersionRef::new(block, tx));
            handle_inspect(target, ledger.as_deref(), json, workspace).await
        }
        Commands::Tx {
            block,
            tx,
            id,
            ledger,
            json,
        } => {
            let lookup = match (id, block, tx) {
                (Some(id), _, _) => TxLookup::Id(id),
                (None, Some(block), Some(tx)) => TxLookup::Version(VersionRef::new(block, tx)),
                _ => anyhow::bail!("Pass either --id TXID or --block N --tx N"),
            };
            handle_tx(lookup, ledger.as_deref(), json, workspace).await
        }
        Commands::Config { action } => handle_config(action, workspace).await,
        Commands::Sample { output } => handle_sample(output.as_deref()),
    }
}

fn load_config(workspace: &Path) -> anyhow::Result<TraceConfig> {
    let config = provtrace_core::load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config.validate()?;
    Ok(config)
}

/// Resolve the snapshot path: the explicit flag wins, then `ledger.snapshot`
/// (relative to the workspace).
fn snapshot_path(
    ledger: Option<&Path>,
    config: &TraceConfig,
    workspace: &Path,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = ledger {
        return Ok(path.to_path_buf());
    }
    match &config.ledger.snapshot {
        Some(path) if path.is_relative() => Ok(workspace.join(path)),
        Some(path) => Ok(path.clone()),
        None => anyhow::bail!(
            "No ledger snapshot configured. Pass --ledger FILE, set ledger.snapshot, \
             or create one with `provtrace sample --output ledger.json`."
        ),
    }
}

fn open_ledger(
    ledger: Option<&Path>,
    config: &TraceConfig,
    workspace: &Path,
) -> anyhow::Result<InMemoryLedger> {
    let path = snapshot_path(ledger, config, workspace)?;
    let ledger = InMemoryLedger::load_snapshot(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load ledger {}: {}", path.display(), e))?;
    Ok(ledger.with_namespace(config.ledger.namespace.clone()))
}

fn build_policy(
    follow: Option<String>,
    path: Vec<String>,
    self_history: bool,
    strict: bool,
) -> Box<dyn SelectionPolicy> {
    if let Some(key) = follow {
        Box::new(FollowKey::new(key))
    } else if self_history {
        Box::new(FollowSelf)
    } else if strict {
        Box::new(FollowPath::new(path).strict())
    } else {
        Box::new(FollowPath::new(path))
    }
}

async fn handle_trace(
    start: WalkTarget,
    policy: &dyn SelectionPolicy,
    max_depth: Option<usize>,
    ledger: Option<&Path>,
    json: bool,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = load_config(workspace)?;
    let ledger = open_ledger(ledger, &config, workspace)?;
    let max_depth = max_depth.unwrap_or(config.walk.max_depth);

    let walker = ChainWalker::new(Arc::new(ledger), config.walk_config());

    // Ctrl-C cancels the walk; the partial chain is still shown.
    let token = walker.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling lineage walk");
            token.cancel();
        }
    });
    let result = walker.walk(start, policy, max_depth).await;
    interrupt.abort();

    match result {
        Ok(chain) => {
            print_chain(&chain, json)?;
            Ok(())
        }
        Err(err) => {
            print_chain(&err.chain, json)?;
            Err(err.into())
        }
    }
}

async fn handle_inspect(
    target: WalkTarget,
    ledger: Option<&Path>,
    json: bool,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = load_config(workspace)?;
    let ledger = open_ledger(ledger, &config, workspace)?;
    let walker = ChainWalker::new(Arc::new(ledger), config.walk_config());

    let step = walker.inspect_step(target).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&step)?);
    } else {
        print!("{}", format_step(&step));
    }
    Ok(())
}

/// How `provtrace tx` addresses a transaction.
enum TxLookup {
    Version(VersionRef),
    Id(String),
}

async fn handle_tx(
    lookup: TxLookup,
    ledger: Option<&Path>,
    json: bool,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = load_config(workspace)?;
    let ledger = open_ledger(ledger, &config, workspace)?;

    let tx = match lookup {
        TxLookup::Version(version) => ledger.fetch_by_version(version).await?,
        TxLookup::Id(id) => ledger.fetch_by_tx_id(&id)?.clone(),
    };
    if !tx.validation_code.is_valid() {
        warn!(
            version = %tx.version(),
            code = tx.validation_code.code(),
            "Transaction was marked invalid by the ledger"
        );
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        print!("{}", format_transaction(&tx));
    }
    Ok(())
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".provtrace");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&TraceConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = provtrace_core::load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

fn handle_sample(output: Option<&Path>) -> anyhow::Result<()> {
    let snapshot = supply_chain_ledger().to_snapshot();
    let json = serde_json::to_string_pretty(&snapshot)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "Wrote {} transactions to {}",
                snapshot.transactions.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn print_chain(chain: &LineageChain, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chain)?);
        return Ok(());
    }
    for step in &chain.steps {
        print!("{}", format_step(step));
    }
    println!("Lineage of {} ({} steps): {}", chain.origin, chain.len(), chain.status);
    Ok(())
}

fn format_step(step: &LineageStep) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", step.provenance.func_name);
    let _ = writeln!(
        out,
        "{} @ {} ({} ms)",
        step.asset, step.version, step.elapsed_ms
    );
    for edge in &step.edges {
        let _ = writeln!(out, "  depends on {edge}");
    }
    for gap in &step.gaps {
        let _ = writeln!(out, "  unresolved {gap}");
    }
    if let Some(followed) = &step.followed {
        let _ = writeln!(out, "  -> {followed}");
    }
    out
}

fn format_transaction(tx: &TransactionRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Transaction {} ({}), {}",
        tx.version(),
        tx.tx_id.as_deref().unwrap_or("no id"),
        tx.validation_code
    );
    if !tx.validation_code.is_valid() {
        let _ = writeln!(out, "WARNING: this transaction is not valid");
    }
    for (i, action) in tx.actions.iter().enumerate() {
        let _ = writeln!(out, "Action {i}:");
        for ns in &action.ns_rwsets {
            let _ = writeln!(out, "  Namespace {}:", ns.namespace);
            for read in &ns.rwset.reads {
                let _ = writeln!(out, "    read  {} @ {}", read.key, read.version);
            }
            for write in &ns.rwset.writes {
                if write.is_delete {
                    let _ = writeln!(out, "    del   {}", write.key);
                } else {
                    let _ = writeln!(out, "    write {} = {}", write.key, write.value);
                }
            }
        }
    }
    out
}
