use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use strata_config::{DispatchConfig, TranslationTable, WorkflowSpec};
use strata_dispatch::Dispatcher;
use strata_provenance::ProvenanceScanner;
use strata_resolver::{Resolver, StandardResolver, export_spec};
use strata_vcs::GitVcs;
use strata_workflow::{WorkflowGraph, match_graphs};

/// Strata - tracks workflow provenance in versioned datasets
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.strata)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Dispatch configuration file (JSON)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a workflow specification and print it back in record form
  Export {
    /// Path to the workflow specification
    spec: PathBuf,

    /// Translation table (CSV, or TSV by extension) to remap handles
    #[arg(long)]
    table: Option<PathBuf>,
  },

  /// Print the provenance graph recorded in a repository
  Scan {
    /// Repository to scan
    repo: PathBuf,

    #[arg(long, default_value = "HEAD")]
    rev: String,

    /// Scan every linked sub-repository as well
    #[arg(long)]
    superdataset: bool,

    #[arg(long)]
    json: bool,
  },

  /// Match a workflow against a repository and show what is left to run
  Status {
    spec: PathBuf,
    repo: PathBuf,

    #[arg(long)]
    table: Option<PathBuf>,

    #[arg(long, default_value = "HEAD")]
    rev: String,

    #[arg(long)]
    superdataset: bool,

    #[arg(long)]
    json: bool,
  },

  /// Run the next pending task on each branch and merge the results
  Dispatch {
    spec: PathBuf,

    /// Source repository; job refs are pushed to and merged here
    repo: PathBuf,

    /// Branch to work on; repeat for several branches
    #[arg(long = "branch", required = true)]
    branches: Vec<String>,

    #[arg(long)]
    table: Option<PathBuf>,

    /// Maximum number of branches worked on at once
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    remote: Option<String>,

    /// Branch receiving the merge of all job refs
    #[arg(long)]
    base: Option<String>,

    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".strata"),
  };

  match cli.command {
    Some(Commands::Export { spec, table }) => export(&spec, table.as_deref()),
    Some(Commands::Scan {
      repo,
      rev,
      superdataset,
      json,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(scan(&repo, &rev, superdataset, json))
    }
    Some(Commands::Status {
      spec,
      repo,
      table,
      rev,
      superdataset,
      json,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(status(&spec, &repo, table.as_deref(), &rev, superdataset, json))
    }
    Some(Commands::Dispatch {
      spec,
      repo,
      branches,
      table,
      workers,
      remote,
      base,
      json,
    }) => {
      let mut config = load_config(cli.config.as_deref(), &data_dir)?;
      if let Some(workers) = workers {
        config.max_workers = workers;
      }
      if let Some(remote) = remote {
        config.remote = remote;
      }
      if let Some(base) = base {
        config.base_branch = base;
      }
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(dispatch(&spec, &repo, table.as_deref(), branches, config, json))
    }
    None => {
      println!("strata - use --help to see available commands");
      Ok(())
    }
  }
}

/// Explicit config file, else `<data_dir>/config.json`, else defaults.
fn load_config(path: Option<&Path>, data_dir: &Path) -> Result<DispatchConfig> {
  let default_path = data_dir.join("config.json");
  let path = match path {
    Some(path) => path,
    None if default_path.exists() => default_path.as_path(),
    None => return Ok(DispatchConfig::with_data_dir(data_dir)),
  };
  DispatchConfig::load(path).with_context(|| format!("failed to load config: {}", path.display()))
}

/// Parse, build and optionally remap a specification file.
fn resolve_spec(spec_file: &Path, table_file: Option<&Path>) -> Result<WorkflowGraph> {
  let text = std::fs::read_to_string(spec_file)
    .with_context(|| format!("failed to read spec file: {}", spec_file.display()))?;
  let spec = WorkflowSpec::parse(&text)
    .with_context(|| format!("failed to parse spec file: {}", spec_file.display()))?;

  let resolver = match table_file {
    Some(path) => StandardResolver::with_table(
      TranslationTable::load(path)
        .with_context(|| format!("failed to load translation table: {}", path.display()))?,
    ),
    None => StandardResolver::new(),
  };
  let graph = resolver.resolve(&spec).context("failed to resolve workflow")?;
  info!(nodes = graph.len(), "resolved workflow");
  Ok(graph)
}

fn export(spec_file: &Path, table_file: Option<&Path>) -> Result<()> {
  let graph = resolve_spec(spec_file, table_file)?;
  print!("{}", export_spec(&graph).to_text());
  Ok(())
}

async fn scan(repo: &Path, rev: &str, superdataset: bool, json: bool) -> Result<()> {
  let scanner = ProvenanceScanner::new(Arc::new(GitVcs::new())).with_superdataset(superdataset);
  let graph = scanner
    .scan(repo, rev)
    .await
    .with_context(|| format!("failed to scan repository: {}", repo.display()))?;

  if json {
    println!("{}", serde_json::to_string_pretty(&graph)?);
    return Ok(());
  }

  for node in graph.sorted_nodes().into_iter().filter(|n| n.is_task()) {
    println!("{}  [{}]  {}", node.name, node.group, node.label);
    println!("    in:  {}", graph.predecessors(&node.name).join(" "));
    println!("    out: {}", graph.successors(&node.name).join(" "));
  }
  let summary = graph.summary();
  println!("{} runs, {} files", summary.tasks, summary.files);
  Ok(())
}

async fn status(
  spec_file: &Path,
  repo: &Path,
  table_file: Option<&Path>,
  rev: &str,
  superdataset: bool,
  json: bool,
) -> Result<()> {
  let graph = resolve_spec(spec_file, table_file)?;
  let scanner = ProvenanceScanner::new(Arc::new(GitVcs::new())).with_superdataset(superdataset);
  let provenance = scanner
    .scan(repo, rev)
    .await
    .with_context(|| format!("failed to scan repository: {}", repo.display()))?;

  let outcome = match_graphs(&graph, &provenance);
  let runnable: Vec<&str> = outcome
    .difference
    .runnable_tasks()
    .into_iter()
    .map(|n| n.name.as_str())
    .collect();
  let frontier: Vec<&str> = outcome
    .difference
    .frontier()
    .into_iter()
    .map(|n| n.name.as_str())
    .collect();
  let summary = outcome.annotated.summary();

  if json {
    let value = serde_json::json!({
      "summary": summary,
      "completed": outcome.completed(),
      "frontier": frontier,
      "runnable": runnable,
      "nodes": outcome
        .annotated
        .sorted_nodes()
        .into_iter()
        .map(|n| serde_json::json!({
          "name": n.name,
          "label": n.label,
          "status": n.status,
          "color": n.color(),
        }))
        .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    return Ok(());
  }

  println!(
    "{}/{} tasks complete ({} nodes, {} edges)",
    summary.complete_tasks, summary.tasks, summary.nodes, summary.edges
  );
  for node in outcome.annotated.sorted_nodes().into_iter().filter(|n| n.is_task()) {
    let mark = if node.is_complete() { "x" } else { " " };
    println!("  [{}] {}  {}", mark, node.name, node.command().unwrap_or_default());
  }
  println!("frontier: {}", frontier.join(" "));
  println!("runnable: {}", runnable.join(" "));
  Ok(())
}

async fn dispatch(
  spec_file: &Path,
  repo: &Path,
  table_file: Option<&Path>,
  branches: Vec<String>,
  config: DispatchConfig,
  json: bool,
) -> Result<()> {
  let graph = resolve_spec(spec_file, table_file)?;
  let repo = std::fs::canonicalize(repo)
    .with_context(|| format!("failed to resolve repository path: {}", repo.display()))?;

  let dispatcher = Dispatcher::new(Arc::new(GitVcs::new()), config);
  let report = dispatcher
    .dispatch(&repo, &graph, &branches, CancellationToken::new())
    .await
    .context("dispatch failed")?;

  if json {
    println!("{}", report.to_json()?);
  } else {
    for outcome in &report.branches {
      match &outcome.error {
        Some(error) => println!("{}: {} ({})", outcome.branch, outcome.state, error),
        None => println!(
          "{}: {} {}",
          outcome.branch,
          outcome.state,
          outcome.task.as_deref().unwrap_or("-")
        ),
      }
    }
    for merge in &report.reconcile.merges {
      let subrepo = if merge.subrepo.is_empty() { "." } else { merge.subrepo.as_str() };
      println!("merged {} job refs into {}", merge.job_refs.len(), subrepo);
    }
  }

  if let Some(error) = &report.reconcile.error {
    bail!("reconcile failed: {error}");
  }
  if report.failed().next().is_some() {
    bail!("{} branch(es) failed", report.failed().count());
  }
  Ok(())
}
