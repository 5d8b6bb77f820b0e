// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreman (fm) CLI
//!
//! Queues a task against a repository, drives it through the engine, and
//! reports the result. All state lives in the project's execution log.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use fm_adapters::{
    ClaudeBackend, ClaudeBackendConfig, CliGit, CommandChecker, GateCommand, GitWorktrees,
};
use fm_core::{Execution, ExecutionId, Phase, ProgressReporter, Task, TaskId};
use fm_engine::{
    ChecklistDecomposer, Dispatcher, DispatcherConfig, Runner, RunnerConfig, RunnerDeps,
};
use fm_storage::{ExecutionStore, JsonlStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "fm", version, about = "Autonomous task executor for coding assistants")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a task and wait for it to finish
    Run(RunArgs),
    /// Show a stored execution
    Status(StatusArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Absolute path of the target repository
    #[arg(long)]
    project: PathBuf,
    /// External task identifier (e.g. GH-123)
    #[arg(long = "task-id")]
    task_id: String,
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    /// Acceptance criterion; repeat for several
    #[arg(long = "criteria")]
    criteria: Vec<String>,
    #[arg(long)]
    branch: Option<String>,
    #[arg(long = "base-branch")]
    base_branch: Option<String>,
    /// Ask the assistant to open a pull request
    #[arg(long = "create-pr")]
    create_pr: bool,
    /// Log every backend event at debug level
    #[arg(long = "verbose-backend")]
    verbose_backend: bool,
    /// Reference image passed to the assistant
    #[arg(long = "image")]
    image: Option<PathBuf>,
    /// Backend CLI binary
    #[arg(long = "backend-cmd", default_value = "claude")]
    backend_cmd: String,
    /// Extra argument appended to the backend argv; repeat for several
    #[arg(long = "backend-arg")]
    backend_args: Vec<String>,
    /// Execution log location (default: <project>/.fm/executions.jsonl)
    #[arg(long = "store-path")]
    store_path: Option<PathBuf>,
    /// Run the task in an isolated git worktree
    #[arg(long)]
    worktrees: bool,
    /// Quality gate as name=command; repeat for several
    #[arg(long = "gate")]
    gates: Vec<String>,
    /// Maximum quality-gate attempts
    #[arg(long = "max-retries", default_value_t = 3)]
    max_retries: u32,
    /// Skip the research phase
    #[arg(long = "no-research")]
    no_research: bool,
    /// Skip the self-review phase
    #[arg(long = "no-self-review")]
    no_self_review: bool,
    /// Split checklist-style tasks into independent subtasks
    #[arg(long)]
    decompose: bool,
}

#[derive(Args)]
struct StatusArgs {
    /// Execution id to look up
    execution_id: String,
    /// Execution log location
    #[arg(long = "store-path")]
    store_path: PathBuf,
}

/// Parse a `name=command` gate flag.
fn parse_gate(raw: &str) -> anyhow::Result<GateCommand> {
    match raw.split_once('=') {
        Some((name, command)) if !name.trim().is_empty() && !command.trim().is_empty() => {
            Ok(GateCommand::new(name.trim(), command.trim()))
        }
        _ => bail!("invalid --gate '{raw}': expected name=command"),
    }
}

fn store_path(args: &RunArgs) -> PathBuf {
    args.store_path
        .clone()
        .unwrap_or_else(|| args.project.join(".fm/executions.jsonl"))
}

fn build_task(args: &RunArgs) -> Task {
    let mut task = Task::new(args.task_id.as_str(), args.title.as_str(), args.project.clone())
        .with_description(args.description.as_str())
        .with_criteria(args.criteria.clone())
        .with_create_pr(args.create_pr)
        .with_verbose(args.verbose_backend);
    if let Some(branch) = &args.branch {
        task = task.with_branch(branch.as_str());
    }
    if let Some(base) = &args.base_branch {
        task = task.with_base_branch(base.as_str());
    }
    if let Some(image) = &args.image {
        task = task.with_image(image.clone());
    }
    task
}

/// Progress printed to stderr so stdout stays machine-readable.
struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn on_progress(&self, task_id: &TaskId, phase: Phase, percent: u8, message: &str) {
        eprintln!("[{percent:>3}%] {task_id} {phase}: {message}");
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("FM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_execution(exec: &Execution) {
    println!("execution:  {}", exec.id);
    println!("task:       {}", exec.task_id);
    println!("project:    {}", exec.project_path.display());
    println!("status:     {}", exec.status);
    println!("created:    {}", exec.created_at.to_rfc3339());
    println!("updated:    {}", exec.updated_at.to_rfc3339());
    if let Some(error) = &exec.error_message {
        println!("error:      {error}");
    }
    if let Some(pr) = &exec.pr_url {
        println!("pr:         {pr}");
    }
    if !exec.commit_shas.is_empty() {
        println!("commits:    {}", exec.commit_shas.join(", "));
    }
    println!(
        "tokens:     {} in / {} out",
        exec.tokens_input, exec.tokens_output
    );
}

async fn run(args: RunArgs) -> anyhow::Result<i32> {
    if !args.project.is_absolute() {
        bail!("--project must be an absolute path");
    }

    let store = Arc::new(
        JsonlStore::open(store_path(&args)).context("failed to open the execution log")?,
    );

    let backend = Arc::new(ClaudeBackend::new(ClaudeBackendConfig {
        command: args.backend_cmd.clone(),
        extra_args: args.backend_args.clone(),
        ..ClaudeBackendConfig::default()
    }));
    let git = Arc::new(CliGit::new());

    let mut deps = RunnerDeps::new(
        backend,
        git,
        Arc::new(StderrProgress) as Arc<dyn ProgressReporter>,
    );
    if args.worktrees {
        deps = deps.with_worktrees(Arc::new(GitWorktrees::new()));
    }
    if !args.gates.is_empty() {
        let gates = args
            .gates
            .iter()
            .map(|raw| parse_gate(raw))
            .collect::<anyhow::Result<Vec<_>>>()?;
        deps = deps.with_quality(Arc::new(CommandChecker::new(args.project.clone(), gates)));
    }

    let mut runner_config = RunnerConfig {
        max_retries: args.max_retries,
        ..RunnerConfig::default()
    };
    runner_config.research.enabled = !args.no_research;
    runner_config.self_review_enabled = !args.no_self_review;

    let runner = Arc::new(Runner::new(deps, runner_config));
    let mut dispatcher = Dispatcher::new(store, runner, DispatcherConfig::default());
    if args.decompose {
        dispatcher = dispatcher.with_decomposer(Arc::new(ChecklistDecomposer::default()));
    }
    let dispatcher = Arc::new(dispatcher);

    let recovered = dispatcher.start().context("stale-task recovery failed")?;
    if recovered > 0 {
        tracing::info!(recovered, "requeued stale executions from a previous run");
    }

    let task = build_task(&args);
    let execution_id = dispatcher.queue_task(&task).context("failed to queue task")?;
    println!("queued: {execution_id}");

    let wait_cancel = CancellationToken::new();
    let outcome = tokio::select! {
        outcome = dispatcher.wait_for_execution(
            &wait_cancel,
            &execution_id,
            Duration::from_millis(500),
        ) => outcome,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted; stopping workers");
            dispatcher.stop().await;
            return Ok(130);
        }
    };

    dispatcher.stop().await;

    let exec = outcome.context("waiting for the execution failed")?;
    print_execution(&exec);
    Ok(if exec.status == fm_core::ExecutionStatus::Completed {
        0
    } else {
        1
    })
}

fn status(args: StatusArgs) -> anyhow::Result<i32> {
    let store = JsonlStore::open(&args.store_path).context("failed to open the execution log")?;
    let exec = store
        .get(&ExecutionId::new(args.execution_id.as_str()))
        .context("execution not found")?;
    print_execution(&exec);
    Ok(0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run(args) => run(args).await?,
        Commands::Status(args) => status(args)?,
    };
    std::process::exit(code);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
