// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task execution pipeline.
//!
//! Preflight -> worktree resolution -> optional research -> main backend
//! execution -> quality-gate retry loop -> self-review -> finalization.
//! Structural failures (preflight, spawn) surface as errors; a task that ran
//! and failed is reported through `ExecutionResult { success: false, .. }`.

use crate::error::EngineError;
use crate::extract;
use crate::preflight::{run_preflight, PreflightOptions};
use crate::prompt;
use crate::research::{run_research, ResearchConfig};
use async_trait::async_trait;
use fm_adapters::{Backend, ExecuteOptions, GitOps, QualityChecker, WorktreeProvider};
use fm_core::{
    BackendResult, Complexity, EventKind, ExecutionResult, Phase, ProgressReporter,
    QualityOutcome, Task,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runner tunables, injected at construction.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum quality-gate attempts (checks) before giving up.
    pub max_retries: u32,
    pub research: ResearchConfig,
    pub self_review_enabled: bool,
    pub self_review_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            research: ResearchConfig::default(),
            self_review_enabled: true,
            self_review_timeout: Duration::from_secs(120),
        }
    }
}

/// Adapter dependencies for the runner.
pub struct RunnerDeps<B, G, W, Q> {
    pub backend: Arc<B>,
    pub git: Arc<G>,
    pub worktrees: Option<Arc<W>>,
    pub quality: Option<Arc<Q>>,
    pub progress: Arc<dyn ProgressReporter>,
}

impl<B, G> RunnerDeps<B, G, fm_adapters::GitWorktrees, fm_adapters::CommandChecker> {
    /// Deps with no worktree isolation and no quality gates configured.
    pub fn new(backend: Arc<B>, git: Arc<G>, progress: Arc<dyn ProgressReporter>) -> Self {
        RunnerDeps {
            backend,
            git,
            worktrees: None,
            quality: None,
            progress,
        }
    }
}

impl<B, G, W, Q> RunnerDeps<B, G, W, Q> {
    pub fn with_worktrees<W2>(self, worktrees: Arc<W2>) -> RunnerDeps<B, G, W2, Q> {
        RunnerDeps {
            backend: self.backend,
            git: self.git,
            worktrees: Some(worktrees),
            quality: self.quality,
            progress: self.progress,
        }
    }

    pub fn with_quality<Q2>(self, quality: Arc<Q2>) -> RunnerDeps<B, G, W, Q2> {
        RunnerDeps {
            backend: self.backend,
            git: self.git,
            worktrees: self.worktrees,
            quality: Some(quality),
            progress: self.progress,
        }
    }
}

/// Contract the project workers drive; implemented by [`Runner`].
#[async_trait]
pub trait TaskRunner: Send + Sync + 'static {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        task: &Task,
    ) -> Result<ExecutionResult, EngineError>;
}

/// Drives a single task end to end.
pub struct Runner<B, G, W, Q> {
    deps: RunnerDeps<B, G, W, Q>,
    config: RunnerConfig,
}

impl<B, G, W, Q> Runner<B, G, W, Q>
where
    B: Backend,
    G: GitOps,
    W: WorktreeProvider,
    Q: QualityChecker,
{
    pub fn new(deps: RunnerDeps<B, G, W, Q>, config: RunnerConfig) -> Self {
        Self { deps, config }
    }

    fn progress(&self, task: &Task, phase: Phase, percent: u8, message: &str) {
        self.deps.progress.on_progress(&task.id, phase, percent, message);
    }

    /// Execute one task.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        task: &Task,
    ) -> Result<ExecutionResult, EngineError> {
        let complexity = Complexity::classify(task);
        tracing::info!(
            task = %task.id,
            project = %task.project_path.display(),
            %complexity,
            "task execution starting"
        );

        self.progress(task, Phase::Preflight, 0, "running preflight checks");
        let use_worktree = self.deps.worktrees.is_some();
        run_preflight(
            self.deps.backend.as_ref(),
            self.deps.git.as_ref(),
            &task.project_path,
            &PreflightOptions {
                skip_git_clean: use_worktree,
            },
        )
        .await?;

        // Worktree is acquired before any backend work and released on every
        // exit path below; the handle's Drop covers abnormal unwinds.
        let worktree = match &self.deps.worktrees {
            Some(provider) => Some(match &task.branch {
                Some(branch) => {
                    provider
                        .create_with_branch(
                            &task.project_path,
                            task.id.as_str(),
                            branch,
                            task.base_branch.as_deref().unwrap_or("HEAD"),
                        )
                        .await?
                }
                None => provider.create(&task.project_path, task.id.as_str()).await?,
            }),
            None => None,
        };
        let exec_path = worktree
            .as_ref()
            .map(|handle| handle.path().to_path_buf())
            .unwrap_or_else(|| task.project_path.clone());
        self.progress(task, Phase::Preflight, 5, "preflight complete");

        let result = self
            .run_pipeline(cancel, task, &exec_path, complexity)
            .await;

        if let Some(handle) = worktree {
            if let Err(e) = handle.remove().await {
                tracing::warn!(task = %task.id, error = %e, "worktree release failed");
            }
        }

        result
    }

    async fn run_pipeline(
        &self,
        cancel: &CancellationToken,
        task: &Task,
        exec_path: &Path,
        complexity: Complexity,
    ) -> Result<ExecutionResult, EngineError> {
        let shas: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut tokens_input: u64 = 0;
        let mut tokens_output: u64 = 0;

        // Optional research fan-out
        let mut findings = Vec::new();
        if self.config.research.enabled && !complexity.skips_research() {
            self.progress(task, Phase::Research, 20, "researching the codebase");
            let mut research_task = task.clone();
            research_task.project_path = exec_path.to_path_buf();
            findings = run_research(
                &self.deps.backend,
                cancel,
                &research_task,
                &self.config.research,
            )
            .await;
        }
        if cancel.is_cancelled() {
            return Ok(self.cancelled(task, tokens_input, tokens_output, &shas));
        }

        // Main implementation run
        self.progress(task, Phase::Implementation, 30, "implementing");
        let main = self
            .run_backend(
                cancel,
                prompt::main_prompt(task, &findings),
                exec_path,
                task,
                complexity.model().map(String::from),
                complexity.effort().map(String::from),
                complexity.timeout(),
                Phase::Implementation,
                &shas,
            )
            .await?;
        tokens_input += main.tokens_input;
        tokens_output += main.tokens_output;

        if cancel.is_cancelled() {
            return Ok(self.cancelled(task, tokens_input, tokens_output, &shas));
        }
        if !main.success {
            let error = main
                .error
                .unwrap_or_else(|| "backend failed without diagnostics".to_string());
            tracing::warn!(task = %task.id, %error, "main execution failed");
            return Ok(ExecutionResult {
                task_id: task.id.clone(),
                success: false,
                output: main.output,
                error: Some(error),
                pr_url: None,
                commit_shas: shas.lock().clone(),
                tokens_input,
                tokens_output,
                quality_gates: Vec::new(),
            });
        }

        let mut final_output = main.output;
        let mut outcomes: Vec<QualityOutcome> = Vec::new();
        let mut success = true;
        let mut error: Option<String> = None;

        // Quality-gate retry loop
        if let Some(quality) = &self.deps.quality {
            let mut attempt: u32 = 1;
            loop {
                self.progress(
                    task,
                    Phase::QualityGates,
                    80,
                    &format!("quality gates, attempt {attempt}"),
                );
                let outcome = quality.check(cancel, attempt).await?;
                let passed = outcome.passed;
                let should_retry = outcome.should_retry;
                let feedback = outcome.retry_feedback.clone();
                outcomes.push(outcome);

                if passed {
                    break;
                }
                if cancel.is_cancelled() {
                    success = false;
                    error = Some("cancelled during quality gates".to_string());
                    break;
                }
                if !should_retry {
                    success = false;
                    error = Some("quality gates failed".to_string());
                    break;
                }
                if attempt >= self.config.max_retries {
                    success = false;
                    error = Some(format!("quality gates failed after {attempt} attempts"));
                    break;
                }

                attempt += 1;
                tracing::info!(task = %task.id, attempt, "retrying after quality gate feedback");
                let retry = self
                    .run_backend(
                        cancel,
                        prompt::retry_prompt(&task.summary(), attempt, &feedback),
                        exec_path,
                        task,
                        complexity.model().map(String::from),
                        complexity.effort().map(String::from),
                        complexity.timeout(),
                        Phase::QualityGates,
                        &shas,
                    )
                    .await?;
                tokens_input += retry.tokens_input;
                tokens_output += retry.tokens_output;
                if !retry.success {
                    success = false;
                    error = retry
                        .error
                        .or_else(|| Some("quality gate retry run failed".to_string()));
                    break;
                }
                final_output = retry.output;
            }
        }

        // Self-review: bounded and never fatal
        if success
            && self.config.self_review_enabled
            && !complexity.skips_self_review()
            && !cancel.is_cancelled()
        {
            self.progress(task, Phase::SelfReview, 95, "self review");
            match self
                .run_backend(
                    cancel,
                    prompt::self_review_prompt(&task.summary()),
                    exec_path,
                    task,
                    None,
                    None,
                    self.config.self_review_timeout,
                    Phase::SelfReview,
                    &shas,
                )
                .await
            {
                Ok(review) => {
                    tokens_input += review.tokens_input;
                    tokens_output += review.tokens_output;
                    if !review.success {
                        tracing::warn!(
                            task = %task.id,
                            error = ?review.error,
                            "self review failed (non-fatal)"
                        );
                    } else if review.output.contains(prompt::REVIEW_FIXED) {
                        tracing::info!(task = %task.id, "self review fixed issues");
                    }
                }
                Err(e) => {
                    tracing::warn!(task = %task.id, error = %e, "self review errored (non-fatal)");
                }
            }
        }

        if cancel.is_cancelled() && success {
            success = false;
            error = Some("execution cancelled".to_string());
        }

        let commit_shas = shas.lock().clone();
        let pr_url = if task.create_pr && !commit_shas.is_empty() {
            extract::extract_pr_url(&final_output)
        } else {
            None
        };

        self.progress(
            task,
            Phase::Finalize,
            100,
            if success { "completed" } else { "failed" },
        );
        Ok(ExecutionResult {
            task_id: task.id.clone(),
            success,
            output: final_output,
            error,
            pr_url,
            commit_shas,
            tokens_input,
            tokens_output,
            quality_gates: outcomes,
        })
    }

    fn cancelled(
        &self,
        task: &Task,
        tokens_input: u64,
        tokens_output: u64,
        shas: &Arc<Mutex<Vec<String>>>,
    ) -> ExecutionResult {
        ExecutionResult {
            task_id: task.id.clone(),
            success: false,
            output: String::new(),
            error: Some("execution cancelled".to_string()),
            pr_url: None,
            commit_shas: shas.lock().clone(),
            tokens_input,
            tokens_output,
            quality_gates: Vec::new(),
        }
    }

    /// Run one backend invocation with a phase timeout, streaming commit
    /// SHAs and progress out of the event stream.
    #[allow(clippy::too_many_arguments)]
    async fn run_backend(
        &self,
        cancel: &CancellationToken,
        prompt_text: String,
        exec_path: &Path,
        task: &Task,
        model: Option<String>,
        effort: Option<String>,
        phase_timeout: Duration,
        phase: Phase,
        shas: &Arc<Mutex<Vec<String>>>,
    ) -> Result<BackendResult, EngineError> {
        let progress = Arc::clone(&self.deps.progress);
        let task_id = task.id.clone();
        let sha_sink = Arc::clone(shas);
        let events = Arc::new(AtomicU32::new(0));
        let event_counter = Arc::clone(&events);

        let opts = ExecuteOptions::new(prompt_text, exec_path.to_path_buf())
            .with_verbose(task.verbose)
            .with_model(model)
            .with_effort(effort)
            .on_event(move |event| {
                if let EventKind::ToolResult {
                    content,
                    is_error: false,
                } = &event.kind
                {
                    extract::merge_shas(
                        &mut sha_sink.lock(),
                        extract::extract_commit_shas(content),
                    );
                }
                if phase == Phase::Implementation {
                    let n = event_counter.fetch_add(1, Ordering::Relaxed) + 1;
                    let percent = 30 + ((n / 2).min(45) as u8);
                    progress.on_progress(&task_id, phase, percent, event.kind.name());
                }
            });

        let run_token = cancel.child_token();
        let backend_token = run_token.clone();
        let fut = self.deps.backend.execute(&backend_token, opts);
        tokio::pin!(fut);

        let result = tokio::select! {
            res = &mut fut => res?,
            _ = tokio::time::sleep(phase_timeout) => {
                tracing::warn!(
                    task = %task.id,
                    timeout_secs = phase_timeout.as_secs(),
                    "phase timeout reached; cancelling backend run"
                );
                run_token.cancel();
                (&mut fut).await?
            }
        };
        Ok(result)
    }
}

#[async_trait]
impl<B, G, W, Q> TaskRunner for Runner<B, G, W, Q>
where
    B: Backend,
    G: GitOps,
    W: WorktreeProvider,
    Q: QualityChecker,
{
    async fn execute(
        &self,
        cancel: &CancellationToken,
        task: &Task,
    ) -> Result<ExecutionResult, EngineError> {
        Runner::execute(self, cancel, task).await
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
