// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt assembly.
//!
//! All prompts are pure functions of their inputs, so any backend
//! invocation can be reproduced from the task record alone.

use fm_core::Task;
use std::fmt::Write as _;

/// Marker the self-review phase uses to report a clean diff.
pub const REVIEW_PASSED: &str = "REVIEW_PASSED";

/// Marker prefix the self-review phase uses after fixing something.
pub const REVIEW_FIXED: &str = "REVIEW_FIXED:";

/// The main implementation prompt: mode header, branch instructions,
/// acceptance criteria, workflow body, optional research context.
pub fn main_prompt(task: &Task, research: &[String]) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "# Implementation Task: {}", task.title);
    let _ = writeln!(p, "\nTask ID: {}", task.id);

    if !task.description.is_empty() {
        let _ = writeln!(p, "\n## Description\n\n{}", task.description);
    }

    if let Some(branch) = &task.branch {
        let _ = writeln!(p, "\n## Branch");
        match &task.base_branch {
            Some(base) => {
                let _ = writeln!(
                    p,
                    "\nWork on branch `{branch}` created from `{base}`. Create it if it does not exist."
                );
            }
            None => {
                let _ = writeln!(
                    p,
                    "\nWork on branch `{branch}`. Create it if it does not exist."
                );
            }
        }
    }

    if !task.acceptance_criteria.is_empty() {
        let _ = writeln!(p, "\n## Acceptance Criteria");
        let _ = writeln!(p);
        for (i, criterion) in task.acceptance_criteria.iter().enumerate() {
            let _ = writeln!(p, "{}. {}", i + 1, criterion);
        }
    }

    if let Some(image) = &task.image_path {
        let _ = writeln!(p, "\n## Reference Image\n\n{}", image.display());
    }

    if !research.is_empty() {
        let _ = writeln!(p, "\n## Research Findings");
        for finding in research {
            let _ = writeln!(p, "\n{finding}");
        }
    }

    let _ = writeln!(
        p,
        "\n## Workflow\n\n\
         1. Read the relevant code before changing it.\n\
         2. Implement the task.\n\
         3. Run the project's tests and fix regressions you introduced.\n\
         4. Commit your work with clear messages.\n\
         5. Summarize what changed and why."
    );

    if task.create_pr {
        let _ = writeln!(
            p,
            "6. Push the branch and open a pull request; include the PR URL in your summary."
        );
    }

    p
}

/// Retry prompt after a quality-gate failure.
///
/// Derivable from `{task summary, attempt, feedback}` alone; no other state
/// is consulted.
pub fn retry_prompt(task_summary: &str, attempt: u32, feedback: &str) -> String {
    format!(
        "# Quality Gate Retry (attempt {attempt})\n\n\
         Your previous attempt at this task did not pass the quality gates.\n\n\
         Task: {task_summary}\n\n\
         ## Gate Feedback\n\n{feedback}\n\n\
         Fix the reported problems, re-run the gates that failed, and commit the fixes."
    )
}

/// Bounded self-review pass over the produced diff.
pub fn self_review_prompt(task_summary: &str) -> String {
    format!(
        "# Self Review\n\n\
         Review the diff you just produced for: {task_summary}\n\n\
         Look for bugs, missing edge cases, and code that does not match the\n\
         surrounding style. If everything is fine, reply with exactly\n\
         `{REVIEW_PASSED}`. If you fix anything, commit the fixes and reply with\n\
         `{REVIEW_FIXED} <one-line summary>`."
    )
}

const RESEARCH_ANGLES: &[&str] = &[
    "the repository layout, build system, and how tests are run",
    "the code paths and modules most relevant to the task",
    "existing conventions, similar past changes, and edge cases to respect",
];

/// Prompt for one research subagent. Each of the bounded set of subagents
/// gets a different angle.
pub fn research_prompt(task: &Task, index: usize) -> String {
    let angle = RESEARCH_ANGLES[index % RESEARCH_ANGLES.len()];
    format!(
        "# Research Only - Do Not Modify Anything\n\n\
         Investigate {angle} for the task below. Reply with concise findings\n\
         as plain text; do not edit files, run write commands, or commit.\n\n\
         Task: {}\n\n{}",
        task.title, task.description
    )
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
