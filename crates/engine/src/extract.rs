// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PR URL and commit SHA extraction from backend output

use regex::Regex;
use std::sync::LazyLock;

// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
static PR_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s)]+/pull/\d+").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static COMMIT_SHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-f]{7,40}\b").expect("constant regex pattern is valid"));

/// Git commit output of the `[branch abc1234] message` form.
#[allow(clippy::expect_used)]
static COMMIT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]\s]+ [0-9a-f]{7,40}\]").expect("constant regex pattern is valid")
});

/// First PR URL in the text. Issue links never match because `/pull/` is
/// required.
pub fn extract_pr_url(text: &str) -> Option<String> {
    PR_URL.find(text).map(|m| m.as_str().to_string())
}

/// Whether a tool-result payload is recognizable as git commit output.
fn looks_like_commit_output(text: &str) -> bool {
    text.contains("commit ") || text.contains("commit:") || COMMIT_LINE.is_match(text)
}

/// Commit SHAs from a tool-result payload.
///
/// Only payloads that look like git commit output are scanned; everything
/// else would be full of incidental hex. Duplicates are dropped preserving
/// first-seen order.
pub fn extract_commit_shas(text: &str) -> Vec<String> {
    if !looks_like_commit_output(text) {
        return Vec::new();
    }
    let mut seen = Vec::new();
    for m in COMMIT_SHA.find_iter(text) {
        let sha = m.as_str();
        if !seen.iter().any(|s| s == sha) {
            seen.push(sha.to_string());
        }
    }
    seen
}

/// Merge newly observed SHAs into an accumulator, preserving first-seen
/// order across calls.
pub fn merge_shas(into: &mut Vec<String>, new: Vec<String>) {
    for sha in new {
        if !into.iter().any(|s| *s == sha) {
            into.push(sha);
        }
    }
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
