// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "opened https://github.com/acme/api/pull/42 for review", Some("https://github.com/acme/api/pull/42") },
    in_parens = { "see (https://github.com/acme/api/pull/7)", Some("https://github.com/acme/api/pull/7") },
    issue_link_ignored = { "filed https://github.com/acme/api/issues/9", None },
    no_url = { "nothing to see", None },
)]
fn pr_url_extraction(text: &str, expected: Option<&str>) {
    assert_eq!(extract_pr_url(text).as_deref(), expected);
}

#[test]
fn pr_url_first_match_wins() {
    let text = "https://github.com/a/b/pull/1 then https://github.com/a/b/pull/2";
    assert_eq!(
        extract_pr_url(text).as_deref(),
        Some("https://github.com/a/b/pull/1")
    );
}

#[test]
fn shas_extracted_from_commit_output() {
    let text = "[main abc1234] add rate limiting\n 2 files changed";
    assert_eq!(extract_commit_shas(text), vec!["abc1234".to_string()]);
}

#[test]
fn shas_extracted_from_git_log_style_output() {
    let text = "commit 0123456789abcdef0123456789abcdef01234567\nAuthor: dev";
    assert_eq!(
        extract_commit_shas(text),
        vec!["0123456789abcdef0123456789abcdef01234567".to_string()]
    );
}

#[test]
fn non_commit_payloads_are_not_scanned() {
    // Hex-looking content without a commit marker
    let text = "checksum deadbeef1234567 for archive";
    assert!(extract_commit_shas(text).is_empty());
}

#[test]
fn duplicate_shas_coalesce_preserving_order() {
    let text = "commit abc1234\ncommit def5678\ncommit abc1234";
    assert_eq!(
        extract_commit_shas(text),
        vec!["abc1234".to_string(), "def5678".to_string()]
    );
}

#[test]
fn merge_shas_keeps_first_seen_order_across_calls() {
    let mut all = Vec::new();
    merge_shas(&mut all, vec!["abc1234".into(), "def5678".into()]);
    merge_shas(&mut all, vec!["def5678".into(), "0badcafe".into()]);
    assert_eq!(
        all,
        vec![
            "abc1234".to_string(),
            "def5678".to_string(),
            "0badcafe".to_string()
        ]
    );
}

#[test]
fn short_hex_is_not_a_sha() {
    // Six characters is below the 7-char minimum
    let text = "commit abc123";
    assert!(extract_commit_shas(text).is_empty());
}
