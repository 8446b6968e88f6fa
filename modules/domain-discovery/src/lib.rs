//! Subdomain discovery over external enumeration tools.
//!
//! The tools are collaborators, not part of this system: each is invoked as
//! an argument vector, its newline-delimited stdout collected, and the union
//! deduplicated and sorted before the pipeline treats each line as a
//! candidate hostname. A tool that is missing or fails contributes nothing.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Passive discovery: subfinder and amass, merged.
pub async fn enumerate_passive(apex: &str, timeout: Duration) -> Vec<String> {
    let mut found = BTreeSet::new();
    collect_lines(
        "subfinder",
        &["-d", apex, "-silent", "-all", "-recursive"],
        timeout,
        &mut found,
    )
    .await;
    collect_lines(
        "amass",
        &["enum", "-passive", "-d", apex],
        timeout,
        &mut found,
    )
    .await;
    info!(apex, found = found.len(), "passive discovery finished");
    found.into_iter().collect()
}

/// Active discovery: shuffledns resolution against a wordlist.
pub async fn enumerate_active(
    apex: &str,
    wordlist: &str,
    resolvers: &str,
    timeout: Duration,
) -> Vec<String> {
    let mut found = BTreeSet::new();
    collect_lines(
        "shuffledns",
        &["-d", apex, "-list", wordlist, "-r", resolvers],
        timeout,
        &mut found,
    )
    .await;
    info!(apex, found = found.len(), "active discovery finished");
    found.into_iter().collect()
}

async fn collect_lines<S: AsRef<OsStr>>(
    tool: &str,
    args: &[S],
    timeout: Duration,
    into: &mut BTreeSet<String>,
) {
    let mut cmd = Command::new(tool);
    cmd.args(args).kill_on_drop(true);
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => {
            warn!(tool, error = %e, "discovery tool failed to run");
            return;
        }
        Err(_) => {
            warn!(tool, timeout_s = timeout.as_secs(), "discovery tool timed out");
            return;
        }
    };
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        let line = line.trim();
        if !line.is_empty() {
            into.insert(line.to_string());
        }
    }
}

/// Dedupe and sort raw tool output lines.
pub fn normalize_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
