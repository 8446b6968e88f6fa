//! Post-pass port scan over an external `naabu` process.
//!
//! The scanner runs once per batch against the distinct set of resolved IPs,
//! never once per hostname: many subdomains behind one shared address (a CDN,
//! a load balancer) cost a single scan, and the result is attached at write
//! time to every hostname resolving there.

use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use surface_core::scratch::ScratchFile;
use tokio::process::Command;
use tracing::{debug, warn};

/// Scan a batch of IPs; returns IP -> sorted, deduplicated open ports.
/// Spawn failure, timeout, or empty output yield an empty map (no data).
pub async fn scan_ips(ips: &[String], timeout: Duration) -> HashMap<String, Vec<u16>> {
    if ips.is_empty() {
        return HashMap::new();
    }
    let list = match ScratchFile::with_lines("surface-naabu", ips) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "could not stage port-scan input file");
            return HashMap::new();
        }
    };
    let mut cmd = Command::new("naabu");
    cmd.args(["-l"])
        .arg(list.path())
        .args(["-retries", "1", "-ec", "-silent", "-s", "s"])
        .kill_on_drop(true);
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => {
            warn!(error = %e, "naabu failed to run");
            return HashMap::new();
        }
        Err(_) => {
            warn!(timeout_s = timeout.as_secs(), "naabu batch timed out");
            return HashMap::new();
        }
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        debug!(ips = ips.len(), "port scan returned no output");
        return HashMap::new();
    }
    parse_output(&stdout)
}

/// Parse `ip:port` lines into the per-IP port map.
pub fn parse_output(stdout: &str) -> HashMap<String, Vec<u16>> {
    let re = Regex::new(r"^(\d+\.\d+\.\d+\.\d+):(\d+)$").expect("port line pattern");
    let mut by_ip: HashMap<String, Vec<u16>> = HashMap::new();
    for line in stdout.lines() {
        let Some(caps) = re.captures(line.trim()) else {
            continue;
        };
        let Ok(port) = caps[2].parse::<u16>() else {
            continue;
        };
        by_ip.entry(caps[1].to_string()).or_default().push(port);
    }
    for ports in by_ip.values_mut() {
        ports.sort_unstable();
        ports.dedup();
    }
    by_ip
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_ports_by_ip_sorted() {
        let out = "1.2.3.4:443\n1.2.3.4:80\n5.6.7.8:22\n1.2.3.4:80\n";
        let map = parse_output(out);
        assert_eq!(map["1.2.3.4"], vec![80, 443]);
        assert_eq!(map["5.6.7.8"], vec![22]);
    }

    #[test]
    fn skips_noise_lines() {
        let out = "some banner\n1.2.3.4:8080\nhost.example.com:80\n1.2.3.4:notaport\n";
        let map = parse_output(out);
        assert_eq!(map.len(), 1);
        assert_eq!(map["1.2.3.4"], vec![8080]);
    }

    #[test]
    fn empty_output_is_an_empty_map() {
        assert!(parse_output("").is_empty());
    }

    #[test]
    fn out_of_range_ports_are_dropped() {
        let out = "1.2.3.4:70000\n1.2.3.4:443\n";
        let map = parse_output(out);
        assert_eq!(map["1.2.3.4"], vec![443]);
    }
}
