//! Batch liveness/fingerprint probe over an external `httpx` process.
//!
//! The fingerprint pass decides which hostnames are alive: a hostname absent
//! from its output is dropped from the run entirely. Its line format is
//! loosely structured and occasionally misorders the title and IP fields, so
//! the parser validates value shapes instead of trusting positions.

use regex::Regex;
use std::net::IpAddr;
use std::time::Duration;
use surface_core::scratch::ScratchFile;
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;

/// Per-host output of the fingerprint tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFingerprint {
    pub host: String,
    pub url: String,
    pub status: Option<String>,
    pub title: Option<String>,
    pub ip: Option<String>,
    pub technologies: Vec<String>,
}

/// Fingerprint a batch of hostnames. One live host per returned entry.
///
/// An empty vec means no data for every hostname in the batch: the tool
/// produced no output, failed to spawn, or overran `timeout`. Partial guesses
/// are never synthesized from a failed batch.
pub async fn fingerprint_hosts(hosts: &[String], timeout: Duration) -> Vec<HostFingerprint> {
    if hosts.is_empty() {
        return Vec::new();
    }
    let list = match ScratchFile::with_lines("surface-httpx", hosts) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "could not stage fingerprint input file");
            return Vec::new();
        }
    };
    let mut cmd = Command::new("httpx");
    cmd.args([
        "-ip", "-title", "-method", "-sc", "-td", "-tech-detect", "-silent", "-nc",
        "-timeout", "3", "-l",
    ])
    .arg(list.path())
    // a timed-out batch must not leave the tool running
    .kill_on_drop(true);
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => {
            warn!(error = %e, "httpx failed to run");
            return Vec::new();
        }
        Err(_) => {
            warn!(timeout_s = timeout.as_secs(), "httpx batch timed out");
            return Vec::new();
        }
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        debug!(hosts = hosts.len(), "fingerprint batch returned no output");
        return Vec::new();
    }
    parse_output(&stdout)
}

/// Parse the tool's stdout: one line per live host,
/// `URL [status] [method] [title] [ip] [tech, list]`.
pub fn parse_output(stdout: &str) -> Vec<HostFingerprint> {
    let re = Regex::new(r"(?P<url>https?://\S+) \[(?P<status>\d+)\] \[\w*\] \[(?P<title>.*?)\] \[(?P<ip>.*?)\] \[(?P<tech>.*?)\]")
        .expect("fingerprint line pattern");
    stdout
        .lines()
        .filter_map(|line| parse_line(&re, line))
        .collect()
}

fn parse_line(re: &Regex, line: &str) -> Option<HostFingerprint> {
    let caps = re.captures(line)?;
    let full_url = caps.name("url")?.as_str();
    let host = Url::parse(full_url).ok()?.host_str()?.to_string();

    let mut title = non_empty(caps.name("title"));
    let mut ip = non_empty(caps.name("ip"));
    // Field-order anomaly: a title that is a syntactically valid address
    // paired with an ip field that is not means the two arrived swapped.
    // If the ip field still isn't an address afterwards, leave it unset.
    if !is_ip(ip.as_deref()) {
        if is_ip(title.as_deref()) {
            std::mem::swap(&mut title, &mut ip);
        } else {
            ip = None;
        }
    }
    let technologies = non_empty(caps.name("tech"))
        .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    Some(HostFingerprint {
        host,
        url: full_url.to_string(),
        status: Some(caps.name("status")?.as_str().to_string()),
        title,
        ip,
        technologies,
    })
}

fn non_empty(m: Option<regex::Match<'_>>) -> Option<String> {
    m.map(|v| v.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_ip(value: Option<&str>) -> bool {
    value.map(|v| v.parse::<IpAddr>().is_ok()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_normal_line() {
        let out = "https://app.example.com [200] [GET] [Welcome] [1.2.3.4] [Nginx, React]\n";
        let parsed = parse_output(out);
        assert_eq!(parsed.len(), 1);
        let fp = &parsed[0];
        assert_eq!(fp.host, "app.example.com");
        assert_eq!(fp.status.as_deref(), Some("200"));
        assert_eq!(fp.title.as_deref(), Some("Welcome"));
        assert_eq!(fp.ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(fp.technologies, vec!["Nginx", "React"]);
    }

    #[test]
    fn swapped_title_and_ip_are_recognized_by_shape() {
        let out = "https://app.example.com [200] [GET] [1.2.3.4] [Welcome] []\n";
        let parsed = parse_output(out);
        assert_eq!(parsed[0].ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(parsed[0].title.as_deref(), Some("Welcome"));
    }

    #[test]
    fn an_ip_shaped_title_is_kept_when_the_ip_field_is_valid() {
        let out = "https://app.example.com [200] [GET] [10.0.0.1] [1.2.3.4] []\n";
        let parsed = parse_output(out);
        assert_eq!(parsed[0].title.as_deref(), Some("10.0.0.1"));
        assert_eq!(parsed[0].ip.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn a_line_with_no_valid_address_keeps_ip_unset() {
        let out = "https://app.example.com [200] [GET] [Welcome] [not-an-ip] []\n";
        let parsed = parse_output(out);
        assert_eq!(parsed[0].ip, None);
        assert_eq!(parsed[0].title.as_deref(), Some("Welcome"));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let out = "garbage line\nhttps://ok.example.com [301] [GET] [] [5.6.7.8] [Caddy]\n";
        let parsed = parse_output(out);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].host, "ok.example.com");
        assert_eq!(parsed[0].title, None);
    }

    #[test]
    fn empty_output_means_no_data_for_the_whole_batch() {
        assert!(parse_output("").is_empty());
        assert!(parse_output("\n\n").is_empty());
    }
}
