//! Allowed-method probe: OPTIONS over HTTPS and HTTP independently.

use reqwest::{header, Client, Method};
use std::time::Duration;
use tracing::debug;

pub const NO_METHODS: &str = "No methods found";

/// Canonical method order for rendering the union.
const KNOWN_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS", "PATCH", "TRACE", "CONNECT",
];

pub fn client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(format!("surface/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("client")
}

/// Probe both schemes for one hostname and report the union of allowed
/// methods found on whichever responded; [`NO_METHODS`] if neither did.
pub async fn allowed_methods(client: &Client, host: &str) -> String {
    let https_url = format!("https://{}", host);
    let http_url = format!("http://{}", host);
    let (https, http) = tokio::join!(
        fetch_allow(client, &https_url),
        fetch_allow(client, &http_url),
    );
    let mut found = Vec::new();
    for allow in [https, http].into_iter().flatten() {
        for m in allow.split(',') {
            let m = m.trim().to_ascii_uppercase();
            if !m.is_empty() && !found.contains(&m) {
                found.push(m);
            }
        }
    }
    render_union(found)
}

async fn fetch_allow(client: &Client, url: &str) -> Option<String> {
    match client.request(Method::OPTIONS, url).send().await {
        Ok(resp) => resp
            .headers()
            .get(header::ALLOW)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        Err(e) => {
            debug!(url, error = %e, "method probe got no response");
            None
        }
    }
}

fn render_union(found: Vec<String>) -> String {
    if found.is_empty() {
        return NO_METHODS.to_string();
    }
    let mut ordered: Vec<&str> = KNOWN_METHODS
        .iter()
        .copied()
        .filter(|m| found.iter().any(|f| f == m))
        .collect();
    // nonstandard verbs go last, in arrival order
    let extras: Vec<&str> = found
        .iter()
        .filter(|f| !KNOWN_METHODS.contains(&f.as_str()))
        .map(String::as_str)
        .collect();
    ordered.extend(extras);
    ordered.join(", ")
}
