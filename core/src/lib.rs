//! Core utilities and shared types for the surface engine.

pub mod cache;
pub mod fanout;
pub mod scratch;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// A candidate hostname, as read from discovery output or user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(pub String);

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target(s.to_string())
    }
}

/// Second-level suffixes under which the registrable domain takes three labels.
const SECOND_LEVEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "co.jp", "ne.jp", "or.jp", "com.au",
    "net.au", "org.au", "co.nz", "com.br", "com.cn", "com.mx", "co.in", "co.za",
];

/// Strip a hostname to its registrable (apex) domain: `sub.a.example.com`
/// becomes `example.com`, `x.example.co.uk` becomes `example.co.uk`.
/// Inputs with fewer labels than an apex are returned unchanged.
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }
    let last_two = labels[labels.len() - 2..].join(".");
    if SECOND_LEVEL_SUFFIXES.contains(&last_two.as_str()) {
        labels[labels.len() - 3..].join(".")
    } else {
        last_two
    }
}
