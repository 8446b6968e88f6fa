//! SPF/DMARC posture for a registrable domain.
//!
//! Two independent TXT lookups: the apex itself for SPF and the `_dmarc.`
//! label for DMARC. Posture is scoped to the apex, so callers memoize it per
//! registrable domain rather than probing every subdomain.

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Presence of the two mail-authentication records. A failed lookup counts
/// as absent; the probe itself never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailPosture {
    pub spf: bool,
    pub dmarc: bool,
}

impl fmt::Display for MailPosture {
    /// Compact two-symbol rendering, SPF first: `✔ ✘`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", symbol(self.spf), symbol(self.dmarc))
    }
}

fn symbol(present: bool) -> char {
    if present {
        '✔'
    } else {
        '✘'
    }
}

pub fn resolver(timeout: Duration) -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
}

/// Check both records for one apex domain.
pub async fn check(resolver: &TokioAsyncResolver, apex: &str) -> MailPosture {
    let dmarc_name = format!("_dmarc.{}", apex);
    let (spf_txt, dmarc_txt) = tokio::join!(
        resolver.txt_lookup(apex.to_string()),
        resolver.txt_lookup(dmarc_name),
    );
    let spf = match spf_txt {
        Ok(records) => records.iter().any(|r| r.to_string().starts_with("v=spf1")),
        Err(e) => {
            debug!(apex, error = %e, "spf lookup failed");
            false
        }
    };
    let dmarc = match dmarc_txt {
        Ok(records) => records.iter().any(|r| r.to_string().starts_with("v=DMARC1")),
        Err(e) => {
            debug!(apex, error = %e, "dmarc lookup failed");
            false
        }
    };
    MailPosture { spf, dmarc }
}

/// Classify raw TXT record sets, one per lookup.
pub fn classify(spf_records: &[String], dmarc_records: &[String]) -> MailPosture {
    MailPosture {
        spf: spf_records.iter().any(|r| r.starts_with("v=spf1")),
        dmarc: dmarc_records.iter().any(|r| r.starts_with("v=DMARC1")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_record_prefixes_independently() {
        let posture = classify(
            &["v=spf1 include:_spf.example.com ~all".to_string()],
            &[],
        );
        assert_eq!(posture, MailPosture { spf: true, dmarc: false });

        let posture = classify(
            &["unrelated txt".to_string()],
            &["v=DMARC1; p=reject;".to_string()],
        );
        assert_eq!(posture, MailPosture { spf: false, dmarc: true });
    }

    #[test]
    fn renders_two_symbols_spf_first() {
        assert_eq!(MailPosture { spf: true, dmarc: true }.to_string(), "✔ ✔");
        assert_eq!(MailPosture { spf: true, dmarc: false }.to_string(), "✔ ✘");
        assert_eq!(MailPosture { spf: false, dmarc: false }.to_string(), "✘ ✘");
    }

    #[test]
    fn a_dmarc_policy_in_spf_position_does_not_count_as_spf() {
        let posture = classify(&["v=DMARC1; p=none".to_string()], &[]);
        assert_eq!(posture, MailPosture { spf: false, dmarc: false });
    }
}
