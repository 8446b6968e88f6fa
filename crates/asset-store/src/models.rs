use serde::{Deserialize, Serialize};

pub type ProgramId = i64;
pub type DomainId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRow {
    pub id: ProgramId,
    pub name: String,
    pub comment: Option<String>,
    pub urls: Option<String>,
}

/// The merged probe results for one hostname in one enumeration run.
/// `open_ports` stays unset until the post-pass port scan resolves it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub http_status: Option<String>,
    pub ip: Option<String>,
    pub title: Option<String>,
    pub technologies: Option<String>,
    pub open_ports: Option<String>,
    /// Screenshot bytes, base64-encoded at rest.
    pub screenshot: Option<String>,
    pub phash: Option<String>,
    pub mail_posture: Option<String>,
    pub tls: Option<String>,
    pub methods: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDetailRow {
    pub domain: String,
    pub detail: DetailRecord,
}

/// Outcome of one persisted enumeration batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Detail rows written.
    pub written: usize,
    /// Hostnames skipped because the run produced no data for them.
    pub skipped: usize,
}
