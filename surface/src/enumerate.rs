//! The enumeration pipeline.
//!
//! One run: fingerprint the candidate batch (this decides which hosts are
//! alive), fan the per-host probes out concurrently with the apex-scoped ones
//! going through the run's cache, merge per hostname, port-scan the distinct
//! resolved IPs once, and persist everything as a single store batch.

use asset_store::{Db, DetailRecord, StoreError};
use http_fingerprint::HostFingerprint;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use surface_core::cache::ApexCache;
use surface_core::fanout::fan_out;
use surface_core::registrable_domain;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Deadline for single-host checks (method, posture, TLS).
    pub probe_timeout: Duration,
    /// Deadline for whole-batch tool invocations (fingerprint, port scan).
    pub batch_timeout: Duration,
    /// Deadline for one screenshot capture, browser launch included.
    pub screenshot_timeout: Duration,
    pub method_concurrency: usize,
    pub posture_concurrency: usize,
    pub screenshot_concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            probe_timeout: Duration::from_secs(3),
            batch_timeout: Duration::from_secs(300),
            screenshot_timeout: Duration::from_secs(10),
            method_concurrency: 20,
            posture_concurrency: 20,
            screenshot_concurrency: 10,
        }
    }
}

/// What one run did, for the caller's summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub candidates: usize,
    pub live: usize,
    pub dead: usize,
    pub written: usize,
    pub distinct_ips: usize,
}

/// Run the full pipeline for one batch of candidate hostnames.
///
/// Probe failures degrade single fields or hosts; the only error out of here
/// is the store's (notably `UnknownProgram`, which skips the whole batch).
pub async fn run(
    db: &mut Db,
    program: &str,
    hostnames: Vec<String>,
    opts: &PipelineOptions,
) -> Result<RunReport, StoreError> {
    let candidates = hostnames.len();
    let fingerprints = http_fingerprint::fingerprint_hosts(&hostnames, opts.batch_timeout).await;
    if fingerprints.is_empty() {
        info!(candidates, "fingerprint batch produced no live hosts");
        return Ok(RunReport { candidates, dead: candidates, ..Default::default() });
    }
    let live_hosts: Vec<String> = fingerprints.iter().map(|f| f.host.clone()).collect();
    info!(candidates, live = live_hosts.len(), "fingerprint batch complete");

    // One cache per run and per probe family; posture and TLS are identical
    // for every hostname under the same registrable domain.
    let posture_cache: Arc<ApexCache<String>> = Arc::new(ApexCache::new());
    let tls_cache: Arc<ApexCache<Option<String>>> = Arc::new(ApexCache::new());
    let resolver = Arc::new(mail_posture::resolver(opts.probe_timeout));
    let client = http_method::client(opts.probe_timeout);

    let (methods, postures, tls, screenshots) = tokio::join!(
        fan_out(live_hosts.clone(), opts.method_concurrency, |host| {
            let client = client.clone();
            async move { http_method::allowed_methods(&client, &host).await }
        }),
        fan_out(live_hosts.clone(), opts.posture_concurrency, |host| {
            let cache = posture_cache.clone();
            let resolver = resolver.clone();
            async move {
                let apex = registrable_domain(&host);
                let key = apex.clone();
                cache
                    .get_or_compute(&key, move || async move {
                        mail_posture::check(&resolver, &apex).await.to_string()
                    })
                    .await
            }
        }),
        fan_out(live_hosts.clone(), opts.posture_concurrency, |host| {
            let cache = tls_cache.clone();
            let deadline = opts.probe_timeout;
            async move {
                let apex = registrable_domain(&host);
                let key = apex.clone();
                cache
                    .get_or_compute(&key, move || async move {
                        tls_probe::probe(&apex, deadline).await.map(|p| p.to_string())
                    })
                    .await
            }
        }),
        fan_out(live_hosts.clone(), opts.screenshot_concurrency, |host| {
            let deadline = opts.screenshot_timeout;
            async move { screenshot::capture(&host, deadline).await }
        }),
    );

    let records = merge_results(&fingerprints, &methods, &postures, &tls, &screenshots);

    // Post-pass: one scan over the distinct IPs, attached per IP at write time.
    let distinct_ips: Vec<String> = records
        .values()
        .filter_map(|r| r.as_ref())
        .filter_map(|r| r.ip.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ports_by_ip = port_scan::scan_ips(&distinct_ips, opts.batch_timeout).await;

    let summary = db.write_batch(program, &records, &ports_by_ip)?;
    let report = RunReport {
        candidates,
        live: live_hosts.len(),
        dead: candidates - live_hosts.len(),
        written: summary.written,
        distinct_ips: distinct_ips.len(),
    };
    info!(
        written = report.written,
        dead = report.dead,
        ips = report.distinct_ips,
        "enumeration batch persisted"
    );
    Ok(report)
}

/// Join the probes' independent outputs into one aggregate per hostname.
///
/// Only hostnames present in the fingerprint output appear at all (the
/// dead-host filter). Each probe owns its fields, so later-joining results
/// never overwrite earlier ones; `open_ports` stays unset here and is filled
/// by the writer once the post-pass scan has resolved per-IP results.
pub fn merge_results(
    fingerprints: &[HostFingerprint],
    methods: &HashMap<String, String>,
    postures: &HashMap<String, String>,
    tls: &HashMap<String, Option<String>>,
    screenshots: &HashMap<String, Option<String>>,
) -> BTreeMap<String, Option<DetailRecord>> {
    let mut records = BTreeMap::new();
    for fp in fingerprints {
        let shot = screenshots.get(&fp.host).cloned().flatten();
        // phash is derived, never independently sourced: set iff the
        // screenshot is present and decodes
        let phash = shot.as_deref().and_then(screenshot::perceptual_hash);
        let record = DetailRecord {
            http_status: fp.status.clone(),
            ip: fp.ip.clone(),
            title: fp.title.clone(),
            technologies: if fp.technologies.is_empty() {
                None
            } else {
                Some(fp.technologies.join(", "))
            },
            open_ports: None,
            screenshot: shot,
            phash,
            mail_posture: postures.get(&fp.host).cloned(),
            tls: tls.get(&fp.host).cloned().flatten(),
            methods: methods.get(&fp.host).cloned(),
            comment: None,
        };
        records.insert(fp.host.clone(), Some(record));
    }
    records
}
