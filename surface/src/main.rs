use anyhow::Result;
use asset_store::{parse_filters, Db, StoreError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

mod config;
mod enumerate;

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Debug, Parser)]
#[command(name = "surface", version, about = "Attack-surface enumeration over external probes")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./surface.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path (default: ./surface.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Enumerate candidate hostnames for a program and persist the results
    Enumerate {
        /// Program the domains belong to (created on first reference)
        program: String,
        /// Hostnames, or *.example.com wildcards expanded via discovery
        domains: Vec<String>,
        /// Expand wildcards with active resolution (shuffledns) instead of
        /// passive sources
        #[arg(long, default_value_t = false)]
        active: bool,
        /// Wordlist for active discovery
        #[arg(long)]
        wordlist: Option<String>,
        /// Resolver list for active discovery
        #[arg(long)]
        resolvers: Option<String>,
        /// Timeout per single-host probe in milliseconds
        #[arg(long)]
        probe_timeout_ms: Option<u64>,
        /// Timeout per batch tool invocation in milliseconds
        #[arg(long)]
        batch_timeout_ms: Option<u64>,
        /// Timeout per screenshot capture in milliseconds
        #[arg(long)]
        screenshot_timeout_ms: Option<u64>,
        /// Max concurrent method probes
        #[arg(long)]
        method_concurrency: Option<usize>,
        /// Max concurrent posture/TLS probes
        #[arg(long)]
        posture_concurrency: Option<usize>,
        /// Max concurrent screenshot captures
        #[arg(long)]
        screenshot_concurrency: Option<usize>,
    },
    /// Create a program (no-op if it exists)
    AddProgram { name: String },
    /// Append a URL to a program's aggregated URL list
    AddUrl { program: String, url: String },
    /// Attach a comment to a program or a domain
    Annotate {
        #[arg(value_parser = ["program", "domain"])]
        kind: String,
        name: String,
        /// Comment text (joined with spaces)
        #[arg(required = true)]
        comment: Vec<String>,
    },
    /// Remove programs or domains (domains accept *.example.com patterns)
    Rm {
        #[arg(value_parser = ["program", "domain"])]
        kind: String,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List programs, or a program's domains, distinct IPs, or URLs
    List {
        #[arg(value_parser = ["programs", "domains", "ips", "urls"])]
        what: String,
        #[arg(long)]
        program: Option<String>,
        /// Detail filters, e.g. http_status:200,techno:nginx
        #[arg(long)]
        filter: Option<String>,
    },
    /// Search a program's stored details for a substring
    Search { program: String, text: String },
    /// Count a program's domains
    Count { program: String },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("surface=info,port_scan=info,http_fingerprint=info,domain_discovery=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_db(cli_db: Option<PathBuf>, cfg: &Option<config::Config>) -> Result<Db> {
    let path = cli_db
        .or_else(|| cfg.as_ref().and_then(|c| c.db.clone()))
        .unwrap_or_else(|| PathBuf::from("surface.db"));
    Db::open_or_create(path)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let loaded_cfg = config::load_config(cli.config.as_deref());

    match cli.command {
        Commands::Version => {
            println!("surface {} (core {})", env!("CARGO_PKG_VERSION"), surface_core::version());
        }
        Commands::AddProgram { name } => {
            let db = open_db(cli.db, &loaded_cfg)?;
            db.add_program(&name)?;
            println!("program '{}' added", name);
        }
        Commands::AddUrl { program, url } => {
            let db = open_db(cli.db, &loaded_cfg)?;
            match db.append_url(&program, &url) {
                Ok(()) => println!("url added to '{}'", program),
                Err(StoreError::UnknownProgram(name)) => eprintln!("program '{}' not found", name),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Annotate { kind, name, comment } => {
            let db = open_db(cli.db, &loaded_cfg)?;
            let comment = comment.join(" ");
            let updated = match kind.as_str() {
                "program" => db.set_program_comment(&name, &comment)?,
                _ => db.set_domain_comment(&name, &comment)?,
            };
            if updated {
                println!("comment added to {} '{}'", kind, name);
            } else {
                eprintln!("{} '{}' not found", kind, name);
            }
        }
        Commands::Rm { kind, names } => {
            let db = open_db(cli.db, &loaded_cfg)?;
            for name in names {
                match kind.as_str() {
                    "program" => {
                        if db.remove_program(&name)? {
                            println!("program '{}' and its domains removed", name);
                        } else {
                            eprintln!("program '{}' not found", name);
                        }
                    }
                    _ => {
                        let n = db.remove_domains(&name)?;
                        if n > 0 {
                            println!("{} domain(s) matching '{}' removed", n, name);
                        } else {
                            eprintln!("no domains matching '{}'", name);
                        }
                    }
                }
            }
        }
        Commands::List { what, program, filter } => {
            let db = open_db(cli.db, &loaded_cfg)?;
            let filters = filter.as_deref().map(parse_filters).unwrap_or_default();
            if what == "programs" {
                for p in db.list_programs()? {
                    match p.comment {
                        Some(com) => println!("{}\t# {}", p.name, com),
                        None => println!("{}", p.name),
                    }
                }
            } else {
                let program = program
                    .ok_or_else(|| anyhow::anyhow!("--program is required to list {}", what))?;
                let outcome = match what.as_str() {
                    "domains" => db.list_domains(&program, &filters).map(print_lines),
                    "ips" => db.list_ips(&program, &filters).map(print_lines),
                    _ => db.list_urls(&program).map(print_lines),
                };
                match outcome {
                    Ok(()) => {}
                    Err(StoreError::UnknownProgram(name)) => {
                        eprintln!("program '{}' not found", name)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Commands::Search { program, text } => {
            let db = open_db(cli.db, &loaded_cfg)?;
            match db.search(&program, &text) {
                Ok(rows) if rows.is_empty() => println!("no matches for '{}'", text),
                Ok(rows) => {
                    for row in rows {
                        let d = &row.detail;
                        println!(
                            "{}\tstatus={}\tip={}\ttitle={}\ttech={}\tports={}\tspf/dmarc={}\ttls={}\tmethods={}{}",
                            row.domain,
                            d.http_status.as_deref().unwrap_or("-"),
                            d.ip.as_deref().unwrap_or("-"),
                            d.title.as_deref().unwrap_or("-"),
                            d.technologies.as_deref().unwrap_or("-"),
                            d.open_ports.as_deref().unwrap_or("-"),
                            d.mail_posture.as_deref().unwrap_or("-"),
                            d.tls.as_deref().unwrap_or("-"),
                            d.methods.as_deref().unwrap_or("-"),
                            d.comment.as_deref().map(|c| format!("\t# {}", c)).unwrap_or_default(),
                        );
                    }
                }
                Err(StoreError::UnknownProgram(name)) => eprintln!("program '{}' not found", name),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Count { program } => {
            let db = open_db(cli.db, &loaded_cfg)?;
            match db.domain_count(&program) {
                Ok(n) => println!("{}", n),
                Err(StoreError::UnknownProgram(name)) => eprintln!("program '{}' not found", name),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Enumerate {
            program,
            domains,
            active,
            wordlist,
            resolvers,
            probe_timeout_ms,
            batch_timeout_ms,
            screenshot_timeout_ms,
            method_concurrency,
            posture_concurrency,
            screenshot_concurrency,
        } => {
            if domains.is_empty() {
                return Err(anyhow::anyhow!("provide at least one domain or *.wildcard"));
            }
            let enum_cfg = loaded_cfg
                .as_ref()
                .and_then(|c| c.enumerate.clone())
                .unwrap_or_default();
            let defaults = enumerate::PipelineOptions::default();
            let opts = enumerate::PipelineOptions {
                probe_timeout: pick_ms(probe_timeout_ms, enum_cfg.probe_timeout_ms, defaults.probe_timeout),
                batch_timeout: pick_ms(batch_timeout_ms, enum_cfg.batch_timeout_ms, defaults.batch_timeout),
                screenshot_timeout: pick_ms(
                    screenshot_timeout_ms,
                    enum_cfg.screenshot_timeout_ms,
                    defaults.screenshot_timeout,
                ),
                method_concurrency: method_concurrency
                    .or(enum_cfg.method_concurrency)
                    .unwrap_or(defaults.method_concurrency),
                posture_concurrency: posture_concurrency
                    .or(enum_cfg.posture_concurrency)
                    .unwrap_or(defaults.posture_concurrency),
                screenshot_concurrency: screenshot_concurrency
                    .or(enum_cfg.screenshot_concurrency)
                    .unwrap_or(defaults.screenshot_concurrency),
            };
            let wordlist = wordlist.or(enum_cfg.wordlist);
            let resolvers = resolvers.or(enum_cfg.resolvers);

            let mut db = open_db(cli.db, &loaded_cfg)?;
            db.add_program(&program)?;

            let started = Instant::now();
            let started_at = now_rfc3339();
            let rt = tokio::runtime::Runtime::new()?;
            let report = rt.block_on(async {
                let candidates =
                    expand_candidates(domains, active, wordlist.as_deref(), resolvers.as_deref(), &opts)
                        .await;
                println!("{} candidate hostname(s)", candidates.len());
                enumerate::run(&mut db, &program, candidates, &opts).await
            });
            match report {
                Ok(r) => {
                    println!(
                        "done: {} live, {} dead, {} stored, {} distinct IP(s) scanned (started {}, took {:.1}s)",
                        r.live,
                        r.dead,
                        r.written,
                        r.distinct_ips,
                        started_at,
                        started.elapsed().as_secs_f64()
                    );
                }
                Err(StoreError::UnknownProgram(name)) => {
                    eprintln!("program '{}' disappeared before the batch was written; nothing stored", name);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

/// Expand the command's domain arguments: wildcards go through discovery,
/// plain hostnames pass through. Deduplicated and sorted.
async fn expand_candidates(
    domains: Vec<String>,
    active: bool,
    wordlist: Option<&str>,
    resolvers: Option<&str>,
    opts: &enumerate::PipelineOptions,
) -> Vec<String> {
    let mut candidates = std::collections::BTreeSet::new();
    for domain in domains {
        if let Some(apex) = domain.strip_prefix("*.") {
            let found = if active {
                let (Some(wordlist), Some(resolvers)) = (wordlist, resolvers) else {
                    eprintln!("active discovery needs --wordlist and --resolvers; skipping '{}'", domain);
                    continue;
                };
                domain_discovery::enumerate_active(apex, wordlist, resolvers, opts.batch_timeout).await
            } else {
                domain_discovery::enumerate_passive(apex, opts.batch_timeout).await
            };
            println!("{} domain(s) found under {}", found.len(), apex);
            candidates.extend(found);
        } else {
            candidates.insert(domain);
        }
    }
    candidates.into_iter().collect()
}

fn pick_ms(flag: Option<u64>, cfg: Option<u64>, default: Duration) -> Duration {
    flag.or(cfg).map(Duration::from_millis).unwrap_or(default)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}
