//! CLI

use clap::{Parser, Subcommand};

use crate::api::Components;
use crate::pipeline::normalize_target_url;
use crate::policy::DomainPolicy;
use crate::runtime;
use crate::services::store::{LocalFsStore, MemoryStore, ScanStore};
use crate::tools::policy_links::extract_policy_links;
use crate::tools::registrar;
use crate::tools::signals::collect_signals;
use crate::tools::skus::extract_homepage_skus;
use crate::types::Domain;

#[derive(Parser)]
#[command(
    name = "riskintel",
    version,
    about = "Policy-gated domain recon and risk scoring"
)]
struct Cli {
    /// Persist scan output under the platform data dir instead of memory
    #[arg(long, global = true)]
    persist: bool,

    /// Scan id (defaults to one derived from the target domain)
    #[arg(long, global = true)]
    scan_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full Scan (signals, policy links, SKUs, assessment)
    Scan {
        /// URL or bare domain
        url: String,
    },

    /// Collect Signals
    Signals {
        /// URL or bare domain
        url: String,
    },

    /// Discover & Verify Policy Links
    Links {
        /// URL or bare domain
        url: String,
    },

    /// Extract Homepage SKUs
    Skus {
        /// URL or bare domain
        url: String,
    },

    /// Registrar Lookup (RDAP with WHOIS fallback)
    Registrar {
        /// Bare domain
        domain: String,
    },
}

fn default_scan_id(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.replace('.', "-")))
        .unwrap_or_else(|| "scan".to_string());
    format!("{host}-{}", chrono::Utc::now().format("%Y%m%d%H%M%S"))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let store: Box<dyn ScanStore> = if cli.persist {
        Box::new(LocalFsStore::new()?)
    } else {
        Box::new(MemoryStore::new())
    };
    let components = Components::new();
    let policy = DomainPolicy::default();

    runtime::block_on(async {
        match cli.command {
            Commands::Scan { url } => {
                let target = normalize_target_url(&url)?;
                let scan_id = cli.scan_id.unwrap_or_else(|| default_scan_id(&target));
                let outcome =
                    crate::api::scan_url(store.as_ref(), &scan_id, &target, &components).await;
                print_json(&serde_json::json!({
                    "scan_id": scan_id,
                    "assessment": outcome.assessment,
                    "signals": outcome.signals,
                    "policy_links": outcome.policy_links,
                    "skus_detected": outcome.skus_detected,
                    "error": outcome.error,
                }))
            }
            Commands::Signals { url } => {
                let target = normalize_target_url(&url)?;
                let scan_id = cli.scan_id.unwrap_or_else(|| default_scan_id(&target));
                let collected =
                    collect_signals(&scan_id, &target, &policy, store.as_ref(), None).await?;
                print_json(&collected.signals)
            }
            Commands::Links { url } => {
                let target = normalize_target_url(&url)?;
                let scan_id = cli.scan_id.unwrap_or_else(|| default_scan_id(&target));
                let outcome = extract_policy_links(
                    &scan_id,
                    &target,
                    &policy,
                    store.as_ref(),
                    None,
                    None,
                )
                .await?;
                print_json(&serde_json::json!({
                    "links": outcome.links,
                    "summary": outcome.summary,
                }))
            }
            Commands::Skus { url } => {
                let target = normalize_target_url(&url)?;
                let scan_id = cli.scan_id.unwrap_or_else(|| default_scan_id(&target));
                let outcome = extract_homepage_skus(
                    &scan_id,
                    &target,
                    &policy,
                    store.as_ref(),
                    None,
                )
                .await?;
                print_json(&serde_json::json!({
                    "items": outcome.items,
                    "summary": outcome.summary,
                }))
            }
            Commands::Registrar { domain } => {
                let domain = Domain::from_raw(&domain);
                let info = registrar::lookup(&domain.0).await;
                print_json(&info)
            }
        }
    })
}
