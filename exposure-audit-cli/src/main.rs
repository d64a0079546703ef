//! `exposure-audit` command line interface.
//!
//! Three subcommands: `list-resources` scans one service from a recorded
//! snapshot and reports a verdict per resource, `evaluate` judges policy
//! documents given on disk without any enumeration, and `services` lists
//! the supported service keys.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::TryStreamExt;
use log::LevelFilter;

use exposure_audit_engine::{
    evaluate, ExposureVerdict, PolicyDocument, ResourceDescriptor, ResourceIdentity,
};
use exposure_audit_scan::{
    AdapterRegistry, AwsSession, Orchestrator, ReplayTransport, RetryTransport, ScanContext,
    ScanFinding, ServiceKey, Snapshot,
};

#[derive(Parser)]
#[command(name = "exposure-audit", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate one service's resources and report exposure per resource
    ListResources {
        /// Service to scan (see `services` for supported keys and aliases)
        #[arg(short, long)]
        service: String,

        /// Recorded API snapshot to scan from
        #[arg(long)]
        snapshot: PathBuf,

        /// Owning account id; taken from the snapshot or resolved via STS
        /// when omitted
        #[arg(long)]
        account_id: Option<String>,

        /// Region the resources live in
        #[arg(short, long, env = "AWS_REGION")]
        region: Option<String>,

        /// Named credentials profile for session resolution
        #[arg(long, env = "AWS_PROFILE")]
        profile: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,

        /// Concurrent policy fetches
        #[arg(long, default_value_t = 8)]
        workers: usize,
    },

    /// Evaluate policy documents from disk, without enumerating anything
    Evaluate {
        /// Policy document JSON file; repeat to combine several documents
        #[arg(long = "policy-file", required = true)]
        policy_files: Vec<PathBuf>,

        /// Account id that owns the resource the policies are attached to
        #[arg(long)]
        account_id: String,

        /// Action namespace to scope statements to (for example `s3`);
        /// all statements apply when omitted
        #[arg(short, long)]
        service: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },

    /// List supported service keys
    Services,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Plain,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Command::ListResources {
            service,
            snapshot,
            account_id,
            region,
            profile,
            format,
            workers,
        } => {
            list_resources(
                &service,
                &snapshot,
                account_id,
                region,
                profile.as_deref(),
                format,
                workers,
            )
            .await
        }
        Command::Evaluate {
            policy_files,
            account_id,
            service,
            format,
        } => evaluate_files(&policy_files, &account_id, service.as_deref(), format),
        Command::Services => {
            for key in ServiceKey::supported() {
                println!("{key}");
            }
            Ok(())
        }
    }
}

fn parse_service(input: &str) -> Result<ServiceKey> {
    input.parse().map_err(|_| {
        anyhow!(
            "unsupported service {input:?}; supported: {}",
            ServiceKey::supported().join(", ")
        )
    })
}

async fn list_resources(
    service: &str,
    snapshot_path: &std::path::Path,
    account_id: Option<String>,
    region: Option<String>,
    profile: Option<&str>,
    format: OutputFormat,
    workers: usize,
) -> Result<()> {
    let key = parse_service(service)?;
    let snapshot = Snapshot::from_path(snapshot_path)?;

    // Account and region: explicit flag, then snapshot metadata, then a
    // live STS session as the last resort.
    let (account_id, region) = match (
        account_id.or_else(|| snapshot.account_id.clone()),
        region.or_else(|| snapshot.region.clone()),
    ) {
        (Some(account), Some(region)) => (account, region),
        (account, region) => {
            let session = AwsSession::resolve(profile, region.as_deref())
                .await
                .context("account or region missing from flags and snapshot, and session resolution failed")?;
            (
                account.unwrap_or(session.account_id),
                region.unwrap_or(session.region),
            )
        }
    };

    let transport = Arc::new(RetryTransport::new(Arc::new(ReplayTransport::new(snapshot))));
    let registry = AdapterRegistry::new(transport, ScanContext::new(account_id, region));
    let orchestrator = Orchestrator::new(registry).with_workers(workers);

    let mut findings: Vec<ScanFinding> = orchestrator.scan(key).try_collect().await?;
    findings.sort_by(|a, b| {
        b.verdict
            .severity()
            .cmp(&a.verdict.severity())
            .then_with(|| a.identity.name.cmp(&b.identity.name))
    });

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&findings)?),
        OutputFormat::Plain => {
            for finding in &findings {
                let verdict = match &finding.verdict {
                    ExposureVerdict::Indeterminate(_) => "indeterminate".to_string(),
                    other => other.to_string(),
                };
                match &finding.reason {
                    Some(reason) => println!(
                        "{verdict}\t{}\t{}\t{reason}",
                        finding.service, finding.identity.name
                    ),
                    None => {
                        println!("{verdict}\t{}\t{}", finding.service, finding.identity.name);
                    }
                }
            }
        }
    }
    Ok(())
}

fn evaluate_files(
    policy_files: &[PathBuf],
    account_id: &str,
    service: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let namespace = match service {
        Some(service) => parse_service(service)?.action_namespace(),
        None => "",
    };

    let mut documents = Vec::with_capacity(policy_files.len());
    for path in policy_files {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let document = PolicyDocument::parse_str(&raw)
            .with_context(|| format!("could not parse {}", path.display()))?;
        documents.push(document);
    }

    let identity = ResourceIdentity::new("<policy>", None, account_id, "");
    let verdict = evaluate(&ResourceDescriptor::new(identity, namespace, documents));

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&verdict)?),
        OutputFormat::Plain => println!("{verdict}"),
    }

    if matches!(
        verdict,
        ExposureVerdict::Public | ExposureVerdict::CrossAccount(_)
    ) {
        std::process::exit(2);
    }
    Ok(())
}
