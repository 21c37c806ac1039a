use chrono::Utc;
use clap::Parser;
use comfy_table::Table;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use strum_macros::{Display, EnumString};
use tracing::warn;
use url::Url;

use certcheck::config::Config;
use certcheck::metrics::prom::push_metrics;
use certcheck::{TlsFetcher, ValidationError, ValidationResult, Validator};

const DEFAULT_CONFIG_FILE: &str = "certcheck.toml";

#[derive(Parser, Debug)]
#[command(name = "certcheck", version, about, long_about = None)]
struct Args {
    /// Domains to validate. URLs are reduced to their host.
    domains: Vec<String>,

    /// Output format: summary, text or json
    #[arg(short, long)]
    output: Option<String>,

    /// Exit code when any domain is expired, mismatched or unreachable
    #[arg(long)]
    exit_code: Option<i32>,

    /// Connect/handshake timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Push results to a Prometheus Push Gateway
    #[arg(long)]
    prometheus: bool,

    /// Prometheus Push Gateway address
    #[arg(long)]
    prometheus_address: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum OutputFormat {
    Summary,
    Text,
    Json,
}

type Outcome = (usize, String, Result<ValidationResult, ValidationError>);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            exit(2);
        }
    };

    let domains: Vec<String> = config
        .domains
        .clone()
        .unwrap_or_default()
        .iter()
        .map(|d| normalize_domain(d))
        .collect();
    if domains.is_empty() {
        eprintln!("No domains given. Pass them as arguments or set `domains` in the config file.");
        exit(2);
    }

    let output = config.output.as_deref().unwrap_or("summary");
    let format = match OutputFormat::from_str(output) {
        Ok(format) => format,
        Err(_) => {
            eprintln!("Unknown output format: {}", output);
            exit(2);
        }
    };

    let timeout = match config.timeout() {
        Ok(timeout) => timeout,
        Err(e) => {
            eprintln!("{}", e);
            exit(2);
        }
    };

    let validator = Arc::new(Validator::new(TlsFetcher::new(timeout)));
    let outcomes = validate_all(validator, domains);

    match format {
        OutputFormat::Summary => print_summary(&outcomes),
        OutputFormat::Text => print_text(&outcomes),
        OutputFormat::Json => print_json(&outcomes),
    }

    if config.prometheus_enabled() {
        let results: Vec<ValidationResult> = outcomes
            .iter()
            .filter_map(|(_, _, r)| r.as_ref().ok().cloned())
            .collect();
        if let Err(e) = push_metrics(&results, &config.prometheus_address(), Utc::now()) {
            warn!(error = %e, "failed to push metrics to prometheus");
        }
    }

    let failed = outcomes.iter().any(|(_, _, r)| match r {
        Ok(result) => result.is_expired() || !result.valid_for_domain,
        Err(_) => true,
    });
    exit(if failed {
        config.exit_code.unwrap_or(0)
    } else {
        0
    });
}

/// Defaults < config file < command line.
fn load_config(args: &Args) -> Result<Config, certcheck::config::ConfigError> {
    let file_config = match &args.config {
        Some(path) => Some(Config::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Some(Config::from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => None,
    };

    let cli_config = Config::from_cli_args(
        if args.domains.is_empty() {
            None
        } else {
            Some(args.domains.clone())
        },
        args.output.clone(),
        args.exit_code,
        args.timeout,
        if args.prometheus { Some(true) } else { None },
        args.prometheus_address.clone(),
    );

    let mut config = Config::default();
    if let Some(file_config) = file_config {
        config = config.merge_with(file_config);
    }
    Ok(config.merge_with(cli_config))
}

/// `https://example.com:8443/path` -> `example.com`. Anything that is not a
/// URL with a host is used as given.
fn normalize_domain(input: &str) -> String {
    if !input.contains("://") {
        return input.to_string();
    }
    Url::parse(input)
        .ok()
        .and_then(|url| url.host_str().map(String::from))
        .unwrap_or_else(|| input.to_string())
}

/// One thread per domain; results come back over a channel and are put
/// back in argument order.
fn validate_all(validator: Arc<Validator>, domains: Vec<String>) -> Vec<Outcome> {
    let (sender, receiver): (Sender<Outcome>, Receiver<Outcome>) = mpsc::channel();
    let domains_len = domains.len();

    for (index, domain) in domains.into_iter().enumerate() {
        let thread_tx = sender.clone();
        let validator = Arc::clone(&validator);
        thread::spawn(move || {
            let result = validator.validate(&domain);
            let _ = thread_tx.send((index, domain, result));
        });
    }
    drop(sender);

    let mut outcomes: Vec<Outcome> = Vec::with_capacity(domains_len);
    for outcome in receiver {
        outcomes.push(outcome);
    }
    outcomes.sort_by_key(|(index, _, _)| *index);
    outcomes
}

fn print_summary(outcomes: &[Outcome]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Domain",
        "Status",
        "Expires",
        "Days left",
        "Valid for domain",
        "Issuer",
    ]);
    let now = Utc::now();
    for (_, domain, result) in outcomes {
        match result {
            Ok(r) => table.add_row(vec![
                domain.clone(),
                r.validity_status.to_string(),
                r.expiration_date.to_rfc3339(),
                r.days_remaining(now).to_string(),
                r.valid_for_domain.to_string(),
                r.issuer_details
                    .organization()
                    .or_else(|| r.issuer_details.common_name())
                    .unwrap_or("None")
                    .to_string(),
            ]),
            Err(e) => table.add_row(vec![
                domain.clone(),
                "Error".to_string(),
                e.to_string(),
                String::new(),
                String::new(),
                String::new(),
            ]),
        };
    }
    println!("{}", table);
}

fn print_text(outcomes: &[Outcome]) {
    let now = Utc::now();
    for (_, domain, result) in outcomes {
        println!("--------------------------------------");
        println!("Domain: {}", domain);
        let r = match result {
            Ok(r) => r,
            Err(e) => {
                println!("Error: {}", e);
                continue;
            }
        };
        println!("Validity status: {}", r.validity_status);
        println!("Valid from: {}", r.valid_from.to_rfc3339());
        println!("Expiration date: {}", r.expiration_date.to_rfc3339());
        println!("Days left: {}", r.days_remaining(now));
        println!("Valid for domain: {}", r.valid_for_domain);
        println!("Subject Name:");
        for attr in r.subject_details.iter() {
            println!("\t{}: {}", attr.label, attr.value);
        }
        println!("Issuer Name:");
        for attr in r.issuer_details.iter() {
            println!("\t{}: {}", attr.label, attr.value);
        }
        println!("Subject Alternative Names:");
        for san in &r.subject_alt_names {
            println!("\tDNS Name: {}", san);
        }
    }
}

fn print_json(outcomes: &[Outcome]) {
    let values: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|(_, domain, result)| match result {
            Ok(r) => serde_json::to_value(r).unwrap_or_else(|e| {
                serde_json::json!({ "domain": domain, "error": e.to_string() })
            }),
            Err(e) => serde_json::json!({ "domain": domain, "error": e.to_string() }),
        })
        .collect();
    match serde_json::to_string_pretty(&values) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render JSON: {}", e),
    }
}
