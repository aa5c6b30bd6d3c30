//! `guardrail` command-line interface.
//!
//! Exit codes for `validate`:
//! - 0: content may be forwarded
//! - 2: content blocked
//! - 3: regeneration requested
//! - 4: held for human review
//! - 1: usage or I/O error

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use guardrail_core::{Content, Disposition, GuardRail, PatternCatalog, Policy, RuleKind};
use guardrail_runtime::{CheckpointService, RuntimeConfig};

#[derive(Parser)]
#[command(name = "guardrail", version, about = "Validate generated content against guardrail checkpoints")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate content and print the result as JSON
    Validate {
        /// Checkpoint definition (YAML or JSON)
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Content file, or "-" for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Parse the input as a JSON object
        #[arg(long)]
        structured: bool,

        /// Treat the checkpoint file as a policy document
        #[arg(long)]
        policy: bool,

        /// Runtime configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the regeneration budget
        #[arg(long)]
        retry_budget: Option<u32>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Load and check a definition without validating content
    Lint {
        file: PathBuf,

        /// Treat the file as a policy document and print the generated checkpoint
        #[arg(long)]
        policy: bool,
    },

    /// List the builtin sensitive-data patterns
    Patterns,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Validate {
            checkpoint,
            input,
            structured,
            policy,
            config,
            retry_budget,
            pretty,
        } => {
            let guardrail = load_guardrail(&checkpoint, policy)?;
            tracing::info!(
                checkpoint_id = %guardrail.checkpoint_id,
                version = %guardrail.version,
                rules = guardrail.rules.len(),
                "Loaded checkpoint"
            );
            let content = read_content(&input, structured)?;

            let mut config = match config {
                Some(path) => RuntimeConfig::from_yaml_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => RuntimeConfig::default(),
            };
            if let Some(budget) = retry_budget {
                config.engine.retry_budget = budget;
            }

            let service = CheckpointService::from_config(config);
            let result = service.validate(&guardrail, content).await;

            let json = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{}", json);

            Ok(ExitCode::from(exit_status(&result.disposition)))
        }
        Command::Lint { file, policy } => {
            let guardrail = load_guardrail(&file, policy)?;
            lint(&guardrail);
            if policy {
                print!("{}", serde_yaml::to_string(&guardrail)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Patterns => {
            let catalog = PatternCatalog::builtin();
            let patterns: Vec<PatternInfo> = catalog
                .iter()
                .map(|p| PatternInfo {
                    name: p.name(),
                    replacement: p.replacement(),
                    regex: p.regex().as_str(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&patterns)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[derive(Serialize)]
struct PatternInfo<'a> {
    name: &'a str,
    replacement: &'a str,
    regex: &'a str,
}

fn exit_status(disposition: &Disposition) -> u8 {
    match disposition {
        Disposition::Forward { .. } => 0,
        Disposition::Blocked { .. } => 2,
        Disposition::RetryRequested { .. } => 3,
        Disposition::PendingReview { .. } => 4,
    }
}

fn load_guardrail(path: &Path, policy: bool) -> Result<GuardRail> {
    if policy {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading policy {}", path.display()))?;
        let policy = Policy::from_yaml(&yaml)?;
        return Ok(policy.to_guardrail()?);
    }

    GuardRail::from_file(path).with_context(|| format!("loading checkpoint {}", path.display()))
}

fn read_content(input: &str, structured: bool) -> Result<Content> {
    let raw = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading input {}", input))?
    };

    parse_content(raw, structured)
}

fn parse_content(raw: String, structured: bool) -> Result<Content> {
    if !structured {
        return Ok(Content::text(raw));
    }

    let value: serde_json::Value = serde_json::from_str(&raw).context("parsing structured input")?;
    if !value.is_object() {
        bail!("structured input must be a JSON object");
    }
    Ok(Content::from_value(value))
}

fn lint(guardrail: &GuardRail) {
    for warning in lint_warnings(guardrail, &PatternCatalog::builtin()) {
        eprintln!("warning: {}", warning);
    }

    println!(
        "OK: {} v{} ({}): {} rules, {} disabled",
        guardrail.checkpoint_id,
        guardrail.version,
        guardrail.mode,
        guardrail.rules.len(),
        guardrail.disabled_count()
    );
}

/// Rules that will fail closed at evaluation time.
fn lint_warnings(guardrail: &GuardRail, catalog: &PatternCatalog) -> Vec<String> {
    let mut warnings = Vec::new();

    for rule in &guardrail.rules {
        match &rule.kind {
            RuleKind::Unrecognized(kind) => {
                warnings.push(format!("rule '{}' has unrecognized kind '{}'", rule.id, kind));
            }
            RuleKind::PatternMatch => {
                let names = rule
                    .params
                    .get("patterns")
                    .and_then(|v| v.as_array())
                    .into_iter()
                    .flatten()
                    .filter_map(|v| v.as_str());
                for name in names {
                    if !catalog.contains(name) {
                        warnings.push(format!(
                            "rule '{}' references unknown pattern '{}'",
                            rule.id, name
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    warnings
}
