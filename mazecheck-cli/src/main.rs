//! Maze level verifier CLI
//!
//! Loads one or more level files, verifies each one and prints the report.
//!
//! # Usage
//!
//! ```bash
//! # Goal is room 4
//! mazecheck --goal 4 levels/castle.xml
//!
//! # Goal is the highest-numbered room, warnings fail too
//! mazecheck --goal-highest --strict levels/*.yaml
//!
//! # Goal and lints from a config file, JSON on stdout
//! MAZECHECK_CONFIG=mazecheck.yaml mazecheck --format json levels/castle.xml
//! ```
//!
//! Exit codes: 0 every map passes, 1 some map fails, 2 a map or the config
//! could not be loaded, 3 the verifier hit an internal error.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use mazecheck_core::{
    load_path, validate_with_config, GoalSpec, Report, RoomNumber, Severity, VerifierConfig,
    VerifyError,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "mazecheck")]
#[command(version)]
#[command(about = "Verify maze level integrity and solvability")]
#[command(long_about = None)]
struct Cli {
    /// Level files (.xml, .yaml, .yml, .json)
    #[arg(required = true)]
    maps: Vec<PathBuf>,

    /// Goal room; repeat to accept any of several rooms
    #[arg(long = "goal", value_name = "ROOM")]
    goals: Vec<RoomNumber>,

    /// Use the highest-numbered room as the goal
    #[arg(long, conflicts_with = "goals")]
    goal_highest: bool,

    /// Verifier configuration file (YAML)
    #[arg(long, env = "MAZECHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Fail on warnings as well as errors
    #[arg(long)]
    strict: bool,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Only print maps that fail
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut json_reports = Vec::new();
    match run(&cli, &mut json_reports) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            if cli.format == OutputFormat::Json {
                // Reports for maps verified before the failure are kept.
                let output = serde_json::json!({
                    "error": format!("{:#}", e),
                    "maps": json_reports,
                });
                println!("{}", output);
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::from(error_exit_code(&e))
        }
    }
}

fn error_exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<VerifyError>().is_some() {
        3
    } else {
        2
    }
}

/// Verify every map in order. Returns whether all of them passed.
///
/// In JSON mode each finished report is appended to `json_reports` as soon
/// as it exists, so a later failure does not lose it.
fn run(cli: &Cli, json_reports: &mut Vec<serde_json::Value>) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => VerifierConfig::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => VerifierConfig::default(),
    };
    if cli.strict {
        config.strict = true;
    }
    let goal = goal_spec(cli, &config)?;
    debug!(%goal, strict = config.strict, maps = cli.maps.len(), "starting verification");

    let mut all_passed = true;
    for path in &cli.maps {
        let report = verify_map(path, &goal, &config)?;
        all_passed &= report.passed();
        match cli.format {
            OutputFormat::Json => json_reports.push(serde_json::json!({
                "map": path.display().to_string(),
                "fingerprint": report.fingerprint(),
                "failure_reasons": report.failure_reasons(),
                "report": report,
            })),
            OutputFormat::Text => print_text(path, &report, cli.quiet),
            OutputFormat::Pretty => print_pretty(path, &report, cli.quiet),
        }
    }

    if cli.format == OutputFormat::Json {
        let output = serde_json::json!({ "passed": all_passed, "maps": &*json_reports });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serializing reports")?
        );
    }
    Ok(all_passed)
}

/// Flags win over the config file; there is no implicit goal.
fn goal_spec(cli: &Cli, config: &VerifierConfig) -> Result<GoalSpec> {
    if !cli.goals.is_empty() {
        let rooms: BTreeSet<RoomNumber> = cli.goals.iter().copied().collect();
        return Ok(match rooms.len() {
            1 => GoalSpec::Room(cli.goals[0]),
            _ => GoalSpec::AnyOf(rooms),
        });
    }
    if cli.goal_highest {
        return Ok(GoalSpec::HighestRoom);
    }
    match &config.goal {
        Some(goal) => Ok(goal.clone()),
        None => bail!("no goal given: pass --goal <ROOM>, --goal-highest, or set `goal` in the config"),
    }
}

fn verify_map(path: &Path, goal: &GoalSpec, config: &VerifierConfig) -> Result<Report> {
    let model = load_path(path).with_context(|| format!("loading {}", path.display()))?;
    let rooms = goal.resolve(&model);
    let report = validate_with_config(&model, &rooms, config)
        .with_context(|| format!("verifying {}", path.display()))?;
    Ok(report)
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_text(path: &Path, report: &Report, quiet: bool) {
    if quiet && report.passed() {
        return;
    }
    println!("{}: {}", path.display(), report.verdict);
    for reason in report.failure_reasons() {
        println!("  reason: {}", reason);
    }
    if quiet {
        return;
    }
    for issue in &report.issues {
        println!("  {}", issue);
    }
    for finding in &report.findings {
        println!("  {}", finding);
    }
}

fn print_pretty(path: &Path, report: &Report, quiet: bool) {
    if quiet && report.passed() {
        return;
    }
    let verdict = if report.passed() {
        report.verdict.to_string().green().bold()
    } else {
        report.verdict.to_string().red().bold()
    };
    println!(
        "{} {} ({} reachable room(s), {} error(s), {} warning(s))",
        verdict,
        path.display().to_string().bold(),
        report.reachable_rooms.len(),
        report.error_count(),
        report.warning_count()
    );
    for reason in report.failure_reasons() {
        println!("  {} {}", "→".red(), reason);
    }
    if quiet {
        return;
    }
    for issue in &report.issues {
        let label = match issue.severity {
            Severity::Error => "error".red(),
            Severity::Warning => "warning".yellow(),
        };
        println!(
            "  {}[{}] {}: {}",
            label,
            issue.kind,
            issue.subject_id.to_string().dimmed(),
            issue.message
        );
    }
    for finding in &report.findings {
        println!(
            "  {}[{}] {}: {}",
            "note".cyan(),
            finding.kind,
            finding.subject_id.to_string().dimmed(),
            finding.message
        );
    }
}
