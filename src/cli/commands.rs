//! CLI command definitions for gauntlet.
//!
//! `run` drives the full evaluation against the remote model, `grade`
//! scores a stored submission offline and `prompt` prints the task the
//! agent is given.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::grading::Grader;
use crate::llm::{AnthropicClient, ANTHROPIC_BASE_URL, DEFAULT_MODEL};
use crate::runner::{
    save_report, EvaluationReport, EvaluationRunner, ExecutionMode, RunConfig, TrialOutcome,
};
use crate::sandbox::{PythonSandbox, SandboxConfig};
use crate::scaffold::{build_prompt, AgentConfig, ToolRegistry};

/// Characters of grader feedback shown per trial line.
const FEEDBACK_PREVIEW_CHARS: usize = 90;

/// Benchmark for autonomous agents repairing a cascading-fault data pipeline.
#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(about = "Benchmark an agent repairing a multi-tier defective pipeline")]
#[command(version)]
#[command(
    long_about = "gauntlet runs N independent agent trials against a defective process_batch routine,\ngrades each final submission through three escalating tiers plus validity and guardrail checks,\nand reports the pass rate against a 10-40% calibration band.\n\nExample usage:\n  gauntlet run --runs 10 --output ./report.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full evaluation against the remote model.
    Run(RunArgs),

    /// Grade a stored submission without involving the model.
    Grade(GradeArgs),

    /// Print the task prompt given to the agent.
    Prompt,
}

/// Arguments for `gauntlet run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Number of independent trials.
    #[arg(short = 'n', long, default_value = "10")]
    pub runs: usize,

    /// Await trials one by one instead of running them concurrently.
    #[arg(long)]
    pub sequential: bool,

    /// Model identifier sent with every request.
    #[arg(short = 'm', long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Step budget of each agent loop.
    #[arg(long, default_value = "18")]
    pub max_steps: usize,

    /// Token budget of each model call.
    #[arg(long, default_value = "3200")]
    pub max_tokens: u32,

    /// Python interpreter backing the sandbox.
    #[arg(long, default_value = "python3")]
    pub python: String,

    /// Wall-clock limit of a single sandbox call, in seconds.
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,

    /// Write the full evaluation report as JSON to this path.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Anthropic API key (can also be set via ANTHROPIC_API_KEY env var).
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Anthropic API base URL.
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = ANTHROPIC_BASE_URL)]
    pub base_url: String,
}

/// Arguments for `gauntlet grade`.
#[derive(Parser, Debug)]
pub struct GradeArgs {
    /// File holding the submitted routine.
    pub file: PathBuf,

    /// Python interpreter backing the sandbox.
    #[arg(long, default_value = "python3")]
    pub python: String,

    /// Wall-clock limit of a single sandbox call, in seconds.
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,

    /// Output the grade report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_evaluation_command(args).await,
        Commands::Grade(args) => run_grade_command(args).await,
        Commands::Prompt => {
            println!("{}", build_prompt());
            Ok(())
        }
    }
}

fn sandbox_for(python: &str, timeout_secs: u64) -> PythonSandbox {
    PythonSandbox::new(SandboxConfig::new(python).with_timeout(Duration::from_secs(timeout_secs)))
}

async fn run_evaluation_command(args: RunArgs) -> anyhow::Result<()> {
    let api_key = args.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!("Missing API key. Provide --api-key or set ANTHROPIC_API_KEY.")
    })?;
    let llm_client = AnthropicClient::new(api_key, args.base_url.clone())
        .context("Failed to initialize Anthropic client")?
        .with_default_model(args.model.clone());

    let sandbox = sandbox_for(&args.python, args.timeout_secs);
    if !sandbox.is_available().await {
        warn!(
            interpreter = %args.python,
            "Python interpreter not runnable; tool calls and grading will report harness errors"
        );
    }
    let sandbox = Arc::new(sandbox);

    let mode = if args.sequential {
        ExecutionMode::Sequential
    } else {
        ExecutionMode::Concurrent
    };
    let agent = AgentConfig::new()
        .with_model(args.model.clone())
        .with_max_steps(args.max_steps)
        .with_max_tokens(args.max_tokens);
    let config = RunConfig::new(args.runs).with_mode(mode).with_agent(agent);

    let runner = EvaluationRunner::new(
        Arc::new(llm_client),
        Arc::new(ToolRegistry::with_default_tools(sandbox.clone())),
        Arc::new(Grader::new(sandbox)),
        config,
    )
    .with_observer(print_trial);

    println!("🛡️  RESILIENCE GAUNTLET: CASCADING BUG HUNT");
    println!("Model: {}", args.model);
    println!("Runs:  {} ({})", args.runs, mode);
    println!();

    let report = runner.run_all(&build_prompt()).await;
    print_summary(&report);

    if let Some(path) = &args.output {
        save_report(&report, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
        println!("Report: {}", path.display());
    }

    Ok(())
}

async fn run_grade_command(args: GradeArgs) -> anyhow::Result<()> {
    let source = read_submission(&args.file)?;
    let sandbox = sandbox_for(&args.python, args.timeout_secs);
    if !sandbox.is_available().await {
        return Err(anyhow::anyhow!(
            "Python interpreter '{}' is not runnable",
            args.python
        ));
    }

    let report = Grader::new(Arc::new(sandbox)).grade(&source).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mark = if report.passed { "✅" } else { "❌" };
    println!("{} {:.0}% - {}", mark, report.score * 100.0, report.feedback);
    if let Some(details) = &report.details {
        for (name, ok) in details.entries() {
            println!("  {:<9} {}", name, if ok { "pass" } else { "fail" });
        }
    }
    Ok(())
}

fn read_submission(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_trial(trial: &TrialOutcome) {
    if !trial.has_submission() {
        match &trial.error {
            Some(error) => println!("❌ Run {}: no submission ({})", trial.trial_id, preview(error)),
            None => println!("❌ Run {}: no submission", trial.trial_id),
        }
        return;
    }
    let mark = if trial.passed { "✅" } else { "❌" };
    println!(
        "{} Run {}: {:.0}% - {}",
        mark,
        trial.trial_id,
        trial.score * 100.0,
        preview(&trial.feedback)
    );
}

fn print_summary(report: &EvaluationReport) {
    let aggregate = &report.aggregate;
    println!();
    println!("📊 RESULTS");
    println!(
        "Passed: {}/{} ({:.1}%)",
        aggregate.passed,
        aggregate.total,
        aggregate.pass_rate * 100.0
    );
    println!("Avg Score: {:.1}%", aggregate.mean_score * 100.0);
    if report.target_met {
        println!("✅ Target met");
    } else {
        println!("⚠️ Target {} not met yet", report.target);
    }
}

fn preview(text: &str) -> String {
    text.chars().take(FEEDBACK_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["gauntlet", "run", "--api-key", "k"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.runs, 10);
                assert!(!args.sequential);
                assert_eq!(args.model, DEFAULT_MODEL);
                assert_eq!(args.max_steps, 18);
                assert_eq!(args.max_tokens, 3200);
                assert_eq!(args.python, "python3");
                assert_eq!(args.timeout_secs, 30);
                assert!(args.output.is_none());
                assert_eq!(args.api_key.as_deref(), Some("k"));
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "gauntlet",
            "run",
            "-n",
            "3",
            "--sequential",
            "--max-steps",
            "5",
            "--output",
            "out.json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.runs, 3);
                assert!(args.sequential);
                assert_eq!(args.max_steps, 5);
                assert_eq!(args.output, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_grade_args() {
        let cli = Cli::try_parse_from(["gauntlet", "grade", "fix.py", "--json"]).unwrap();
        match cli.command {
            Commands::Grade(args) => {
                assert_eq!(args.file, PathBuf::from("fix.py"));
                assert!(args.json);
            }
            _ => panic!("expected grade"),
        }
    }

    #[test]
    fn test_preview_counts_chars() {
        let text = "✗ ".repeat(100);
        assert_eq!(preview(&text).chars().count(), FEEDBACK_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_read_submission_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_submission(&dir.path().join("absent.py")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
