//! CLI command definitions for prompt-forge.
//!
//! Two subcommands: `optimize` runs the assess/improve loop on a prompt and
//! `generate` sends a single raw prompt to the configured model.

use crate::llm::{
    GenerationOptions, LiteLlmClient, LlmProvider, DEFAULT_MODEL, OPENROUTER_API_BASE,
};
use crate::optimizer::{
    load_metrics_file, Metric, OptimizationReport, OptimizerConfig, PromptOptimizer,
    RatingSystem, RunGuard, DEFAULT_OPTIMIZATION_GOAL,
};
use crate::prompt::Prompt;
use crate::utils::strip_code_fences;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Output hint added to `generate` prompts when JSON output is requested.
const JSON_OUTPUT_HINT: &str = "Please provide your response in JSON format.";

/// Iterative prompt optimizer driven by an LLM grader.
#[derive(Parser)]
#[command(name = "prompt-forge")]
#[command(about = "Optimize prompts by letting an LLM grade and rewrite them")]
#[command(version)]
#[command(
    long_about = "prompt-forge scores a prompt against a task with an LLM, asks the LLM for an incremental and a bold rewrite, keeps the more promising one and repeats until the rating goal or the iteration cap is reached.\n\nExample usage:\n  prompt-forge optimize --task \"Opening of a mystery novel\" --rating-system numerical --threshold 0.85 \"Write a mystery opening\""
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
    /// Iteratively assess and rewrite a prompt.
    #[command(alias = "opt")]
    Optimize(OptimizeArgs),

    /// Send a prompt to the model and print the response.
    #[command(alias = "gen")]
    Generate(GenerateArgs),
}

/// Provider connection flags shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct ProviderArgs {
    /// Model used for generation.
    #[arg(short = 'm', long, env = "LITELLM_DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of an OpenAI-compatible API (defaults to OpenRouter).
    #[arg(long, env = "LITELLM_API_BASE")]
    pub api_base: Option<String>,

    /// API key (can also be set via OPENROUTER_API_KEY or LITELLM_API_KEY env var).
    #[arg(long, env = "OPENROUTER_API_KEY")]
    pub api_key: Option<String>,
}

/// Arguments for `prompt-forge optimize`.
#[derive(Parser, Debug)]
pub struct OptimizeArgs {
    /// The prompt to optimize.
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,

    /// What the prompt must accomplish (defaults to the prompt text).
    #[arg(short = 't', long)]
    pub task: Option<String>,

    /// What "better" means for this run.
    #[arg(short = 'g', long, default_value = DEFAULT_OPTIMIZATION_GOAL)]
    pub goal: String,

    /// Maximum number of rewrite rounds.
    #[arg(short = 'i', long, default_value_t = 5)]
    pub iterations: u32,

    /// Number of previous rounds shown to the model.
    #[arg(long, default_value_t = 2)]
    pub memory: usize,

    /// Custom metric as "Name: description" (repeatable).
    #[arg(long = "metric")]
    pub metrics: Vec<Metric>,

    /// YAML file with a list of {name, description} metrics.
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Success criterion: numerical or letter. Unset runs until the iteration cap.
    #[arg(short = 'r', long)]
    pub rating_system: Option<RatingSystem>,

    /// Fraction of the 20-point scale required by the numerical rating system.
    #[arg(long, default_value_t = 0.8)]
    pub threshold: f64,

    /// Retries after a transient provider failure.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Delay between attempts in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub retry_delay_ms: u64,

    /// Deadline for the whole run in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Timeout for each model call in seconds.
    #[arg(long)]
    pub call_timeout_secs: Option<u64>,

    /// Provider connection flags.
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Print the full report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Also print run details and the winning assessment.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Arguments for `prompt-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// The prompt to send.
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,

    /// Directive to attach to the prompt (repeatable).
    #[arg(short = 'd', long = "directive")]
    pub directives: Vec<String>,

    /// Structured output format.
    #[arg(long, value_parser = ["json"])]
    pub output_format: Option<String>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Maximum tokens to generate.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Provider connection flags.
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Print the rendered prompt before the response.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Parse command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with already-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Optimize(args) => run_optimize_command(args).await,
        Commands::Generate(args) => run_generate_command(args).await,
    }
}

async fn run_optimize_command(args: OptimizeArgs) -> anyhow::Result<()> {
    let prompt_text = args.prompt.join(" ");
    let config = build_optimizer_config(&args, &prompt_text)?;
    let llm = build_llm_client(&args.provider)?;

    info!(
        model = %args.provider.model,
        iterations = config.max_iterations,
        memory = config.history_size,
        "Starting optimize command"
    );

    let mut optimizer = PromptOptimizer::new(llm, config)?;
    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());

    let result = optimizer
        .optimize(Prompt::new(prompt_text.clone()), &cancel)
        .await;
    interrupt.abort();

    let report = result?;
    print_report(&report, &args, &prompt_text)
}

fn build_optimizer_config(args: &OptimizeArgs, prompt_text: &str) -> anyhow::Result<OptimizerConfig> {
    let mut metrics = args.metrics.clone();
    if let Some(path) = &args.metrics_file {
        metrics.extend(load_metrics_file(path)?);
    }

    let task = args
        .task
        .clone()
        .unwrap_or_else(|| prompt_text.to_string());

    let mut config = OptimizerConfig::new(task)
        .with_goal(args.goal.clone())
        .with_metrics(metrics)
        .with_threshold(args.threshold)
        .with_max_iterations(args.iterations)
        .with_history_size(args.memory)
        .with_max_retries(args.max_retries)
        .with_retry_delay(Duration::from_millis(args.retry_delay_ms))
        .with_model(args.provider.model.clone());

    if let Some(rating_system) = args.rating_system {
        config = config.with_rating_system(rating_system);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_run_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = args.call_timeout_secs {
        config = config.with_call_timeout(Duration::from_secs(secs));
    }

    config.validate()?;
    Ok(config)
}

fn print_report(report: &OptimizationReport, args: &OptimizeArgs, initial: &str) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if args.verbose {
        println!("Initial Prompt: {}", initial);
        println!("Optimization Goal: {}", args.goal);
        println!("Memory Size: {}", args.memory);
        println!(
            "Rounds: {} ({} rewrites, {})",
            report.rounds, report.improvements, report.stop_reason
        );
        println!(
            "Score: {:.1}/20 (grade {})",
            report.entry.assessment.overall_score, report.entry.assessment.overall_grade
        );
        for strength in &report.entry.assessment.strengths {
            println!("  + {}", strength.point);
        }
        for weakness in &report.entry.assessment.weaknesses {
            println!("  - {}", weakness.point);
        }
        println!();
        println!("Optimized Prompt:");
    }

    println!("{}", report.prompt);
    Ok(())
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let llm = build_llm_client(&args.provider)?;
    let want_json = args.output_format.as_deref() == Some("json");

    let mut prompt = Prompt::new(args.prompt.join(" ")).with_directives(args.directives.clone());
    if want_json {
        prompt = prompt.with_output(JSON_OUTPUT_HINT);
    }

    let mut options = GenerationOptions::default().with_model(args.provider.model.clone());
    if let Some(temperature) = args.temperature {
        options = options.with_temperature(temperature);
    }
    if let Some(max_tokens) = args.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }

    if args.verbose {
        println!("Prompt:\n{}\n", prompt);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let guard = RunGuard::unbounded(cancel);
    let result = guard.call(llm.generate(prompt.to_request(None, &options))).await;
    interrupt.abort();

    let response = result??;
    let content = response
        .first_content()
        .ok_or_else(|| anyhow::anyhow!("Model returned an empty response"))?;

    if want_json {
        let cleaned = strip_code_fences(content);
        match serde_json::from_str::<serde_json::Value>(cleaned) {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(e) => {
                warn!(error = %e, "Response is not valid JSON, printing raw output");
                println!("{}", content);
            }
        }
    } else {
        println!("{}", content);
    }

    Ok(())
}

/// Build the LLM client from flags and environment.
fn build_llm_client(provider: &ProviderArgs) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let api_key = provider
        .api_key
        .clone()
        .or_else(|| std::env::var("LITELLM_API_KEY").ok());
    let api_base = provider
        .api_base
        .clone()
        .unwrap_or_else(|| OPENROUTER_API_BASE.to_string());

    if api_key.is_none() && api_base == OPENROUTER_API_BASE {
        anyhow::bail!(
            "OPENROUTER_API_KEY is required but not set.\n\
             Provide it via --api-key <KEY>, set the OPENROUTER_API_KEY environment variable, \
             or point --api-base at a server that needs no key."
        );
    }

    info!(model = %provider.model, api_base = %api_base, "Using LLM provider");
    let client = LiteLlmClient::new(api_base, api_key, provider.model.clone())?;
    Ok(Arc::new(client))
}

/// Cancel `cancel` when Ctrl-C is pressed. Abort the handle once the work is done.
fn cancel_on_ctrl_c(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    })
}
