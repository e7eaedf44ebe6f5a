//! Dispatcher binary entry point

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use clap::{Parser, Subcommand};

use shared::{logging, EndpointConfig};
use dispatcher::{
    DispatchError, DispatchResult, Dispatcher, OutcomeReporter, RequestOptions,
    services::{RealCompletionClient, RealOutcomeReporter},
    DEFAULT_MAX_TOKENS, DEFAULT_SAMPLES, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
};

#[derive(Parser)]
#[command(name = "dispatcher")]
#[command(about = "Dispatch a batch of prompts across several API keys, retrying failures")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send prompts to the endpoint and print the responses
    Run(RunArgs),
    /// Write a configuration file; never overwrites an existing one
    InitConfig(InitConfigArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Configuration file (model_type, api_url, api_keys)
    #[arg(long, default_value = "./config.json")]
    config: PathBuf,

    /// Read DISPATCH_MODEL, DISPATCH_API_URL and DISPATCH_API_KEYS instead of a file
    #[arg(long)]
    from_env: bool,

    /// Prompt to send (repeatable)
    #[arg(long = "prompt")]
    prompts: Vec<String>,

    /// File with one prompt per line
    #[arg(long)]
    prompts_file: Option<PathBuf>,

    /// Attempts allowed per prompt before it is dropped
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// System message sent ahead of every prompt
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system_prompt: String,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Completions requested per prompt (only the first is used)
    #[arg(long, default_value_t = DEFAULT_SAMPLES)]
    samples: u32,

    /// Pause after each successful request, in milliseconds
    #[arg(long, default_value_t = 500)]
    min_interval_ms: u64,
}

#[derive(clap::Args)]
struct InitConfigArgs {
    /// Where to write the configuration
    #[arg(long, default_value = "./config.json")]
    output: PathBuf,

    /// Model identifier
    #[arg(long)]
    model: String,

    /// Chat completion endpoint URL
    #[arg(long)]
    api_url: String,

    /// API key (repeatable, order is the rotation order)
    #[arg(long = "api-key", required = true)]
    api_keys: Vec<String>,
}

#[tokio::main]
async fn main() -> DispatchResult<()> {
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level));

    match args.command {
        Command::Run(run) => run_batch(run).await,
        Command::InitConfig(init) => init_config(init),
    }
}

fn init_config(args: InitConfigArgs) -> DispatchResult<()> {
    let config = EndpointConfig::new(args.model, args.api_url, args.api_keys)?;
    config.save_to_json_file(&args.output)?;
    println!("Configuration dumped to {}", args.output.display());
    Ok(())
}

fn load_prompts(args: &RunArgs) -> DispatchResult<Vec<String>> {
    let mut prompts = args.prompts.clone();

    if let Some(path) = &args.prompts_file {
        let contents = std::fs::read_to_string(path)?;
        prompts.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }

    if prompts.is_empty() {
        return Err(DispatchError::ConfigError {
            message: "no prompts given (use --prompt or --prompts-file)".to_string(),
        });
    }
    Ok(prompts)
}

async fn run_batch(args: RunArgs) -> DispatchResult<()> {
    let config = if args.from_env {
        EndpointConfig::from_env()?
    } else {
        EndpointConfig::from_json_file(&args.config)?
    };
    let prompts = load_prompts(&args)?;

    let options = RequestOptions::new()
        .with_system_prompt(args.system_prompt.clone())
        .with_max_tokens(args.max_tokens)
        .with_temperature(args.temperature)
        .with_samples(args.samples)
        .with_min_interval(Duration::from_millis(args.min_interval_ms));

    tracing::info!(config = %config, prompts = prompts.len(), "Dispatching batch");

    let reporter = Arc::new(RealOutcomeReporter::new());
    let dispatcher = Dispatcher::from_shared(Arc::new(RealCompletionClient::new()), Arc::clone(&reporter));

    let mut stream = dispatcher.dispatch_with_retries(&config, prompts.clone(), args.max_retries, options)?;
    let mut answered = HashSet::new();

    while let Some(completion) = stream.next_completion().await {
        answered.insert(completion.position);
        let response = completion
            .outcome
            .response()
            .unwrap_or_default()
            .replace('\n', "");
        println!("Prompt: {}\nResponse: {}\n", completion.prompt, response);
    }

    let unanswered: Vec<&String> = prompts
        .iter()
        .enumerate()
        .filter(|(position, _)| !answered.contains(position))
        .map(|(_, prompt)| prompt)
        .collect();
    if !unanswered.is_empty() {
        println!("No response after {} attempts for {} prompt(s):", args.max_retries.max(1), unanswered.len());
        for prompt in unanswered {
            println!("  - {}", prompt);
        }
    }

    for (credential, stats) in reporter.get_stats().await? {
        tracing::info!(
            credential = %credential,
            total = stats.total_requests,
            ok = stats.successful_requests,
            failed = stats.failed_requests,
            avg_ms = stats.average_response_time_ms().unwrap_or(0),
            "Credential usage"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        let args = Args::try_parse_from(std::iter::once("dispatcher").chain(argv.iter().copied())).unwrap();
        match args.command {
            Command::Run(run) => run,
            Command::InitConfig(_) => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn test_run_defaults() {
        let args = run_args(&["run", "--prompt", "hello"]);

        assert_eq!(args.config, PathBuf::from("./config.json"));
        assert!(!args.from_env);
        assert_eq!(args.max_retries, 3);
        assert_eq!(args.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(args.samples, DEFAULT_SAMPLES);
        assert_eq!(args.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(args.min_interval_ms, 500);
    }

    #[test]
    fn test_prompts_from_flags_then_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.txt");
        std::fs::write(&path, "  What is 2+2?  \n\n\t\nName a colour.\n").unwrap();

        let args = run_args(&[
            "run",
            "--prompt",
            "first",
            "--prompt",
            "second",
            "--prompts-file",
            path.to_str().unwrap(),
        ]);
        let prompts = load_prompts(&args).unwrap();

        assert_eq!(prompts, vec!["first", "second", "What is 2+2?", "Name a colour."]);
    }

    #[test]
    fn test_no_prompts_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "\n   \n").unwrap();

        let args = run_args(&["run"]);
        assert!(matches!(load_prompts(&args), Err(DispatchError::ConfigError { .. })));

        let args = run_args(&["run", "--prompts-file", path.to_str().unwrap()]);
        assert!(matches!(load_prompts(&args), Err(DispatchError::ConfigError { .. })));
    }

    #[test]
    fn test_missing_prompts_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");

        let args = run_args(&["run", "--prompts-file", path.to_str().unwrap()]);
        assert!(matches!(load_prompts(&args), Err(DispatchError::IoError(_))));
    }

    #[test]
    fn test_init_config_requires_a_key() {
        let result = Args::try_parse_from(["dispatcher", "init-config", "--model", "m", "--api-url", "https://x.test"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let args = Args::try_parse_from([
            "dispatcher",
            "init-config",
            "--output",
            path.to_str().unwrap(),
            "--model",
            "gpt-4o-mini",
            "--api-url",
            "https://api.openai.com/v1/chat/completions",
            "--api-key",
            "key-alpha-123456",
        ])
        .unwrap();
        let Command::InitConfig(init) = args.command else {
            panic!("expected the init-config subcommand");
        };

        let result = init_config(init);
        assert!(matches!(
            result,
            Err(DispatchError::Shared(shared::SharedError::AlreadyExists { .. }))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
