//! Task Agent CLI - handle request files with the sample handlers

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use task_agent::config::LogConfig;
use task_agent::sample::register_samples;
use task_agent::{
    AgentConfig, Context, FixSuggestion, LogSink, Masker, Request, Resolver, Router, Secret,
    TaskError,
};

#[derive(Parser)]
#[command(name = "task-agent")]
#[command(about = "Task Agent - route tasks, resolve their secrets and payload expressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a request file (JSON, or YAML by extension)
    Run {
        /// Path to the request file
        file: PathBuf,

        /// Pretty-print a JSON response body
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a request file (parse only)
    Validate {
        /// Path to the request file
        file: PathBuf,
    },

    /// Resolve secret references and template expressions in a payload file
    Resolve {
        /// Path to the payload file
        file: PathBuf,

        /// Secret available to the payload, repeatable
        #[arg(short, long = "secret", value_name = "ID=VALUE", value_parser = parse_secret)]
        secrets: Vec<Secret>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AgentConfig::load() {
        Ok(config) => config.with_env(),
        Err(e) => fail(&anyhow::Error::from(e)),
    };

    init_tracing(&config.log, cli.verbose, cli.json_logs);

    let result = match cli.command {
        Commands::Run { file, pretty } => {
            run_request(&file, pretty || config.output.pretty, &config).await
        }
        Commands::Validate { file } => validate_request(&file),
        Commands::Resolve { file, secrets } => resolve_payload(&file, &secrets),
    };

    if let Err(e) = result {
        fail(&e);
    }
}

fn fail(e: &anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), e);
    if let Some(suggestion) = e
        .downcast_ref::<TaskError>()
        .and_then(|err| err.fix_suggestion())
    {
        eprintln!("  {} {}", "Fix:".yellow(), suggestion);
    }
    std::process::exit(1);
}

fn init_tracing(config: &LogConfig, verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if json || config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_secret(s: &str) -> Result<Secret, String> {
    match s.split_once('=') {
        Some((id, value)) if !id.is_empty() => Ok(Secret::new(id, value)),
        _ => Err(format!("expected ID=VALUE, got '{s}'")),
    }
}

fn read_request(path: &Path) -> anyhow::Result<Request> {
    let text = fs::read_to_string(path)
        .map_err(TaskError::from)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );

    let req = if is_yaml {
        // payloads are raw JSON, so go through a JSON value
        let value: serde_json::Value = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        serde_json::from_str(&value.to_string()).map_err(TaskError::from)?
    } else {
        serde_json::from_str(&text)
            .map_err(TaskError::from)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    };

    Ok(req)
}

async fn run_request(file: &Path, pretty: bool, config: &AgentConfig) -> anyhow::Result<()> {
    let mut req = read_request(file)?.with_logger(LogSink::new(io::stderr()));

    let mut router = Router::new();
    register_samples(&mut router, &config.exec);

    let ctx = Context::new();
    let token = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let res = router.handle(&ctx, &mut req).await;

    let masker = Masker::new(io::sink(), req.redaction_values());
    let (body, error) = res.into_parts();

    if let Some(body) = body.filter(|b| !b.is_empty()) {
        println!("{}", masker.mask(&render_body(&body, pretty)));
    }

    match error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn render_body(body: &[u8], pretty: bool) -> String {
    if pretty {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
            if let Ok(text) = serde_json::to_string_pretty(&value) {
                return text;
            }
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

fn validate_request(file: &Path) -> anyhow::Result<()> {
    let req = read_request(file)?;

    println!("{} Request '{}' is valid", "✓".green(), file.display());
    println!("  Task: {} ({})", req.task.id, req.task.kind);
    if !req.task.driver.is_empty() {
        println!("  Driver: {}", req.task.driver);
    }
    println!("  Secrets: {}", req.tasks.len());

    Ok(())
}

fn resolve_payload(file: &Path, secrets: &[Secret]) -> anyhow::Result<()> {
    let data = fs::read(file)
        .map_err(TaskError::from)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let resolution = Resolver::new(secrets).resolve(&data)?;

    let masker = Masker::new(
        io::sink(),
        secrets
            .iter()
            .map(|s| s.value.as_str())
            .chain(resolution.masks.iter().map(String::as_str)),
    );
    println!("{}", masker.mask(&String::from_utf8_lossy(&resolution.data)));

    if !resolution.masks.is_empty() {
        eprintln!(
            "{} {} derived value(s) masked",
            "→".cyan(),
            resolution.masks.len()
        );
    }

    Ok(())
}
