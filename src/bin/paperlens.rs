//! CLI binary for edgequake-paperlens.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PaperLensConfig`, runs one pipeline and prints the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_paperlens::{
    ingest, retry_with_backoff, AnalysisClient, ContentFetcher, IngestOutput, JsonlLedger,
    PaperError, PaperLensConfig, PipelineProgressCallback, Pricing, ProgressCallback,
    RetryPolicy, UsageRecorder,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    verbose: bool,
}

impl CliProgressCallback {
    fn new(verbose: bool) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar, verbose })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_fetch_start(&self, url: &str) {
        self.bar.set_prefix("Fetching");
        self.bar.set_message(url.to_string());
    }

    fn on_fetch_complete(&self, _url: &str, bytes: usize) {
        self.bar.println(format!(
            "  {} Downloaded  {}",
            green("✓"),
            dim(&format!("{:.1} KiB", bytes as f64 / 1024.0))
        ));
        self.bar.set_prefix("Extracting");
        self.bar.set_message("");
    }

    fn on_extract_complete(&self, page_count: usize, line_count: usize) {
        self.bar.println(format!(
            "  {} Extracted   {}",
            green("✓"),
            dim(&format!("{page_count} pages, {line_count} lines"))
        ));
    }

    fn on_structure_complete(&self, block_count: usize) {
        self.bar.println(format!(
            "  {} Structured  {}",
            green("✓"),
            dim(&format!("{block_count} blocks"))
        ));
    }

    fn on_analysis_start(&self, action: &str, input_chars: usize) {
        self.bar.set_prefix("Thinking");
        self.bar
            .set_message(format!("{action} ({input_chars} chars of context)"));
    }

    fn on_analysis_complete(&self, action: &str, input_tokens: usize, output_tokens: usize) {
        self.bar.println(format!(
            "  {} {:<11} {}",
            green("✓"),
            action,
            dim(&format!("{input_tokens} tokens in / {output_tokens} out"))
        ));
    }

    fn on_error(&self, stage: &str, error: &str) {
        if !self.verbose {
            self.bar.println(format!("  {} {:<11} {}", red("✗"), stage, red("failed")));
            return;
        }
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<11} {}", red("✗"), stage, red(&msg)));
    }
}

/// How long to wait for ledger writes before the process exits.
const USAGE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

const AFTER_HELP: &str = r#"EXAMPLES:
  # Reconstruct a paper as Markdown
  paperlens ingest https://arxiv.org/pdf/1706.03762

  # Analyse a paper, JSON output
  paperlens analyze https://arxiv.org/pdf/1706.03762 --json

  # Ask about a passage
  paperlens ask https://arxiv.org/pdf/1706.03762 \
      --excerpt "multi-head attention" --question "Why several heads?"

  # Spend per actor so far
  paperlens usage

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          Credential checked before any model call
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PAPERLENS_LEDGER        Usage ledger path (JSON lines)
"#;

/// Ingest and analyse academic papers with a reasoning model.
#[derive(Parser, Debug)]
#[command(
    name = "paperlens",
    version,
    about = "Ingest and analyse academic papers with a reasoning model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Usage ledger file (JSON lines, append-only).
    #[arg(long, global = true, env = "PAPERLENS_LEDGER", default_value = "paperlens-usage.jsonl")]
    ledger: PathBuf,

    /// Actor the usage is attributed to.
    #[arg(long, global = true, env = "PAPERLENS_ACTOR", default_value = "cli")]
    actor: String,

    /// Environment variable holding the model credential.
    #[arg(long, global = true, env = "PAPERLENS_CREDENTIAL_ENV", default_value = "OPENAI_API_KEY")]
    credential_env: String,

    /// Input price, USD per million tokens.
    #[arg(long, global = true, env = "PAPERLENS_INPUT_PRICE", default_value_t = 0.10)]
    input_price: f64,

    /// Output price, USD per million tokens.
    #[arg(long, global = true, env = "PAPERLENS_OUTPUT_PRICE", default_value_t = 0.40)]
    output_price: f64,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "PAPERLENS_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Download size limit in MiB.
    #[arg(long, global = true, env = "PAPERLENS_MAX_MB", default_value_t = 100)]
    max_mb: u64,

    /// Retries on transient network or model failures.
    #[arg(long, global = true, env = "PAPERLENS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Wait before the first retry, in milliseconds.
    #[arg(long, global = true, env = "PAPERLENS_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "PAPERLENS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAPERLENS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAPERLENS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a paper and print it as structured Markdown.
    Ingest {
        url: String,

        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full ingest output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Download a paper and print the model's analysis.
    Analyze {
        url: String,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask a question about an excerpt of a paper.
    Ask {
        url: String,

        /// The highlighted passage.
        #[arg(long)]
        excerpt: String,

        /// The question about it.
        #[arg(long)]
        question: String,

        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Summarise the usage ledger per actor.
    Usage,
}

impl Command {
    fn wants_json(&self) -> bool {
        matches!(
            self,
            Command::Ingest { json: true, .. }
                | Command::Analyze { json: true, .. }
                | Command::Ask { json: true, .. }
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers INFO-level feedback, so library logs drop to
    // errors while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.command.wants_json();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = if show_progress && !matches!(cli.command, Command::Usage) {
        Some(CliProgressCallback::new(cli.verbose))
    } else {
        None
    };
    let result = match cli.command {
        Command::Usage => print_usage(&cli).await,
        _ => execute(&cli, progress.clone().map(|p| p as ProgressCallback)).await,
    };
    if let Some(p) = progress {
        p.finish();
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", failure_message(&e, cli.verbose));
            ExitCode::FAILURE
        }
    }
}

/// Failure text for stderr. The error chain, which may carry raw provider
/// text, is only included when `verbose` is set.
fn failure_message(error: &anyhow::Error, verbose: bool) -> String {
    let headline = match error.chain().find_map(|cause| cause.downcast_ref::<PaperError>()) {
        Some(paper) => paper.category().user_message().to_string(),
        None => error.to_string(),
    };
    if verbose {
        format!("{} {}\n{}", red("✘"), headline, dim(&format!("{error:?}")))
    } else {
        format!("{} {}\n{}", red("✘"), headline, dim("Run with --verbose for details."))
    }
}

async fn execute(cli: &Cli, progress: Option<ProgressCallback>) -> Result<()> {
    let config = build_config(cli, progress)?;
    let policy = RetryPolicy::new(cli.max_retries, cli.retry_backoff_ms);
    run(cli, config, &policy).await
}

async fn run(cli: &Cli, config: PaperLensConfig, policy: &RetryPolicy) -> Result<()> {
    match &cli.command {
        Command::Ingest { url, output, json } => {
            let fetcher = ContentFetcher::new(&config).context("Failed to build HTTP client")?;
            let ingested = fetch_with_retry(url, &fetcher, &config, policy).await?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&ingested)?);
            } else if let Some(path) = output {
                tokio::fs::write(path, ingested.markdown.as_bytes())
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} pages  {}ms  →  {}",
                        green("✔"),
                        ingested.page_count,
                        ingested.stats.total_duration_ms,
                        bold(&path.display().to_string())
                    );
                }
            } else {
                write_stdout(&ingested.markdown)?;
            }
        }

        Command::Analyze { url, json } => {
            let client = analysis_client(cli, &config)?;
            let fetcher = ContentFetcher::new(&config).context("Failed to build HTTP client")?;
            let ingested = fetch_with_retry(url, &fetcher, &config, policy).await?;
            let analysis = retry_with_backoff(policy, "analyze", || {
                client.analyze_document(&ingested.markdown, &cli.actor)
            })
            .await
            .map_err(PaperError::from)
            .context("Analysis failed");
            client.flush_usage(USAGE_FLUSH_TIMEOUT).await;
            let analysis = analysis?;

            if *json {
                let report = serde_json::json!({
                    "textBytes": ingested.text_bytes,
                    "title": ingested.document.title(),
                    "analysis": analysis,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if let Some(title) = ingested.document.title() {
                    println!("{}\n", bold(title));
                }
                println!("{} {}/10   {}", bold("Rating:"), analysis.rating, analysis.category);
                println!("\n{}", analysis.summary);
                if !analysis.key_findings.is_empty() {
                    println!("\n{}", bold("Key findings:"));
                    for finding in &analysis.key_findings {
                        println!("  - {finding}");
                    }
                }
                if !analysis.tags.is_empty() {
                    println!("\n{} {}", bold("Tags:"), analysis.tags.join(", "));
                }
            }
        }

        Command::Ask {
            url,
            excerpt,
            question,
            json,
        } => {
            let client = analysis_client(cli, &config)?;
            let fetcher = ContentFetcher::new(&config).context("Failed to build HTTP client")?;
            let ingested = fetch_with_retry(url, &fetcher, &config, policy).await?;
            let answer = retry_with_backoff(policy, "annotate", || {
                client.answer_annotation(&ingested.markdown, excerpt, question, &cli.actor)
            })
            .await
            .map_err(PaperError::from)
            .context("Question could not be answered");
            client.flush_usage(USAGE_FLUSH_TIMEOUT).await;
            let answer = answer?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                write_stdout(answer.response_text().unwrap_or_default())?;
            }
        }

        Command::Usage => unreachable!("handled before config is built"),
    }
    Ok(())
}

async fn fetch_with_retry(
    url: &str,
    fetcher: &ContentFetcher,
    config: &PaperLensConfig,
    policy: &RetryPolicy,
) -> Result<IngestOutput> {
    retry_with_backoff(policy, "ingest", || ingest(url, fetcher, config))
        .await
        .with_context(|| format!("Failed to ingest {url}"))
}

fn analysis_client(cli: &Cli, config: &PaperLensConfig) -> Result<AnalysisClient> {
    let recorder = UsageRecorder::with_ledger(
        Arc::new(JsonlLedger::new(cli.ledger.clone())),
        config.pricing,
    );
    let client = AnalysisClient::from_config(config.clone(), recorder)?;
    if !client.is_configured() {
        anyhow::bail!(
            "{} is not set to a usable API key; the reasoning model is unavailable",
            cli.credential_env
        );
    }
    Ok(client)
}

/// Map CLI args to `PaperLensConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PaperLensConfig> {
    let mut builder = PaperLensConfig::builder()
        .fetch_timeout_secs(cli.download_timeout)
        .max_download_bytes(cli.max_mb.saturating_mul(1024 * 1024))
        .credential_env(cli.credential_env.clone())
        .pricing(Pricing::per_million(cli.input_price, cli.output_price));

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Per-actor totals from the ledger file.
async fn print_usage(cli: &Cli) -> Result<()> {
    let ledger = JsonlLedger::new(cli.ledger.clone());
    let events = ledger
        .load()
        .await
        .with_context(|| format!("Failed to read ledger {}", cli.ledger.display()))?;

    let mut totals: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for event in &events {
        let entry = totals.entry(event.actor_id.as_str()).or_default();
        entry.0 += 1;
        entry.1 += event.cost_estimate;
    }

    if totals.is_empty() {
        eprintln!("{}", dim("Ledger is empty"));
        return Ok(());
    }
    println!("{:<24} {:>6} {:>12}", bold("actor"), bold("calls"), bold("cost (USD)"));
    for (actor, (calls, cost)) in totals {
        println!("{actor:<24} {calls:>6} {cost:>12.6}");
    }
    Ok(())
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_paperlens::AnalysisError;

    fn provider_failure() -> anyhow::Error {
        anyhow::Error::new(PaperError::from(AnalysisError::Unreachable {
            detail: "upstream said: internal key sk-live-123 rejected".into(),
        }))
        .context("Analysis failed")
    }

    #[test]
    fn provider_text_is_hidden_by_default() {
        let message = failure_message(&provider_failure(), false);
        assert!(!message.contains("sk-live-123"), "got: {message}");
        assert!(!message.contains("upstream said"), "got: {message}");
        assert!(message.contains("--verbose"));
    }

    #[test]
    fn verbose_shows_the_full_chain() {
        let message = failure_message(&provider_failure(), true);
        assert!(message.contains("upstream said"), "got: {message}");
        assert!(message.contains("Analysis failed"));
    }
}
