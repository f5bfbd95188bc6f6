//! Command-line entry point.
//!
//! ```sh
//! # Add blocks to every symbol that lacks one
//! agentspec generate src/
//!
//! # Preview with a local model, no writes
//! agentspec generate --provider local --model llama3.2 --dry-run src/
//!
//! # Validate, render, remove
//! agentspec lint --strict src/
//! agentspec extract --format agent-context src/ > CONTEXT.md
//! agentspec strip src/
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use agentspec::collect::collect_files;
use agentspec::config::{GenerateConfig, ProviderSettings};
use agentspec::events::{CompositeEventHandler, FnEventHandler, GenerateEvent, LoggingHandler};
use agentspec::extract::{ExtractFormat, extract_paths, render};
use agentspec::generate::Generator;
use agentspec::lang::Language;
use agentspec::lint::{DEFAULT_MIN_LINES, LintOptions, lint_paths};
use agentspec::llm::{ProviderKind, build_provider};
use agentspec::strip::strip_paths;
use agentspec::{Error, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Structured agentspec documentation blocks for Python and JS/TS code.
#[derive(Parser)]
#[command(name = "agentspec", version)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Targets {
    /// Files or directories. Default: the current directory.
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Only these languages (repeatable).
    #[arg(long = "language", value_enum)]
    languages: Vec<Language>,
}

#[derive(Subcommand)]
enum Command {
    /// Check blocks for structure and required keys.
    Lint {
        #[command(flatten)]
        targets: Targets,

        /// Minimum block length in lines.
        #[arg(long, default_value_t = DEFAULT_MIN_LINES)]
        min_lines: usize,

        /// Treat warnings as errors.
        #[arg(long)]
        strict: bool,
    },

    /// Render existing blocks as Markdown, JSON, or agent context.
    Extract {
        #[command(flatten)]
        targets: Targets,

        #[arg(long, value_enum, default_value_t = ExtractFormat::Markdown)]
        format: ExtractFormat,

        /// Write to a file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Generate blocks with an LLM.
    Generate(GenerateArgs),

    /// Remove blocks, keeping the rest of each doc comment.
    Strip {
        #[command(flatten)]
        targets: Targets,

        /// Report what would be removed without writing.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args)]
struct GenerateArgs {
    #[command(flatten)]
    targets: Targets,

    /// Model identifier. Default: `AGENTSPEC_MODEL`, else claude-haiku-4-5.
    #[arg(long)]
    model: Option<String>,

    /// Provider. Default: `AGENTSPEC_PROVIDER`, else chosen from the model.
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// OpenAI-compatible base URL (overrides `OPENAI_BASE_URL`).
    #[arg(long)]
    base_url: Option<String>,

    /// Shorter blocks.
    #[arg(long)]
    terse: bool,

    /// Print the blocks instead of writing them.
    #[arg(long)]
    dry_run: bool,

    /// Regenerate symbols that already have a block.
    #[arg(long)]
    update_existing: bool,

    /// Regenerate every symbol, including ones with broken blocks.
    #[arg(long)]
    force: bool,

    /// Skip the git history lookup.
    #[arg(long)]
    no_changelog: bool,

    /// Retries for rate limits and server errors.
    #[arg(long, default_value_t = 0)]
    retries: u32,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long)]
    temperature: Option<f32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("AGENTSPEC_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Lint {
            targets,
            min_lines,
            strict,
        } => {
            let files = collect_files(&targets.paths, &targets.languages)?;
            let report = lint_paths(&files, &LintOptions { min_lines, strict });
            for diagnostic in &report.diagnostics {
                println!("{diagnostic}");
            }
            eprintln!(
                "{} file(s): {} error(s), {} warning(s)",
                report.files,
                report.errors(),
                report.warnings()
            );
            Ok(exit_code(report.has_errors()))
        }

        Command::Extract {
            targets,
            format,
            output,
        } => {
            let files = collect_files(&targets.paths, &targets.languages)?;
            let text = render(&extract_paths(&files), format)?;
            match output {
                Some(path) => std::fs::write(&path, text).map_err(|source| Error::Write {
                    path: path.clone(),
                    source,
                })?,
                None => print!("{text}"),
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Generate(args) => generate(args).await,

        Command::Strip { targets, dry_run } => {
            let files = collect_files(&targets.paths, &targets.languages)?;
            let report = strip_paths(&files, dry_run).await;
            let verb = if dry_run { "would strip" } else { "stripped" };
            eprintln!(
                "{verb} {} block(s) in {} file(s)",
                report.stripped, report.files
            );
            Ok(exit_code(report.file_errors > 0))
        }
    }
}

async fn generate(args: GenerateArgs) -> Result<ExitCode> {
    let mut settings = ProviderSettings::from_env();
    if let Some(kind) = args.provider {
        settings = settings.with_kind(kind);
    }
    if let Some(model) = args.model {
        settings = settings.with_model(model);
    }
    if let Some(url) = args.base_url {
        settings = settings.with_base_url(url);
    }

    let mut config = GenerateConfig::default()
        .with_model(settings.model.clone())
        .with_terse(args.terse)
        .with_dry_run(args.dry_run)
        .with_update_existing(args.update_existing)
        .with_force(args.force)
        .with_changelog(!args.no_changelog)
        .with_retries(args.retries);
    if let Some(max_tokens) = args.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = args.temperature {
        config = config.with_temperature(temperature);
    }

    let files = collect_files(&args.targets.paths, &args.targets.languages)?;
    let provider = build_provider(&settings)?;

    let handler = CompositeEventHandler::new().with(LoggingHandler).with_if(
        args.dry_run,
        FnEventHandler::new(|event| {
            if let GenerateEvent::Generated {
                path,
                symbol,
                block,
            } = event
            {
                println!("# {}::{}\n{block}\n", path.display(), symbol.name);
            }
        }),
    );

    let report = Generator::new(provider.as_ref(), config)
        .with_event_handler(&handler)
        .run(&files)
        .await;

    eprintln!(
        "{} file(s): {} generated, {} skipped, {} failed, {} written",
        report.files, report.generated, report.skipped, report.failed, report.written
    );
    Ok(exit_code(report.has_failures()))
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
