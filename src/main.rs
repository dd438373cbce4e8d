use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use synthweave::cli::commands::synthesize::SynthesizeOptions;
use synthweave::cli::commands::themes::ThemesOptions;
use synthweave::cli::{CommandContext, Output};
use synthweave::config::LanguageSetting;
use synthweave::types::{SynthesisLevel, ThemeCount};

#[derive(Parser)]
#[command(name = "synthweave")]
#[command(
    version,
    about = "Theme discovery and multi-chapter synthesis over embedded document corpora"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Load this config file instead of the global and project layers
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover themes in the stored fragments and print them as JSON
    Themes {
        #[arg(long, short = 'n', help = "Number of themes or 'auto'")]
        count: Option<ThemeCount>,
        #[arg(long, short, help = "Output language code or 'auto'")]
        language: Option<LanguageSetting>,
        #[arg(long = "document", short = 'd', help = "Restrict to a document (repeatable)")]
        documents: Vec<String>,
        #[arg(long, short, help = "Write themes to this file")]
        output: Option<PathBuf>,
    },

    /// Synthesize a multi-chapter document
    Synthesize {
        #[arg(help = "Document title")]
        title: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long, help = "Synthesis level: short, normal, comprehensive")]
        level: Option<SynthesisLevel>,
        #[arg(long, short = 'n', help = "Number of themes or 'auto'")]
        count: Option<ThemeCount>,
        #[arg(long, help = "Fragments retrieved per chapter")]
        fragments: Option<usize>,
        #[arg(long, short, help = "Output language code or 'auto'")]
        language: Option<LanguageSetting>,
        #[arg(long, help = "Do not attach citations to chapters")]
        no_citations: bool,
        #[arg(long = "document", short = 'd', help = "Restrict to a document (repeatable)")]
        documents: Vec<String>,
        #[arg(long, short, help = "Theme list from 'synthweave themes' to use instead of discovery")]
        themes: Option<PathBuf>,
        #[arg(long, short, help = "Write the job result to this file")]
        output: Option<PathBuf>,
        #[arg(long, help = "Write the finished document to this file")]
        write_document: Option<PathBuf>,
    },

    /// Check the fragment store and the LLM backend
    Check,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mSynthWeave encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        eprintln!("\n\x1b[33mPlease report this issue at:\x1b[0m");
        eprintln!("  https://github.com/junyeong-ai/synthweave/issues");
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // stdout carries JSON; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let output = Output::quiet(cli.quiet);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Themes {
            count,
            language,
            documents,
            output: path,
        } => {
            let ctx = CommandContext::load(config_path)?;
            let rt = Runtime::new()?;
            rt.block_on(synthweave::cli::commands::themes::run(
                &ctx,
                ThemesOptions {
                    count,
                    language,
                    documents,
                    output: path,
                },
                &output,
            ))?;
        }
        Commands::Synthesize {
            title,
            author,
            level,
            count,
            fragments,
            language,
            no_citations,
            documents,
            themes,
            output: path,
            write_document,
        } => {
            let ctx = CommandContext::load(config_path)?;
            let rt = Runtime::new()?;
            rt.block_on(synthweave::cli::commands::synthesize::run(
                &ctx,
                SynthesizeOptions {
                    title,
                    author,
                    level,
                    count,
                    fragments_per_chapter: fragments,
                    language,
                    no_citations,
                    documents,
                    themes,
                    output: path,
                    document: write_document,
                },
                &output,
            ))?;
        }
        Commands::Check => {
            let ctx = CommandContext::load(config_path)?;
            let rt = Runtime::new()?;
            rt.block_on(synthweave::cli::commands::check::run(&ctx, &output))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                synthweave::cli::commands::config::show(config_path, global, &format)?;
            }
            ConfigAction::Path => {
                synthweave::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    synthweave::cli::commands::config::init_global(force)?;
                } else {
                    synthweave::cli::commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
