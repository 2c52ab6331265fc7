use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ee_assistant::Assistant;
use ee_core::AppConfig;
use ee_rag::{build_index, embedder_from_config};

const DEFAULT_MANIFEST: &str = "resources/resource_manifest.json";

#[derive(Parser)]
#[command(name = "emacs-explained")]
#[command(about = "Plain-language answers about Emacs and Emacs Lisp", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question about using Emacs
    Ask {
        question: String,
        #[arg(long, default_value = "beginner")]
        skill_level: String,
        /// Correlation id recorded in the event log (generated when omitted)
        #[arg(long)]
        request_id: Option<String>,
    },
    /// Explain a piece of Emacs Lisp
    Explain {
        /// Code to explain; use --file to read it from disk instead
        code: Option<String>,
        #[arg(long, conflicts_with = "code")]
        file: Option<PathBuf>,
        #[arg(long, default_value = "elisp")]
        language: String,
        /// What the user was doing when they found this code
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long, default_value = "beginner")]
        skill_level: String,
        #[arg(long)]
        request_id: Option<String>,
    },
    /// Build the local knowledge index from a resource manifest
    Index {
        #[arg(long, default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
        /// Index directory (defaults to VECTOR_DB_DIR)
        #[arg(long)]
        db_dir: Option<PathBuf>,
        /// Directory that manifest paths are relative to
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,
        /// Keep the existing index and merge new chunks into it
        #[arg(long)]
        no_reset: bool,
    },
    /// Show the resolved configuration (without secrets)
    Config,
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Reject blank user input before it reaches the pipeline.
fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} must not be empty", field);
    }
    Ok(())
}

fn request_id_or_new(request_id: Option<String>) -> String {
    request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ask {
            question,
            skill_level,
            request_id,
        } => {
            require_text("question", &question)?;
            let request_id = request_id_or_new(request_id);
            let result = Assistant::new()
                .ask(&question, &skill_level, Some(&request_id))
                .await?;
            print_json(&result)
        }
        Commands::Explain {
            code,
            file,
            language,
            context,
            skill_level,
            request_id,
        } => {
            let code = match (code, file) {
                (Some(code), _) => code,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Provide the code to explain or --file <PATH>"),
            };
            require_text("code", &code)?;
            let request_id = request_id_or_new(request_id);
            let result = Assistant::new()
                .explain_region(&code, &language, &context, &skill_level, Some(&request_id))
                .await?;
            print_json(&result)
        }
        Commands::Index {
            manifest,
            db_dir,
            base_dir,
            no_reset,
        } => {
            let config = AppConfig::from_env()?;
            let db_dir = db_dir.unwrap_or_else(|| config.vector_db_dir.clone());
            let embedder = embedder_from_config(&config)?;
            eprintln!("{} Indexing resources from {}", "📚".cyan(), manifest.display());
            let report =
                build_index(&manifest, &db_dir, &base_dir, embedder.as_ref(), !no_reset).await?;
            print_json(&report)
        }
        Commands::Config => {
            let config = AppConfig::from_env()?;
            print_json(&config.summary())
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "❌".red(), format!("{:#}", e).red());
        std::process::exit(1);
    }
}
