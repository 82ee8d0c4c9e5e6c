use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use module_sentinel::config::{Config, LoggingConfig};

mod cli;

#[derive(Parser)]
#[command(name = "module-sentinel")]
#[command(author = "Module Sentinel Team")]
#[command(version)]
#[command(about = "Multi-language symbol and relationship extraction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: compact, pretty, json (overrides the config file)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single file and print what was extracted
    Parse {
        /// File to parse
        file: String,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Cache strategy: aggressive, moderate, minimal
        #[arg(long)]
        cache_strategy: Option<String>,

        /// Force a language instead of detecting it from the extension
        #[arg(short, long)]
        language: Option<String>,

        /// Print traversal statistics
        #[arg(long)]
        stats: bool,
    },

    /// Index a project through the worker pool
    Index {
        /// Project directory to index
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Languages to index (comma-separated)
        #[arg(short, long)]
        languages: Option<String>,

        /// Override the worker count
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// List supported languages
    Languages,
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig, format: Option<&str>) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("module_sentinel={level}")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format.unwrap_or(logging.format.as_str()) {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let project_dir = match &cli.command {
        Commands::Index { project, .. } => project.clone(),
        _ => ".".to_string(),
    };
    let config = Config::from_project_dir(&project_dir);
    init_logging(cli.debug, cli.verbose, &config.logging, cli.log_format.as_deref());

    info!("Module Sentinel v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Parse {
            file,
            format,
            cache_strategy,
            language,
            stats,
        } => {
            cli::parse::parse_file(&config, file, format, cache_strategy, language, stats || cli.debug)?;
        }

        Commands::Index {
            project,
            languages,
            workers,
        } => {
            info!("Indexing project: {}", project);
            cli::index::index_project(config, project, languages, workers).await?;
        }

        Commands::Languages => {
            cli::languages::list_languages();
        }
    }

    Ok(())
}
