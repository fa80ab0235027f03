//! easyqc CLI: rate subjects, aggregate ratings, and query tables.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use easyqc_table::JoinMode;

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "easyqc",
    version,
    about = "Multi-rater QC scoring with per-file ratings and aggregated tables"
)]
struct Cli {
    /// Config file path (default: ./easyqc.toml, then ~/.config/easyqc/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rate one subject with one module
    Rate {
        /// Project name ("-" for default_project)
        project: String,

        /// Module name
        module: String,

        /// Rater name ("-" for default_rater)
        rater: String,

        /// Subject id
        ezqcid: String,

        /// Set a score: KEY=VALUE (empty VALUE clears it)
        #[arg(long = "score", value_name = "KEY=VALUE")]
        scores: Vec<String>,

        /// Set a tag: KEY=true|false
        #[arg(long = "tag", value_name = "KEY=BOOL")]
        tags: Vec<String>,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,

        /// Open read-only; nothing is written
        #[arg(long)]
        observe: bool,

        /// Also print score 1 and tag 1 for every subject
        #[arg(long)]
        list: bool,
    },

    /// Rebuild the rating tables for a project
    Aggregate {
        /// Project name ("-" for default_project)
        project: String,

        /// Join against the covariate table: left or inner (default from config)
        #[arg(long)]
        join: Option<JoinMode>,

        /// Filter query, e.g. "SELECT ezqcid, _othervar_ FROM df WHERE alice.memory.score1 = 3"
        #[arg(long)]
        query: Option<String>,

        /// Write the resulting table to this CSV file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Filter any CSV (or .txt/.list) file with a query
    Query {
        /// Input table
        input: PathBuf,

        /// Query text
        sql: String,

        /// Write the result to this CSV file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Manage a project's rating modules
    Module {
        #[command(subcommand)]
        action: commands::module::ModuleAction,
    },

    /// Build a project's covariate table from a list, a directory, or ids
    Covariates {
        /// Project name ("-" for default_project)
        project: String,

        /// .csv, .txt or .list file, or a directory whose subdirectories are subjects
        source: Option<PathBuf>,

        /// Subject ids separated by spaces, commas or newlines
        #[arg(long, conflicts_with = "source")]
        ids: Option<String>,

        /// Column copied into ezqcid when the table has none
        #[arg(long)]
        id_var: Option<String>,

        /// Batch name stored in ezqcbatch
        #[arg(long)]
        batch: Option<String>,
    },

    /// Validate an exported module file
    Validate {
        /// Path to module JSON
        path: PathBuf,
    },

    /// Create a project directory and register it in the config
    Init {
        /// Project name
        name: String,

        /// Project directory
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("easyqc=info,easyqc_core=info,easyqc_table=info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Rate {
            project,
            module,
            rater,
            ezqcid,
            scores,
            tags,
            notes,
            observe,
            list,
        } => commands::rate::execute(
            config,
            commands::rate::RateTarget {
                project,
                module,
                rater,
                ezqcid,
            },
            commands::rate::RateEdits {
                scores,
                tags,
                notes,
                observe,
            },
            list,
        ),
        Commands::Aggregate {
            project,
            join,
            query,
            output,
        } => commands::aggregate::execute(config, project, join, query, output).await,
        Commands::Query { input, sql, output } => commands::query::execute(input, sql, output),
        Commands::Module { action } => commands::module::execute(config, action),
        Commands::Covariates {
            project,
            source,
            ids,
            id_var,
            batch,
        } => commands::covariates::execute(config, project, source, ids, id_var, batch),
        Commands::Validate { path } => commands::validate::execute(path),
        Commands::Init { name, dir } => commands::init::execute(config, name, dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
