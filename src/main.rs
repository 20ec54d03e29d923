use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use docdex::engine::EngineProcess;
use docdex::{ApiResponse, App, Config, ProgressSink};

#[derive(Parser, Debug)]
#[command(name = "docdex")]
#[command(about = "Parse documents into chunks and index them for full-text search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and index one or more files
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Search indexed chunks
    Search {
        query: String,
        /// Return at most this many hits instead of all of them
        #[arg(long)]
        limit: Option<usize>,
        /// Offset into the hit list, used with --limit
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Engine filter expression, e.g. 'fileType = pdf'
        #[arg(long)]
        filter: Option<String>,
        /// Include full chunk content in hits
        #[arg(long)]
        content: bool,
    },
    /// Delete an ingested file by its id
    Delete { file_id: String },
    /// List upload records, most recent first
    Records,
    /// List supported file extensions
    Extensions,
    /// Show index statistics
    Stats,
    /// Remove every document from the index
    Clear,
    /// Manage the search engine process
    Engine {
        #[command(subcommand)]
        action: EngineAction,
    },
}

#[derive(Subcommand, Debug)]
enum EngineAction {
    /// Run the engine in the foreground until interrupted
    Run,
    /// Report whether a running engine answers its health endpoint
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Command::Engine {
            action: EngineAction::Run,
        } => run_engine(config).await,
        Command::Engine {
            action: EngineAction::Status,
        } => {
            let app = App::new(config)?;
            let running = app.engine_healthy().await;
            emit(ApiResponse::ok(serde_json::json!({ "running": running })));
            Ok(())
        }
        command => run_command(config, command).await,
    }
}

async fn run_engine(config: Config) -> Result<()> {
    let mut engine = EngineProcess::new(&config)?;
    engine.start().await?;
    log::info!("Engine running on {}, press Ctrl-C to stop", engine.url());
    tokio::signal::ctrl_c().await?;
    engine.stop().await?;
    Ok(())
}

async fn run_command(config: Config, command: Command) -> Result<()> {
    let app = App::new(config)?;
    app.initialize().await?;

    match command {
        Command::Ingest { paths } => {
            let (sink, mut events) = ProgressSink::channel();
            let reporter = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    log::info!(
                        "{}: {:?} {}/{} ({}%)",
                        event.file_name,
                        event.status,
                        event.current,
                        event.total,
                        event.percentage
                    );
                }
            });

            let report = app.ingest(&paths, &sink).await?;
            drop(sink);
            let _ = reporter.await;
            emit(ApiResponse::ok(report));
        }
        Command::Search {
            query,
            limit,
            offset,
            filter,
            content,
        } => {
            let mut options = app.search_options();
            if limit.is_some() {
                options.fetch_all_hits = false;
                options.limit = limit;
                options.offset = offset;
            }
            options.params.filter = filter;
            options.params.include_content = content;

            emit(ApiResponse::from_result(app.search(&query, &options).await));
        }
        Command::Delete { file_id } => {
            emit(ApiResponse::from_result(app.delete_file(&file_id).await));
        }
        Command::Records => {
            emit(ApiResponse::from_result(app.list_records().await));
        }
        Command::Extensions => {
            emit(ApiResponse::ok(app.supported_extensions()));
        }
        Command::Stats => {
            emit(ApiResponse::from_result(app.stats().await));
        }
        Command::Clear => {
            emit(ApiResponse::from_result(
                app.clear_index().await.map(|_| "index cleared"),
            ));
        }
        Command::Engine { .. } => unreachable!("handled before app construction"),
    }

    app.shutdown();
    Ok(())
}

fn emit<T: Serialize>(response: ApiResponse<T>) {
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize response: {}", e),
    }
}
