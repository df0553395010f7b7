//! askdb CLI
//!
//! Command-line interface for the natural language to SQL gateway.

use anyhow::Context;
use askdb::config::Settings;
use askdb::db::DatabaseKind;
use askdb::otel::{init_tracing, shutdown_tracing};
use askdb::pipeline::{connect_backend, Pipeline};
use askdb::schema::SchemaFetcher;
use askdb::server;
use askdb::sql::SqlValidator;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// askdb - ask questions, get read-only SQL and its results
#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Natural language to read-only SQL for PostgreSQL and MySQL", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,

    /// Print the live schema description
    Schema,

    /// Answer a question end to end and print the response JSON
    Ask {
        /// Question in natural language
        question: String,

        /// Schema description file (defaults to the live schema)
        #[arg(long)]
        schema_file: Option<PathBuf>,
    },

    /// Run the SQL validator only (exit code 2 when rejected)
    Validate {
        /// Candidate SQL or raw model output (reads stdin when omitted)
        sql: Option<String>,

        /// Dialect to validate against (defaults to --database-type)
        #[arg(long, value_enum)]
        dialect: Option<DatabaseKind>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let settings = cli.settings;

    if let Commands::Validate { sql, dialect } = cli.command {
        return cmd_validate(sql, dialect.unwrap_or(settings.database_type));
    }

    init_tracing(settings.log_format, settings.otlp_endpoint.as_deref())?;

    let outcome = match cli.command {
        Commands::Serve => cmd_serve(&settings).await,
        Commands::Schema => cmd_schema(&settings).await,
        Commands::Ask {
            question,
            schema_file,
        } => cmd_ask(&settings, &question, schema_file).await,
        Commands::Validate { .. } => Ok(()),
    };

    shutdown_tracing();
    outcome.map(|_| ExitCode::SUCCESS)
}

async fn cmd_serve(settings: &Settings) -> anyhow::Result<()> {
    settings.validate()?;
    let pipeline = Arc::new(Pipeline::from_settings(settings)?);
    server::serve(pipeline, settings.listen_addr).await?;
    Ok(())
}

async fn cmd_schema(settings: &Settings) -> anyhow::Result<()> {
    let backend = connect_backend(settings)?;
    let schema = SchemaFetcher::new(backend).fetch().await?;
    println!("{schema}");
    Ok(())
}

async fn cmd_ask(
    settings: &Settings,
    question: &str,
    schema_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    settings.validate()?;

    let schema = match schema_file {
        Some(path) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read schema file {}", path.display()))?,
        ),
        None => None,
    };

    let pipeline = Pipeline::from_settings(settings)?;
    let payload = pipeline.generate(question, schema.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn cmd_validate(sql: Option<String>, dialect: DatabaseKind) -> anyhow::Result<ExitCode> {
    let raw = match sql {
        Some(sql) => sql,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read SQL from stdin")?;
            buf
        }
    };

    match SqlValidator::new(dialect).validate(&raw) {
        Ok(query) => {
            println!("{query}");
            Ok(ExitCode::SUCCESS)
        }
        Err(rejection) => {
            eprintln!("✗ {rejection}");
            Ok(ExitCode::from(2))
        }
    }
}
