//! sql-graph-export CLI - relational schema discovery and CSV export for graph import.

use clap::{Args, Parser, Subcommand};
use sql_graph_export::config::{ConnectionConfig, DatabaseType, ExportSettings};
use sql_graph_export::{pipeline, Config, EtlError, ExportEvent, RelationshipNameFrom};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "sql-graph-export")]
#[command(about = "Relational schema discovery and CSV export for bulk graph import")]
#[command(version)]
struct Cli {
    /// Path to YAML job file (flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print errors with their full cause chain
    #[arg(long)]
    debug: bool,

    /// Print progress events as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover a parent/child table pair and write the mapping document
    GenerateMapping {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Export CSV files and the graph-load configuration
    Export {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        job: JobArgs,

        #[command(flatten)]
        format: FormatArgs,
    },
}

#[derive(Args, Default)]
struct ConnectionArgs {
    /// Source database type
    #[arg(long, value_parser = ["mysql", "postgres"])]
    db_type: Option<String>,

    /// Database host
    #[arg(long)]
    host: Option<String>,

    /// Database port (default: 3306 for mysql, 5432 for postgres)
    #[arg(long)]
    port: Option<u16>,

    /// Database name
    #[arg(long)]
    database: Option<String>,

    /// Database user
    #[arg(long)]
    user: Option<String>,

    /// Database password
    #[arg(long, env = "SQL_GRAPH_EXPORT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Schema for unqualified table names
    #[arg(long)]
    schema: Option<String>,
}

#[derive(Args, Default)]
struct JobArgs {
    /// Existing directory that receives the output files
    #[arg(long)]
    destination: Option<PathBuf>,

    /// Referenced (parent) table, schema.table or bare name
    #[arg(long)]
    parent_table: Option<String>,

    /// Referencing (child) table, schema.table or bare name
    #[arg(long)]
    child_table: Option<String>,

    /// Relationship type source: table or column
    #[arg(long)]
    relationship_name: Option<RelationshipNameFrom>,

    /// Mapping document path or file:// URI
    #[arg(long, alias = "csv-resources-uri")]
    mapping_file: Option<String>,
}

#[derive(Args, Default)]
struct FormatArgs {
    /// Import-tool options file (JSON)
    #[arg(long)]
    options_file: Option<PathBuf>,

    /// Field delimiter (single character or TAB)
    #[arg(long)]
    delimiter: Option<String>,

    /// Quote character
    #[arg(long)]
    quote: Option<String>,

    /// Allow line breaks inside fields
    #[arg(long)]
    multiline_fields: Option<bool>,

    /// Resources exported concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Rows written between cancellation checks
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = cli.debug;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if debug {
                eprintln!("{}", e.format_detailed());
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), EtlError> {
    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => empty_config(),
    };

    match cli.command {
        Commands::GenerateMapping { connection, job } => {
            connection.apply(&mut config.source);
            job.apply(&mut config.export);

            let summary = pipeline::generate_mapping(&config).await?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                println!("\nMapping generated!");
                println!("  File: {}", summary.mapping_file.display());
                println!("  Tables: {}", summary.tables.join(", "));
                println!("  Joins: {}", summary.joins.len());
                println!("  Resources: {}", summary.resources.join(", "));
            }
        }

        Commands::Export {
            connection,
            job,
            format,
        } => {
            connection.apply(&mut config.source);
            job.apply(&mut config.export);
            format.apply(&mut config.export);

            let cancel_token = setup_signal_handler();
            let (events, printer) = if cli.progress {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(spawn_progress_printer(rx)))
            } else {
                (None, None)
            };

            let result = pipeline::run_export(&config, cancel_token, events).await;
            if let Some(printer) = printer {
                let _ = printer.await;
            }
            let summary = result?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                println!("\nExport completed!");
                println!("  Duration: {:.2}s", summary.duration_seconds);
                println!("  Files: {}", summary.files.len());
                for file in &summary.files {
                    println!("    {} ({} rows)", file.path.display(), file.rows);
                }
                println!("  Rows: {}", summary.rows_exported);
                println!("  Graph load config: {}", summary.graph_config_file.display());
                println!("  Import tool arguments:");
                for arg in &summary.import_tool_args {
                    println!("    {}", arg);
                }
            }
        }
    }

    Ok(())
}

impl ConnectionArgs {
    fn apply(self, source: &mut ConnectionConfig) {
        match self.db_type.as_deref() {
            Some("postgres") => source.database_type = DatabaseType::Postgres,
            Some(_) => source.database_type = DatabaseType::Mysql,
            None => {}
        }
        if let Some(host) = self.host {
            source.host = host;
        }
        if self.port.is_some() {
            source.port = self.port;
        }
        if let Some(database) = self.database {
            source.database = database;
        }
        if let Some(user) = self.user {
            source.user = user;
        }
        if let Some(password) = self.password {
            source.password = password;
        }
        if self.schema.is_some() {
            source.schema = self.schema;
        }
    }
}

impl JobArgs {
    fn apply(self, export: &mut ExportSettings) {
        if self.destination.is_some() {
            export.destination = self.destination;
        }
        if self.parent_table.is_some() {
            export.parent_table = self.parent_table;
        }
        if self.child_table.is_some() {
            export.child_table = self.child_table;
        }
        if let Some(from) = self.relationship_name {
            export.relationship_name_from = from;
        }
        if self.mapping_file.is_some() {
            export.mapping_file = self.mapping_file;
        }
    }
}

impl FormatArgs {
    fn apply(self, export: &mut ExportSettings) {
        if self.options_file.is_some() {
            export.options_file = self.options_file;
        }
        if self.delimiter.is_some() {
            export.delimiter = self.delimiter;
        }
        if self.quote.is_some() {
            export.quote = self.quote;
        }
        if self.multiline_fields.is_some() {
            export.multiline_fields = self.multiline_fields;
        }
        if let Some(workers) = self.workers {
            export.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            export.batch_size = batch_size;
        }
    }
}

/// Configuration used when no job file is given; flags fill it in.
fn empty_config() -> Config {
    Config {
        source: ConnectionConfig {
            database_type: DatabaseType::default(),
            host: "localhost".to_string(),
            port: None,
            database: String::new(),
            user: String::new(),
            password: String::new(),
            schema: None,
        },
        export: ExportSettings::default(),
    }
}

fn spawn_progress_printer(mut rx: mpsc::UnboundedReceiver<ExportEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => eprintln!("{}", line),
                Err(e) => warn!("Cannot serialize progress event: {}", e),
            }
        }
    })
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT (Ctrl-C) or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping export...", name);
                    token.cancel();
                });
            }
            Err(e) => warn!("Cannot install {} handler: {}", name, e),
        }
    }

    cancel_token
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping export...");
            token.cancel();
        }
    });

    cancel_token
}
