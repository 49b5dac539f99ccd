//! quarry CLI - Inspect cube configurations and compiled backend queries
//!
//! Usage:
//!   quarry check <quarry.toml>
//!   quarry compile <quarry.toml> <cube> <query.json> [--dialect <dialect>]
//!
//! Examples:
//!   quarry check quarry.toml
//!   quarry compile quarry.toml mysql_index_stats query.json --output verbose
//!
//! Nothing is executed against a backend; set RUST_LOG=debug for details.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use quarry::config::{Backend, Settings};
use quarry::cube::Cube;
use quarry::error::BoxError;
use quarry::model::Row;
use quarry::query::Query;
use quarry::search::SearchExecutor;
use quarry::sql::{Dialect, SqlExecutor, SqlParams};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "quarry - A dimensional query engine over SQL and search backends")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration and list its cubes
    Check {
        /// Path to the quarry.toml file
        config: PathBuf,
    },

    /// Print the backend query a JSON query compiles to
    Compile {
        /// Path to the quarry.toml file
        config: PathBuf,

        /// Name of the cube to query
        cube: String,

        /// Path to the query JSON file
        query: PathBuf,

        /// SQL dialect to generate (overrides the configured one)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Output format
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Mysql,
    Postgres,
    Duckdb,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Duckdb => Dialect::DuckDb,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Query text only
    Plain,
    /// Query text with parameters and paging details
    Verbose,
}

/// Executor for compile-only cubes; every call fails.
struct Offline;

#[async_trait]
impl SqlExecutor for Offline {
    async fn count(&self, _sql: &str, _params: &SqlParams) -> Result<u64, BoxError> {
        Err("quarry compile does not execute queries".into())
    }

    async fn query(&self, _sql: &str, _params: &SqlParams) -> Result<Vec<Row>, BoxError> {
        Err("quarry compile does not execute queries".into())
    }
}

#[async_trait]
impl SearchExecutor for Offline {
    async fn execute(&self, _method: &str, _path: &str, _body: Value) -> Result<Value, BoxError> {
        Err("quarry compile does not execute queries".into())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => cmd_check(config),
        Commands::Compile {
            config,
            cube,
            query,
            dialect,
            output,
        } => cmd_compile(config, &cube, query, dialect, output),
    }
}

fn load(config: &Path) -> Option<Settings> {
    match Settings::from_file(config) {
        Ok(settings) => Some(settings),
        Err(e) => {
            eprintln!("Error loading '{}': {}", config.display(), e);
            None
        }
    }
}

fn cmd_check(config: PathBuf) -> ExitCode {
    let Some(settings) = load(&config) else {
        return ExitCode::FAILURE;
    };

    println!("File: {}", config.display());
    println!();

    if settings.cubes.is_empty() {
        println!("No cubes defined.");
        return ExitCode::SUCCESS;
    }

    let mut failed = false;
    println!("Cubes:");
    for (name, def) in &settings.cubes {
        match def.schema(name) {
            Ok(schema) => {
                let dims: Vec<_> = schema.dimensions().map(|d| d.code()).collect();
                let measures: Vec<_> = schema.measures().map(|m| m.code()).collect();
                println!("  - {} ({:?})", name, def.backend);
                println!("      dimensions: {}", dims.join(", "));
                println!("      measures:   {}", measures.join(", "));
            }
            Err(e) => {
                println!("  - {} INVALID: {}", name, e);
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        info!(cubes = settings.cubes.len(), "configuration is valid");
        ExitCode::SUCCESS
    }
}

fn cmd_compile(
    config: PathBuf,
    cube: &str,
    query: PathBuf,
    dialect: Option<DialectArg>,
    output: OutputFormat,
) -> ExitCode {
    let Some(mut settings) = load(&config) else {
        return ExitCode::FAILURE;
    };
    if let Some(dialect) = dialect {
        settings.sql.dialect = dialect.into();
    }

    let source = match fs::read_to_string(&query) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", query.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let query: Query = match serde_json::from_str(&source) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Invalid query JSON: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let def = match settings.cube(cube) {
        Ok(def) => def,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let verbose = matches!(output, OutputFormat::Verbose);
    let result = match def.backend {
        Backend::Sql => def
            .sql_cube(cube, &settings.sql, Arc::new(Offline))
            .map_err(|e| e.to_string())
            .and_then(|sql_cube| {
                sql_cube.schema().validate(&query).map_err(|e| e.to_string())?;
                let plan = sql_cube.compile(&query).map_err(|e| e.to_string())?;
                if verbose {
                    println!("-- Cube: {} (table {})", cube, sql_cube.table());
                    println!("-- Dialect: {}", settings.sql.dialect);
                    if let Some(count_sql) = &plan.count_sql {
                        println!("-- Count: {}", count_sql);
                    }
                    for (name, value) in plan.params.iter() {
                        println!("-- :{} = {}", name, value);
                    }
                    println!();
                }
                println!("{}", plan.sql);
                Ok(())
            }),
        Backend::Search => def
            .search_cube(cube, &settings.search, Arc::new(Offline))
            .map_err(|e| e.to_string())
            .and_then(|search_cube| {
                search_cube.schema().validate(&query).map_err(|e| e.to_string())?;
                let request = search_cube.request(&query).map_err(|e| e.to_string())?;
                if verbose {
                    println!("# Cube: {} (index {})", cube, search_cube.index());
                    println!("# Scroll: {}", request.scroll);
                }
                let body = serde_json::to_string_pretty(&request.body).map_err(|e| e.to_string())?;
                println!("POST {}", request.path);
                println!("{}", body);
                Ok(())
            }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}
