//! Mantis CLI - compile a serialized Model to SQL.
//!
//! Usage:
//!   mantis compile <model.json> --dialect <dialect>
//!   mantis dump <model.json>
//!
//! `<model.json>` holds a `Model` in the wire-format envelope produced by
//! `mantis::compile::wire::model_to_json` (spec.md §6).

use clap::{Parser, Subcommand, ValueEnum};
use mantis::compile::wire::model_from_json;
use mantis::compile::{compile_model, compile_sql};
use mantis::config::Settings;
use mantis::sql::Dialect;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mantis")]
#[command(about = "Mantis - a declarative analytical query builder and multi-dialect SQL compiler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a serialized Model to SQL text.
    Compile {
        /// Path to a JSON file holding a wire-format Model.
        file: PathBuf,

        /// SQL dialect to generate.
        #[arg(short, long, default_value = "duckdb")]
        dialect: DialectArg,

        /// Emit only the compile result (no driver execution attempted).
        #[arg(long, default_value_t = true)]
        sql_only: bool,
    },

    /// Parse and re-serialize a Model, printing its wire-format JSON.
    Dump { file: PathBuf },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Duckdb,
    Mysql,
    Tsql,
    Postgres,
    Snowflake,
    Bigquery,
    Redshift,
    Databricks,
    Clickhouse,
    Athena,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Snowflake => Dialect::Snowflake,
            DialectArg::Bigquery => Dialect::BigQuery,
            DialectArg::Redshift => Dialect::Redshift,
            DialectArg::Databricks => Dialect::Databricks,
            DialectArg::Clickhouse => Dialect::ClickHouse,
            DialectArg::Athena => Dialect::Athena,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            file,
            dialect,
            sql_only,
        } => cmd_compile(file, dialect.into(), sql_only),
        Commands::Dump { file } => cmd_dump(file),
    }
}

fn read_model(file: &PathBuf) -> Result<mantis::model::Model, ExitCode> {
    let text = fs::read_to_string(file).map_err(|e| {
        eprintln!("Error reading file '{}': {}", file.display(), e);
        ExitCode::FAILURE
    })?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error parsing '{}' as JSON: {}", file.display(), e);
        ExitCode::FAILURE
    })?;
    model_from_json(json).map_err(|e| {
        eprintln!("Error decoding model: {e}");
        ExitCode::FAILURE
    })
}

fn cmd_compile(file: PathBuf, dialect: Dialect, sql_only: bool) -> ExitCode {
    let model = match read_model(&file) {
        Ok(m) => m,
        Err(code) => return code,
    };

    if sql_only {
        return match compile_sql(&model, dialect) {
            Ok(sql) => {
                println!("{sql}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Compilation error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let settings = Settings::default();
    let output = compile_model(&model, dialect, settings, None);
    if !output.compile.ok {
        for err in &output.compile.errors {
            eprintln!("Compilation error: {err}");
        }
        return ExitCode::FAILURE;
    }
    println!("{}", output.sql);
    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }
    ExitCode::SUCCESS
}

fn cmd_dump(file: PathBuf) -> ExitCode {
    let model = match read_model(&file) {
        Ok(m) => m,
        Err(code) => return code,
    };
    match mantis::compile::wire::model_to_json(&model) {
        Ok(json) => {
            println!("{}", serde_json::to_string_pretty(&json).unwrap());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing model: {e}");
            ExitCode::FAILURE
        }
    }
}
