#![allow(dead_code)]
#[macro_use]
mod errors;
mod btree;
mod catalog;
mod command;
mod console;
mod database;
mod heap;
mod pager;
mod repl;
mod schema;

use clap::Parser;
use std::fs::OpenOptions;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "teto", version = VERSION, about = "Embedded relational database.")]
struct Cli {
    /// Database name; backs the catalog file `<dbName>.teto` and every
    /// `<dbName>_<tableName>.db` / `.btree` file belonging to it.
    db_name: String,
    /// Optional script of command-language lines to run before the REPL.
    script_file: Option<String>,
}

fn main() -> ExitCode {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("teto.log")
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match repl::start(&cli.db_name, cli.script_file.as_deref()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(errors::Error::Io(e)) if e.kind() == io::ErrorKind::Interrupted => ExitCode::SUCCESS,
        Err(e) => {
            println!("\nError: {}", e);
            ExitCode::FAILURE
        }
    }
}
