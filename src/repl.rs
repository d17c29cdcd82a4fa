/// The REPL (Read-Eval-Print-Loop): reads command-language lines from stdin
/// (or an optional script file first), executes them against a `Database`,
/// and prints results as an ASCII table or a message line.
use crate::command::{self, CommandOutcome};
use crate::console::print_prompt;
use crate::database::Database;
use crate::errors::Error;
use crate::{echo, echo_lines, error};
use std::io::{self, BufRead};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: &str = r#"
Type '.help' for a list of commands. Type '.exit' to quit.
"#;

/// Builds an ASCII table from headers and rows, padding each column to the
/// widest cell (including the header) seen in it.
pub fn build_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut result = String::new();
    let num_columns = headers.len();

    let mut column_widths = vec![0; num_columns];
    for (i, header) in headers.iter().enumerate() {
        column_widths[i] = header.len();
    }
    for row in rows {
        for (i, col) in row.iter().enumerate() {
            column_widths[i] = column_widths[i].max(col.len());
        }
    }

    let border = |result: &mut String| {
        result.push('+');
        for width in &column_widths {
            result.push_str(&"-".repeat(*width));
            result.push('+');
        }
        result.push('\n');
    };

    border(&mut result);
    if !headers.is_empty() {
        result.push('|');
        for (i, header) in headers.iter().enumerate() {
            result.push_str(&format!("{:<width$}|", header, width = column_widths[i]));
        }
        result.push('\n');
        border(&mut result);
    }
    for row in rows {
        result.push('|');
        for (i, col) in row.iter().enumerate() {
            result.push_str(&format!("{:<width$}|", col, width = column_widths[i]));
        }
        result.push('\n');
    }
    border(&mut result);
    result
}

fn run_line(db: &mut Database, line: &str) -> Result<bool, Error> {
    if line.trim().is_empty() {
        return Ok(true);
    }
    let statement = command::parse(line)?;
    match command::execute(db, statement)? {
        CommandOutcome::Message(msg) => {
            echo_lines!("{}\n", msg);
            Ok(true)
        }
        CommandOutcome::Table { headers, rows } => {
            echo_lines!("{}", build_table(&headers, &rows));
            Ok(true)
        }
        CommandOutcome::Exit => Ok(false),
    }
}

/// Executes every non-empty line of `path` against `db`, stopping (and
/// returning) the first time a statement requests exit.
fn run_script(db: &mut Database, path: &str) -> Result<bool, Error> {
    let file = std::fs::File::open(path)?;
    for line in io::BufReader::new(file).lines() {
        let line = line?;
        echo!("{}\n", line);
        match run_line(db, &line) {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) => error!("{}\n", e),
        }
    }
    Ok(true)
}

pub fn start(db_name: &str, script: Option<&str>) -> Result<(), Error> {
    let mut db = Database::open(db_name)?;
    info!(database = db_name, "starting REPL");

    echo!("Welcome to teto {}.\n", VERSION);
    echo_lines!("{}\n", BANNER);

    if let Some(path) = script {
        if !run_script(&mut db, path)? {
            db.commit()?;
            return Ok(());
        }
    }

    let stdin = io::stdin();
    loop {
        print_prompt()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match run_line(&mut db, &line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => error!("{}\n", e),
        }
    }

    db.commit()?;
    echo!("Bye\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_renders_header_and_rows() {
        let headers = vec!["id".to_string(), "name".to_string()];
        let rows = vec![vec!["1".to_string(), "alice".to_string()]];
        let table = build_table(&headers, &rows);
        assert!(table.contains("id"));
        assert!(table.contains("alice"));
        assert!(table.starts_with('+'));
    }
}
