/// Parses and executes one line of the command language: `create table`,
/// `insert into`, `select from [where]`, `delete from [where]`, and the dot
/// commands.
use crate::database::Database;
use crate::err;
use crate::errors::Error;
use crate::schema::{ColumnType, Row, Value};
use std::collections::VecDeque;

#[derive(Debug)]
pub enum DotCommand {
    Exit,
    Commit,
    Tables,
    Schema(String),
    Help,
}

#[derive(Debug)]
pub struct RangeFilter {
    pub column: String,
    pub lo: i32,
    pub hi: i32,
}

#[derive(Debug)]
pub enum Statement {
    CreateTable {
        table: String,
        columns: Vec<(String, ColumnType, u32)>,
    },
    InsertInto {
        table: String,
        values: Vec<String>,
    },
    SelectFrom {
        table: String,
        filter: Option<RangeFilter>,
    },
    DeleteFrom {
        table: String,
        filter: Option<RangeFilter>,
    },
    Dot(DotCommand),
}

pub enum CommandOutcome {
    Message(String),
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Exit,
}

/// Splits a command line into whitespace-separated tokens, treating a
/// double-quoted span as a single token (quotes stripped).
pub fn tokenize(line: &str) -> Result<VecDeque<String>, Error> {
    let mut out = VecDeque::new();
    let mut current = String::new();
    let mut inside_text = false;

    for c in line.chars() {
        match c {
            '"' => inside_text = !inside_text,
            ' ' | '\t' if !inside_text => {
                if !current.is_empty() {
                    out.push_back(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push_back(current);
    }
    if inside_text {
        return Err(err!(Syntax, "unclosed string literal"));
    }
    Ok(out)
}

fn pop(tokens: &mut VecDeque<String>, what: &str) -> Result<String, Error> {
    tokens.pop_front().ok_or_else(|| err!(Syntax, "expected {}", what))
}

fn expect_keyword(tokens: &mut VecDeque<String>, keyword: &str) -> Result<(), Error> {
    let tok = pop(tokens, keyword)?;
    if tok.to_lowercase() != keyword {
        return Err(err!(Syntax, "expected '{}', found '{}'", keyword, tok));
    }
    Ok(())
}

fn parse_column_type(tok: &str) -> Result<ColumnType, Error> {
    match tok.to_lowercase().as_str() {
        "int" => Ok(ColumnType::Int),
        "char" => Ok(ColumnType::Char),
        other => Err(err!(Syntax, "unknown column type '{}'", other)),
    }
}

fn parse_range_filter(tokens: &mut VecDeque<String>) -> Result<Option<RangeFilter>, Error> {
    if tokens.front().map(|t| t.to_lowercase()) != Some("where".to_string()) {
        return Ok(None);
    }
    tokens.pop_front();
    let column = pop(tokens, "column name")?;
    let lo: i32 = pop(tokens, "range lower bound")?
        .parse()
        .map_err(|_| err!(Syntax, "range bounds must be integers"))?;
    let hi: i32 = pop(tokens, "range upper bound")?
        .parse()
        .map_err(|_| err!(Syntax, "range bounds must be integers"))?;
    Ok(Some(RangeFilter { column, lo, hi }))
}

pub fn parse(line: &str) -> Result<Statement, Error> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('.') {
        return parse_dot(rest);
    }

    let mut tokens = tokenize(line)?;
    let keyword = pop(&mut tokens, "statement keyword")?.to_lowercase();
    match keyword.as_str() {
        "create" => {
            expect_keyword(&mut tokens, "table")?;
            let table = pop(&mut tokens, "table name")?;
            let mut columns = Vec::new();
            while !tokens.is_empty() {
                let col_name = pop(&mut tokens, "column name")?;
                let col_type = parse_column_type(&pop(&mut tokens, "column type")?)?;
                let size_or_index: u32 = pop(&mut tokens, "column size or index flag")?
                    .parse()
                    .map_err(|_| err!(Syntax, "column size/index flag must be an integer"))?;
                columns.push((col_name, col_type, size_or_index));
            }
            if columns.is_empty() {
                return Err(err!(Syntax, "create table requires at least one column"));
            }
            Ok(Statement::CreateTable { table, columns })
        }
        "insert" => {
            expect_keyword(&mut tokens, "into")?;
            let table = pop(&mut tokens, "table name")?;
            let values: Vec<String> = tokens.into_iter().collect();
            Ok(Statement::InsertInto { table, values })
        }
        "select" => {
            expect_keyword(&mut tokens, "from")?;
            let table = pop(&mut tokens, "table name")?;
            let filter = parse_range_filter(&mut tokens)?;
            Ok(Statement::SelectFrom { table, filter })
        }
        "delete" => {
            expect_keyword(&mut tokens, "from")?;
            let table = pop(&mut tokens, "table name")?;
            let filter = parse_range_filter(&mut tokens)?;
            Ok(Statement::DeleteFrom { table, filter })
        }
        other => Err(err!(Syntax, "unrecognized statement '{}'", other)),
    }
}

fn parse_dot(rest: &str) -> Result<Statement, Error> {
    let mut parts = rest.split_whitespace();
    let cmd = parts.next().unwrap_or("").to_lowercase();
    match cmd.as_str() {
        "exit" => Ok(Statement::Dot(DotCommand::Exit)),
        "commit" => Ok(Statement::Dot(DotCommand::Commit)),
        "tables" => Ok(Statement::Dot(DotCommand::Tables)),
        "schema" => {
            let table = parts
                .next()
                .ok_or_else(|| err!(Syntax, "usage: .schema <table>"))?;
            Ok(Statement::Dot(DotCommand::Schema(table.to_string())))
        }
        "help" => Ok(Statement::Dot(DotCommand::Help)),
        other => Err(err!(Syntax, "unrecognized dot command '.{}'", other)),
    }
}

fn build_row(values: &[String], schema: &crate::schema::TableSchema) -> Result<Row, Error> {
    if values.len() != schema.columns.len() {
        return Err(err!(
            InvalidSchema,
            "expected {} values, got {}",
            schema.columns.len(),
            values.len()
        ));
    }
    let mut row = Row::new();
    for (col, raw) in schema.columns.iter().zip(values) {
        let value = match col.col_type {
            ColumnType::Int => Value::Int(
                raw.parse()
                    .map_err(|_| err!(InvalidSchema, "column '{}' expects an int, got '{}'", col.name, raw))?,
            ),
            ColumnType::Char => Value::Str(raw.clone()),
        };
        row.insert(col.name.clone(), value);
    }
    Ok(row)
}

fn row_to_strings(schema: &crate::schema::TableSchema, row: &Row) -> Vec<String> {
    schema
        .columns
        .iter()
        .map(|c| row.get(&c.name).map(Value::to_display_string).unwrap_or_default())
        .collect()
}

pub fn execute(db: &mut Database, statement: Statement) -> Result<CommandOutcome, Error> {
    match statement {
        Statement::CreateTable { table, columns } => {
            db.create_table(&table, &columns)?;
            Ok(CommandOutcome::Message(format!("Table '{}' created.", table)))
        }
        Statement::InsertInto { table, values } => {
            let schema = db.table(&table)?.schema().clone();
            let row = build_row(&values, &schema)?;
            let row_id = db.table_mut(&table)?.insert(&row)?;
            Ok(CommandOutcome::Message(format!("Inserted row {} into '{}'.", row_id, table)))
        }
        Statement::SelectFrom { table, filter } => {
            let schema = db.table(&table)?.schema().clone();
            let rows = match filter {
                Some(f) => db.table_mut(&table)?.select_range(&f.column, f.lo, f.hi)?,
                None => db.table_mut(&table)?.select_all()?,
            };
            let headers = schema.columns.iter().map(|c| c.name.clone()).collect();
            let body = rows.iter().map(|(_, row)| row_to_strings(&schema, row)).collect();
            Ok(CommandOutcome::Table { headers, rows: body })
        }
        Statement::DeleteFrom { table, filter } => {
            let count = match filter {
                Some(f) => db.table_mut(&table)?.delete_range(&f.column, f.lo, f.hi)?,
                None => db.table_mut(&table)?.delete_all()?,
            };
            Ok(CommandOutcome::Message(format!("Deleted {} row(s) from '{}'.", count, table)))
        }
        Statement::Dot(DotCommand::Exit) => Ok(CommandOutcome::Exit),
        Statement::Dot(DotCommand::Commit) => {
            db.commit()?;
            Ok(CommandOutcome::Message("Commit complete.".to_string()))
        }
        Statement::Dot(DotCommand::Tables) => {
            let headers = vec!["table".to_string(), "rows".to_string()];
            let mut rows = Vec::new();
            for name in db.table_names() {
                let t = db.table(&name)?;
                rows.push(vec![name.clone(), t.row_count().to_string()]);
            }
            Ok(CommandOutcome::Table { headers, rows })
        }
        Statement::Dot(DotCommand::Schema(table)) => {
            let schema = db.table(&table)?.schema().clone();
            let headers = vec!["column".to_string(), "type".to_string(), "indexed".to_string()];
            let rows = schema
                .columns
                .iter()
                .map(|c| vec![c.name.clone(), c.col_type.as_str().to_string(), c.indexed.to_string()])
                .collect();
            Ok(CommandOutcome::Table { headers, rows })
        }
        Statement::Dot(DotCommand::Help) => Ok(CommandOutcome::Message(
            "Commands:\n\
             create table <T> (<col> <type> <sizeOrIndexFlag>)+\n\
             insert into <T> <v1> <v2> ...\n\
             select from <T> [where <col> <lo> <hi>]\n\
             delete from <T> [where <col> <lo> <hi>]\n\
             .exit  .commit  .tables  .schema <T>  .help"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_quoted_strings_as_one_token() {
        let toks = tokenize(r#"insert into t 7 "alice smith""#).unwrap();
        assert_eq!(
            toks,
            VecDeque::from(vec![
                "insert".to_string(),
                "into".to_string(),
                "t".to_string(),
                "7".to_string(),
                "alice smith".to_string()
            ])
        );
    }

    #[test]
    fn parses_create_table() {
        let stmt = parse("create table t id int 1 name char 8").unwrap();
        match stmt {
            Statement::CreateTable { table, columns } => {
                assert_eq!(table, "t");
                assert_eq!(columns.len(), 2);
                assert_eq!(columns[0].0, "id");
                assert_eq!(columns[0].2, 1);
            }
            _ => panic!("wrong statement"),
        }
    }

    #[test]
    fn parses_select_with_where() {
        let stmt = parse("select from t where id 4 10").unwrap();
        match stmt {
            Statement::SelectFrom { table, filter } => {
                assert_eq!(table, "t");
                let f = filter.unwrap();
                assert_eq!(f.column, "id");
                assert_eq!((f.lo, f.hi), (4, 10));
            }
            _ => panic!("wrong statement"),
        }
    }

    #[test]
    fn rejects_unclosed_quote() {
        assert!(tokenize(r#"insert into t 1 "unterminated"#).is_err());
    }
}
