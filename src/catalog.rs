/// The plain-text catalog file: `<numTables>` then, per table, a header
/// line, one line per column, and the free-list contents. Format confirmed
/// against the original implementation's `FlushToMeta`/`LoadFromMeta`.
use crate::err;
use crate::errors::Error;
use crate::schema::{Column, ColumnType, TableSchema};
use std::fs;
use std::path::Path;

pub struct TableMeta {
    pub schema: TableSchema,
    pub row_count: u32,
    pub free_list: Vec<u32>,
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<TableMeta>, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();

    let num_tables: usize = parse_first_token(lines.next(), "table count")?;
    let mut tables = Vec::with_capacity(num_tables);

    for _ in 0..num_tables {
        let header = lines
            .next()
            .ok_or_else(|| err!(Storage, "catalog truncated: missing table header"))?;
        let mut header_parts = header.split_whitespace();
        let name = header_parts
            .next()
            .ok_or_else(|| err!(Storage, "catalog: missing table name"))?
            .to_string();
        let row_count: u32 = header_parts
            .next()
            .ok_or_else(|| err!(Storage, "catalog: missing rowCount for '{}'", name))?
            .parse()
            .map_err(|_| err!(Storage, "catalog: invalid rowCount for '{}'", name))?;
        let num_cols: usize = header_parts
            .next()
            .ok_or_else(|| err!(Storage, "catalog: missing numCols for '{}'", name))?
            .parse()
            .map_err(|_| err!(Storage, "catalog: invalid numCols for '{}'", name))?;

        let mut columns = Vec::with_capacity(num_cols);
        for _ in 0..num_cols {
            let line = lines
                .next()
                .ok_or_else(|| err!(Storage, "catalog truncated: missing column for '{}'", name))?;
            let mut parts = line.split_whitespace();
            let col_name = parts
                .next()
                .ok_or_else(|| err!(Storage, "catalog: missing column name"))?
                .to_string();
            let type_id: u8 = parts
                .next()
                .ok_or_else(|| err!(Storage, "catalog: missing column type"))?
                .parse()
                .map_err(|_| err!(Storage, "catalog: invalid column type"))?;
            let size_or_index: u32 = parts
                .next()
                .ok_or_else(|| err!(Storage, "catalog: missing column size/index field"))?
                .parse()
                .map_err(|_| err!(Storage, "catalog: invalid column size/index field"))?;
            let offset: u32 = parts
                .next()
                .ok_or_else(|| err!(Storage, "catalog: missing column offset"))?
                .parse()
                .map_err(|_| err!(Storage, "catalog: invalid column offset"))?;

            let col_type = ColumnType::from_type_id(type_id)
                .ok_or_else(|| err!(Storage, "catalog: unknown column type id {}", type_id))?;

            let (size, indexed) = match col_type {
                ColumnType::Int => (4, size_or_index != 0),
                ColumnType::Char => (size_or_index, false),
            };

            columns.push(Column {
                name: col_name,
                col_type,
                size,
                offset,
                indexed,
            });
        }

        let free_list_line = lines
            .next()
            .ok_or_else(|| err!(Storage, "catalog truncated: missing free list size for '{}'", name))?;
        let free_list_size: usize = free_list_line
            .trim()
            .parse()
            .map_err(|_| err!(Storage, "catalog: invalid free list size for '{}'", name))?;

        let free_list: Vec<u32> = if free_list_size == 0 {
            Vec::new()
        } else {
            let ids_line = lines
                .next()
                .ok_or_else(|| err!(Storage, "catalog truncated: missing free list ids for '{}'", name))?;
            ids_line
                .split_whitespace()
                .map(|t| t.parse::<u32>().map_err(|_| err!(Storage, "catalog: invalid free list id")))
                .collect::<Result<Vec<u32>, Error>>()?
        };

        tables.push(TableMeta {
            schema: TableSchema { name, columns },
            row_count,
            free_list,
        });
    }

    Ok(tables)
}

pub fn save(path: impl AsRef<Path>, tables: &[TableMeta]) -> Result<(), Error> {
    let mut out = String::new();
    out.push_str(&format!("{}\n", tables.len()));
    for t in tables {
        out.push_str(&format!(
            "{} {} {}\n",
            t.schema.name,
            t.row_count,
            t.schema.columns.len()
        ));
        for col in &t.schema.columns {
            let size_or_index = match col.col_type {
                ColumnType::Int => col.indexed as u32,
                ColumnType::Char => col.size,
            };
            out.push_str(&format!(
                "{} {} {} {}\n",
                col.name,
                col.col_type.type_id(),
                size_or_index,
                col.offset
            ));
        }
        out.push_str(&format!("{}\n", t.free_list.len()));
        if !t.free_list.is_empty() {
            let ids: Vec<String> = t.free_list.iter().map(|id| id.to_string()).collect();
            out.push_str(&ids.join(" "));
            out.push('\n');
        }
    }
    fs::write(path, out)?;
    Ok(())
}

fn parse_first_token(line: Option<&str>, what: &str) -> Result<usize, Error> {
    line.and_then(|l| l.split_whitespace().next())
        .ok_or_else(|| err!(Storage, "catalog: missing {}", what))?
        .parse()
        .map_err(|_| err!(Storage, "catalog: invalid {}", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_empty_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.teto");
        save(&path, &[]).unwrap();
        let loaded = load(&path).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn roundtrip_table_with_columns_and_free_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.teto");
        let schema = TableSchema {
            name: "t".into(),
            columns: vec![
                Column {
                    name: "id".into(),
                    col_type: ColumnType::Int,
                    size: 4,
                    offset: 1,
                    indexed: true,
                },
                Column {
                    name: "name".into(),
                    col_type: ColumnType::Char,
                    size: 8,
                    offset: 5,
                    indexed: false,
                },
            ],
        };
        let tables = vec![TableMeta {
            schema,
            row_count: 6,
            free_list: vec![2, 5],
        }];
        save(&path, &tables).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].row_count, 6);
        assert_eq!(loaded[0].free_list, vec![2, 5]);
        assert_eq!(loaded[0].schema.columns.len(), 2);
        assert!(loaded[0].schema.columns[0].indexed);
        assert_eq!(loaded[0].schema.columns[1].size, 8);
    }
}
