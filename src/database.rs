/// `Database`/`Table` glue: wires the command layer to the heap table and
/// its secondary indexes, and owns the catalog.
use crate::btree::BTree;
use crate::catalog::{self, TableMeta};
use crate::err;
use crate::errors::Error;
use crate::heap::HeapTable;
use crate::schema::{Column, ColumnType, Row, TableSchema, Value};
use std::collections::HashMap;
use tracing::{info, warn};

pub struct Table {
    heap: HeapTable,
    indexes: HashMap<String, BTree>,
}

impl Table {
    pub fn schema(&self) -> &TableSchema {
        &self.heap.schema
    }

    pub fn row_count(&self) -> u32 {
        self.heap.row_count()
    }

    fn index_insert(&mut self, col: &str, key: i32, row_id: u32) -> Result<(), Error> {
        let Table { heap, indexes, .. } = self;
        let tree = indexes
            .get_mut(col)
            .ok_or_else(|| err!(Storage, "no index on column '{}'", col))?;
        let mut is_deleted = |rid: u32| heap.is_row_deleted(rid).unwrap_or(true);
        tree.insert(key, row_id, &mut is_deleted)
    }

    pub fn insert(&mut self, values: &Row) -> Result<u32, Error> {
        let row_id = self.heap.next_row_id();
        for col in self.heap.schema.indexed_columns().cloned().collect::<Vec<Column>>() {
            let key = values
                .get(&col.name)
                .and_then(Value::as_int)
                .ok_or_else(|| err!(InvalidSchema, "missing value for indexed column '{}'", col.name))?;
            self.index_insert(&col.name, key, row_id)?;
        }
        self.heap.insert_row(row_id, values)?;
        Ok(row_id)
    }

    pub fn select_all(&mut self) -> Result<Vec<(u32, Row)>, Error> {
        self.heap.select_all()
    }

    pub fn select_range(&mut self, col: &str, lo: i32, hi: i32) -> Result<Vec<(u32, Row)>, Error> {
        if let Some(indexed_col) = self.heap.schema.column(col).filter(|c| c.indexed) {
            let _ = indexed_col;
            let Table { heap, indexes, .. } = self;
            let tree = indexes
                .get_mut(col)
                .ok_or_else(|| err!(Storage, "no index on column '{}'", col))?;
            let mut is_deleted = |rid: u32| heap.is_row_deleted(rid).unwrap_or(true);
            let row_ids = tree.select_range(lo, hi, &mut is_deleted)?;
            let mut out = Vec::with_capacity(row_ids.len());
            for rid in row_ids {
                out.push((rid, heap.read_row(rid)?));
            }
            Ok(out)
        } else {
            let mut out = Vec::new();
            for (row_id, row) in self.heap.select_all()? {
                if let Some(v) = row.get(col).and_then(Value::as_int) {
                    if v >= lo && v <= hi {
                        out.push((row_id, row));
                    }
                }
            }
            Ok(out)
        }
    }

    pub fn delete_all(&mut self) -> Result<usize, Error> {
        self.heap.delete_all()
    }

    pub fn delete_range(&mut self, col: &str, lo: i32, hi: i32) -> Result<usize, Error> {
        if self.heap.schema.column(col).map(|c| c.indexed).unwrap_or(false) {
            let Table { heap, indexes, .. } = self;
            let tree = indexes
                .get_mut(col)
                .ok_or_else(|| err!(Storage, "no index on column '{}'", col))?;
            let mut mark_deleted = |rid: u32| heap.mark_row_deleted(rid);
            let mut is_deleted = |rid: u32| heap.is_row_deleted(rid).unwrap_or(true);
            tree.delete_range(lo, hi, &mut mark_deleted, &mut is_deleted)
        } else {
            let mut count = 0;
            let rows = self.heap.select_all()?;
            for (row_id, row) in rows {
                if let Some(v) = row.get(col).and_then(Value::as_int) {
                    if v >= lo && v <= hi {
                        self.heap.mark_row_deleted(row_id)?;
                        count += 1;
                    }
                }
            }
            Ok(count)
        }
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.heap.commit()?;
        for tree in self.indexes.values_mut() {
            tree.commit()?;
        }
        Ok(())
    }
}

/// Owns every table of one on-disk database and the catalog describing
/// them.
pub struct Database {
    pub name: String,
    tables: HashMap<String, Table>,
}

fn catalog_path(db_name: &str) -> String {
    format!("{}.teto", db_name)
}

fn heap_path(db_name: &str, table_name: &str) -> String {
    format!("{}_{}.db", db_name, table_name)
}

fn index_path(db_name: &str, table_name: &str, col: &str) -> String {
    format!("{}_{}_{}.btree", db_name, table_name, col)
}

impl Database {
    /// Opens (creating if absent) the database named `name`, loading every
    /// table and index listed in its catalog.
    pub fn open(name: &str) -> Result<Self, Error> {
        let metas = catalog::load(catalog_path(name))?;
        let mut tables = HashMap::new();

        for meta in metas {
            let table_name = meta.schema.name.clone();
            let heap = HeapTable::open(heap_path(name, &table_name), meta.schema.clone(), meta.row_count, meta.free_list)?;

            let mut indexes = HashMap::new();
            for col in meta.schema.indexed_columns() {
                let tree = BTree::open(index_path(name, &table_name, &col.name))?;
                indexes.insert(col.name.clone(), tree);
            }

            tables.insert(table_name, Table { heap, indexes });
        }

        info!(database = name, tables = tables.len(), "opened database");
        Ok(Database {
            name: name.to_string(),
            tables,
        })
    }

    pub fn create_table(
        &mut self,
        name: &str,
        column_specs: &[(String, ColumnType, u32)],
    ) -> Result<(), Error> {
        if self.tables.contains_key(name) {
            return Err(err!(TableAlreadyExists, "table '{}' already exists", name));
        }

        let mut columns = Vec::with_capacity(column_specs.len());
        let mut offset = 1u32;
        for (col_name, col_type, size_or_index) in column_specs {
            let (size, indexed) = match col_type {
                ColumnType::Int => (4, *size_or_index != 0),
                ColumnType::Char => (*size_or_index, false),
            };
            columns.push(Column {
                name: col_name.clone(),
                col_type: *col_type,
                size,
                offset,
                indexed,
            });
            offset += size;
        }

        let schema = TableSchema {
            name: name.to_string(),
            columns,
        };

        let heap = HeapTable::open(heap_path(&self.name, name), schema.clone(), 0, Vec::new())?;

        let mut indexes = HashMap::new();
        for col in schema.indexed_columns() {
            let tree = BTree::open(index_path(&self.name, name, &col.name))?;
            indexes.insert(col.name.clone(), tree);
        }

        self.tables.insert(name.to_string(), Table { heap, indexes });
        info!(database = %self.name, table = name, "created table");
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&Table, Error> {
        self.tables
            .get(name)
            .ok_or_else(|| err!(TableNotFound, "table '{}' does not exist", name))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table, Error> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| err!(TableNotFound, "table '{}' does not exist", name))
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Writes the catalog file and flushes every table's pager (heap plus
    /// every index).
    pub fn commit(&mut self) -> Result<(), Error> {
        info!(database = %self.name, "committing database");

        for (name, table) in self.tables.iter_mut() {
            if let Err(e) = table.commit() {
                warn!(table = %name, "failed to flush table: {}", e);
                return Err(e);
            }
        }

        let metas: Vec<TableMeta> = self
            .tables
            .values()
            .map(|t| TableMeta {
                schema: t.schema().clone(),
                row_count: t.heap.row_count(),
                free_list: t.heap.free_list().to_vec(),
            })
            .collect();
        catalog::save(catalog_path(&self.name), &metas)?;

        info!(database = %self.name, "commit complete");
        Ok(())
    }
}
