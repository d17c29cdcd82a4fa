/// Heap table: maps row ids to fixed-width row slots in a data file via its
/// own `Pager`, serializes/deserializes rows, and manages tombstones plus a
/// free list of reclaimable row ids.
use crate::errors::Error;
use crate::pager::{PageNum, Pager, PAGE_SIZE};
use crate::schema::{Column, ColumnType, Row, TableSchema, Value};
use tracing::trace;

const TOMBSTONE_LIVE: u8 = 0;
const TOMBSTONE_DELETED: u8 = 1;

pub struct HeapTable {
    pub schema: TableSchema,
    pager: Pager,
    row_count: u32,
    free_list: Vec<u32>,
}

impl HeapTable {
    pub fn open(
        path: impl AsRef<std::path::Path>,
        schema: TableSchema,
        row_count: u32,
        free_list: Vec<u32>,
    ) -> Result<Self, Error> {
        let pager = Pager::open(path)?;
        Ok(HeapTable {
            schema,
            pager,
            row_count,
            free_list,
        })
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    pub fn free_list(&self) -> &[u32] {
        &self.free_list
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        self.pager.commit()
    }

    fn slot_location(&self, row_id: u32) -> (PageNum, usize) {
        let rows_per_page = self.schema.rows_per_page();
        let page_num = row_id / rows_per_page;
        let offset = ((row_id % rows_per_page) * self.schema.row_size()) as usize;
        (page_num, offset)
    }

    fn ensure_page(&mut self, page_num: PageNum) -> Result<(), Error> {
        while self.pager.num_pages() <= page_num {
            self.pager.allocate_new_page();
        }
        Ok(())
    }

    /// Pops a reusable id from the free list, or grows the high-water mark.
    pub fn next_row_id(&mut self) -> u32 {
        if let Some(id) = self.free_list.pop() {
            id
        } else {
            let id = self.row_count;
            self.row_count += 1;
            id
        }
    }

    pub fn insert_row(&mut self, row_id: u32, values: &Row) -> Result<(), Error> {
        let (page_num, offset) = self.slot_location(row_id);
        self.ensure_page(page_num)?;
        let schema = self.schema.clone();
        let page = self.pager.get_mut(page_num)?;
        page[offset] = TOMBSTONE_LIVE;
        for col in &schema.columns {
            write_column(page, offset, col, values.get(&col.name));
        }
        trace!(row_id, page = page_num, "inserted row");
        Ok(())
    }

    pub fn read_row(&mut self, row_id: u32) -> Result<Row, Error> {
        let (page_num, offset) = self.slot_location(row_id);
        let schema = self.schema.clone();
        let page = self.pager.get(page_num)?;
        let mut row = Row::new();
        for col in &schema.columns {
            row.insert(col.name.clone(), read_column(page, offset, col));
        }
        Ok(row)
    }

    /// True if the tombstone byte is set or the row id was never assigned.
    pub fn is_row_deleted(&mut self, row_id: u32) -> Result<bool, Error> {
        if row_id >= self.row_count {
            return Ok(true);
        }
        let (page_num, offset) = self.slot_location(row_id);
        if page_num >= self.pager.num_pages() {
            return Ok(true);
        }
        let page = self.pager.get(page_num)?;
        Ok(page[offset] == TOMBSTONE_DELETED)
    }

    /// Idempotent: marking an already-deleted row a second time is a no-op.
    pub fn mark_row_deleted(&mut self, row_id: u32) -> Result<(), Error> {
        if self.is_row_deleted(row_id)? {
            return Ok(());
        }
        let (page_num, offset) = self.slot_location(row_id);
        let page = self.pager.get_mut(page_num)?;
        page[offset] = TOMBSTONE_DELETED;
        self.free_list.push(row_id);
        trace!(row_id, "tombstoned row");
        Ok(())
    }

    /// Every live row in row-id ascending order.
    pub fn select_all(&mut self) -> Result<Vec<(u32, Row)>, Error> {
        let mut out = Vec::new();
        for row_id in 0..self.row_count {
            if !self.is_row_deleted(row_id)? {
                out.push((row_id, self.read_row(row_id)?));
            }
        }
        Ok(out)
    }

    /// Tombstones every live row without touching any index.
    pub fn delete_all(&mut self) -> Result<usize, Error> {
        let mut count = 0;
        for row_id in 0..self.row_count {
            if !self.is_row_deleted(row_id)? {
                self.mark_row_deleted(row_id)?;
                count += 1;
            }
        }
        Ok(count)
    }
}

fn write_column(page: &mut [u8; PAGE_SIZE], slot_offset: usize, col: &Column, value: Option<&Value>) {
    let at = slot_offset + col.offset as usize;
    match col.col_type {
        ColumnType::Int => {
            let v = match value {
                Some(Value::Int(v)) => *v,
                _ => 0,
            };
            page[at..at + 4].copy_from_slice(&v.to_le_bytes());
        }
        ColumnType::Char => {
            let size = col.size as usize;
            let slice = &mut page[at..at + size];
            slice.fill(0);
            if let Some(Value::Str(s)) = value {
                let bytes = s.as_bytes();
                let n = bytes.len().min(size.saturating_sub(1));
                slice[..n].copy_from_slice(&bytes[..n]);
            }
        }
    }
}

fn read_column(page: &[u8; PAGE_SIZE], slot_offset: usize, col: &Column) -> Value {
    let at = slot_offset + col.offset as usize;
    match col.col_type {
        ColumnType::Int => {
            let v = i32::from_le_bytes(page[at..at + 4].try_into().unwrap());
            Value::Int(v)
        }
        ColumnType::Char => {
            let size = col.size as usize;
            let bytes = &page[at..at + size];
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(size);
            Value::Str(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use tempfile::tempdir;

    fn schema() -> TableSchema {
        TableSchema {
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
        }
    }

    fn row(id: i32, name: &str) -> Row {
        let mut r = Row::new();
        r.insert("id".into(), Value::Int(id));
        r.insert("name".into(), Value::Str(name.into()));
        r
    }

    #[test]
    fn insert_and_read_roundtrip() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::open(dir.path().join("t.db"), schema(), 0, vec![]).unwrap();
        let id = table.next_row_id();
        table.insert_row(id, &row(7, "alice")).unwrap();

        let got = table.read_row(id).unwrap();
        assert_eq!(got.get("id").unwrap().as_int(), Some(7));
        assert_eq!(got.get("name").unwrap().to_display_string(), "alice");
    }

    #[test]
    fn delete_then_reinsert_reuses_free_list() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::open(dir.path().join("t.db"), schema(), 0, vec![]).unwrap();
        let mut ids = Vec::new();
        for i in 0..5 {
            let id = table.next_row_id();
            table.insert_row(id, &row(i, "x")).unwrap();
            ids.push(id);
        }
        table.delete_all().unwrap();
        assert_eq!(table.select_all().unwrap().len(), 0);

        for i in 0..3 {
            let id = table.next_row_id();
            assert_eq!(id, ids[4 - i as usize]);
            table.insert_row(id, &row(100 + i, "y")).unwrap();
        }
        assert_eq!(table.select_all().unwrap().len(), 3);
    }

    #[test]
    fn mark_deleted_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::open(dir.path().join("t.db"), schema(), 0, vec![]).unwrap();
        let id = table.next_row_id();
        table.insert_row(id, &row(1, "a")).unwrap();
        table.mark_row_deleted(id).unwrap();
        table.mark_row_deleted(id).unwrap();
        assert_eq!(table.free_list(), &[id]);
    }
}
