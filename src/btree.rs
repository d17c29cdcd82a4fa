/// A persistent B+Tree keyed on the composite `(key: i32, rowId: u32)` pair,
/// used as a secondary index over an integer column. Leaves are threaded
/// into a singly linked list in key order for ordered range scans; the tree
/// cooperates with its owning table's tombstones via caller-supplied
/// closures rather than an upward dependency on the table.
use crate::errors::Error;
use crate::pager::{PageNum, Pager, PAGE_SIZE};
use tracing::trace;

const HEADER_TYPE_OFFSET: usize = 0;
const HEADER_IS_ROOT_OFFSET: usize = 1;
const HEADER_NUM_CELLS_OFFSET: usize = 2;
const HEADER_PARENT_OFFSET: usize = 4;
const COMMON_HEADER_SIZE: usize = 8;

const LEAF_NEXT_LEAF_OFFSET: usize = COMMON_HEADER_SIZE;
const LEAF_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 4;
const LEAF_CELL_SIZE: usize = 8; // key:4 + row_id:4

const INTERNAL_RIGHT_CHILD_OFFSET: usize = COMMON_HEADER_SIZE;
const INTERNAL_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 4;
const INTERNAL_CELL_SIZE: usize = 12; // key:4 + row_id:4 + child:4

pub fn default_leaf_max_cells() -> usize {
    (PAGE_SIZE - LEAF_HEADER_SIZE) / LEAF_CELL_SIZE
}

pub fn default_internal_max_cells() -> usize {
    (PAGE_SIZE - INTERNAL_HEADER_SIZE) / INTERNAL_CELL_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeType {
    Leaf,
    Internal,
}

fn node_type(page: &[u8; PAGE_SIZE]) -> NodeType {
    if page[HEADER_TYPE_OFFSET] == 1 {
        NodeType::Internal
    } else {
        NodeType::Leaf
    }
}

fn set_node_type(page: &mut [u8; PAGE_SIZE], t: NodeType) {
    page[HEADER_TYPE_OFFSET] = match t {
        NodeType::Leaf => 0,
        NodeType::Internal => 1,
    };
}

fn is_root(page: &[u8; PAGE_SIZE]) -> bool {
    page[HEADER_IS_ROOT_OFFSET] == 1
}

fn set_is_root(page: &mut [u8; PAGE_SIZE], v: bool) {
    page[HEADER_IS_ROOT_OFFSET] = v as u8;
}

fn num_cells(page: &[u8; PAGE_SIZE]) -> u16 {
    u16::from_le_bytes(page[HEADER_NUM_CELLS_OFFSET..HEADER_NUM_CELLS_OFFSET + 2].try_into().unwrap())
}

fn set_num_cells(page: &mut [u8; PAGE_SIZE], n: u16) {
    page[HEADER_NUM_CELLS_OFFSET..HEADER_NUM_CELLS_OFFSET + 2].copy_from_slice(&n.to_le_bytes());
}

fn parent(page: &[u8; PAGE_SIZE]) -> PageNum {
    u32::from_le_bytes(page[HEADER_PARENT_OFFSET..HEADER_PARENT_OFFSET + 4].try_into().unwrap())
}

fn set_parent(page: &mut [u8; PAGE_SIZE], p: PageNum) {
    page[HEADER_PARENT_OFFSET..HEADER_PARENT_OFFSET + 4].copy_from_slice(&p.to_le_bytes());
}

fn next_leaf(page: &[u8; PAGE_SIZE]) -> PageNum {
    u32::from_le_bytes(page[LEAF_NEXT_LEAF_OFFSET..LEAF_NEXT_LEAF_OFFSET + 4].try_into().unwrap())
}

fn set_next_leaf(page: &mut [u8; PAGE_SIZE], p: PageNum) {
    page[LEAF_NEXT_LEAF_OFFSET..LEAF_NEXT_LEAF_OFFSET + 4].copy_from_slice(&p.to_le_bytes());
}

fn leaf_cell_offset(i: usize) -> usize {
    LEAF_HEADER_SIZE + i * LEAF_CELL_SIZE
}

fn leaf_cell(page: &[u8; PAGE_SIZE], i: usize) -> (i32, u32) {
    let o = leaf_cell_offset(i);
    let key = i32::from_le_bytes(page[o..o + 4].try_into().unwrap());
    let row_id = u32::from_le_bytes(page[o + 4..o + 8].try_into().unwrap());
    (key, row_id)
}

fn set_leaf_cell(page: &mut [u8; PAGE_SIZE], i: usize, key: i32, row_id: u32) {
    let o = leaf_cell_offset(i);
    page[o..o + 4].copy_from_slice(&key.to_le_bytes());
    page[o + 4..o + 8].copy_from_slice(&row_id.to_le_bytes());
}

fn internal_cell_offset(i: usize) -> usize {
    INTERNAL_HEADER_SIZE + i * INTERNAL_CELL_SIZE
}

fn internal_cell(page: &[u8; PAGE_SIZE], i: usize) -> (i32, u32, PageNum) {
    let o = internal_cell_offset(i);
    let key = i32::from_le_bytes(page[o..o + 4].try_into().unwrap());
    let row_id = u32::from_le_bytes(page[o + 4..o + 8].try_into().unwrap());
    let child = u32::from_le_bytes(page[o + 8..o + 12].try_into().unwrap());
    (key, row_id, child)
}

fn set_internal_cell(page: &mut [u8; PAGE_SIZE], i: usize, key: i32, row_id: u32, child: PageNum) {
    let o = internal_cell_offset(i);
    page[o..o + 4].copy_from_slice(&key.to_le_bytes());
    page[o + 4..o + 8].copy_from_slice(&row_id.to_le_bytes());
    page[o + 8..o + 12].copy_from_slice(&child.to_le_bytes());
}

fn right_child(page: &[u8; PAGE_SIZE]) -> PageNum {
    u32::from_le_bytes(
        page[INTERNAL_RIGHT_CHILD_OFFSET..INTERNAL_RIGHT_CHILD_OFFSET + 4]
            .try_into()
            .unwrap(),
    )
}

fn set_right_child(page: &mut [u8; PAGE_SIZE], p: PageNum) {
    page[INTERNAL_RIGHT_CHILD_OFFSET..INTERNAL_RIGHT_CHILD_OFFSET + 4].copy_from_slice(&p.to_le_bytes());
}

fn init_leaf(page: &mut [u8; PAGE_SIZE]) {
    set_node_type(page, NodeType::Leaf);
    set_is_root(page, false);
    set_num_cells(page, 0);
    set_parent(page, 0);
    set_next_leaf(page, 0);
}

fn init_internal(page: &mut [u8; PAGE_SIZE]) {
    set_node_type(page, NodeType::Internal);
    set_is_root(page, false);
    set_num_cells(page, 0);
    set_parent(page, 0);
    set_right_child(page, 0);
}

/// A secondary index on one integer column, backed by its own `Pager`.
pub struct BTree {
    pager: Pager,
    leaf_max_cells: usize,
    internal_max_cells: usize,
}

impl BTree {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        Self::open_with_fanout(path, default_leaf_max_cells(), default_internal_max_cells())
    }

    /// Used by tests to force small fanout so splits happen under tiny
    /// workloads, matching the scenarios that exercise split/root-split
    /// logic.
    pub fn open_with_fanout(
        path: impl AsRef<std::path::Path>,
        leaf_max_cells: usize,
        internal_max_cells: usize,
    ) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            let root = pager.allocate_new_page();
            let page = pager.get_mut(root)?;
            init_leaf(page);
            set_is_root(page, true);
        }
        Ok(BTree {
            pager,
            leaf_max_cells,
            internal_max_cells,
        })
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        self.pager.commit()
    }

    fn find_leaf(&mut self, key: i32, row_id: u32) -> Result<PageNum, Error> {
        let mut page_num: PageNum = 0;
        loop {
            let page = self.pager.get(page_num)?;
            if node_type(page) == NodeType::Leaf {
                return Ok(page_num);
            }
            let n = num_cells(page) as usize;
            let mut child = right_child(page);
            for i in 0..n {
                let (k, r) = (internal_cell(page, i).0, internal_cell(page, i).1);
                if (key, row_id) < (k, r) {
                    child = internal_cell(page, i).2;
                    break;
                }
            }
            page_num = child;
        }
    }

    fn leaf_lower_bound(page: &[u8; PAGE_SIZE], n: usize, target: (i32, u32)) -> usize {
        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if leaf_cell(page, mid) < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn insert(
        &mut self,
        key: i32,
        row_id: u32,
        is_deleted: &mut dyn FnMut(u32) -> bool,
    ) -> Result<(), Error> {
        let leaf_page = self.find_leaf(key, row_id)?;
        self.leaf_insert(leaf_page, key, row_id, is_deleted)
    }

    fn leaf_insert(
        &mut self,
        leaf_page: PageNum,
        key: i32,
        row_id: u32,
        is_deleted: &mut dyn FnMut(u32) -> bool,
    ) -> Result<(), Error> {
        let (n, idx, reuse_row) = {
            let page = self.pager.get(leaf_page)?;
            let n = num_cells(page) as usize;
            let idx = Self::leaf_lower_bound(page, n, (key, row_id));
            let reuse = if idx < n {
                Some(leaf_cell(page, idx).1)
            } else {
                None
            };
            (n, idx, reuse)
        };

        if let Some(existing_row_id) = reuse_row {
            if is_deleted(existing_row_id) {
                let page = self.pager.get_mut(leaf_page)?;
                set_leaf_cell(page, idx, key, row_id);
                return Ok(());
            }
        }

        if n < self.leaf_max_cells {
            self.leaf_insert_nonfull(leaf_page, key, row_id)?;
            return Ok(());
        }

        trace!(page = leaf_page, "leaf full, splitting");
        let (new_right_page, sep_key, sep_row_id) = self.split_leaf(leaf_page, key, row_id)?;
        self.insert_separator(leaf_page, new_right_page, sep_key, sep_row_id)
    }

    /// Shift-insert `(key, row_id)` into a leaf known to have room. Finds
    /// its own insertion point, mirroring the original `LeafNodeInsertNonFull`.
    fn leaf_insert_nonfull(&mut self, leaf_page: PageNum, key: i32, row_id: u32) -> Result<(), Error> {
        let page = self.pager.get_mut(leaf_page)?;
        let n = num_cells(page) as usize;
        let idx = Self::leaf_lower_bound(page, n, (key, row_id));
        for i in (idx..n).rev() {
            let (k, r) = leaf_cell(page, i);
            set_leaf_cell(page, i + 1, k, r);
        }
        set_leaf_cell(page, idx, key, row_id);
        set_num_cells(page, (n + 1) as u16);
        Ok(())
    }

    /// Splits a full leaf at `splitIdx = (MAX+1)/2` computed over the
    /// *pre-insertion* cells, then routes the pending `(key, row_id)` into
    /// whichever side it belongs to — mirroring `LeafNodeInsert`.
    fn split_leaf(
        &mut self,
        leaf_page: PageNum,
        key: i32,
        row_id: u32,
    ) -> Result<(PageNum, i32, u32), Error> {
        let (old_cells, old_next_leaf, old_parent) = {
            let page = self.pager.get(leaf_page)?;
            let n = num_cells(page) as usize;
            let old_cells: Vec<(i32, u32)> = (0..n).map(|i| leaf_cell(page, i)).collect();
            (old_cells, next_leaf(page), parent(page))
        };

        let split_idx = (self.leaf_max_cells + 1) / 2;
        let left = &old_cells[..split_idx];
        let right = &old_cells[split_idx..];

        let new_right_page = self.pager.allocate_new_page();

        {
            let page = self.pager.get_mut(leaf_page)?;
            set_num_cells(page, left.len() as u16);
            set_next_leaf(page, new_right_page);
        }
        {
            let page = self.pager.get_mut(new_right_page)?;
            init_leaf(page);
            for (i, &(k, r)) in right.iter().enumerate() {
                set_leaf_cell(page, i, k, r);
            }
            set_num_cells(page, right.len() as u16);
            set_next_leaf(page, old_next_leaf);
            set_parent(page, old_parent);
        }

        let (sep_key, sep_row_id) = right[0];

        if key >= sep_key {
            self.leaf_insert_nonfull(new_right_page, key, row_id)?;
        } else {
            self.leaf_insert_nonfull(leaf_page, key, row_id)?;
        }

        Ok((new_right_page, sep_key, sep_row_id))
    }

    /// Propagate a freshly split child's separator into its parent, or
    /// split the root if the child had none.
    fn insert_separator(
        &mut self,
        child_page: PageNum,
        new_child_page: PageNum,
        key: i32,
        row_id: u32,
    ) -> Result<(), Error> {
        let (child_is_root, child_parent) = {
            let page = self.pager.get(child_page)?;
            (is_root(page), parent(page))
        };
        if child_is_root {
            self.create_new_root(child_page, new_child_page, key, row_id)
        } else {
            self.internal_insert(child_parent, key, row_id, new_child_page)
        }
    }

    fn read_internal(&mut self, page_num: PageNum) -> Result<(Vec<(i32, u32)>, Vec<PageNum>), Error> {
        let page = self.pager.get(page_num)?;
        let n = num_cells(page) as usize;
        let mut seps = Vec::with_capacity(n);
        let mut children = Vec::with_capacity(n + 1);
        for i in 0..n {
            let (k, r, c) = internal_cell(page, i);
            seps.push((k, r));
            children.push(c);
        }
        children.push(right_child(page));
        Ok((seps, children))
    }

    fn internal_insert(
        &mut self,
        parent_page: PageNum,
        key: i32,
        row_id: u32,
        new_child: PageNum,
    ) -> Result<(), Error> {
        let n = { let page = self.pager.get(parent_page)?; num_cells(page) as usize };

        if n < self.internal_max_cells {
            self.internal_insert_nonfull(parent_page, key, row_id, new_child)?;
            self.set_parent_of(new_child, parent_page)?;
            return Ok(());
        }

        trace!(page = parent_page, "internal node full, splitting");
        let (promoted, new_right_page) = self.split_internal(parent_page)?;
        if key >= promoted.0 {
            self.internal_insert_nonfull(new_right_page, key, row_id, new_child)?;
            self.set_parent_of(new_child, new_right_page)?;
        } else {
            self.internal_insert_nonfull(parent_page, key, row_id, new_child)?;
            self.set_parent_of(new_child, parent_page)?;
        }
        self.insert_separator(parent_page, new_right_page, promoted.0, promoted.1)
    }

    /// Shift-insert `(key, row_id, new_child)` into an internal node known
    /// to have room, mirroring `InternalNodeInsert`'s non-full branch: the
    /// separator at the insertion point keeps its own `childPage` (the left
    /// subtree pointer for the new separator), and `new_child` becomes the
    /// right subtree pointer of whatever ends up immediately after it.
    fn internal_insert_nonfull(
        &mut self,
        page_num: PageNum,
        key: i32,
        row_id: u32,
        new_child: PageNum,
    ) -> Result<(), Error> {
        let page = self.pager.get_mut(page_num)?;
        let n = num_cells(page) as usize;

        let mut i = 0;
        while i < n {
            let (k, r, _) = internal_cell(page, i);
            if (k, r) >= (key, row_id) {
                break;
            }
            i += 1;
        }

        if i == n {
            let old_right_child = right_child(page);
            set_internal_cell(page, n, key, row_id, old_right_child);
            set_right_child(page, new_child);
        } else {
            for j in (i..n).rev() {
                let (k, r, c) = internal_cell(page, j);
                set_internal_cell(page, j + 1, k, r, c);
            }
            let (shifted_k, shifted_r, _) = internal_cell(page, i + 1);
            set_internal_cell(page, i + 1, shifted_k, shifted_r, new_child);
            let (_, _, keep_child) = internal_cell(page, i);
            set_internal_cell(page, i, key, row_id, keep_child);
        }
        set_num_cells(page, (n + 1) as u16);
        Ok(())
    }

    fn set_parent_of(&mut self, page_num: PageNum, parent_page: PageNum) -> Result<(), Error> {
        let page = self.pager.get_mut(page_num)?;
        set_parent(page, parent_page);
        Ok(())
    }

    /// Split a full internal node at `splitIdx = MAX/2` computed over the
    /// pre-insertion cells. Returns the promoted separator and the new
    /// right sibling's page number; does not itself recurse upward.
    fn split_internal(&mut self, page_num: PageNum) -> Result<((i32, u32), PageNum), Error> {
        let (seps, children) = self.read_internal(page_num)?;

        let split_idx = self.internal_max_cells / 2;
        let promoted = seps[split_idx];
        let left_rightmost = children[split_idx];

        let left_seps = &seps[..split_idx];
        let left_children: Vec<PageNum> = children[..split_idx]
            .iter()
            .copied()
            .chain(std::iter::once(left_rightmost))
            .collect();

        let right_seps = &seps[split_idx + 1..];
        let right_children = &children[split_idx + 1..];

        let old_parent = { let page = self.pager.get(page_num)?; parent(page) };
        let new_right_page = self.pager.allocate_new_page();

        {
            let page = self.pager.get_mut(page_num)?;
            for (i, &(k, r)) in left_seps.iter().enumerate() {
                set_internal_cell(page, i, k, r, left_children[i]);
            }
            set_num_cells(page, left_seps.len() as u16);
            set_right_child(page, *left_children.last().unwrap());
        }

        {
            let page = self.pager.get_mut(new_right_page)?;
            init_internal(page);
            for (i, &(k, r)) in right_seps.iter().enumerate() {
                set_internal_cell(page, i, k, r, right_children[i]);
            }
            set_num_cells(page, right_seps.len() as u16);
            set_right_child(page, *right_children.last().unwrap());
            set_parent(page, old_parent);
        }

        for &child in &left_children {
            self.set_parent_of(child, page_num)?;
        }
        for &child in right_children {
            self.set_parent_of(child, new_right_page)?;
        }

        Ok((promoted, new_right_page))
    }

    fn create_new_root(
        &mut self,
        old_root_page: PageNum,
        new_right_page: PageNum,
        key: i32,
        row_id: u32,
    ) -> Result<(), Error> {
        let old_bytes = *self.pager.get(old_root_page)?;
        let new_left_page = self.pager.allocate_new_page();

        {
            let page = self.pager.get_mut(new_left_page)?;
            *page = old_bytes;
            set_is_root(page, false);
            set_parent(page, old_root_page);
        }

        let left_is_internal = node_type(&old_bytes) == NodeType::Internal;
        if left_is_internal {
            let (_, children) = self.read_internal(new_left_page)?;
            for child in children {
                self.set_parent_of(child, new_left_page)?;
            }
        }

        self.set_parent_of(new_right_page, old_root_page)?;
        {
            let page = self.pager.get_mut(new_right_page)?;
            set_is_root(page, false);
        }

        let page = self.pager.get_mut(old_root_page)?;
        init_internal(page);
        set_is_root(page, true);
        set_parent(page, 0);
        set_internal_cell(page, 0, key, row_id, new_left_page);
        set_num_cells(page, 1);
        set_right_child(page, new_right_page);
        Ok(())
    }

    /// Ascending-by-row-id rowIds whose key lies in `[lo, hi]` and are not
    /// tombstoned.
    pub fn select_range(
        &mut self,
        lo: i32,
        hi: i32,
        is_deleted: &mut dyn FnMut(u32) -> bool,
    ) -> Result<Vec<u32>, Error> {
        let mut out = Vec::new();
        let mut page_num = self.find_leaf(lo, 0)?;
        loop {
            let (cells, next) = {
                let page = self.pager.get(page_num)?;
                let n = num_cells(page) as usize;
                let cells: Vec<(i32, u32)> = (0..n).map(|i| leaf_cell(page, i)).collect();
                (cells, next_leaf(page))
            };

            let max_key = cells.last().map(|c| c.0);
            for (k, r) in &cells {
                if *k >= lo && *k <= hi && !is_deleted(*r) {
                    out.push(*r);
                }
            }

            if next == 0 || max_key.map(|k| k > hi).unwrap_or(true) {
                break;
            }
            page_num = next;
        }
        out.sort_unstable();
        Ok(out)
    }

    /// Tombstones every live row whose key lies in `[lo, hi]`, compacting
    /// each leaf visited to drop cells that are now tombstoned. Returns how
    /// many rows were newly marked deleted.
    pub fn delete_range(
        &mut self,
        lo: i32,
        hi: i32,
        mark_deleted: &mut dyn FnMut(u32) -> Result<(), Error>,
        is_deleted: &mut dyn FnMut(u32) -> bool,
    ) -> Result<usize, Error> {
        let mut count = 0usize;
        let mut page_num = self.find_leaf(lo, 0)?;
        loop {
            let (cells, next) = {
                let page = self.pager.get(page_num)?;
                let n = num_cells(page) as usize;
                let cells: Vec<(i32, u32)> = (0..n).map(|i| leaf_cell(page, i)).collect();
                (cells, next_leaf(page))
            };

            let max_key = cells.last().map(|c| c.0);

            for (k, r) in &cells {
                if *k >= lo && *k <= hi && !is_deleted(*r) {
                    mark_deleted(*r)?;
                    count += 1;
                }
            }

            let survivors: Vec<(i32, u32)> = cells.into_iter().filter(|(_, r)| !is_deleted(*r)).collect();
            {
                let page = self.pager.get_mut(page_num)?;
                for (i, &(k, r)) in survivors.iter().enumerate() {
                    set_leaf_cell(page, i, k, r);
                }
                set_num_cells(page, survivors.len() as u16);
            }

            if next == 0 || max_key.map(|k| k > hi).unwrap_or(true) {
                break;
            }
            page_num = next;
        }
        Ok(count)
    }

    pub fn is_root_internal(&mut self) -> Result<bool, Error> {
        let page = self.pager.get(0)?;
        Ok(node_type(page) == NodeType::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_deletes(_row_id: u32) -> bool {
        false
    }

    #[test]
    fn insert_and_select_single_leaf() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open_with_fanout(dir.path().join("idx.btree"), 3, 3).unwrap();
        tree.insert(7, 0, &mut no_deletes).unwrap();
        tree.insert(3, 1, &mut no_deletes).unwrap();
        tree.insert(9, 2, &mut no_deletes).unwrap();

        let got = tree.select_range(4, 10, &mut no_deletes).unwrap();
        assert_eq!(got, vec![0, 2]);
    }

    #[test]
    fn splits_build_internal_root() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open_with_fanout(dir.path().join("idx.btree"), 3, 3).unwrap();
        for k in 1..=10i32 {
            tree.insert(k, (k - 1) as u32, &mut no_deletes).unwrap();
        }
        assert!(tree.is_root_internal().unwrap());

        let got = tree.select_range(3, 7, &mut no_deletes).unwrap();
        assert_eq!(got, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn range_spans_multiple_leaves() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open_with_fanout(dir.path().join("idx.btree"), 3, 3).unwrap();
        for (i, k) in [10, 20, 30, 40, 50].into_iter().enumerate() {
            tree.insert(k, i as u32, &mut no_deletes).unwrap();
        }
        let got = tree.select_range(15, 45, &mut no_deletes).unwrap();
        let mut keys: Vec<i32> = got
            .iter()
            .map(|r| match r {
                1 => 20,
                2 => 30,
                3 => 40,
                _ => unreachable!(),
            })
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![20, 30, 40]);
    }

    #[test]
    fn delete_range_tombstones_and_select_excludes() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open_with_fanout(dir.path().join("idx.btree"), 3, 3).unwrap();
        for k in 1..=4i32 {
            tree.insert(k, (k - 1) as u32, &mut no_deletes).unwrap();
        }

        let mut deleted = std::collections::HashSet::new();
        {
            let mut is_deleted = |r: u32| deleted.contains(&r);
            let mut mark = |r: u32| -> Result<(), Error> {
                deleted.insert(r);
                Ok(())
            };
            let n = tree.delete_range(2, 3, &mut mark, &mut is_deleted).unwrap();
            assert_eq!(n, 2);
        }

        let mut is_deleted = |r: u32| deleted.contains(&r);
        let got = tree.select_range(1, 4, &mut is_deleted).unwrap();
        assert_eq!(got, vec![0, 3]);

        // Tombstone reuse: reinsert keys 2 and 3 as new row ids.
        let mut is_deleted2 = |r: u32| deleted.contains(&r);
        tree.insert(2, 4, &mut is_deleted2).unwrap();
        tree.insert(3, 5, &mut is_deleted2).unwrap();
        let mut no_del = |_r: u32| false;
        let got2 = tree.select_range(1, 4, &mut no_del).unwrap();
        assert_eq!(got2, vec![0, 3, 4, 5]);
    }
}
