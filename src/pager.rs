/// Paged storage with a bounded buffer pool and a shadow-paging commit
/// protocol. Every paged file (a heap data file or a B+Tree index file) is
/// backed by its own `Pager`.
use crate::err;
use crate::errors::Error;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub const PAGE_SIZE: usize = 4096;
pub const MAX_PAGES: usize = 64;

pub type PageNum = u32;

struct Frame {
    bytes: [u8; PAGE_SIZE],
    page_num: Option<PageNum>,
    valid: bool,
    dirty: bool,
    recent: bool,
}

impl Frame {
    fn empty() -> Self {
        Frame {
            bytes: [0u8; PAGE_SIZE],
            page_num: None,
            valid: false,
            dirty: false,
            recent: false,
        }
    }
}

/// A fixed-size paged view over a file, with clock-algorithm eviction and a
/// shadow (`.tmp`) side file used to implement commit-or-rollback.
pub struct Pager {
    main_path: PathBuf,
    main_file: File,
    shadow_file: File,
    num_pages: u32,
    frames: Vec<Frame>,
    page_table: HashMap<PageNum, usize>,
    pages_in_temp: std::collections::HashSet<PageNum>,
    clock_hand: usize,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let main_path = path.as_ref().to_path_buf();
        let shadow_path = {
            let mut p = main_path.clone();
            let mut name = p.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            name.push(".tmp");
            p.set_file_name(name);
            p
        };

        let main_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&main_path)?;

        let shadow_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&shadow_path)?;

        let file_len = main_file.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Storage,
                "file '{}' is not a whole number of pages",
                main_path.display()
            ));
        }
        let num_pages = (file_len / PAGE_SIZE as u64) as u32;

        let mut frames = Vec::with_capacity(MAX_PAGES);
        for _ in 0..MAX_PAGES {
            frames.push(Frame::empty());
        }

        Ok(Pager {
            main_path,
            main_file,
            shadow_file,
            num_pages,
            frames,
            page_table: HashMap::new(),
            pages_in_temp: std::collections::HashSet::new(),
            clock_hand: 0,
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Allocate a fresh page number past the current tail; the page is
    /// materialized zero-filled on its first `get`/`get_mut`.
    pub fn allocate_new_page(&mut self) -> PageNum {
        let page_num = self.num_pages;
        self.num_pages += 1;
        page_num
    }

    fn tick_clock(&mut self) -> usize {
        let idx = self.clock_hand;
        self.clock_hand = (self.clock_hand + 1) % MAX_PAGES;
        idx
    }

    /// Choose a frame to use for a fresh page fetch, evicting via the clock
    /// algorithm if every frame is occupied and `RECENT`.
    fn choose_frame(&mut self) -> Result<usize, Error> {
        loop {
            let idx = self.tick_clock();
            if !self.frames[idx].valid {
                return Ok(idx);
            }
            if self.frames[idx].recent {
                self.frames[idx].recent = false;
                continue;
            }
            if let Some(evicted_page) = self.frames[idx].page_num {
                self.page_table.remove(&evicted_page);
                if self.frames[idx].dirty {
                    let bytes = self.frames[idx].bytes;
                    self.write_shadow(evicted_page, &bytes)?;
                    self.pages_in_temp.insert(evicted_page);
                    trace!(page = evicted_page, "evicted dirty page to shadow file");
                } else {
                    trace!(page = evicted_page, "evicted clean page");
                }
            }
            return Ok(idx);
        }
    }

    fn write_shadow(&mut self, page_num: PageNum, bytes: &[u8; PAGE_SIZE]) -> Result<(), Error> {
        self.shadow_file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.shadow_file.write_all(bytes)?;
        Ok(())
    }

    fn read_shadow(&mut self, page_num: PageNum, buf: &mut [u8; PAGE_SIZE]) -> Result<(), Error> {
        self.shadow_file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.shadow_file.read_exact(buf)?;
        Ok(())
    }

    fn read_main(&mut self, page_num: PageNum, buf: &mut [u8; PAGE_SIZE]) -> Result<(), Error> {
        self.main_file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.main_file.read_exact(buf)?;
        Ok(())
    }

    /// Load `page_num` into a resident frame (if not already resident) and
    /// return its frame index.
    fn fetch(&mut self, page_num: PageNum) -> Result<usize, Error> {
        if let Some(&idx) = self.page_table.get(&page_num) {
            self.frames[idx].recent = true;
            return Ok(idx);
        }

        if page_num >= self.num_pages {
            return Err(err!(
                Storage,
                "tried to fetch page {} out of bounds (num_pages={})",
                page_num,
                self.num_pages
            ));
        }

        let idx = self.choose_frame()?;

        let mut bytes = [0u8; PAGE_SIZE];
        let main_len = self.main_file.metadata()?.len();
        if self.pages_in_temp.contains(&page_num) {
            self.read_shadow(page_num, &mut bytes)?;
        } else if (page_num as u64) < main_len / PAGE_SIZE as u64 {
            self.read_main(page_num, &mut bytes)?;
        }
        // else: newly allocated beyond file end — zero-initialized.

        self.frames[idx] = Frame {
            bytes,
            page_num: Some(page_num),
            valid: true,
            dirty: false,
            recent: true,
        };
        self.page_table.insert(page_num, idx);
        debug!(page = page_num, frame = idx, "fetched page");
        Ok(idx)
    }

    /// Borrow a page read-only. The borrow must not outlive the next call
    /// to `get`/`get_mut` on this pager.
    pub fn get(&mut self, page_num: PageNum) -> Result<&[u8; PAGE_SIZE], Error> {
        let idx = self.fetch(page_num)?;
        Ok(&self.frames[idx].bytes)
    }

    /// Borrow a page mutably and mark it dirty. Same aliasing discipline as
    /// `get`.
    pub fn get_mut(&mut self, page_num: PageNum) -> Result<&mut [u8; PAGE_SIZE], Error> {
        let idx = self.fetch(page_num)?;
        self.frames[idx].dirty = true;
        self.frames[idx].recent = true;
        Ok(&mut self.frames[idx].bytes)
    }

    /// Commit: copy shadow pages into the main file, flush resident dirty
    /// frames, fsync, then discard the shadow file.
    pub fn commit(&mut self) -> Result<(), Error> {
        debug!(file = %self.main_path.display(), "committing pager");

        let pending: Vec<PageNum> = self.pages_in_temp.iter().copied().collect();
        for page_num in pending {
            if self.page_table.contains_key(&page_num) {
                continue;
            }
            let mut bytes = [0u8; PAGE_SIZE];
            self.read_shadow(page_num, &mut bytes)?;
            self.main_file
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.main_file.write_all(&bytes)?;
        }

        for idx in 0..self.frames.len() {
            if self.frames[idx].valid && self.frames[idx].dirty {
                let page_num = self.frames[idx].page_num.unwrap();
                let bytes = self.frames[idx].bytes;
                self.main_file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.main_file.write_all(&bytes)?;
                self.frames[idx].dirty = false;
            }
        }

        self.main_file.sync_all()?;

        self.shadow_file.set_len(0)?;
        self.shadow_file.seek(SeekFrom::Start(0))?;
        self.pages_in_temp.clear();

        debug!(file = %self.main_path.display(), "commit complete");
        Ok(())
    }

    pub fn main_path(&self) -> &Path {
        &self.main_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocate_and_roundtrip_uncommitted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut pager = Pager::open(&path).unwrap();

        let p0 = pager.allocate_new_page();
        {
            let page = pager.get_mut(p0).unwrap();
            page[0] = 42;
        }
        assert_eq!(pager.get(p0).unwrap()[0], 42);
    }

    #[test]
    fn commit_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut pager = Pager::open(&path).unwrap();
            let p0 = pager.allocate_new_page();
            pager.get_mut(p0).unwrap()[0] = 7;
            pager.commit().unwrap();
        }
        {
            let mut pager = Pager::open(&path).unwrap();
            assert_eq!(pager.num_pages(), 1);
            assert_eq!(pager.get(0).unwrap()[0], 7);
        }
    }

    #[test]
    fn uncommitted_changes_are_discarded_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut pager = Pager::open(&path).unwrap();
            let p0 = pager.allocate_new_page();
            pager.get_mut(p0).unwrap()[0] = 5;
            pager.commit().unwrap();

            pager.get_mut(p0).unwrap()[0] = 99;
            // no commit
        }
        {
            let mut pager = Pager::open(&path).unwrap();
            assert_eq!(pager.get(0).unwrap()[0], 5);
        }
    }

    #[test]
    fn eviction_under_small_pool_preserves_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut pager = Pager::open(&path).unwrap();

        let mut pages = Vec::new();
        for i in 0..(MAX_PAGES as u32 * 2) {
            let p = pager.allocate_new_page();
            pager.get_mut(p).unwrap()[0] = (i % 251) as u8;
            pages.push(p);
        }
        pager.commit().unwrap();

        for (i, p) in pages.iter().enumerate() {
            assert_eq!(pager.get(*p).unwrap()[0], (i % 251) as u8);
        }
    }
}
