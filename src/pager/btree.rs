//! # Table B-Tree
//!
//! [`BTreeTable`] implements the table b-tree insert protocol over the pager:
//! records go to the right-most leaf, and a full leaf root is split into an
//! interior root with two leaf children.
//!
//! ## Split Protocol
//!
//! When the leaf root cannot fit another record:
//!
//! 1. Allocate `left` and `right` leaf pages
//! 2. Copy every cell of the root into `left`
//! 3. Reinitialize the root as an interior page whose right-most child is
//!    `right`
//! 4. Add one interior cell `{left, max row id of the old root}` to the root
//! 5. Add the incoming record to `right`
//!
//! ```text
//!        [root: leaf, full]          [root: interior]
//!                            ==>      /            \
//!                              [left: old cells]  [right: new record]
//! ```
//!
//! When the root is already interior, the record goes to the right-most
//! child; if that child is full, a fresh leaf replaces it as the right-most
//! child and the full one is linked with an interior cell. The root itself
//! never splits: a full interior root is a hard limit surfaced as an error.
//!
//! ## Key Ordering
//!
//! Splits push the largest existing row id into an interior key and new
//! records land on the right-most leaf, so a strictly increasing row id
//! sequence keeps the tree ordered. Row id allocation is the caller's
//! responsibility (the engine's transaction id counter).

use eyre::{bail, ensure, Result};

use super::mem_page::{MemPage, PageHeader, PageType};
use super::Pager;
use crate::config::INTERIOR_CELL_SIZE;
use crate::record::{InteriorNode, Record};
use crate::storage::PageFile;

pub struct BTreeTable<'a, F: PageFile> {
    pager: &'a mut Pager<F>,
    root_page: u32,
}

impl<'a, F: PageFile> BTreeTable<'a, F> {
    pub fn new(root_page: u32, pager: &'a mut Pager<F>) -> Self {
        Self { pager, root_page }
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    pub fn insert(&mut self, record: &Record) -> Result<()> {
        let record_bytes = record.to_bytes();
        let mut root = self.pager.read(self.root_page)?;

        match root.page_type() {
            PageType::LeafTable => {
                if !root.fits(record_bytes.len()) {
                    let (left, mut right) = split_leaf_root(self.pager, &mut root)?;
                    right.add_cell(&record_bytes)?;
                    self.pager.write(vec![left, right, root]);
                    return Ok(());
                }

                root.add_cell(&record_bytes)?;
                self.pager.write(vec![root]);
                Ok(())
            }
            PageType::InteriorTable => {
                let mut dest = self.pager.read(root.header().right_page)?;

                if !dest.fits(record_bytes.len()) {
                    let max_row_id = max_row_id(&dest)?;
                    let link = InteriorNode::new(dest.number(), max_row_id);

                    ensure!(
                        root.fits(INTERIOR_CELL_SIZE),
                        "interior page split is not supported: root page {} is full",
                        root.number()
                    );

                    // Retire the full leaf behind an interior cell and hang a
                    // fresh leaf as the right-most child.
                    let mut new_dest = self.pager.allocate(PageType::LeafTable);
                    root.set_right_page(new_dest.number());
                    root.add_cell(&link.to_bytes())?;

                    new_dest.add_cell(&record_bytes)?;
                    self.pager.write(vec![root, new_dest]);
                    return Ok(());
                }

                dest.add_cell(&record_bytes)?;
                self.pager.write(vec![dest]);
                Ok(())
            }
            other => bail!(
                "unsupported page type {:?} at page {}",
                other,
                root.number()
            ),
        }
    }

    /// Returns every record in the table in cell order: each interior cell's
    /// left child first, the right-most child last.
    pub fn scan(&mut self) -> Result<Vec<Record>> {
        let root = self.pager.read(self.root_page)?;

        match root.page_type() {
            PageType::LeafTable => collect_records(&root),
            PageType::InteriorTable => {
                let mut records = Vec::new();

                for i in 0..root.cell_count() {
                    let node = root.read_interior_node(i)?;
                    let child = self.pager.read(node.left_child)?;
                    ensure!(
                        child.page_type() == PageType::LeafTable,
                        "unsupported page type {:?} at page {}",
                        child.page_type(),
                        child.number()
                    );
                    records.extend(collect_records(&child)?);
                }

                let right = self.pager.read(root.header().right_page)?;
                ensure!(
                    right.page_type() == PageType::LeafTable,
                    "unsupported page type {:?} at page {}",
                    right.page_type(),
                    right.number()
                );
                records.extend(collect_records(&right)?);

                Ok(records)
            }
            other => bail!(
                "unsupported page type {:?} at page {}",
                other,
                root.number()
            ),
        }
    }
}

/// Splits a full leaf root: its cells move to a new `left` leaf, the root
/// becomes an interior page pointing at `left` and an empty `right` leaf.
fn split_leaf_root<F: PageFile>(
    pager: &mut Pager<F>,
    root: &mut MemPage,
) -> Result<(MemPage, MemPage)> {
    let mut left = pager.allocate(PageType::LeafTable);
    let right = pager.allocate(PageType::LeafTable);

    let max_row_id = max_row_id(root)?;

    root.copy_to(&mut left)?;

    let mut header = PageHeader::new(PageType::InteriorTable, pager.page_size());
    header.right_page = right.number();
    root.set_header(header);

    root.add_cell(&InteriorNode::new(left.number(), max_row_id).to_bytes())?;

    Ok((left, right))
}

fn max_row_id(page: &MemPage) -> Result<u32> {
    let mut max = 0;
    for record in RecordIterator::new(page) {
        max = max.max(record?.row_id());
    }
    Ok(max)
}

fn collect_records(page: &MemPage) -> Result<Vec<Record>> {
    RecordIterator::new(page).collect()
}

/// Iterates the record cells of one leaf page in insertion order.
pub struct RecordIterator<'p> {
    page: &'p MemPage,
    index: usize,
}

impl<'p> RecordIterator<'p> {
    pub fn new(page: &'p MemPage) -> Self {
        Self { page, index: 0 }
    }
}

impl Iterator for RecordIterator<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.page.cell_count() {
            return None;
        }

        let record = self.page.read_record(self.index);
        self.index += 1;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::initialize;
    use crate::storage::DbFile;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 1024;

    /// Pager with page 1 initialized and a leaf table root on page 2, so
    /// splits copy between pages with identical header offsets.
    fn open_table_pager(dir: &std::path::Path) -> (Pager<DbFile>, u32) {
        let file = DbFile::open(dir.join("test.db"), PAGE_SIZE).unwrap();
        initialize(&file).unwrap();

        let mut pager = Pager::new(file);
        let root = pager.allocate(PageType::LeafTable);
        let root_page = root.number();
        (pager, root_page)
    }

    fn record(row_id: u32, payload_len: usize) -> Record {
        Record::new(row_id, vec![row_id as u8; payload_len])
    }

    #[test]
    fn insert_into_leaf_root() {
        let dir = tempdir().unwrap();
        let (mut pager, root_page) = open_table_pager(dir.path());

        let mut table = BTreeTable::new(root_page, &mut pager);
        table.insert(&record(1, 3)).unwrap();
        table.insert(&record(2, 3)).unwrap();

        assert_eq!(table.scan().unwrap(), vec![record(1, 3), record(2, 3)]);

        let root = pager.read(root_page).unwrap();
        assert_eq!(root.page_type(), PageType::LeafTable);
        assert_eq!(root.cell_count(), 2);
    }

    #[test]
    fn full_leaf_root_splits_into_interior() {
        let dir = tempdir().unwrap();
        let (mut pager, root_page) = open_table_pager(dir.path());
        let mut table = BTreeTable::new(root_page, &mut pager);

        // 203-byte cells: four fit on a 1024-byte leaf, the fifth splits.
        for row_id in 1..=5 {
            table.insert(&record(row_id, 200)).unwrap();
        }

        let all = table.scan().unwrap();
        assert_eq!(
            all.iter().map(|r| r.row_id()).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );

        let root = pager.read(root_page).unwrap();
        assert_eq!(root.page_type(), PageType::InteriorTable);
        assert_eq!(root.cell_count(), 1);

        let link = root.read_interior_node(0).unwrap();
        let left = pager.read(link.left_child).unwrap();
        let right = pager.read(root.header().right_page).unwrap();

        // The split pushed the pre-split maximum row id into the interior key.
        assert_eq!(link.key, 4);
        assert_eq!(left.cell_count(), 4);
        assert_eq!(right.cell_count(), 1);
        assert_eq!(right.read_record(0).unwrap(), record(5, 200));
        assert_eq!(root.header().right_page, right.number());
    }

    #[test]
    fn split_preserves_existing_records() {
        let dir = tempdir().unwrap();
        let (mut pager, root_page) = open_table_pager(dir.path());
        let mut table = BTreeTable::new(root_page, &mut pager);

        let before: Vec<Record> = (1..=4).map(|id| record(id, 200)).collect();
        for r in &before {
            table.insert(r).unwrap();
        }
        table.insert(&record(5, 200)).unwrap();

        let mut expected = before;
        expected.push(record(5, 200));

        assert_eq!(table.scan().unwrap(), expected);
    }

    #[test]
    fn full_rightmost_leaf_is_retired_behind_interior_cell() {
        let dir = tempdir().unwrap();
        let (mut pager, root_page) = open_table_pager(dir.path());
        let mut table = BTreeTable::new(root_page, &mut pager);

        // 1..=5 split the root; 6..=8 fill the right leaf; 9 retires it.
        for row_id in 1..=9 {
            table.insert(&record(row_id, 200)).unwrap();
        }

        let ids: Vec<u32> = table.scan().unwrap().iter().map(|r| r.row_id()).collect();
        assert_eq!(ids, (1..=9).collect::<Vec<_>>());

        let root = pager.read(root_page).unwrap();
        assert_eq!(root.cell_count(), 2);
        assert_eq!(root.read_interior_node(1).unwrap().key, 8);

        let right = pager.read(root.header().right_page).unwrap();
        assert_eq!(right.cell_count(), 1);
        assert_eq!(right.read_record(0).unwrap().row_id(), 9);
    }

    #[test]
    fn full_interior_root_is_a_hard_limit() {
        let dir = tempdir().unwrap();
        let (mut pager, root_page) = open_table_pager(dir.path());
        let mut table = BTreeTable::new(root_page, &mut pager);

        let mut inserted = 0u32;
        let error = loop {
            match table.insert(&record(inserted + 1, 200)) {
                Ok(()) => inserted += 1,
                Err(e) => break e,
            }
            assert!(inserted < 10_000, "interior root never filled up");
        };

        assert!(error
            .to_string()
            .contains("interior page split is not supported"));

        // The failed insert left the tree untouched.
        let ids: Vec<u32> = table.scan().unwrap().iter().map(|r| r.row_id()).collect();
        assert_eq!(ids, (1..=inserted).collect::<Vec<_>>());
    }

    #[test]
    fn insert_rejects_non_table_pages() {
        let dir = tempdir().unwrap();
        let (mut pager, _) = open_table_pager(dir.path());

        let index_page = pager.allocate(PageType::LeafIndex);
        let index_root = index_page.number();

        let mut table = BTreeTable::new(index_root, &mut pager);
        let result = table.insert(&record(1, 3));

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported page type"));
    }

    #[test]
    fn record_iterator_yields_insertion_order() {
        let mut page = MemPage::new(PageType::LeafTable, 2, PAGE_SIZE);
        for row_id in [3u32, 1, 2] {
            page.add_cell(&Record::new(row_id, vec![row_id as u8]).to_bytes())
                .unwrap();
        }

        let ids: Vec<u32> = RecordIterator::new(&page)
            .map(|r| r.unwrap().row_id())
            .collect();

        assert_eq!(ids, vec![3, 1, 2]);
    }
}
