use crate::accounting;
use crate::alloc::{BlockId, BlockLedger};
use crate::config::Config;
use crate::error::{Result, SimFsError};
use crate::node::{NodeId, NodeKind, NodeTree};
use crate::path::FsPath;

use log::{debug, info};
use std::ops::{Range, RangeInclusive};
use std::time::SystemTime;

/// A directory entry as returned by [`SimFs::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Byte size of a file or of everything beneath a directory.
    pub size: u64,
    pub modified: SystemTime,
}

/// A node visited by [`SimFs::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub id: NodeId,
    pub path: FsPath,
    pub kind: NodeKind,
}

/// The result of growing or shrinking a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeChange {
    pub size_before: u64,
    pub size_after: u64,
    /// Blocks handed to the file when growing, or taken back when shrinking.
    pub blocks: Vec<BlockId>,
}

/// Placement of a single file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub id: NodeId,
    pub path: FsPath,
    pub size: u64,
    pub modified: SystemTime,
    /// The file's blocks in address order, collapsed into contiguous runs.
    pub runs: Vec<RangeInclusive<BlockId>>,
}

/// Usage of the whole disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskReport {
    pub block_size: u64,
    pub total_blocks: u64,
    pub allocated_blocks: u64,
    pub free_blocks: u64,
    /// Occupied sectors in address order.
    pub sectors: Vec<Range<BlockId>>,
    pub next_block: BlockId,
}

/// Sorts a list of blocks and collapses it into runs of consecutive blocks.
pub fn block_runs(blocks: &[BlockId]) -> Vec<RangeInclusive<BlockId>> {
    let mut sorted = blocks.to_vec();
    sorted.sort_unstable();

    let mut runs: Vec<RangeInclusive<BlockId>> = Vec::new();
    for block in sorted {
        match runs.last_mut() {
            Some(run) if *run.end() + 1 == block => *run = *run.start()..=block,
            _ => runs.push(block..=block),
        }
    }
    runs
}

/// A simulated single disk filesystem: a directory tree whose files own blocks
/// of a fixed size disk.
///
/// Every operation is fully applied, tree and block ledger together, before
/// it returns.
pub struct SimFs {
    config: Config,
    tree: NodeTree,
    ledger: BlockLedger,
    work_dir: NodeId,
}

impl SimFs {
    /// Formats an empty filesystem; the working directory starts at the root.
    pub fn new(config: Config) -> Self {
        let tree = NodeTree::new("");
        let work_dir = tree.root();
        info!(
            "formatted {} blocks of {}B",
            config.num_blocks(),
            config.block_size()
        );
        Self {
            ledger: BlockLedger::new(config.num_blocks()),
            config,
            tree,
            work_dir,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn block_size(&self) -> u64 {
        self.config.block_size()
    }

    pub fn num_blocks(&self) -> u64 {
        self.ledger.capacity()
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn ledger(&self) -> &BlockLedger {
        &self.ledger
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn current_node(&self) -> NodeId {
        self.work_dir
    }

    /// Moves the working directory to `id`, which must be a live directory.
    pub fn set_current_node(&mut self, id: NodeId) -> Result<()> {
        if !self.tree.get(id)?.is_dir() {
            return Err(SimFsError::NotADirectory(self.path_of(id)?.to_string()));
        }
        self.work_dir = id;
        Ok(())
    }

    /// Absolute path of the working directory.
    pub fn current_path(&self) -> Result<FsPath> {
        self.path_of(self.work_dir)
    }

    pub fn path_of(&self, id: NodeId) -> Result<FsPath> {
        Ok(FsPath::from_names(&self.tree.path_of(id)?))
    }

    fn resolve(&self, path: &FsPath) -> Option<NodeId> {
        let base = if path.is_absolute() {
            self.tree.root()
        } else {
            self.work_dir
        };
        self.tree.resolve(base, path.segments())
    }

    /// Finds the node at `path`, relative to the working directory unless the
    /// path is absolute.
    pub fn lookup(&self, path: &str) -> Result<NodeId> {
        self.resolve(&FsPath::parse(path)).ok_or_else(|| {
            debug!("lookup of {} failed", path);
            SimFsError::PathNotFound(path.to_string())
        })
    }

    fn lookup_or_cwd(&self, path: Option<&str>) -> Result<NodeId> {
        match path {
            Some(path) => self.lookup(path),
            None => Ok(self.work_dir),
        }
    }

    /// Changes the working directory.
    pub fn change_dir(&mut self, path: &str) -> Result<NodeId> {
        let id = self.lookup(path)?;
        if !self.tree.get(id)?.is_dir() {
            return Err(SimFsError::NotADirectory(path.to_string()));
        }
        self.work_dir = id;
        Ok(id)
    }

    /// Lists a directory, or the working directory when no path is given, in
    /// name order.
    pub fn list(&self, path: Option<&str>) -> Result<Vec<DirEntry>> {
        let dir = self.lookup_or_cwd(path)?;
        if !self.tree.get(dir)?.is_dir() {
            return Err(SimFsError::NotADirectory(path.unwrap_or(".").to_string()));
        }

        let mut entries = Vec::new();
        for id in self.tree.children(dir, true)? {
            let node = self.tree.get(id)?;
            entries.push(DirEntry {
                id,
                name: node.name().to_string(),
                kind: node.kind(),
                size: self.tree.aggregate_size(id)?,
                modified: node.modified(),
            });
        }
        Ok(entries)
    }

    pub fn make_dir(&mut self, path: &str) -> Result<NodeId> {
        self.create(path, NodeKind::Directory)
    }

    pub fn create_file(&mut self, path: &str) -> Result<NodeId> {
        self.create(path, NodeKind::File)
    }

    fn create(&mut self, path: &str, kind: NodeKind) -> Result<NodeId> {
        let parsed = FsPath::parse(path);
        if self.resolve(&parsed).is_some() {
            return Err(SimFsError::AlreadyExists(path.to_string()));
        }
        let (parent, name) = match (parsed.parent(), parsed.file_name()) {
            (Some(parent), Some(name)) => (parent, name.to_string()),
            _ => return Err(SimFsError::EmptyPath),
        };

        let dir = self
            .resolve(&parent)
            .ok_or_else(|| SimFsError::ParentMissing(path.to_string()))?;
        if !self.tree.get(dir)?.is_dir() {
            return Err(SimFsError::NotADirectory(parent.to_string()));
        }
        self.tree.insert(dir, &[name], kind)
    }

    /// Finds the file at `path`, validating a byte request along the way.
    fn target_file(&self, path: &str, bytes: i64) -> Result<NodeId> {
        let id = self.lookup(path)?;
        if bytes <= 0 {
            return Err(SimFsError::InvalidAmount(bytes));
        }
        if !self.tree.get(id)?.is_file() {
            return Err(SimFsError::NotAFile(path.to_string()));
        }
        Ok(id)
    }

    fn touch_with_parent(&mut self, id: NodeId) -> Result<()> {
        let parent = self.tree.parent(id)?;
        self.tree.touch(id)?;
        self.tree.touch(parent)
    }

    /// Grows a file by `bytes`, assigning it however many new blocks the
    /// larger size spills into.
    ///
    /// # Errors
    ///
    /// Fails with `InsufficientSpace`, leaving both the file and the disk
    /// untouched, if the blocks cannot all be allocated.
    pub fn append(&mut self, path: &str, bytes: i64) -> Result<SizeChange> {
        let id = self.target_file(path, bytes)?;
        let resize = accounting::grow(self.tree.file_size(id)?, bytes, self.block_size())?;

        let blocks = self.ledger.reserve(resize.blocks)?;
        for &block in &blocks {
            self.tree.assign_block(id, block)?;
        }
        self.tree.set_file_size(id, resize.size_after)?;
        self.touch_with_parent(id)?;

        info!(
            "appended {}B to {} ({} new blocks)",
            bytes,
            path,
            blocks.len()
        );
        Ok(SizeChange {
            size_before: resize.size_before,
            size_after: resize.size_after,
            blocks,
        })
    }

    /// Shrinks a file by `bytes`, giving back the blocks it no longer needs,
    /// most recently assigned first.
    pub fn truncate(&mut self, path: &str, bytes: i64) -> Result<SizeChange> {
        let id = self.target_file(path, bytes)?;
        let resize = accounting::shrink(self.tree.file_size(id)?, bytes, self.block_size())?;

        let mut blocks = Vec::new();
        for _ in 0..resize.blocks {
            match self.tree.release_block(id)? {
                Some(block) => {
                    self.ledger.free(block);
                    blocks.push(block);
                }
                None => break,
            }
        }
        self.tree.set_file_size(id, resize.size_after)?;
        self.touch_with_parent(id)?;

        info!(
            "removed {}B from {} ({} blocks freed)",
            bytes,
            path,
            blocks.len()
        );
        Ok(SizeChange {
            size_before: resize.size_before,
            size_after: resize.size_after,
            blocks,
        })
    }

    /// Deletes a file, returning its blocks to the disk, or an empty
    /// directory.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        let id = self.lookup(path)?;
        if id == self.work_dir {
            return Err(SimFsError::DirectoryInUse(path.to_string()));
        }

        if self.tree.get(id)?.is_file() {
            for &block in self.tree.file_blocks(id)? {
                self.ledger.free(block);
            }
            self.tree.remove_file(id)?;
        } else {
            self.tree.remove_dir(id)?;
        }
        Ok(())
    }

    /// Every node at or beneath `path` (or the working directory), breadth
    /// first with siblings in name order.
    pub fn walk(&self, path: Option<&str>) -> Result<Vec<WalkEntry>> {
        let start = self.lookup_or_cwd(path)?;
        self.tree
            .breadth_first(start)?
            .into_iter()
            .map(|id| -> Result<WalkEntry> {
                Ok(WalkEntry {
                    id,
                    path: self.path_of(id)?,
                    kind: self.tree.get(id)?.kind(),
                })
            })
            .collect()
    }

    /// Block placement of every file at or beneath `path` (or the working
    /// directory), in the order [`SimFs::walk`] visits them.
    pub fn file_reports(&self, path: Option<&str>) -> Result<Vec<FileReport>> {
        let start = self.lookup_or_cwd(path)?;
        let mut reports = Vec::new();
        for id in self.tree.breadth_first(start)? {
            let node = self.tree.get(id)?;
            if !node.is_file() {
                continue;
            }
            reports.push(FileReport {
                id,
                path: self.path_of(id)?,
                size: node.size(),
                modified: node.modified(),
                runs: block_runs(node.blocks()),
            });
        }
        Ok(reports)
    }

    pub fn disk_report(&self) -> DiskReport {
        DiskReport {
            block_size: self.block_size(),
            total_blocks: self.ledger.capacity(),
            allocated_blocks: self.ledger.allocated_count(),
            free_blocks: self.ledger.free_count(),
            sectors: self.ledger.sectors(),
            next_block: self.ledger.next_allocatable(),
        }
    }

    /// Size in bytes of a file, or of every file beneath a directory.
    pub fn size_of(&self, path: &str) -> Result<u64> {
        self.tree.aggregate_size(self.lookup(path)?)
    }

    /// Number of files in a directory, descending into subdirectories when
    /// `recursive` is set.
    pub fn count_files(&self, path: &str, recursive: bool) -> Result<u64> {
        self.tree.count_entries(self.lookup(path)?, recursive)
    }

    /// Destroys every node and releases every block, returning the number of
    /// nodes destroyed.
    pub fn flush(mut self) -> usize {
        let released = self.tree.flush();
        self.ledger.clear();
        info!("flushed filesystem ({} nodes)", released);
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_fs() -> SimFs {
        SimFs::new(Config::new(32, 16 * 32).unwrap())
    }

    #[test]
    fn root_is_initial_working_directory() {
        let fs = create_test_fs();
        assert_eq!(fs.current_node(), fs.root());
        assert_eq!(fs.current_path().unwrap().to_string(), "/");
        assert_eq!(fs.num_blocks(), 16);
        assert_eq!(fs.lookup("/").unwrap(), fs.root());
        assert_eq!(fs.lookup("").unwrap(), fs.root());
    }

    #[test]
    fn missing_paths_are_reported() {
        let fs = create_test_fs();
        assert_eq!(
            fs.lookup("/foo"),
            Err(SimFsError::PathNotFound("/foo".to_string()))
        );
    }

    #[test]
    fn relative_paths_follow_working_directory() {
        let mut fs = create_test_fs();
        fs.make_dir("a").unwrap();
        fs.make_dir("/a/b").unwrap();
        fs.change_dir("a").unwrap();

        let c = fs.make_dir("b/c").unwrap();
        assert_eq!(fs.lookup("/a/b/c").unwrap(), c);
        assert_eq!(fs.lookup("../a/./b/c").unwrap(), c);
        assert_eq!(fs.current_path().unwrap().to_string(), "/a");

        fs.change_dir("..").unwrap();
        assert_eq!(fs.current_node(), fs.root());
    }

    #[test]
    fn create_checks_existence_and_parent() {
        let mut fs = create_test_fs();
        fs.create_file("f").unwrap();

        assert_eq!(
            fs.create_file("f"),
            Err(SimFsError::AlreadyExists("f".to_string()))
        );
        assert_eq!(
            fs.make_dir("/"),
            Err(SimFsError::AlreadyExists("/".to_string()))
        );
        assert_eq!(
            fs.make_dir("x/y"),
            Err(SimFsError::ParentMissing("x/y".to_string()))
        );
        assert_eq!(
            fs.create_file("f/g"),
            Err(SimFsError::NotADirectory("f".to_string()))
        );
    }

    #[test]
    fn change_dir_rejects_files() {
        let mut fs = create_test_fs();
        let f = fs.create_file("f").unwrap();
        assert_eq!(
            fs.change_dir("f"),
            Err(SimFsError::NotADirectory("f".to_string()))
        );
        assert!(fs.set_current_node(f).is_err());
        assert_eq!(fs.current_node(), fs.root());
    }

    #[test]
    fn append_and_truncate_track_blocks() {
        let mut fs = create_test_fs();
        let f = fs.create_file("f").unwrap();

        let grown = fs.append("f", 50).unwrap();
        assert_eq!(grown.blocks, vec![0, 1]);
        assert_eq!(grown.size_after, 50);

        let filled = fs.append("f", 14).unwrap();
        assert!(filled.blocks.is_empty());
        assert_eq!(fs.tree().file_size(f).unwrap(), 64);

        let shrunk = fs.truncate("f", 40).unwrap();
        assert_eq!(shrunk.blocks, vec![1]);
        assert_eq!(shrunk.size_after, 24);
        assert_eq!(fs.tree().file_blocks(f).unwrap(), &[0]);
        assert_eq!(fs.ledger().allocated_count(), 1);
    }

    #[test]
    fn append_validates_request() {
        let mut fs = create_test_fs();
        fs.make_dir("d").unwrap();
        fs.create_file("f").unwrap();

        assert_eq!(fs.append("f", 0), Err(SimFsError::InvalidAmount(0)));
        assert_eq!(fs.append("d", 5), Err(SimFsError::NotAFile("d".to_string())));
        assert_eq!(
            fs.append("nope", 5),
            Err(SimFsError::PathNotFound("nope".to_string()))
        );
        assert_eq!(
            fs.truncate("f", 1),
            Err(SimFsError::Underflow {
                size: 0,
                request: 1
            })
        );
    }

    #[test]
    fn failed_append_leaves_everything_untouched() {
        let mut fs = create_test_fs();
        let f = fs.create_file("f").unwrap();
        fs.append("f", 32 * 10).unwrap();
        let before = fs.disk_report();

        match fs.append("f", 32 * 7) {
            Err(SimFsError::InsufficientSpace {
                needed: 7,
                available: 6,
            }) => (),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(fs.disk_report(), before);
        assert_eq!(fs.tree().file_size(f).unwrap(), 320);
        assert_eq!(fs.tree().file_blocks(f).unwrap().len(), 10);
    }

    #[test]
    fn delete_frees_file_blocks() {
        let mut fs = create_test_fs();
        fs.create_file("f").unwrap();
        fs.create_file("g").unwrap();
        fs.append("f", 64).unwrap();
        fs.append("g", 32).unwrap();

        fs.delete("f").unwrap();
        assert_eq!(fs.ledger().sectors(), vec![2..3]);
        assert!(fs.lookup("f").is_err());

        // The blocks f held are handed out again first.
        assert_eq!(fs.append("g", 32).unwrap().blocks, vec![0]);
    }

    #[test]
    fn delete_guards_directories() {
        let mut fs = create_test_fs();
        fs.make_dir("a").unwrap();
        fs.make_dir("a/b").unwrap();

        assert_eq!(
            fs.delete("a"),
            Err(SimFsError::DirectoryNotEmpty("/a".to_string()))
        );
        fs.change_dir("a/b").unwrap();
        assert_eq!(
            fs.delete("."),
            Err(SimFsError::DirectoryInUse(".".to_string()))
        );
        fs.change_dir("/").unwrap();
        fs.delete("a/b").unwrap();
        fs.delete("a").unwrap();
        assert!(fs.list(None).unwrap().is_empty());
    }

    #[test]
    fn listing_is_sorted_with_sizes() {
        let mut fs = create_test_fs();
        fs.make_dir("docs").unwrap();
        fs.create_file("docs/a").unwrap();
        fs.create_file("b").unwrap();
        fs.append("docs/a", 10).unwrap();
        fs.append("b", 3).unwrap();

        let entries = fs.list(None).unwrap();
        let summary: Vec<(&str, NodeKind, u64)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.kind, e.size))
            .collect();
        assert_eq!(
            summary,
            vec![("b", NodeKind::File, 3), ("docs", NodeKind::Directory, 10)]
        );
        assert_eq!(
            fs.list(Some("b")),
            Err(SimFsError::NotADirectory("b".to_string()))
        );
    }

    #[test]
    fn walk_and_reports_cover_subtree() {
        let mut fs = create_test_fs();
        fs.make_dir("d").unwrap();
        fs.create_file("d/x").unwrap();
        fs.create_file("y").unwrap();
        fs.append("y", 32).unwrap();
        fs.append("d/x", 64).unwrap();
        fs.append("y", 32).unwrap();

        let paths: Vec<String> = fs
            .walk(None)
            .unwrap()
            .into_iter()
            .map(|e| e.path.to_string())
            .collect();
        assert_eq!(paths, vec!["/", "/d", "/y", "/d/x"]);

        let reports = fs.file_reports(None).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].path.to_string(), "/y");
        assert_eq!(reports[0].runs, vec![0..=0, 3..=3]);
        assert_eq!(reports[1].runs, vec![1..=2]);
    }

    #[test]
    fn block_runs_collapse_consecutive_blocks() {
        assert_eq!(block_runs(&[5, 1, 2, 3, 9, 8]), vec![1..=3, 5..=5, 8..=9]);
        assert!(block_runs(&[]).is_empty());
    }

    #[test]
    fn modifications_touch_file_and_parent() {
        let mut fs = create_test_fs();
        let d = fs.make_dir("d").unwrap();
        let f = fs.create_file("d/f").unwrap();
        let epoch = SystemTime::UNIX_EPOCH;
        fs.tree.set_modified(d, epoch).unwrap();
        fs.tree.set_modified(f, epoch).unwrap();

        fs.append("d/f", 1).unwrap();
        assert!(fs.tree().get(d).unwrap().modified() > epoch);
        assert!(fs.tree().get(f).unwrap().modified() > epoch);
    }

    #[test]
    fn flush_releases_everything() {
        let mut fs = create_test_fs();
        fs.make_dir("a").unwrap();
        fs.create_file("a/f").unwrap();
        fs.append("a/f", 100).unwrap();
        assert_eq!(fs.flush(), 3);
    }
}
