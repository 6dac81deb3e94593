use crate::alloc::BlockId;
use crate::error::{Result, SimFsError};
use crate::path::FsPath;

use log::{debug, info};
use std::collections::VecDeque;
use std::time::SystemTime;

/// A handle to a node in a [`NodeTree`].
///
/// Handles carry the generation of the slot they were issued for, so a handle
/// to a removed node never aliases whatever later reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

#[derive(Debug)]
enum Contents {
    /// Entries are kept newest first.
    Directory { children: VecDeque<NodeId> },
    File {
        /// The total size of the file in bytes.
        size: u64,
        /// Blocks owned by the file. Used as a stack: the most recently
        /// assigned block is on top and is the first to be released.
        blocks: Vec<BlockId>,
    },
}

#[derive(Debug)]
pub struct Node {
    name: String,
    /// Absent only for the root.
    parent: Option<NodeId>,
    /// The time the node or, for directories, its entry list last changed.
    modified: SystemTime,
    contents: Contents,
}

impl Node {
    fn new(name: &str, parent: Option<NodeId>, kind: NodeKind) -> Self {
        let contents = match kind {
            NodeKind::Directory => Contents::Directory {
                children: VecDeque::new(),
            },
            NodeKind::File => Contents::File {
                size: 0,
                blocks: Vec::new(),
            },
        };
        Self {
            name: name.to_string(),
            parent,
            modified: SystemTime::now(),
            contents,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        match self.contents {
            Contents::Directory { .. } => NodeKind::Directory,
            Contents::File { .. } => NodeKind::File,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind() == NodeKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == NodeKind::Directory
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Byte size of a file, zero for directories.
    pub fn size(&self) -> u64 {
        match self.contents {
            Contents::File { size, .. } => size,
            Contents::Directory { .. } => 0,
        }
    }

    /// Blocks owned by a file in the order they were assigned, empty for
    /// directories.
    pub fn blocks(&self) -> &[BlockId] {
        match &self.contents {
            Contents::File { blocks, .. } => blocks,
            Contents::Directory { .. } => &[],
        }
    }

    fn children(&self) -> Option<&VecDeque<NodeId>> {
        match &self.contents {
            Contents::Directory { children } => Some(children),
            Contents::File { .. } => None,
        }
    }
}

struct Slot {
    generation: u64,
    node: Option<Node>,
}

/// The directory hierarchy, stored as an arena of nodes addressed by
/// [`NodeId`]. Removing a node vacates its slot for reuse.
pub struct NodeTree {
    slots: Vec<Slot>,
    vacant: Vec<usize>,
    root: NodeId,
    live: usize,
}

impl NodeTree {
    /// Creates a tree holding a single root directory.
    pub fn new(root_name: &str) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            live: 0,
        };
        tree.root = tree.occupy(Node::new(root_name, None, NodeKind::Directory));
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, the root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SimFsError::NodeNotFound)
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(SimFsError::NodeNotFound)
    }

    /// The directory containing `id`. The root is its own parent.
    pub fn parent(&self, id: NodeId) -> Result<NodeId> {
        Ok(self.get(id)?.parent.unwrap_or(id))
    }

    /// Walks `segments` starting at `start`.
    ///
    /// `.` and empty segments stay put, `..` climbs to the parent (staying put
    /// at the root) and any other segment must name a child of the current
    /// directory. A path that continues past a file does not resolve.
    pub fn resolve(&self, start: NodeId, segments: &[String]) -> Option<NodeId> {
        let mut current = start;
        self.get(current).ok()?;

        for segment in segments {
            let node = self.get(current).ok()?;
            let children = node.children()?;
            current = match segment.as_str() {
                "" | "." => current,
                ".." => node.parent.unwrap_or(current),
                name => self.child_named(children, name)?,
            };
        }
        Some(current)
    }

    fn child_named(&self, children: &VecDeque<NodeId>, name: &str) -> Option<NodeId> {
        children
            .iter()
            .copied()
            .find(|&child| self.get(child).map_or(false, |n| n.name == name))
    }

    /// Creates a node at `segments`, relative to `start`, whose last segment
    /// is the new node's name.
    ///
    /// # Errors
    ///
    /// `EmptyPath` for an empty path, `InvalidName` for a name that could never
    /// be resolved, `PathNotFound` when the containing directory does not
    /// exist, `ParentIsFile` when it is a file, and `AlreadyExists` when it
    /// already holds an entry of that name.
    pub fn insert(
        &mut self,
        start: NodeId,
        segments: &[String],
        kind: NodeKind,
    ) -> Result<NodeId> {
        let (name, parent_path) = segments.split_last().ok_or(SimFsError::EmptyPath)?;
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(SimFsError::InvalidName(name.clone()));
        }

        let parent = self
            .resolve(start, parent_path)
            .ok_or_else(|| SimFsError::PathNotFound(parent_path.join("/")))?;
        match self.get(parent)?.children() {
            None => return Err(SimFsError::ParentIsFile(self.path_string(parent))),
            Some(children) => {
                if self.child_named(children, name).is_some() {
                    return Err(SimFsError::AlreadyExists(segments.join("/")));
                }
            }
        }

        let id = self.occupy(Node::new(name, Some(parent), kind));
        let dir = self.get_mut(parent)?;
        if let Contents::Directory { children } = &mut dir.contents {
            children.push_front(id);
        }
        dir.modified = SystemTime::now();

        info!("created {:?} {}", kind, self.path_string(id));
        Ok(id)
    }

    /// Detaches and destroys a node, returning the blocks a file still owned.
    ///
    /// Ownership of the blocks is simply dropped; the caller is expected to
    /// have returned them to the block ledger first.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for a stale handle, `RootRemoval` for the root and
    /// `DirectoryNotEmpty` for a directory that still has entries.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<BlockId>> {
        let node = self.get(id)?;
        let parent = node.parent.ok_or(SimFsError::RootRemoval)?;
        if node.children().map_or(false, |c| !c.is_empty()) {
            return Err(SimFsError::DirectoryNotEmpty(self.path_string(id)));
        }
        let path = self.path_string(id);

        let released = match &mut self.get_mut(id)?.contents {
            Contents::File { size, blocks } => {
                *size = 0;
                std::mem::take(blocks)
            }
            Contents::Directory { .. } => Vec::new(),
        };

        let dir = self.get_mut(parent)?;
        if let Contents::Directory { children } = &mut dir.contents {
            children.retain(|&child| child != id);
        }
        dir.modified = SystemTime::now();

        self.vacate(id);
        info!("removed {}", path);
        Ok(released)
    }

    /// Removes a file; see [`NodeTree::remove`].
    pub fn remove_file(&mut self, id: NodeId) -> Result<Vec<BlockId>> {
        if !self.get(id)?.is_file() {
            return Err(SimFsError::NotAFile(self.path_string(id)));
        }
        self.remove(id)
    }

    /// Removes an empty directory; see [`NodeTree::remove`].
    pub fn remove_dir(&mut self, id: NodeId) -> Result<()> {
        if !self.get(id)?.is_dir() {
            return Err(SimFsError::NotADirectory(self.path_string(id)));
        }
        self.remove(id).map(|_| ())
    }

    /// The entries of a directory, either sorted by name or newest first. Files
    /// have no entries.
    pub fn children(&self, id: NodeId, ordered: bool) -> Result<Vec<NodeId>> {
        let mut entries: Vec<NodeId> = match self.get(id)?.children() {
            Some(children) => children.iter().copied().collect(),
            None => return Ok(Vec::new()),
        };
        if ordered {
            entries.sort_by(|a, b| self.name_of(*a).cmp(self.name_of(*b)));
        }
        Ok(entries)
    }

    fn name_of(&self, id: NodeId) -> &str {
        self.get(id).map_or("", |n| n.name.as_str())
    }

    /// Total bytes held by a file or by every file beneath a directory.
    pub fn aggregate_size(&self, id: NodeId) -> Result<u64> {
        let mut total = 0;
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let node = self.get(next)?;
            match &node.contents {
                Contents::File { size, .. } => total += *size,
                Contents::Directory { children } => pending.extend(children.iter().copied()),
            }
        }
        Ok(total)
    }

    /// Counts the files directly inside a directory, or every file beneath it
    /// when `recursive` is set. Directories themselves are never counted.
    pub fn count_entries(&self, id: NodeId, recursive: bool) -> Result<u64> {
        let mut count = 0;
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let children = match self.get(next)?.children() {
                Some(children) => children,
                None => continue,
            };
            for &child in children {
                if self.get(child)?.is_file() {
                    count += 1;
                } else if recursive {
                    pending.push(child);
                }
            }
        }
        Ok(count)
    }

    /// Names from the root down to `id`, both inclusive.
    pub fn path_of(&self, id: NodeId) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(next) = current {
            let node = self.get(next)?;
            names.push(node.name.clone());
            current = node.parent;
        }
        names.reverse();
        Ok(names)
    }

    fn path_string(&self, id: NodeId) -> String {
        self.path_of(id)
            .map(|names| FsPath::from_names(&names).to_string())
            .unwrap_or_default()
    }

    /// Every node beneath `start` in breadth first order, `start` first.
    /// Entries of a directory are visited in name order.
    pub fn breadth_first(&self, start: NodeId) -> Result<Vec<NodeId>> {
        let mut visited = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(next) = queue.pop_front() {
            queue.extend(self.children(next, true)?);
            visited.push(next);
        }
        Ok(visited)
    }

    pub fn file_size(&self, id: NodeId) -> Result<u64> {
        let node = self.get(id)?;
        match node.contents {
            Contents::File { size, .. } => Ok(size),
            Contents::Directory { .. } => Err(SimFsError::NotAFile(self.path_string(id))),
        }
    }

    pub fn set_file_size(&mut self, id: NodeId, new_size: u64) -> Result<()> {
        if let Contents::File { size, .. } = self.file_contents(id)? {
            *size = new_size;
        }
        Ok(())
    }

    pub fn file_blocks(&self, id: NodeId) -> Result<&[BlockId]> {
        let node = self.get(id)?;
        match &node.contents {
            Contents::File { blocks, .. } => Ok(blocks),
            Contents::Directory { .. } => Err(SimFsError::NotAFile(self.path_string(id))),
        }
    }

    /// Hands an already allocated block to a file.
    pub fn assign_block(&mut self, id: NodeId, block: BlockId) -> Result<()> {
        if let Contents::File { blocks, .. } = self.file_contents(id)? {
            blocks.push(block);
        }
        Ok(())
    }

    /// Takes the most recently assigned block back from a file. The caller
    /// is expected to free it.
    pub fn release_block(&mut self, id: NodeId) -> Result<Option<BlockId>> {
        match self.file_contents(id)? {
            Contents::File { blocks, .. } => Ok(blocks.pop()),
            Contents::Directory { .. } => Ok(None),
        }
    }

    fn file_contents(&mut self, id: NodeId) -> Result<&mut Contents> {
        if !self.get(id)?.is_file() {
            return Err(SimFsError::NotAFile(self.path_string(id)));
        }
        Ok(&mut self.get_mut(id)?.contents)
    }

    /// Marks a node as modified now.
    pub fn touch(&mut self, id: NodeId) -> Result<()> {
        self.set_modified(id, SystemTime::now())
    }

    pub fn set_modified(&mut self, id: NodeId, time: SystemTime) -> Result<()> {
        self.get_mut(id)?.modified = time;
        Ok(())
    }

    /// Destroys every node in the tree, returning how many were released. The
    /// tree is left empty and every handle into it is stale.
    pub fn flush(&mut self) -> usize {
        let mut released = 0;
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            let node = match self.slots.get_mut(id.index).and_then(|s| s.node.take()) {
                Some(node) => node,
                None => continue,
            };
            if let Contents::Directory { children } = node.contents {
                pending.extend(children);
            }
            self.slots[id.index].generation += 1;
            self.vacant.push(id.index);
            released += 1;
        }
        self.live -= released;
        debug!("flushed {} nodes", released);
        released
    }

    fn occupy(&mut self, node: Node) -> NodeId {
        self.live += 1;
        match self.vacant.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn vacate(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.index];
        slot.node = None;
        slot.generation += 1;
        self.vacant.push(id.index);
        self.live -= 1;
    }
}
