//! An in-memory simulation of a single disk filesystem.
//!
//! A directory tree of named files and directories sits on top of a fixed
//! size disk of equally sized blocks. Files only track their length in bytes
//! and the blocks that length occupies; there is no file content.
//!
//! ```
//! use simfs::Session;
//!
//! let mut session = Session::new();
//! let fs = session.init(32, 512).unwrap();
//! fs.make_dir("/docs").unwrap();
//! fs.create_file("/docs/notes").unwrap();
//! let change = fs.append("/docs/notes", 50).unwrap();
//! assert_eq!(change.blocks, vec![0, 1]);
//! session.teardown().unwrap();
//! ```

pub mod accounting;
mod alloc;
mod config;
mod error;
mod fs;
mod node;
pub mod path;
mod session;

pub use crate::alloc::{BlockId, BlockLedger, State};
pub use crate::config::{Config, ConfigBuilder, DEFAULT_BLOCK_SIZE, DEFAULT_CAPACITY};
pub use crate::error::{Result, SimFsError};
pub use crate::fs::{block_runs, DirEntry, DiskReport, FileReport, SimFs, SizeChange, WalkEntry};
pub use crate::node::{Node, NodeId, NodeKind, NodeTree};
pub use crate::path::FsPath;
pub use crate::session::Session;
