use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SimFsError {
    #[error("{0}: no such file or directory")]
    PathNotFound(String),
    #[error("{0}: not a directory")]
    NotADirectory(String),
    #[error("{0}: not a file")]
    NotAFile(String),
    #[error("{0}: already exists")]
    AlreadyExists(String),
    #[error("{0}: containing directory does not exist")]
    ParentMissing(String),
    #[error("{0}: cannot add an entry beneath a file")]
    ParentIsFile(String),
    #[error("{0}: directory not empty")]
    DirectoryNotEmpty(String),
    #[error("{0}: directory currently in use")]
    DirectoryInUse(String),
    #[error("path names no entry")]
    EmptyPath,
    #[error("invalid entry name {0:?}")]
    InvalidName(String),
    #[error("the root directory cannot be removed")]
    RootRemoval,
    #[error("node handle does not refer to a live node")]
    NodeNotFound,
    #[error("byte count must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("cannot remove {request} bytes from a {size} byte file")]
    Underflow { size: u64, request: u64 },
    #[error("cannot add {request} bytes to a {size} byte file")]
    Overflow { size: u64, request: u64 },
    #[error("insufficient space to allocate {needed} blocks ({available} free)")]
    InsufficientSpace { needed: u64, available: u64 },
    #[error("no free block available")]
    AllocatorExhausted,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("filesystem is already initialized")]
    AlreadyInitialized,
    #[error("filesystem is not initialized")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, SimFsError>;
