use std::io;
use thiserror::Error;

/// Error types for MRG rig decoding
#[derive(Error, Debug)]
pub enum MrgError {
    /// I/O Error while loading an archive
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record extends past the end of the buffer
    #[error("Unexpected end of data: needed {needed} bytes at offset {offset:#x}, buffer has {available}")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Invalid identifier in a record header
    #[error("Invalid magic number: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    /// The child/sibling walk returned to a record it already visited
    #[error("Joint record at offset {offset:#x} is linked more than once")]
    CyclicJointLink { offset: usize },

    /// The joint walk produced more records than any skeleton can hold
    #[error("Skeleton exceeds {0} joints")]
    TooManyJoints(usize),

    /// An animation block declares a length that cannot advance the chain
    #[error("Animation block at offset {offset:#x} declares invalid length {length}")]
    InvalidBlockLength { offset: usize, length: i32 },

    /// Error during parsing
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error during validation
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type using MrgError
pub type Result<T> = std::result::Result<T, MrgError>;
