//! Error types for relabeling, map decoding and export IO.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Volumes, planes or tables whose dimensions don't line up.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A source id was observed with two different targets.
    #[error("ambiguous mapping: id {id} maps to both {first} and {second}")]
    AmbiguousMapping { id: u32, first: u32, second: u32 },

    /// A nonzero id with no table entry, under `UnmappedPolicy::Strict`.
    #[error("unmapped id {id}")]
    UnmappedId { id: u32 },

    /// Cumulative plane offsets no longer fit in a `u32` label.
    #[error("label id overflow at plane {plane}")]
    IdOverflow { plane: usize },

    /// A label too large for the requested output pixel depth.
    #[error("label {value} does not fit in {depth} output")]
    BitDepth { value: u32, depth: &'static str },

    /// Malformed correspondence table text.
    #[error("table line {line}: {msg}")]
    Table { line: usize, msg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "im-io")]
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
