// Library crate root.
//
// Converts a 3D segmentation into the plane-local superpixel -> segment -> body
// hierarchy used by slice-based proofreading, and reconstructs bodies from it.
// The binary (src/main.rs) is a thin CLI over `export`.

pub mod annot;
pub mod error;
pub mod fmap;
pub mod hierarchy;
pub mod im;
pub mod reader;
pub mod relabel;
pub mod table;

#[cfg(feature = "im-io")]
pub mod export;

pub use error::{Error, Result};

#[cfg(test)]
pub mod test_helpers;
