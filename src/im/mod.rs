pub mod core;
#[allow(unused_imports)]
pub use core::{Im, LabelIm, LabelVol, Lum8Im, Vol, WeightVol};

pub mod label;
#[allow(unused_imports)]
pub use label::{LabelInfo, label_im};

// Optional extras
// -----------------------------------------------------------------------------

#[cfg(feature = "im-io")]
pub mod io;
